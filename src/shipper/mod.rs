//! Asynchronous delivery pipeline shipping log events to a remote collector.
//!
//! [`Shipper`] decouples producing threads from the network behind a bounded
//! queue. A single dispatcher thread drains the queue and writes encoded
//! events to the live connection; a connector thread re-establishes the
//! connection with retries and host failover; events the queue cannot
//! accept are routed to an optional [`BackupSink`](crate::backup::BackupSink).
//! Producers never block past their configured offer timeout, and nothing
//! in the pipeline propagates a fault into the hosting application.

mod config;
mod connector;
mod dispatcher;
mod hosts;
mod queue;
mod transport;


pub use config::{
    ConfigError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_NOF_RETRIES, DEFAULT_OFFER_TIMEOUT,
    DEFAULT_PORT, DEFAULT_QUEUE_SIZE, DEFAULT_WRITE_TIMEOUT, MIN_RECONNECT_DELAY,
    MIN_SHUTDOWN_TIMEOUT, ShipperConfig,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use log::{trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::backup::BackupSink;
use crate::encoder::{Encoder, JsonEncoder};
use crate::event::LogEvent;

use dispatcher::DispatcherShared;
use queue::EventQueue;
use transport::Transport;

/// Slack added to the shutdown budget before the stop call gives up waiting
/// for the dispatcher.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct Pipeline {
    queue: Arc<EventQueue>,
    transport: Arc<Transport>,
    dispatcher: Arc<DispatcherShared>,
    done_rx: Receiver<u64>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Reliable, non-blocking client shipping log events to a remote collector.
///
/// Create it with a [`ShipperConfig`], optionally install a custom encoder
/// and a backup sink, then call [`start`](Self::start). Producer threads
/// hand events in through [`append`](Self::append); [`stop`](Self::stop)
/// drains the queue within the shutdown budget and reports how many events
/// could not be delivered.
pub struct Shipper {
    config: ShipperConfig,
    encoder: Option<Box<dyn Encoder>>,
    backup: Option<Arc<dyn BackupSink>>,
    pipeline: RwLock<Option<Pipeline>>,
    accepting: AtomicBool,
    stopped: AtomicBool,
    /// Consecutive failed offers since the last successful enqueue; the
    /// overflow warning fires only on the 0 -> 1 transition.
    overflow_streak: AtomicU64,
}

impl Shipper {
    pub fn new(config: ShipperConfig) -> Self {
        Self {
            config,
            encoder: None,
            backup: None,
            pipeline: RwLock::new(None),
            accepting: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            overflow_streak: AtomicU64::new(0),
        }
    }

    /// Replace the default JSON encoder. Must be called before `start`.
    pub fn set_encoder(&mut self, encoder: Box<dyn Encoder>) {
        self.encoder = Some(encoder);
    }

    /// Install a backup sink receiving events the queue cannot accept.
    pub fn set_backup(&mut self, backup: Arc<dyn BackupSink>) {
        self.backup = Some(backup);
    }

    /// Validate the configuration and start the pipeline.
    ///
    /// Returns immediately without waiting for connectivity; the first
    /// connection attempt runs on the connector thread. Calling `start` on
    /// a shipper that is already running (or was stopped) is a no-op.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        if self.stopped.load(Ordering::Acquire) || self.pipeline.get_mut().is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| default_encoder(&self.config));
        let queue = Arc::new(EventQueue::new(self.config.queue_size));
        let transport = Arc::new(Transport::new(&self.config, encoder));
        let shared = Arc::new(DispatcherShared::new());
        let (done_tx, done_rx) = bounded(1);

        let thread = {
            let shared = Arc::clone(&shared);
            let queue = Arc::clone(&queue);
            let transport = Arc::clone(&transport);
            thread::spawn(move || dispatcher::run(shared, queue, transport, done_tx))
        };
        transport.start();

        *self.pipeline.get_mut() = Some(Pipeline {
            queue,
            transport,
            dispatcher: shared,
            done_rx,
            thread: Mutex::new(Some(thread)),
        });
        self.accepting.store(true, Ordering::Release);
        trace!("shipper started");
        Ok(())
    }

    /// Producer entry point: enqueue an event for delivery.
    ///
    /// Blocks at most the configured offer timeout (zero by default, so
    /// never). When the queue is full the event goes to the backup sink if
    /// one is installed, otherwise it is dropped; either way a single
    /// warning is emitted per overflow episode. After `stop` this is a
    /// no-op.
    pub fn append(&self, event: LogEvent) {
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }
        let pipeline = self.pipeline.read();
        let Some(pipeline) = pipeline.as_ref() else {
            return;
        };
        match pipeline.queue.offer(event, self.config.offer_timeout) {
            Ok(()) => {
                self.overflow_streak.store(0, Ordering::Relaxed);
            }
            Err(event) => {
                if self.overflow_streak.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!(
                        "event queue is full [{}]; increase the queue size or reduce the volume of log events",
                        pipeline.queue.len()
                    );
                    if self.backup.is_some() {
                        warn!(
                            "backup sink activated; overflowed events can be imported into the collector later"
                        );
                    } else {
                        warn!("backup sink is not configured, overflowed events are dropped");
                    }
                }
                if let Some(backup) = &self.backup {
                    backup.accept(event);
                }
            }
        }
    }

    /// Stop the pipeline, draining queued events within the shutdown budget.
    ///
    /// Blocks up to the configured shutdown timeout plus a small grace
    /// bound. Returns the number of orphans: events that could not be
    /// delivered before shutdown completed. Idempotent; subsequent calls
    /// return zero.
    pub fn stop(&self) -> u64 {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return 0;
        }
        self.accepting.store(false, Ordering::Release);
        let pipeline = self.pipeline.read();
        let Some(pipeline) = pipeline.as_ref() else {
            return 0;
        };

        pipeline
            .dispatcher
            .begin_drain(Instant::now() + self.config.shutdown_timeout);
        let orphans = match pipeline
            .done_rx
            .recv_timeout(self.config.shutdown_timeout + SHUTDOWN_GRACE)
        {
            Ok(orphans) => {
                if let Some(thread) = pipeline.thread.lock().take() {
                    if thread.join().is_err() {
                        warn!("dispatcher thread panicked");
                    }
                }
                orphans
            }
            Err(_) => {
                warn!("dispatcher did not finish draining within the shutdown budget");
                pipeline.queue.len() as u64
            }
        };
        pipeline.transport.stop();

        if orphans > 0 {
            warn!("shipper stopped with {orphans} orphaned events");
        } else {
            trace!("shipper stopped OK");
        }
        orphans
    }

    /// Whether a connection is currently usable for sending. Advisory: not
    /// synchronised with concurrent sends.
    pub fn is_operational(&self) -> bool {
        self.pipeline
            .read()
            .as_ref()
            .is_some_and(|p| p.transport.is_operational())
    }

    /// Events successfully delivered since start-up. Monotonic.
    pub fn total_count(&self) -> u64 {
        self.pipeline
            .read()
            .as_ref()
            .map_or(0, |p| p.transport.total_count())
    }

    /// Events currently queued for delivery.
    pub fn queue_len(&self) -> usize {
        self.pipeline.read().as_ref().map_or(0, |p| p.queue.len())
    }

    /// Whether producing adapters should capture call-site information.
    pub fn wants_location_info(&self) -> bool {
        self.config.location_info
    }
}

impl Drop for Shipper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_encoder(config: &ShipperConfig) -> Box<dyn Encoder> {
    let mut encoder = JsonEncoder::new();
    if let Some(application) = &config.application {
        encoder = encoder.with_application(application);
    }
    if let Some(hostname) = &config.hostname {
        encoder = encoder.with_hostname(hostname);
    }
    Box::new(encoder)
}

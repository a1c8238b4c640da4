//! Single consumer loop turning queued events into network writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::warn;
use parking_lot::Mutex;

use super::queue::EventQueue;
use super::transport::{SendOutcome, Transport};

/// Bound on queue polls so a stop request is observed promptly even when
/// the queue is idle.
const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(500);
/// Re-poll interval while the transport is not operational; the condvar in
/// the transport wakes the wait early when a connection lands.
const OFFLINE_POLL_TIMEOUT: Duration = Duration::from_millis(500);

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const DRAINING: u8 = 2;
const STOPPED: u8 = 3;

/// Dispatcher lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DispatcherState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// State shared between the dispatcher thread and the shipper façade.
pub(crate) struct DispatcherShared {
    state: AtomicU8,
    drain_deadline: Mutex<Option<Instant>>,
}

impl DispatcherShared {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            drain_deadline: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DispatcherState {
        match self.state.load(Ordering::Acquire) {
            IDLE => DispatcherState::Idle,
            RUNNING => DispatcherState::Running,
            DRAINING => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    /// Ask the dispatcher to drain the queue and exit by `deadline`.
    pub fn begin_drain(&self, deadline: Instant) {
        *self.drain_deadline.lock() = Some(deadline);
        // Idle -> Draining covers a stop that lands before the thread's
        // first iteration; the run loop checks for that and skips straight
        // to the drain.
        let _ = self
            .state
            .compare_exchange(IDLE, DRAINING, Ordering::AcqRel, Ordering::Acquire);
        let _ = self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Dispatcher thread body.
///
/// The orphan total (events that could not be delivered before shutdown
/// completed) is reported over `done_tx` once the drain finishes.
pub(crate) fn run(
    shared: Arc<DispatcherShared>,
    queue: Arc<EventQueue>,
    transport: Arc<Transport>,
    done_tx: Sender<u64>,
) {
    let mut orphans = 0u64;
    let _ = shared
        .state
        .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire);

    while shared.state() == DispatcherState::Running {
        if !transport.is_operational() {
            transport.wait_until_operational(OFFLINE_POLL_TIMEOUT);
            continue;
        }
        let Some(event) = queue.take(QUEUE_POLL_TIMEOUT) else {
            continue;
        };
        match transport.send(&event) {
            SendOutcome::Sent | SendOutcome::EncodeFailed => {}
            SendOutcome::NotConnected | SendOutcome::IoFailed => {
                if shared.state() == DispatcherState::Running {
                    // Best-effort re-delivery at the tail; a zero timeout
                    // keeps re-insertion from inflating the bound.
                    if queue.offer(event, Duration::ZERO).is_err() {
                        warn!("re-enqueue failed with the queue at capacity, event dropped");
                    }
                } else {
                    orphans += 1;
                }
            }
        }
    }

    // Drain phase: no re-offers, every undeliverable event is an orphan.
    let deadline = (*shared.drain_deadline.lock()).unwrap_or_else(Instant::now);
    while Instant::now() < deadline {
        let Some(event) = queue.take(Duration::ZERO) else {
            break;
        };
        match transport.send(&event) {
            SendOutcome::Sent | SendOutcome::EncodeFailed => {}
            SendOutcome::NotConnected | SendOutcome::IoFailed => orphans += 1,
        }
    }
    // Producers that passed the accepting check may still be completing
    // an offer; sweep until the queue stays empty for a beat so their
    // events are counted rather than silently lost.
    while queue.take(Duration::from_millis(10)).is_some() {
        orphans += 1;
    }

    shared.state.store(STOPPED, Ordering::Release);
    if orphans > 0 {
        warn!("dispatcher stopped with {orphans} orphaned events");
    }
    let _ = done_tx.send(orphans);
}

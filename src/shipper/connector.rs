//! Background task (re)establishing the transport's connection.
//!
//! At most one connector cycle is alive at a time. A cycle retries the
//! current host up to `nof_retries` times with the fixed reconnection delay
//! between attempts, then rotates to the next host and starts a fresh
//! attempt cycle in the same thread. A stop request cancels the sleep and
//! the cycle exits silently without advancing any state.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use log::{trace, warn};

use super::hosts::{RetryAction, RetrySchedule};
use super::transport::{Status, Transport};

/// Granularity of the cancellable reconnection sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

impl Transport {
    /// Start a connector cycle unless one is already running.
    ///
    /// `nof_retries == 0` disables reconnection entirely: the transport
    /// parks in `Failed` until restarted.
    pub(crate) fn spawn_connector(self: &Arc<Self>) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        if self.nof_retries == 0 {
            let mut state = self.state.lock();
            if state.status != Status::Connected {
                state.status = Status::Failed;
            }
            return;
        }
        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // A cycle is already alive; it owns host selection until it exits.
            return;
        }
        {
            let mut state = self.state.lock();
            if state.status != Status::Connected {
                state.status = Status::Connecting;
            }
        }
        let transport = Arc::clone(self);
        // Detached: a stop request cannot interrupt a dial blocked in the
        // kernel, so nothing ever joins this thread. It observes the
        // shutdown flag and exits on its own once the dial resolves.
        let spawned = thread::Builder::new()
            .name("logship-connector".into())
            .spawn(move || {
                transport.run_connector();
                transport.connecting.store(false, Ordering::Release);
            });
        if spawned.is_err() {
            self.connecting.store(false, Ordering::Release);
            warn!("failed to spawn connector thread");
        }
    }

    fn run_connector(&self) {
        let mut schedule = RetrySchedule::new(self.nof_retries, self.reconnect_delay);
        loop {
            if let Some(delay) = schedule.next_delay() {
                if !self.sleep_cancellable(delay) {
                    return;
                }
            }
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }

            let resolved = self.cursor.lock().resolve_current();
            let attempt = resolved
                .and_then(|addr| open_stream(addr, self.connect_timeout, self.write_timeout));
            match attempt {
                Ok(stream) => {
                    let mut state = self.state.lock();
                    if self.shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    state.conn = Some(stream);
                    state.status = Status::Connected;
                    drop(state);
                    self.connected.notify_all();
                    trace!("connected to {}", self.cursor.lock().current_name());
                    return;
                }
                Err(err) => match schedule.on_failure() {
                    RetryAction::Retry { .. } => {
                        trace!(
                            "connection attempt to {} failed: {err}",
                            self.cursor.lock().current_name()
                        );
                    }
                    RetryAction::Rotate => {
                        let mut cursor = self.cursor.lock();
                        let exhausted = cursor.current_name().to_owned();
                        cursor.rotate();
                        warn!(
                            "unable to connect to {exhausted} after {} retries, trying {}",
                            self.nof_retries,
                            cursor.current_name()
                        );
                    }
                },
            }
        }
    }

    /// Sleep in short slices so a stop request is observed promptly.
    ///
    /// Returns `false` when cancelled.
    fn sleep_cancellable(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

fn open_stream(
    addr: SocketAddr,
    connect_timeout: Duration,
    write_timeout: Duration,
) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, connect_timeout)?;
    socket2::SockRef::from(&stream).set_keepalive(true)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(write_timeout))?;
    Ok(stream)
}

//! Connection ownership and the send path.
//!
//! `Transport` holds the single live connection behind one lock together
//! with the connection state, so a send can never observe a half-installed
//! stream. The connector (see `connector.rs`) is the sole writer of state
//! transitions into `Connected`; the send path is the sole invalidator.

use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::encoder::Encoder;
use crate::event::LogEvent;

use super::config::ShipperConfig;
use super::hosts::HostCursor;

/// Challenge bytes written before each payload when probing is enabled.
///
/// A half-closed socket often accepts one more write; risking two throwaway
/// bytes first surfaces the broken connection before the real payload is
/// lost in the socket buffers.
const PROBE: &[u8] = b"  ";

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

pub(super) struct TransportState {
    pub status: Status,
    pub conn: Option<TcpStream>,
}

/// Result of a single send attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Sent,
    /// The event could not be serialised; the caller drops it.
    EncodeFailed,
    /// No live connection; the caller should re-offer the event.
    NotConnected,
    /// The write failed and reconnection has been triggered; the caller
    /// should re-offer the event.
    IoFailed,
}

pub(crate) struct Transport {
    pub(super) state: Mutex<TransportState>,
    /// Notified when a connection is installed and on shutdown.
    pub(super) connected: Condvar,
    pub(super) cursor: Mutex<HostCursor>,
    encoder: Box<dyn Encoder>,
    total: AtomicU64,
    pub(super) shutdown: AtomicBool,
    /// At-most-one-connector guard.
    pub(super) connecting: AtomicBool,
    pub(super) reconnect_delay: Duration,
    pub(super) nof_retries: u32,
    pub(super) connect_timeout: Duration,
    pub(super) write_timeout: Duration,
    probe_before_send: bool,
}

impl Transport {
    pub fn new(config: &ShipperConfig, encoder: Box<dyn Encoder>) -> Self {
        Self {
            state: Mutex::new(TransportState {
                status: Status::Disconnected,
                conn: None,
            }),
            connected: Condvar::new(),
            cursor: Mutex::new(HostCursor::new(&config.hosts, config.port)),
            encoder,
            total: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            reconnect_delay: config.reconnect_delay,
            nof_retries: config.nof_retries,
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
            probe_before_send: config.probe_before_send,
        }
    }

    /// Kick off the first connection attempt and return immediately.
    pub fn start(self: &Arc<Self>) {
        self.spawn_connector();
    }

    /// Close the connection and cancel any live connector cycle.
    ///
    /// Returns without waiting for the connector: a dial blocked in the
    /// kernel cannot be interrupted, so the cycle is left to observe the
    /// shutdown flag and exit on its own once the dial resolves. The
    /// install path re-checks the flag under the state lock, so no
    /// connection can appear after this returns.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        {
            let mut state = self.state.lock();
            state.conn = None;
            state.status = Status::Disconnected;
        }
        self.connected.notify_all();
    }

    /// Advisory: whether a connection is currently usable for sending.
    pub fn is_operational(&self) -> bool {
        let state = self.state.lock();
        state.status == Status::Connected && state.conn.is_some()
    }

    /// Events successfully written since start-up.
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Serialise and transmit one event.
    ///
    /// Expected I/O failures never panic or propagate: they are reported
    /// through the returned [`SendOutcome`] and the state transition to
    /// `Disconnected`, which also triggers a new connector cycle.
    pub fn send(self: &Arc<Self>, event: &LogEvent) -> SendOutcome {
        let payload = match self.encoder.encode(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode event, dropping it: {err}");
                return SendOutcome::EncodeFailed;
            }
        };

        // The stream is checked out of the shared state for the duration
        // of the write, so status queries never wait behind socket I/O.
        let Some(mut conn) = self.state.lock().conn.take() else {
            return SendOutcome::NotConnected;
        };
        match write_payload(&mut conn, &payload, self.probe_before_send) {
            Ok(()) => {
                let mut state = self.state.lock();
                // `stop` or a reconnection may have run while the stream
                // was checked out; the stale handle is discarded then.
                if state.status == Status::Connected && state.conn.is_none() {
                    state.conn = Some(conn);
                }
                drop(state);
                self.total.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Sent
            }
            Err(err) => {
                self.state.lock().status = Status::Disconnected;
                warn!("socket write failed: {err}");
                self.spawn_connector();
                SendOutcome::IoFailed
            }
        }
    }

    /// Block until the transport is operational, `timeout` at most.
    ///
    /// Wakes early when the connector installs a connection; the bounded
    /// timeout doubles as the polling fallback.
    pub fn wait_until_operational(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if state.status == Status::Connected {
            return true;
        }
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        self.connected.wait_for(&mut state, timeout);
        state.status == Status::Connected
    }
}

fn write_payload(conn: &mut TcpStream, payload: &[u8], probe: bool) -> io::Result<()> {
    if probe {
        conn.write_all(PROBE)?;
        conn.flush()?;
    }
    conn.write_all(payload)?;
    conn.flush()
}

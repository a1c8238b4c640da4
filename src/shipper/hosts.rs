//! Failover host list and retry bookkeeping.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

struct HostEntry {
    name: String,
    cached: Option<SocketAddr>,
}

/// Ordered host list with a wrapping cursor and per-entry address cache.
///
/// Only the connector touches the cursor; rotation happens when the retry
/// budget against the current host is exhausted.
pub(crate) struct HostCursor {
    entries: Vec<HostEntry>,
    index: usize,
    port: u16,
}

impl HostCursor {
    /// Build the cursor, skipping blank entries in the host list.
    ///
    /// Configuration validation guarantees at least one usable host, so
    /// the cursor is never empty.
    pub fn new(hosts: &[String], port: u16) -> Self {
        let entries = hosts
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| HostEntry {
                name: name.to_owned(),
                cached: None,
            })
            .collect();
        Self {
            entries,
            index: 0,
            port,
        }
    }

    pub fn current_name(&self) -> &str {
        &self.entries[self.index].name
    }

    /// Resolve the current host, caching the first address returned.
    pub fn resolve_current(&mut self) -> io::Result<SocketAddr> {
        let entry = &mut self.entries[self.index];
        if let Some(addr) = entry.cached {
            return Ok(addr);
        }
        let addr = (entry.name.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for {}", entry.name),
                )
            })?;
        entry.cached = Some(addr);
        Ok(addr)
    }

    /// Advance to the next host, wrapping to the front of the list.
    ///
    /// The departing entry's cache is cleared so a later visit re-resolves.
    pub fn rotate(&mut self) {
        self.entries[self.index].cached = None;
        self.index = (self.index + 1) % self.entries.len();
    }
}

/// What the connector should do after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RetryAction {
    /// Try the same host again after `delay`.
    Retry { delay: Duration },
    /// Retry budget exhausted; rotate to the next host.
    Rotate,
}

/// Retries-then-rotate bookkeeping for one connector cycle.
///
/// The first attempt against a host is immediate; each retry after a
/// failure waits the fixed reconnection delay. After `nof_retries`
/// consecutive failures the schedule resets and asks for rotation, so a
/// fresh host always gets an immediate first attempt.
pub(crate) struct RetrySchedule {
    nof_retries: u32,
    failures: u32,
    delay: Duration,
}

impl RetrySchedule {
    pub fn new(nof_retries: u32, delay: Duration) -> Self {
        Self {
            nof_retries,
            failures: 0,
            delay,
        }
    }

    /// Delay to wait before the next attempt, `None` for an immediate one.
    pub fn next_delay(&self) -> Option<Duration> {
        (self.failures > 0).then_some(self.delay)
    }

    pub fn on_failure(&mut self) -> RetryAction {
        self.failures += 1;
        if self.failures >= self.nof_retries {
            self.failures = 0;
            RetryAction::Rotate
        } else {
            RetryAction::Retry { delay: self.delay }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn schedule_retries_then_rotates() {
        let delay = Duration::from_millis(100);
        let mut schedule = RetrySchedule::new(3, delay);

        assert_eq!(schedule.next_delay(), None);
        assert_eq!(schedule.on_failure(), RetryAction::Retry { delay });
        assert_eq!(schedule.next_delay(), Some(delay));
        assert_eq!(schedule.on_failure(), RetryAction::Retry { delay });
        assert_eq!(schedule.on_failure(), RetryAction::Rotate);
        // Fresh cycle against the next host starts immediately.
        assert_eq!(schedule.next_delay(), None);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn schedule_allows_exactly_nof_retries_attempts(#[case] retries: u32) {
        let mut schedule = RetrySchedule::new(retries, Duration::from_millis(1));
        let mut attempts = 1u32; // the immediate first attempt failed
        while schedule.on_failure() != RetryAction::Rotate {
            attempts += 1;
        }
        assert_eq!(attempts, retries);
    }

    #[test]
    fn cursor_rotates_with_wrap() {
        let hosts = vec!["alpha".to_string(), "beta".to_string()];
        let mut cursor = HostCursor::new(&hosts, 4321);
        assert_eq!(cursor.current_name(), "alpha");
        cursor.rotate();
        assert_eq!(cursor.current_name(), "beta");
        cursor.rotate();
        assert_eq!(cursor.current_name(), "alpha");
    }

    #[test]
    fn blank_entries_are_dropped() {
        let hosts = vec![String::new(), "  ".to_string(), " beta ".to_string()];
        let mut cursor = HostCursor::new(&hosts, 1);
        assert_eq!(cursor.entries.len(), 1);
        assert_eq!(cursor.current_name(), "beta");
        cursor.rotate();
        assert_eq!(cursor.current_name(), "beta");
    }

    #[test]
    fn single_host_rotates_to_itself() {
        let hosts = vec!["only".to_string()];
        let mut cursor = HostCursor::new(&hosts, 4321);
        cursor.rotate();
        assert_eq!(cursor.current_name(), "only");
    }

    #[test]
    fn resolution_is_cached_until_rotation() {
        let hosts = vec!["127.0.0.1".to_string()];
        let mut cursor = HostCursor::new(&hosts, 9999);
        let first = cursor.resolve_current().expect("resolve loopback");
        assert_eq!(first.port(), 9999);
        assert_eq!(cursor.entries[0].cached, Some(first));
        cursor.rotate();
        assert_eq!(cursor.entries[0].cached, None);
    }

    #[test]
    fn unresolvable_host_reports_error() {
        let hosts = vec!["host.invalid.".to_string()];
        let mut cursor = HostCursor::new(&hosts, 1);
        assert!(cursor.resolve_current().is_err());
    }
}

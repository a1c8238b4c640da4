//! Shipper configuration: defaults, floors, and start-up validation.

use std::time::Duration;

use thiserror::Error;

/// Default collector port.
pub const DEFAULT_PORT: u16 = 55200;
/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 500;
/// Default number of connection attempts per host before failover.
pub const DEFAULT_NOF_RETRIES: u32 = 3;
/// Default producer offer timeout; zero means non-blocking.
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::ZERO;
/// Default and minimum delay between reconnection attempts.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// Default and minimum shutdown drain budget.
pub const MIN_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default timeout for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout applied to each socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration consumed by [`Shipper`](super::Shipper).
///
/// The fields are public so embedded and test callers can set exact values;
/// the `set_*` setters apply the same floors the configuration surface of
/// the hosting framework is expected to enforce.
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    /// Ordered failover host list; must be non-empty at start-up.
    pub hosts: Vec<String>,
    pub port: u16,
    pub queue_size: usize,
    /// How long `append` may block waiting for queue space.
    pub offer_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Connection attempts per host before rotating; zero disables
    /// reconnection entirely.
    pub nof_retries: u32,
    pub connect_timeout: Duration,
    /// Bound on each socket write, so a wedged collector cannot stall the
    /// dispatcher past the shutdown budget.
    pub write_timeout: Duration,
    /// Whether producing adapters should capture call-site information.
    pub location_info: bool,
    /// Write a tiny probe before each payload to detect half-closed sockets.
    pub probe_before_send: bool,
    /// Application name stamped into encoded payloads.
    pub application: Option<String>,
    /// Origin host name stamped into encoded payloads.
    pub hostname: Option<String>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            port: DEFAULT_PORT,
            queue_size: DEFAULT_QUEUE_SIZE,
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            shutdown_timeout: MIN_SHUTDOWN_TIMEOUT,
            reconnect_delay: MIN_RECONNECT_DELAY,
            nof_retries: DEFAULT_NOF_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            location_info: false,
            probe_before_send: true,
            application: None,
            hostname: None,
        }
    }
}

impl ShipperConfig {
    /// Populate the host list from a comma-separated specification.
    pub fn parse_hosts(&mut self, spec: &str) {
        self.hosts = spec
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(ToString::to_string)
            .collect();
    }

    /// Set the reconnection delay, enforcing the 5 s floor.
    pub fn set_reconnect_delay(&mut self, delay: Duration) {
        self.reconnect_delay = delay.max(MIN_RECONNECT_DELAY);
    }

    /// Set the shutdown drain budget, enforcing the 5 s floor.
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) {
        self.shutdown_timeout = timeout.max(MIN_SHUTDOWN_TIMEOUT);
    }

    /// Validate the configuration before the pipeline starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::NoHosts);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        Ok(())
    }
}

/// Start-up configuration errors; the shipper refuses to start on any of
/// these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one remote host must be configured")]
    NoHosts,
    #[error("queue size must be greater than zero")]
    ZeroQueueSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_values() {
        let config = ShipperConfig::default();
        assert_eq!(config.port, 55200);
        assert_eq!(config.queue_size, 500);
        assert_eq!(config.nof_retries, 3);
        assert_eq!(config.offer_timeout, Duration::ZERO);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.probe_before_send);
    }

    #[rstest]
    #[case("host1", vec!["host1"])]
    #[case("a.example.com, b.example.com", vec!["a.example.com", "b.example.com"])]
    #[case(" a ,, b ", vec!["a", "b"])]
    fn parses_comma_separated_hosts(#[case] spec: &str, #[case] expected: Vec<&str>) {
        let mut config = ShipperConfig::default();
        config.parse_hosts(spec);
        assert_eq!(config.hosts, expected);
    }

    #[test]
    fn setters_enforce_floors() {
        let mut config = ShipperConfig::default();
        config.set_reconnect_delay(Duration::from_millis(100));
        assert_eq!(config.reconnect_delay, MIN_RECONNECT_DELAY);
        config.set_shutdown_timeout(Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        config.set_shutdown_timeout(Duration::from_millis(1));
        assert_eq!(config.shutdown_timeout, MIN_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn validation_requires_hosts_and_capacity() {
        let config = ShipperConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoHosts)));

        let mut config = ShipperConfig::default();
        config.parse_hosts("localhost");
        config.queue_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroQueueSize)));

        config.queue_size = 1;
        assert!(config.validate().is_ok());
    }
}

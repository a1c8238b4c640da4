//! Event serialisation.
//!
//! The delivery core treats the wire encoding as a collaborator behind the
//! [`Encoder`] trait. [`JsonEncoder`] is the default implementation: one
//! newline-terminated JSON object per event, with optional `application`
//! and `hostname` context keys stamped into every payload.

use std::collections::BTreeMap;
use std::io;

use serde::Serialize;

use crate::event::{CallSite, LogEvent, Thrown};

/// Context key carrying the configured application name.
pub const APPLICATION_KEY: &str = "application";
/// Context key carrying the configured origin host name.
pub const HOSTNAME_KEY: &str = "hostname";

/// Serialises a [`LogEvent`] into the bytes written to the collector.
///
/// Invoked synchronously by the dispatcher thread; implementations must not
/// block on anything slower than the serialisation itself.
pub trait Encoder: Send + Sync {
    fn encode(&self, event: &LogEvent) -> io::Result<Vec<u8>>;
}

/// Borrowed view serialised by [`JsonEncoder`].
#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp_ms: i64,
    timestamp: String,
    level: &'static str,
    logger: &'a str,
    thread: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    context: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thrown: Option<&'a Thrown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_site: Option<&'a CallSite>,
}

/// Default JSON line encoder.
#[derive(Clone, Debug, Default)]
pub struct JsonEncoder {
    application: Option<String>,
    hostname: Option<String>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp an `application` context key into every payload.
    pub fn with_application(mut self, application: &str) -> Self {
        self.application = Some(application.to_owned());
        self
    }

    /// Stamp a `hostname` context key into every payload.
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_owned());
        self
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, event: &LogEvent) -> io::Result<Vec<u8>> {
        let mut context: BTreeMap<&str, &str> = event
            .context
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(application) = &self.application {
            context.insert(APPLICATION_KEY, application);
        }
        if let Some(hostname) = &self.hostname {
            context.insert(HOSTNAME_KEY, hostname);
        }

        let view = JsonEvent {
            timestamp_ms: event.timestamp.timestamp_millis(),
            timestamp: event.timestamp.to_rfc3339(),
            level: event.level.as_str(),
            logger: &event.logger,
            thread: &event.thread_name,
            message: &event.message,
            context,
            thrown: event.thrown.as_ref(),
            call_site: event.call_site.as_ref(),
        };

        let mut buf = serde_json::to_vec(&view).map_err(io::Error::other)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use serde_json::Value;

    fn decode(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("decode payload")
    }

    #[test]
    fn encodes_core_fields_as_one_line() {
        let event = LogEvent::new("app.db", Level::Warn, "slow query");
        let bytes = JsonEncoder::new().encode(&event).expect("encode");
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert!(!bytes[..bytes.len() - 1].contains(&b'\n'));

        let value = decode(&bytes);
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["logger"], "app.db");
        assert_eq!(value["message"], "slow query");
        assert!(value["timestamp_ms"].as_i64().expect("millis") > 0);
    }

    #[test]
    fn stamps_application_and_hostname() {
        let event = LogEvent::new("app", Level::Info, "hi").with_context("user", "bob");
        let encoder = JsonEncoder::new()
            .with_application("billing")
            .with_hostname("web-1");
        let value = decode(&encoder.encode(&event).expect("encode"));
        assert_eq!(value["context"]["application"], "billing");
        assert_eq!(value["context"]["hostname"], "web-1");
        assert_eq!(value["context"]["user"], "bob");
    }

    #[test]
    fn omits_empty_optionals() {
        let event = LogEvent::new("app", Level::Info, "hi");
        let value = decode(&JsonEncoder::new().encode(&event).expect("encode"));
        assert!(value.get("context").is_none());
        assert!(value.get("thrown").is_none());
        assert!(value.get("call_site").is_none());
    }

    #[test]
    fn serialises_thrown_frames() {
        let event = LogEvent::new("app", Level::Error, "boom").with_thrown(crate::event::Thrown {
            message: "io failure".into(),
            frames: vec!["a".into(), "b".into()],
        });
        let value = decode(&JsonEncoder::new().encode(&event).expect("encode"));
        assert_eq!(value["thrown"]["message"], "io failure");
        assert_eq!(value["thrown"]["frames"][1], "b");
    }
}

//! Captured log event snapshots.
//!
//! A [`LogEvent`] is an immutable copy of one log record, taken on the
//! producing thread before the event enters the delivery queue. Moving the
//! event into the queue (or the backup sink) transfers ownership, so no
//! caller can observe it after hand-off even when the originating framework
//! reuses its own record objects.

use std::collections::BTreeMap;
use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::level::Level;

/// Structured snapshot of an exception attached to an event.
#[derive(Clone, Debug, Serialize)]
pub struct Thrown {
    /// Exception message.
    pub message: String,
    /// Rendered stack frames, outermost first.
    pub frames: Vec<String>,
}

/// Call-site information captured when location info is enabled.
#[derive(Clone, Debug, Serialize)]
pub struct CallSite {
    pub class: String,
    pub method: String,
    pub file: String,
    pub line: u32,
}

/// Immutable captured log record.
#[derive(Clone, Debug)]
pub struct LogEvent {
    /// Wall-clock time the event was captured.
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// Name of the logger that produced the event.
    pub logger: String,
    /// Name of the producing thread.
    pub thread_name: String,
    /// Rendered message.
    pub message: String,
    /// MDC-style context key/value pairs.
    pub context: BTreeMap<String, String>,
    pub thrown: Option<Thrown>,
    pub call_site: Option<CallSite>,
}

impl LogEvent {
    /// Capture a new event from the calling thread.
    ///
    /// Timestamp and thread name are taken at construction time; context,
    /// exception, and call-site details are attached with the `with_*`
    /// builder methods.
    pub fn new(logger: &str, level: Level, message: &str) -> Self {
        let thread_name = thread::current()
            .name()
            .map(ToString::to_string)
            .unwrap_or_default();
        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.to_owned(),
            thread_name,
            message: message.to_owned(),
            context: BTreeMap::new(),
            thrown: None,
            call_site: None,
        }
    }

    /// Attach a context key/value pair.
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Attach an exception snapshot.
    pub fn with_thrown(mut self, thrown: Thrown) -> Self {
        self.thrown = Some(thrown);
        self
    }

    /// Attach call-site information.
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.level, self.logger, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_thread_name() {
        let event = thread::Builder::new()
            .name("producer".into())
            .spawn(|| LogEvent::new("app", Level::Info, "hello"))
            .expect("spawn thread")
            .join()
            .expect("join thread");
        assert_eq!(event.thread_name, "producer");
        assert_eq!(event.logger, "app");
    }

    #[test]
    fn builder_methods_attach_details() {
        let event = LogEvent::new("app", Level::Error, "boom")
            .with_context("user", "alice")
            .with_thrown(Thrown {
                message: "broken".into(),
                frames: vec!["frame0".into()],
            })
            .with_call_site(CallSite {
                class: "Service".into(),
                method: "run".into(),
                file: "service.rs".into(),
                line: 42,
            });
        assert_eq!(event.context.get("user").map(String::as_str), Some("alice"));
        assert_eq!(event.thrown.as_ref().map(|t| t.message.as_str()), Some("broken"));
        assert_eq!(event.call_site.as_ref().map(|c| c.line), Some(42));
    }
}

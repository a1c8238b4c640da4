//! Reliable, non-blocking shipping of structured log events to a remote
//! collector over TCP.
//!
//! The crate is the delivery core only: a bounded queue decoupling producer
//! threads from the network, one dispatcher thread draining and
//! transmitting events, a connector with retry and multi-host failover, and
//! an overflow escape valve into a backup sink. Wire encoding sits behind
//! the [`Encoder`] trait (JSON by default); the backup destination sits
//! behind [`BackupSink`]. Host frameworks integrate by translating their
//! native record type into a [`LogEvent`] and calling
//! [`Shipper::append`].
//!
//! ```no_run
//! use logship::{LogEvent, Level, Shipper, ShipperConfig};
//!
//! let mut config = ShipperConfig::default();
//! config.parse_hosts("collector-a.example.com,collector-b.example.com");
//! let mut shipper = Shipper::new(config);
//! shipper.start()?;
//! shipper.append(LogEvent::new("app.startup", Level::Info, "ready"));
//! let orphans = shipper.stop();
//! assert_eq!(orphans, 0);
//! # Ok::<(), logship::ConfigError>(())
//! ```

pub mod backup;
pub mod encoder;
pub mod event;
pub mod level;
pub mod shipper;

pub use backup::{BackupSink, FileBackupSink, MemoryBackupSink};
pub use encoder::{APPLICATION_KEY, Encoder, HOSTNAME_KEY, JsonEncoder};
pub use event::{CallSite, LogEvent, Thrown};
pub use level::Level;
pub use shipper::{ConfigError, Shipper, ShipperConfig};

//! Backup sinks for events the pipeline cannot currently accept.
//!
//! When the delivery queue is full, the producer path routes the rejected
//! event to a [`BackupSink`]. [`FileBackupSink`] appends encoded events to a
//! local file from its own writer thread; [`MemoryBackupSink`] collects
//! events in memory for tests and diagnostics.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::warn;
use parking_lot::Mutex;

use crate::encoder::Encoder;
use crate::event::LogEvent;

/// Default bounded capacity of the file sink's writer channel.
pub const DEFAULT_BACKUP_CAPACITY: usize = 1024;

/// Fallback destination for events that could not be queued.
///
/// `accept` is fire-and-forget: it must never block the producing thread.
pub trait BackupSink: Send + Sync {
    fn accept(&self, event: LogEvent);
}

/// Backup sink appending encoded events to a local file.
///
/// A background thread owns the file handle and encoder, receiving events
/// over a bounded channel and writing them asynchronously. When the channel
/// is full the event is dropped with a warning; the backup must not become
/// a second source of back-pressure.
pub struct FileBackupSink {
    tx: Option<Sender<LogEvent>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FileBackupSink {
    /// Open (or create) `path` for appending, using the default capacity.
    pub fn new<P: AsRef<Path>>(
        path: P,
        encoder: Box<dyn Encoder>,
    ) -> std::io::Result<Self> {
        Self::with_capacity(path, encoder, DEFAULT_BACKUP_CAPACITY)
    }

    /// Open the sink with a caller-specified writer channel capacity.
    pub fn with_capacity<P: AsRef<Path>>(
        path: P,
        encoder: Box<dyn Encoder>,
        capacity: usize,
    ) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (tx, rx) = bounded(capacity);
        let handle = thread::Builder::new()
            .name("logship-backup".into())
            .spawn(move || writer_loop(file, encoder, rx))?;
        Ok(Self {
            tx: Some(tx),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop the writer thread after it has drained pending events.
    pub fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("FileBackupSink: writer thread panicked");
            }
        }
    }
}

fn writer_loop(mut file: File, encoder: Box<dyn Encoder>, rx: Receiver<LogEvent>) {
    for event in rx {
        match encoder.encode(&event) {
            Ok(bytes) => {
                if file.write_all(&bytes).and_then(|_| file.flush()).is_err() {
                    warn!("FileBackupSink: write error, event lost");
                }
            }
            Err(err) => warn!("FileBackupSink: encode error: {err}"),
        }
    }
}

impl BackupSink for FileBackupSink {
    fn accept(&self, event: LogEvent) {
        let Some(tx) = self.tx.as_ref() else {
            warn!("FileBackupSink: accept after close, event lost");
            return;
        };
        if tx.try_send(event).is_err() {
            warn!("FileBackupSink: writer queue full, event lost");
        }
    }
}

impl Drop for FileBackupSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory backup sink collecting accepted events.
#[derive(Default)]
pub struct MemoryBackupSink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryBackupSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return every collected event.
    pub fn take_all(&self) -> Vec<LogEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl BackupSink for MemoryBackupSink {
    fn accept(&self, event: LogEvent) {
        self.events.lock().push(event);
    }
}

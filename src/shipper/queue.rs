//! Bounded fair FIFO buffer between producer threads and the dispatcher.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::event::LogEvent;

/// Bounded event queue.
///
/// Any number of producers may `offer`; the dispatcher is the single
/// consumer calling `take`. Blocked producers are parked in FIFO order by
/// the underlying channel, so the first offerer is unblocked first when a
/// slot frees up. Capacity is fixed at construction; the buffer never grows
/// past it.
pub(crate) struct EventQueue {
    tx: Sender<LogEvent>,
    rx: Receiver<LogEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Attempt to append an event, blocking up to `timeout` when full.
    ///
    /// A zero timeout never blocks. On timeout or tear-down the rejected
    /// event is handed back so the caller can route it to the backup sink.
    pub fn offer(&self, event: LogEvent, timeout: Duration) -> Result<(), LogEvent> {
        if timeout.is_zero() {
            self.tx.try_send(event).map_err(|err| err.into_inner())
        } else {
            self.tx
                .send_timeout(event, timeout)
                .map_err(|err| err.into_inner())
        }
    }

    /// Wait up to `timeout` for the next event.
    pub fn take(&self, timeout: Duration) -> Option<LogEvent> {
        if timeout.is_zero() {
            self.rx.try_recv().ok()
        } else {
            self.rx.recv_timeout(timeout).ok()
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::time::Instant;

    fn event(message: &str) -> LogEvent {
        LogEvent::new("test", Level::Info, message)
    }

    #[test]
    fn preserves_fifo_order() {
        let queue = EventQueue::new(4);
        for message in ["a", "b", "c"] {
            assert!(queue.offer(event(message), Duration::ZERO).is_ok());
        }
        assert_eq!(queue.len(), 3);
        for expected in ["a", "b", "c"] {
            let taken = queue.take(Duration::from_millis(100)).expect("event present");
            assert_eq!(taken.message, expected);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_timeout_offer_returns_event_when_full() {
        let queue = EventQueue::new(2);
        assert!(queue.offer(event("a"), Duration::ZERO).is_ok());
        assert!(queue.offer(event("b"), Duration::ZERO).is_ok());
        let start = Instant::now();
        let rejected = queue
            .offer(event("c"), Duration::ZERO)
            .expect_err("queue is full");
        assert_eq!(rejected.message, "c");
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(queue.len(), queue.capacity());
    }

    #[test]
    fn offer_times_out_when_no_slot_frees() {
        let queue = EventQueue::new(1);
        assert!(queue.offer(event("a"), Duration::ZERO).is_ok());
        let start = Instant::now();
        assert!(queue.offer(event("b"), Duration::from_millis(50)).is_err());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn take_times_out_on_empty_queue() {
        let queue = EventQueue::new(1);
        let start = Instant::now();
        assert!(queue.take(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(queue.take(Duration::ZERO).is_none());
    }

    #[test]
    fn blocked_offer_completes_once_consumer_drains() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(EventQueue::new(1));
        assert!(queue.offer(event("first"), Duration::ZERO).is_ok());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.offer(event("second"), Duration::from_secs(2)).is_ok())
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(
            queue.take(Duration::from_millis(500)).expect("first event").message,
            "first"
        );
        assert!(producer.join().expect("producer thread"));
        assert_eq!(
            queue.take(Duration::from_millis(500)).expect("second event").message,
            "second"
        );
    }
}

//! Listener that forwards events into a bounded channel.

use super::Listener;
use crate::types::DomainEvent;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Forwards every event to an [`EventReceiver`] without ever blocking.
///
/// When the buffer is full the event is dropped and counted; the native
/// thread is never made to wait for a slow consumer.
pub struct ChannelListener {
    sender: Sender<DomainEvent>,
    overflowed: Arc<AtomicU64>,
}

impl ChannelListener {
    /// Create a listener with room for `capacity` undelivered events.
    pub fn bounded(capacity: usize) -> (Arc<ChannelListener>, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        let overflowed = Arc::new(AtomicU64::new(0));

        let listener = Arc::new(ChannelListener {
            sender,
            overflowed: Arc::clone(&overflowed),
        });

        (
            listener,
            EventReceiver {
                receiver,
                overflowed,
            },
        )
    }
}

impl Listener for ChannelListener {
    fn on_event(&self, event: &DomainEvent) {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let total = self.overflowed.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(overflowed = total, "event receiver full, dropping event");
            }
            // Receiver gone; nothing left to deliver to.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Receiving end of a [`ChannelListener`].
pub struct EventReceiver {
    receiver: Receiver<DomainEvent>,
    overflowed: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<DomainEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Option<DomainEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DomainEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<DomainEvent> {
        self.receiver.try_iter().collect()
    }

    /// Events dropped because the buffer was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;

    fn advanced(index: u32) -> DomainEvent {
        DomainEvent::SequenceAdvanced {
            source: SourceId(1),
            index,
            item: None,
        }
    }

    #[test]
    fn test_forwards_in_order() {
        let (listener, receiver) = ChannelListener::bounded(8);

        for i in 0..3 {
            listener.on_event(&advanced(i));
        }

        assert_eq!(receiver.drain(), vec![advanced(0), advanced(1), advanced(2)]);
        assert_eq!(receiver.overflowed(), 0);
    }

    #[test]
    fn test_full_buffer_drops_without_blocking() {
        let (listener, receiver) = ChannelListener::bounded(2);

        for i in 0..10 {
            listener.on_event(&advanced(i));
        }

        assert_eq!(receiver.overflowed(), 8);
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (listener, receiver) = ChannelListener::bounded(1);
        drop(receiver);

        listener.on_event(&advanced(0));
    }

    #[test]
    fn test_recv_timeout_when_empty() {
        let (_listener, receiver) = ChannelListener::bounded(1);
        assert!(receiver.recv_timeout(Duration::from_millis(10)).is_err());
        assert!(receiver.try_recv().is_none());
    }
}

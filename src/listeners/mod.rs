//! Listeners for translated bridge events.
//!
//! A listener is any `Send + Sync` object implementing [`Listener`]. The
//! bridge holds listeners as `Arc<dyn Listener>` and identifies them by
//! pointer, so registering the same `Arc` twice delivers every event to it
//! twice.
//!
//! # Contract
//!
//! Handlers run synchronously on the native callback thread. They must
//! return quickly and must never call back into the native subsystem. A
//! panicking handler is contained by the bridge: it is logged and the
//! remaining listeners are still notified.
//!
//! # Example
//!
//! ```ignore
//! struct Printer;
//!
//! impl Listener for Printer {
//!     fn sequence_advanced(&self, _source: SourceId, index: u32, _item: Option<ItemRef>) {
//!         println!("now at item {}", index);
//!     }
//! }
//!
//! bridge.add_listener(Arc::new(Printer));
//! ```

mod channel;
mod registry;

pub use channel::{ChannelListener, EventReceiver};
pub use registry::{ListenerRegistry, Snapshot};

use crate::types::{DomainEvent, ItemRef, SourceId};

/// Receives translated events. Every method defaults to a no-op.
pub trait Listener: Send + Sync {
    /// The list played through to its end.
    fn finished(&self, _source: SourceId) {}

    /// The next item in the sequence was set.
    fn sequence_advanced(&self, _source: SourceId, _index: u32, _item: Option<ItemRef>) {}

    /// Playback was stopped.
    fn stopped(&self, _source: SourceId) {}

    /// Single entry point used by the bridge; routes to the typed methods.
    fn on_event(&self, event: &DomainEvent) {
        match *event {
            DomainEvent::Finished { source } => self.finished(source),
            DomainEvent::SequenceAdvanced {
                source,
                index,
                item,
            } => self.sequence_advanced(source, index, item),
            DomainEvent::Stopped { source } => self.stopped(source),
        }
    }
}

/// Adapts a closure into a [`Listener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(&DomainEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(&DomainEvent) + Send + Sync,
{
    fn on_event(&self, event: &DomainEvent) {
        (self.0)(event)
    }
}

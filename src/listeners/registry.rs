//! Copy-on-write listener registry.

use super::Listener;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Immutable view of the registry taken for one dispatch.
pub type Snapshot = Arc<[Arc<dyn Listener>]>;

/// Thread-safe ordered collection of listeners.
///
/// Readers take a [`Snapshot`] by cloning an `Arc` under a read lock, so a
/// dispatch in progress never observes a later `add`/`remove`. Writers are
/// serialized by their own mutex and build the replacement list before
/// swapping it in; the read lock is only ever held for the pointer swap.
///
/// No deduplication is performed: adding the same listener twice makes it
/// receive every event twice.
pub struct ListenerRegistry {
    /// Current published list.
    current: RwLock<Snapshot>,
    /// Serializes writers so concurrent mutations are not lost.
    write_lock: Mutex<()>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::from(Vec::<Arc<dyn Listener>>::new())),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a listener at the end of the dispatch order.
    pub fn add(&self, listener: Arc<dyn Listener>) {
        let _guard = self.write_lock.lock();
        let mut next: Vec<Arc<dyn Listener>> = self.snapshot().iter().cloned().collect();
        next.push(listener);
        *self.current.write() = Arc::from(next);
    }

    /// Remove the first registration of `listener`.
    ///
    /// Returns false (and changes nothing) if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn Listener>) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        let Some(pos) = current.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };

        let mut next: Vec<Arc<dyn Listener>> = current.iter().cloned().collect();
        next.remove(pos);
        *self.current.write() = Arc::from(next);
        true
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        *self.current.write() = Arc::from(Vec::<Arc<dyn Listener>>::new());
    }

    /// Listeners registered at this instant.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.current.read())
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pointer identity, ignoring vtable metadata.
fn same_listener(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainEvent, SourceId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Listener for Counter {
        fn on_event(&self, _event: &DomainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stopped() -> DomainEvent {
        DomainEvent::Stopped {
            source: SourceId(1),
        }
    }

    #[test]
    fn test_add_remove() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn Listener> = Arc::new(Counter::default());

        registry.add(Arc::clone(&listener));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&listener));
        assert!(registry.is_empty());

        // Removing again is a no-op
        assert!(!registry.remove(&listener));
    }

    #[test]
    fn test_duplicate_registration_is_kept() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn Listener> = counter.clone();

        registry.add(Arc::clone(&listener));
        registry.add(Arc::clone(&listener));

        for l in registry.snapshot().iter() {
            l.on_event(&stopped());
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        // One remove drops a single registration
        registry.remove(&listener);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = ListenerRegistry::new();
        let a: Arc<dyn Listener> = Arc::new(Counter::default());
        let b: Arc<dyn Listener> = Arc::new(Counter::default());

        registry.add(Arc::clone(&a));
        let snapshot = registry.snapshot();

        registry.add(Arc::clone(&b));
        registry.remove(&a);

        assert_eq!(snapshot.len(), 1);
        assert!(same_listener(&snapshot[0], &a));
        assert_eq!(registry.len(), 1);
        assert!(same_listener(&registry.snapshot()[0], &b));
    }

    #[test]
    fn test_remove_only_matching_identity() {
        let registry = ListenerRegistry::new();
        let a: Arc<dyn Listener> = Arc::new(Counter::default());
        let b: Arc<dyn Listener> = Arc::new(Counter::default());

        registry.add(Arc::clone(&a));
        assert!(!registry.remove(&b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear() {
        let registry = ListenerRegistry::new();
        for _ in 0..3 {
            registry.add(Arc::new(Counter::default()));
        }
        let before = registry.snapshot();

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(before.len(), 3);
    }
}

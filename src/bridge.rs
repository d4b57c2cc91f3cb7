//! Event bridge between a native event manager and registered listeners.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::listeners::{ChannelListener, EventReceiver, Listener, ListenerRegistry};
use crate::native::{EventCallback, NativeEventManager, NativeSource};
use crate::translate::{EventTranslator, ListPlayerTranslator};
use crate::types::{DomainEvent, EventFilter, EventKind, RawEvent, SourceId};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Counters describing what a bridge has delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Domain events dispatched to a listener snapshot.
    pub dispatched: u64,
    /// Listener invocations that panicked and were contained.
    pub listener_failures: u64,
}

/// State reachable from the native callback.
struct BridgeInner {
    source: SourceId,
    /// Kinds outside this range are dropped before translation.
    filter: EventFilter,
    translator: Box<dyn EventTranslator>,
    listeners: Arc<ListenerRegistry>,
    /// Set before detaching; later raw events are ignored.
    detached: AtomicBool,
    dispatched: AtomicU64,
    listener_failures: AtomicU64,
}

impl BridgeInner {
    fn on_raw_event(&self, raw: &RawEvent) {
        if self.detached.load(Ordering::Acquire) {
            return;
        }
        if !self.filter.contains(raw.kind) {
            return;
        }

        let translated =
            panic::catch_unwind(AssertUnwindSafe(|| self.translator.translate(self.source, raw)));
        match translated {
            Ok(Some(event)) => self.dispatch(&event),
            Ok(None) => {}
            Err(_) => warn!(source = ?self.source, kind = ?raw.kind, "event translator panicked"),
        }
    }

    fn dispatch(&self, event: &DomainEvent) {
        let snapshot = self.listeners.snapshot();
        trace!(?event, listeners = snapshot.len(), "dispatching event");

        for (position, listener) in snapshot.iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                self.listener_failures.fetch_add(1, Ordering::Relaxed);
                warn!(source = ?self.source, position, ?event, "listener panicked, continuing dispatch");
            }
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }
}

/// Bridges native events for one owning entity to its listeners.
///
/// The bridge attaches one callback to every kind in its filter when it is
/// created and detaches from exactly the kinds it attached when released.
/// Native callbacks may arrive on any thread; they are translated and
/// dispatched synchronously to a snapshot of the registered listeners, in
/// registration order, so events reach listeners in native order.
///
/// Teardown ([`EventBridge::release`], or drop) detaches first and then
/// clears the listeners. Events racing in after that notify nobody.
pub struct EventBridge {
    inner: Arc<BridgeInner>,
    config: BridgeConfig,
    manager: Arc<dyn NativeEventManager>,
    /// The one callback registered for every kind.
    callback: EventCallback,
    /// Kinds successfully attached and not yet detached.
    attached: Mutex<Vec<EventKind>>,
    released: AtomicBool,
}

impl EventBridge {
    /// Create a bridge for `source` using the list player translator.
    pub fn attach(source: &dyn NativeSource, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let translator = ListPlayerTranslator::new(config.filter, config.kinds);
        Self::with_translator(source, config, translator)
    }

    /// Create a bridge with a custom translator.
    ///
    /// Only the filter and thread name of `config` are checked; the kind
    /// table is the translator's business. Fails with
    /// [`BridgeError::InvalidConfig`] for an unusable filter,
    /// [`BridgeError::Initialization`] if the source has no event manager,
    /// or [`BridgeError::AttachFailed`] if the manager refuses a kind (kinds
    /// attached before it are detached again).
    pub fn with_translator(
        source: &dyn NativeSource,
        config: BridgeConfig,
        translator: impl EventTranslator + 'static,
    ) -> Result<Self> {
        config.validate_attachment()?;

        let source_id = source.id();
        let manager = source.event_manager().ok_or_else(|| {
            BridgeError::Initialization(format!(
                "no native event manager for {:?}",
                source_id
            ))
        })?;
        manager.set_callback_thread_name(&config.callback_thread_name);

        let inner = Arc::new(BridgeInner {
            source: source_id,
            filter: config.filter,
            translator: Box::new(translator),
            listeners: Arc::new(ListenerRegistry::new()),
            detached: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
        });

        // The native side only holds a weak reference; events arriving after
        // the bridge is gone are dropped.
        let weak: Weak<BridgeInner> = Arc::downgrade(&inner);
        let callback: EventCallback = Arc::new(move |raw: &RawEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_raw_event(raw);
            }
        });

        let bridge = EventBridge {
            inner,
            config,
            manager,
            callback,
            attached: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        };
        bridge.attach_all()?;

        debug!(source = ?source_id, filter = ?bridge.config.filter, "event bridge attached");
        Ok(bridge)
    }

    fn attach_all(&self) -> Result<()> {
        for kind in self.config.filter.kinds() {
            if let Err(source) = self.manager.attach(kind, &self.callback) {
                warn!(source = ?self.inner.source, ?kind, error = %source, "native attach failed");
                self.detach();
                return Err(BridgeError::AttachFailed { kind, source });
            }
            self.attached.lock().push(kind);
        }
        Ok(())
    }

    /// Stop receiving native events.
    ///
    /// Detaches exactly the kinds that were attached, so it is safe after a
    /// partial attach. Only the first call has any effect.
    pub fn detach(&self) {
        self.inner.detached.store(true, Ordering::Release);

        let kinds = std::mem::take(&mut *self.attached.lock());
        for kind in &kinds {
            self.manager.detach(*kind, &self.callback);
        }

        if !kinds.is_empty() {
            debug!(source = ?self.inner.source, detached = kinds.len(), "event bridge detached");
        }
    }

    /// Tear the bridge down: detach, then drop every listener.
    ///
    /// Idempotent; also performed on drop.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.detach();
        self.inner.listeners.clear();
    }

    /// Callback entry point for a raw native event.
    ///
    /// Never blocks on client code beyond the listeners' own handlers and
    /// never panics: listener panics are caught, logged and counted.
    pub fn on_raw_event(&self, raw: &RawEvent) {
        self.inner.on_raw_event(raw);
    }

    /// Add a listener. The same listener added twice is notified twice.
    ///
    /// Safe from any thread, including from inside a handler; the change
    /// applies from the next dispatch.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.inner.listeners.add(listener);
    }

    /// Remove one registration of a listener. Returns false if absent.
    pub fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Register a [`ChannelListener`] and return it with its receiver.
    ///
    /// The listener stays registered until removed or the bridge is released.
    pub fn subscribe(&self, capacity: usize) -> (Arc<dyn Listener>, EventReceiver) {
        let (listener, receiver) = ChannelListener::bounded(capacity);
        let listener: Arc<dyn Listener> = listener;
        self.add_listener(Arc::clone(&listener));
        (listener, receiver)
    }

    /// Shared handle to the listener registry, for handlers that need to
    /// change the listener set themselves.
    pub fn registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.inner.listeners)
    }

    /// Number of listener registrations, duplicates included.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether any native kind is still attached.
    pub fn is_attached(&self) -> bool {
        !self.attached.lock().is_empty()
    }

    /// The entity this bridge was created for.
    pub fn source(&self) -> SourceId {
        self.inner.source
    }

    /// Native kinds this bridge attached to.
    pub fn filter(&self) -> EventFilter {
        self.config.filter
    }

    /// Configuration the bridge was created with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Delivery counters since creation.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            listener_failures: self.inner.listener_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::loopback::{LoopbackSource, ATTACH_REFUSED};
    use crate::types::{list_player, KindTable, RawPayload};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Listener for Counter {
        fn on_event(&self, _event: &DomainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl Listener for Panicker {
        fn on_event(&self, _event: &DomainEvent) {
            panic!("listener failure");
        }
    }

    fn stopped() -> RawEvent {
        RawEvent::empty(list_player::STOPPED)
    }

    #[test]
    fn test_attach_registers_whole_filter() {
        let source = LoopbackSource::new(SourceId(1));
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();

        let manager = source.manager().unwrap();
        assert_eq!(
            manager.attached_kinds(),
            vec![
                list_player::PLAYED,
                list_player::NEXT_ITEM_SET,
                list_player::STOPPED
            ]
        );
        assert!(bridge.is_attached());
    }

    #[test]
    fn test_missing_event_manager() {
        let source = LoopbackSource::without_event_manager(SourceId(1));
        let result = EventBridge::attach(&source, BridgeConfig::default());
        assert!(matches!(result, Err(BridgeError::Initialization(_))));
    }

    #[test]
    fn test_invalid_config_rejected_before_attach() {
        let source = LoopbackSource::new(SourceId(1));
        let config = BridgeConfig {
            kinds: KindTable {
                finished: EventKind(1),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = EventBridge::attach(&source, config);
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
        assert_eq!(source.manager().unwrap().attach_calls(), 0);
    }

    #[test]
    fn test_partial_attach_rolls_back() {
        let source = LoopbackSource::new(SourceId(1));
        let manager = source.manager().unwrap();
        manager.refuse(list_player::STOPPED);

        let result = EventBridge::attach(&source, BridgeConfig::default());
        match result {
            Err(BridgeError::AttachFailed { kind, source }) => {
                assert_eq!(kind, list_player::STOPPED);
                assert_eq!(source.code, ATTACH_REFUSED);
            }
            Err(other) => panic!("Expected AttachFailed, got {:?}", other),
            Ok(_) => panic!("Expected AttachFailed, got a bridge"),
        }
        assert_eq!(manager.registration_count(), 0);
        assert_eq!(manager.detach_calls(), 2);
    }

    #[test]
    fn test_release_detaches_then_clears() {
        let source = LoopbackSource::new(SourceId(1));
        let manager = Arc::clone(source.manager().unwrap());
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();
        bridge.add_listener(Arc::new(Counter::default()));

        bridge.release();
        assert_eq!(manager.registration_count(), 0);
        assert_eq!(bridge.listener_count(), 0);
        assert!(!bridge.is_attached());

        bridge.release();
        drop(bridge);
        assert_eq!(manager.detach_calls(), 3);
    }

    #[test]
    fn test_event_after_detach_notifies_nobody() {
        let source = LoopbackSource::new(SourceId(1));
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();
        let counter = Arc::new(Counter::default());
        bridge.add_listener(counter.clone());

        bridge.detach();
        bridge.on_raw_event(&stopped());

        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.stats().dispatched, 0);
    }

    #[test]
    fn test_callback_outliving_bridge_is_harmless() {
        let source = LoopbackSource::new(SourceId(1));
        let manager = source.manager().unwrap();
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();

        // Keep the registered callback alive past the bridge, as a native
        // thread mid-delivery would.
        let callback = Arc::clone(&bridge.callback);
        drop(bridge);

        callback(&stopped());
        assert_eq!(manager.registration_count(), 0);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let source = LoopbackSource::new(SourceId(1));
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();
        let before = Arc::new(Counter::default());
        let after = Arc::new(Counter::default());

        bridge.add_listener(before.clone());
        bridge.add_listener(Arc::new(Panicker));
        bridge.add_listener(after.clone());

        source.manager().unwrap().raise(&stopped());

        assert_eq!(before.0.load(Ordering::SeqCst), 1);
        assert_eq!(after.0.load(Ordering::SeqCst), 1);
        assert_eq!(
            bridge.stats(),
            BridgeStats {
                dispatched: 1,
                listener_failures: 1
            }
        );
    }

    #[test]
    fn test_panicking_translator_is_contained() {
        let source = LoopbackSource::new(SourceId(1));
        let translator = |_source: SourceId, _raw: &RawEvent| -> Option<DomainEvent> {
            panic!("translator failure")
        };
        let bridge =
            EventBridge::with_translator(&source, BridgeConfig::default(), translator).unwrap();
        let counter = Arc::new(Counter::default());
        bridge.add_listener(counter.clone());

        bridge.on_raw_event(&stopped());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_custom_translator_never_sees_kinds_outside_filter() {
        let source = LoopbackSource::new(SourceId(1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let translator = move |source: SourceId, raw: &RawEvent| {
            sink.lock().push(raw.kind);
            Some(DomainEvent::Stopped { source })
        };
        let bridge =
            EventBridge::with_translator(&source, BridgeConfig::default(), translator).unwrap();
        let (_listener, receiver) = bridge.subscribe(4);

        bridge.on_raw_event(&RawEvent::empty(EventKind(0x9999)));
        bridge.on_raw_event(&RawEvent::empty(list_player::PLAYED.prev()));
        assert!(receiver.try_recv().is_none());
        assert!(seen.lock().is_empty());

        bridge.on_raw_event(&stopped());
        assert_eq!(*seen.lock(), vec![list_player::STOPPED]);
        assert_eq!(
            receiver.try_recv(),
            Some(DomainEvent::Stopped {
                source: SourceId(1)
            })
        );
    }

    #[test]
    fn test_custom_translator_with_inverted_filter_rejected() {
        let source = LoopbackSource::new(SourceId(1));
        let config = BridgeConfig {
            filter: EventFilter::range(0x402..=0x400),
            ..Default::default()
        };
        let translator = |source: SourceId, _raw: &RawEvent| Some(DomainEvent::Stopped { source });

        let result = EventBridge::with_translator(&source, config, translator);
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
        assert_eq!(source.manager().unwrap().attach_calls(), 0);
    }

    #[test]
    fn test_custom_translator_may_use_kinds_outside_kind_table() {
        // Kind table is left at its defaults, outside this filter.
        let source = LoopbackSource::new(SourceId(1));
        let config = BridgeConfig {
            filter: EventFilter::range(10..=11),
            ..Default::default()
        };
        let translator = |source: SourceId, _raw: &RawEvent| Some(DomainEvent::Stopped { source });

        let bridge = EventBridge::with_translator(&source, config, translator).unwrap();
        assert_eq!(
            source.manager().unwrap().attached_kinds(),
            vec![EventKind(10), EventKind(11)]
        );
        assert!(bridge.is_attached());
    }

    #[test]
    fn test_callback_thread_name_reaches_native_manager() {
        let source = LoopbackSource::new(SourceId(1));
        let config = BridgeConfig {
            callback_thread_name: "mlp-events".to_string(),
            ..Default::default()
        };

        let _bridge = EventBridge::attach(&source, config).unwrap();
        assert_eq!(
            source.manager().unwrap().callback_thread_name().as_deref(),
            Some("mlp-events")
        );
    }

    #[test]
    fn test_subscribe_receives_events() {
        let source = LoopbackSource::new(SourceId(5));
        let bridge = EventBridge::attach(&source, BridgeConfig::default()).unwrap();
        let (listener, receiver) = bridge.subscribe(4);

        let manager = source.manager().unwrap();
        manager.raise(&RawEvent::new(
            list_player::NEXT_ITEM_SET,
            RawPayload::Index(2),
        ));

        assert_eq!(
            receiver.try_recv(),
            Some(DomainEvent::SequenceAdvanced {
                source: SourceId(5),
                index: 2,
                item: None,
            })
        );

        assert!(bridge.remove_listener(&listener));
        manager.raise(&stopped());
        assert!(receiver.try_recv().is_none());
    }
}

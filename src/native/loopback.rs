//! In-process implementation of the native seams.
//!
//! Used to drive a bridge without a native library: events can be raised
//! synchronously with [`LoopbackEventManager::raise`] or from a dedicated
//! named thread with [`LoopbackDispatcher`], which behaves like a native
//! callback thread the application does not control.

use super::{
    same_callback, EventCallback, NativeEventManager, NativeRequestCanceller, NativeSource,
    NativeThumbnailer,
};
use crate::config::DEFAULT_CALLBACK_THREAD_NAME;
use crate::error::{NativeError, Result};
use crate::thumbnail::ThumbnailRequestSpec;
use crate::types::{EventKind, RawEvent, RequestToken, SourceId};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Status returned for kinds configured to refuse attachment.
pub const ATTACH_REFUSED: i32 = -12;

/// Event manager that keeps its callbacks in memory.
#[derive(Default)]
pub struct LoopbackEventManager {
    callbacks: RwLock<BTreeMap<EventKind, Vec<EventCallback>>>,
    refused: Mutex<HashSet<EventKind>>,
    thread_name: Mutex<Option<String>>,
    attach_calls: AtomicU64,
    detach_calls: AtomicU64,
}

impl LoopbackEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `attach` for `kind` fail.
    pub fn refuse(&self, kind: EventKind) {
        self.refused.lock().insert(kind);
    }

    /// Deliver `event` to the callbacks attached for its kind, on the
    /// calling thread. Returns how many callbacks were invoked.
    pub fn raise(&self, event: &RawEvent) -> usize {
        // Callbacks run without the lock held so they may attach/detach.
        let targets = match self.callbacks.read().get(&event.kind) {
            Some(callbacks) => callbacks.clone(),
            None => return 0,
        };
        for callback in &targets {
            callback(event);
        }
        targets.len()
    }

    /// Kinds with at least one callback attached, ascending.
    pub fn attached_kinds(&self) -> Vec<EventKind> {
        self.callbacks
            .read()
            .iter()
            .filter(|(_, callbacks)| !callbacks.is_empty())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Total number of (kind, callback) registrations.
    pub fn registration_count(&self) -> usize {
        self.callbacks.read().values().map(Vec::len).sum()
    }

    /// Thread name requested by the last bridge attached here.
    pub fn callback_thread_name(&self) -> Option<String> {
        self.thread_name.lock().clone()
    }

    pub fn attach_calls(&self) -> u64 {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> u64 {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

impl NativeEventManager for LoopbackEventManager {
    fn attach(&self, kind: EventKind, callback: &EventCallback) -> std::result::Result<(), NativeError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.refused.lock().contains(&kind) {
            return Err(NativeError::new(ATTACH_REFUSED));
        }
        self.callbacks
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::clone(callback));
        Ok(())
    }

    fn set_callback_thread_name(&self, name: &str) {
        *self.thread_name.lock() = Some(name.to_string());
    }

    fn detach(&self, kind: EventKind, callback: &EventCallback) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        let mut callbacks = self.callbacks.write();
        if let Some(list) = callbacks.get_mut(&kind) {
            if let Some(pos) = list.iter().position(|c| same_callback(c, callback)) {
                list.remove(pos);
            }
            if list.is_empty() {
                callbacks.remove(&kind);
            }
        }
    }
}

/// Owning entity backed by a [`LoopbackEventManager`].
pub struct LoopbackSource {
    id: SourceId,
    manager: Option<Arc<LoopbackEventManager>>,
}

impl LoopbackSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            manager: Some(Arc::new(LoopbackEventManager::new())),
        }
    }

    /// A source whose native side cannot supply an event manager.
    pub fn without_event_manager(id: SourceId) -> Self {
        Self { id, manager: None }
    }

    /// The concrete manager, for raising events.
    pub fn manager(&self) -> Option<&Arc<LoopbackEventManager>> {
        self.manager.as_ref()
    }
}

impl NativeSource for LoopbackSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn event_manager(&self) -> Option<Arc<dyn NativeEventManager>> {
        self.manager
            .as_ref()
            .map(|m| Arc::clone(m) as Arc<dyn NativeEventManager>)
    }
}

/// Named thread delivering raw events to a [`LoopbackEventManager`].
///
/// Events are delivered one at a time, in the order they were sent.
pub struct LoopbackDispatcher {
    sender: Option<Sender<RawEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl LoopbackDispatcher {
    pub fn spawn(name: &str, manager: Arc<LoopbackEventManager>) -> Result<Self> {
        let (sender, receiver) = unbounded::<RawEvent>();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for event in receiver.iter() {
                    let delivered = manager.raise(&event);
                    trace!(kind = ?event.kind, delivered, "loopback event raised");
                }
            })?;

        debug!(thread = name, "loopback dispatcher started");
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Spawn a dispatcher on the thread name requested through
    /// [`NativeEventManager::set_callback_thread_name`], or the default name
    /// if none was requested.
    pub fn for_manager(manager: Arc<LoopbackEventManager>) -> Result<Self> {
        let name = manager
            .callback_thread_name()
            .unwrap_or_else(|| DEFAULT_CALLBACK_THREAD_NAME.to_string());
        Self::spawn(&name, manager)
    }

    /// Queue an event. Returns false once the dispatcher has shut down.
    pub fn send(&self, event: RawEvent) -> bool {
        match &self.sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver everything queued so far, then stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("loopback dispatcher thread panicked");
            }
        }
    }
}

impl Drop for LoopbackDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Canceller that records every cancel it receives.
#[derive(Default)]
pub struct LoopbackCanceller {
    cancelled: Mutex<Vec<RequestToken>>,
}

impl LoopbackCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cancel received, in order, duplicates included.
    pub fn cancelled(&self) -> Vec<RequestToken> {
        self.cancelled.lock().clone()
    }

    pub fn cancel_count(&self, token: RequestToken) -> usize {
        self.cancelled.lock().iter().filter(|t| **t == token).count()
    }
}

impl NativeRequestCanceller for LoopbackCanceller {
    fn cancel(&self, token: RequestToken) {
        self.cancelled.lock().push(token);
    }
}

/// Thumbnailer that hands out sequential tokens and never renders anything.
#[derive(Default)]
pub struct LoopbackThumbnailer {
    next_token: AtomicU64,
    refuse: AtomicBool,
    requests: Mutex<Vec<(RequestToken, ThumbnailRequestSpec)>>,
    completed: Mutex<HashSet<RequestToken>>,
    canceller: LoopbackCanceller,
}

impl LoopbackThumbnailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or accept again) subsequent requests.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Mark a request as finished natively.
    pub fn complete(&self, token: RequestToken) {
        self.completed.lock().insert(token);
    }

    pub fn is_completed(&self, token: RequestToken) -> bool {
        self.completed.lock().contains(&token)
    }

    pub fn requests(&self) -> Vec<(RequestToken, ThumbnailRequestSpec)> {
        self.requests.lock().clone()
    }

    pub fn cancel_count(&self, token: RequestToken) -> usize {
        self.canceller.cancel_count(token)
    }
}

impl NativeRequestCanceller for LoopbackThumbnailer {
    fn cancel(&self, token: RequestToken) {
        // Cancelling a completed request is accepted and changes nothing.
        self.canceller.cancel(token);
    }
}

impl NativeThumbnailer for LoopbackThumbnailer {
    fn request(&self, spec: &ThumbnailRequestSpec) -> Option<RequestToken> {
        if self.refuse.load(Ordering::SeqCst) {
            return None;
        }
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        self.requests.lock().push((token, spec.clone()));
        Some(token)
    }
}

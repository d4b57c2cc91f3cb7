//! Seams to the native subsystem.
//!
//! The bridge never talks to a native library directly. It goes through:
//! - [`NativeSource`]: the owning entity, which may or may not hand out an
//!   event manager
//! - [`NativeEventManager`]: per-kind attach/detach of a callback
//! - [`NativeRequestCanceller`]: cancellation of an asynchronous request
//! - [`NativeThumbnailer`]: issuing thumbnail requests
//!
//! The [`loopback`] module implements all of them in-process.

pub mod loopback;

use crate::error::NativeError;
use crate::thumbnail::ThumbnailRequestSpec;
use crate::types::{EventKind, RawEvent, RequestToken, SourceId};
use std::sync::Arc;

/// Callback registered with a native event manager.
///
/// Identity is `Arc` pointer identity: `detach` must be given the same `Arc`
/// that was passed to `attach`.
pub type EventCallback = Arc<dyn Fn(&RawEvent) + Send + Sync>;

/// Per-entity native event manager.
pub trait NativeEventManager: Send + Sync {
    /// Start delivering events of `kind` to `callback`.
    fn attach(&self, kind: EventKind, callback: &EventCallback) -> Result<(), NativeError>;

    /// Stop delivering events of `kind` to `callback`. Unknown pairs are ignored.
    fn detach(&self, kind: EventKind, callback: &EventCallback);

    /// Name to give the thread that delivers callbacks, called before the
    /// first `attach`. Backends that cannot name their threads ignore it.
    fn set_callback_thread_name(&self, _name: &str) {}
}

/// The entity a bridge is created for.
pub trait NativeSource {
    fn id(&self) -> SourceId;

    /// `None` when the native side cannot supply an event manager.
    fn event_manager(&self) -> Option<Arc<dyn NativeEventManager>>;
}

/// Cancels asynchronous native requests. Must tolerate completed tokens.
pub trait NativeRequestCanceller: Send + Sync {
    fn cancel(&self, token: RequestToken);
}

/// Native thumbnail generation.
pub trait NativeThumbnailer: NativeRequestCanceller {
    /// Start generating a thumbnail; `None` if the request was refused.
    fn request(&self, spec: &ThumbnailRequestSpec) -> Option<RequestToken>;
}

/// Compare two callbacks by identity.
pub fn same_callback(a: &EventCallback, b: &EventCallback) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

//! # Native Bridge
//!
//! Bridges events raised by a native subsystem on its own threads to typed
//! listeners, and owns the lifecycle of cancellable native requests.
//!
//! ## Core Concepts
//!
//! - **EventBridge**: attaches to a range of native event kinds, translates
//!   raw callbacks and fans them out to listeners
//! - **Listeners**: copy-on-write registry, safe to change mid-dispatch
//! - **Translator**: pure mapping from raw native records to domain events
//! - **Requests**: handles that cancel their native request exactly once
//!
//! ## Example
//!
//! ```ignore
//! use native_bridge::{BridgeConfig, EventBridge, FnListener};
//!
//! let bridge = EventBridge::attach(&player, BridgeConfig::default())?;
//!
//! bridge.add_listener(Arc::new(FnListener::new(|event| {
//!     println!("{:?}", event);
//! })));
//!
//! // Thumbnail requests are cancelled when released
//! let request = thumbnailer.request(&ThumbnailRequestSpec::at_position(0.5, 320, 0))?;
//! request.release();
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod listeners;
pub mod native;
pub mod request;
pub mod thumbnail;
pub mod translate;
pub mod types;

// Re-exports
pub use bridge::{BridgeStats, EventBridge};
pub use config::BridgeConfig;
pub use error::{BridgeError, NativeError, Result};
pub use listeners::{ChannelListener, EventReceiver, FnListener, Listener, ListenerRegistry, Snapshot};
pub use native::{
    EventCallback, NativeEventManager, NativeRequestCanceller, NativeSource, NativeThumbnailer,
};
pub use request::{RequestHandle, RequestState};
pub use thumbnail::{PictureType, SeekSpeed, ThumbnailRequestSpec, ThumbnailSeek, Thumbnailer};
pub use translate::{EventTranslator, ListPlayerTranslator};
pub use types::*;

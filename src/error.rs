//! Error types for the native bridge.

use crate::types::EventKind;
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The native subsystem could not supply an event manager handle.
    #[error("Bridge initialization failed: {0}")]
    Initialization(String),

    #[error("Failed to attach to native event {kind:?}: {source}")]
    AttachFailed {
        kind: EventKind,
        #[source]
        source: NativeError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid thumbnail request: {0}")]
    InvalidThumbnailSpec(String),

    #[error("Native request failed: {0}")]
    RequestFailed(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

/// Status code reported by the native subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("native status {code}")]
pub struct NativeError {
    pub code: i32,
}

impl NativeError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

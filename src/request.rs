//! Lifecycle of asynchronous native requests.

use crate::native::NativeRequestCanceller;
use crate::types::RequestToken;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// State of a [`RequestHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// The native request may still be running.
    Pending,
    /// Released; the native request has been cancelled or had completed.
    Released,
}

/// Owns one pending native request.
///
/// The request must be released when it is no longer needed; release also
/// cancels it if it has not completed yet. Dropping a pending handle
/// releases it. Release is idempotent: only the first call reaches the
/// native canceller, whichever thread it comes from.
pub struct RequestHandle {
    token: RequestToken,
    canceller: Arc<dyn NativeRequestCanceller>,
    released: AtomicBool,
}

impl RequestHandle {
    pub fn new(token: RequestToken, canceller: Arc<dyn NativeRequestCanceller>) -> Self {
        Self {
            token,
            canceller,
            released: AtomicBool::new(false),
        }
    }

    /// Release, or cancel, this request.
    ///
    /// Returns true if this call performed the release.
    pub fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.canceller.cancel(self.token);
        trace!(token = ?self.token, "request released");
        true
    }

    pub fn state(&self) -> RequestState {
        if self.released.load(Ordering::Acquire) {
            RequestState::Released
        } else {
            RequestState::Pending
        }
    }

    pub fn is_released(&self) -> bool {
        self.state() == RequestState::Released
    }

    pub fn token(&self) -> RequestToken {
        self.token
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("token", &self.token)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        self.release();
    }
}

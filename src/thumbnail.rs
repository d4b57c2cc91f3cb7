//! Thumbnail requests.
//!
//! A [`Thumbnailer`] validates a [`ThumbnailRequestSpec`], hands it to the
//! native thumbnailer and returns a [`RequestHandle`] for the pending work.
//! The finished picture is reported by the native side through its own
//! events; this module only owns the request lifecycle.

use crate::error::{BridgeError, Result};
use crate::native::{NativeRequestCanceller, NativeThumbnailer};
use crate::request::RequestHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where in the media to take the thumbnail.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSeek {
    /// Absolute time from the start.
    Time(Duration),
    /// Fraction of the duration, `0.0..=1.0`.
    Position(f32),
}

/// Seek accuracy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekSpeed {
    #[default]
    Precise,
    Fast,
}

/// Encoding of the generated picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PictureType {
    Argb,
    #[default]
    Png,
    Jpg,
}

/// Parameters of one thumbnail request.
///
/// A zero width or height is derived from the other dimension by the native
/// side, keeping the aspect ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailRequestSpec {
    pub seek: ThumbnailSeek,
    pub speed: SeekSpeed,
    pub width: u32,
    pub height: u32,
    /// Crop to exactly `width` x `height` instead of fitting.
    pub crop: bool,
    pub picture_type: PictureType,
    /// None = wait indefinitely.
    pub timeout: Option<Duration>,
}

impl ThumbnailRequestSpec {
    pub fn at_time(time: Duration, width: u32, height: u32) -> Self {
        Self::with_seek(ThumbnailSeek::Time(time), width, height)
    }

    pub fn at_position(position: f32, width: u32, height: u32) -> Self {
        Self::with_seek(ThumbnailSeek::Position(position), width, height)
    }

    fn with_seek(seek: ThumbnailSeek, width: u32, height: u32) -> Self {
        Self {
            seek,
            speed: SeekSpeed::default(),
            width,
            height,
            crop: false,
            picture_type: PictureType::default(),
            timeout: None,
        }
    }

    pub fn fast(mut self) -> Self {
        self.speed = SeekSpeed::Fast;
        self
    }

    pub fn cropped(mut self) -> Self {
        self.crop = true;
        self
    }

    pub fn picture_type(mut self, picture_type: PictureType) -> Self {
        self.picture_type = picture_type;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let ThumbnailSeek::Position(position) = self.seek {
            if !(0.0..=1.0).contains(&position) {
                return Err(BridgeError::InvalidThumbnailSpec(format!(
                    "position {} outside 0.0..=1.0",
                    position
                )));
            }
        }

        if self.width == 0 && self.height == 0 {
            return Err(BridgeError::InvalidThumbnailSpec(
                "width and height are both zero".to_string(),
            ));
        }

        if self.crop && (self.width == 0 || self.height == 0) {
            return Err(BridgeError::InvalidThumbnailSpec(
                "cropping needs both width and height".to_string(),
            ));
        }

        Ok(())
    }
}

/// Issues thumbnail requests to a native thumbnailer.
pub struct Thumbnailer {
    native: Arc<dyn NativeThumbnailer>,
    canceller: Arc<dyn NativeRequestCanceller>,
}

impl Thumbnailer {
    pub fn new<T>(native: Arc<T>) -> Self
    where
        T: NativeThumbnailer + 'static,
    {
        Self {
            native: native.clone(),
            canceller: native,
        }
    }

    /// Start a thumbnail request.
    ///
    /// The returned handle must be kept until the thumbnail arrives or is no
    /// longer wanted; releasing (or dropping) it cancels unfinished work.
    pub fn request(&self, spec: &ThumbnailRequestSpec) -> Result<RequestHandle> {
        spec.validate()?;

        let token = self.native.request(spec).ok_or_else(|| {
            BridgeError::RequestFailed("native thumbnailer refused the request".to_string())
        })?;

        debug!(token = ?token, seek = ?spec.seek, "thumbnail requested");
        Ok(RequestHandle::new(token, Arc::clone(&self.canceller)))
    }
}

//! Upload validation, applied before any decoding.

use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use crate::error::InputError;

/// Default upload cap: 10 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Size and type limits for incoming images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPolicy {
    max_bytes: u64,
}

impl InputPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check a payload's size and MIME type.
    ///
    /// A payload of exactly `max_bytes` is accepted.
    pub fn validate(&self, len: u64, mime: &str) -> Result<(), InputError> {
        if !mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(InputError::UnsupportedType(mime.to_string()));
        }
        if len == 0 {
            return Err(InputError::Empty);
        }
        if len > self.max_bytes {
            return Err(InputError::TooLarge {
                size: len,
                max: self.max_bytes,
            });
        }
        debug!("Accepted {} upload of {} bytes", mime, len);
        Ok(())
    }
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Guess a MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

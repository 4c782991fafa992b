//! Split and decoding configuration.
//!
//! [`SplitOptions`] is a builder that threads progress callbacks and output
//! policy through [`split_images`](crate::split_images) without polluting
//! its signature. [`DecodeLimits`] bounds what a decoder may allocate and is
//! fixed when an [`ImagingFactory`](crate::ImagingFactory) is built.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framesplit::{ProgressCallback, ProgressInfo, SplitOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frame(s) done", info.current);
//!     }
//! }
//!
//! let options = SplitOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_batch_size(10)
//!     .with_overwrite(false);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::SplitError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Environment variable holding the decoder allocation limit in bytes.
pub const MAX_ALLOC_ENV: &str = "FRAMESPLIT_MAX_ALLOC";
/// Environment variable holding the maximum frame width/height in pixels.
pub const MAX_DIMENSION_ENV: &str = "FRAMESPLIT_MAX_DIMENSION";

/// Resource limits applied by every decoding backend.
///
/// `None` means the backend's own default applies. Limits protect against
/// crafted containers that claim enormous frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeLimits {
    /// Maximum number of bytes a decoder may allocate for one frame.
    pub max_alloc: Option<u64>,
    /// Maximum width or height of a frame, in pixels.
    pub max_dimension: Option<u32>,
}

impl DecodeLimits {
    /// Limits with every bound left to the backend defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-frame allocation limit in bytes.
    #[must_use]
    pub fn with_max_alloc(mut self, bytes: u64) -> Self {
        self.max_alloc = Some(bytes);
        self
    }

    /// Set the maximum frame width/height in pixels.
    #[must_use]
    pub fn with_max_dimension(mut self, pixels: u32) -> Self {
        self.max_dimension = Some(pixels);
        self
    }

    /// Read limits from [`MAX_ALLOC_ENV`] and [`MAX_DIMENSION_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::InvalidConfiguration`] if a variable is set
    /// but is not a positive integer.
    pub fn from_env() -> Result<Self, SplitError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, SplitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut limits = Self::default();
        if let Some(value) = lookup(MAX_ALLOC_ENV) {
            limits.max_alloc = Some(parse_positive(MAX_ALLOC_ENV, &value)?);
        }
        if let Some(value) = lookup(MAX_DIMENSION_ENV) {
            let pixels = parse_positive(MAX_DIMENSION_ENV, &value)?;
            let pixels = u32::try_from(pixels).map_err(|_| {
                SplitError::InvalidConfiguration(format!(
                    "{MAX_DIMENSION_ENV}={value} does not fit in 32 bits"
                ))
            })?;
            limits.max_dimension = Some(pixels);
        }
        Ok(limits)
    }

    /// Convert to the `image` crate's limits.
    pub(crate) fn to_image_limits(self) -> image::Limits {
        let mut limits = image::Limits::default();
        if let Some(bytes) = self.max_alloc {
            limits.max_alloc = Some(bytes);
        }
        if let Some(pixels) = self.max_dimension {
            limits.max_image_width = Some(pixels);
            limits.max_image_height = Some(pixels);
        }
        limits
    }

    /// Convert to the `tiff` crate's limits.
    pub(crate) fn to_tiff_limits(self) -> tiff::decoder::Limits {
        let mut limits = tiff::decoder::Limits::default();
        if let Some(bytes) = self.max_alloc {
            let bytes = usize::try_from(bytes).unwrap_or(usize::MAX);
            limits.decoding_buffer_size = bytes;
            limits.intermediate_buffer_size = bytes;
        }
        limits
    }

    /// Check a frame's dimensions against [`max_dimension`](Self::max_dimension).
    pub(crate) fn check_dimensions(self, width: u32, height: u32) -> Result<(), String> {
        match self.max_dimension {
            Some(max) if width > max || height > max => Err(format!(
                "frame is {width}x{height}, larger than the {max} pixel limit"
            )),
            _ => Ok(()),
        }
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u64, SplitError> {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(SplitError::InvalidConfiguration(format!(
            "{key} must be a positive integer, got {value:?}"
        ))),
    }
}

/// Configuration for a split operation.
///
/// All fields have sensible defaults. A default-constructed value reproduces
/// the plain `framesplit <input> <basename>` behaviour: no progress
/// reporting, existing output files are overwritten.
#[derive(Clone)]
pub struct SplitOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
    /// Replace existing `<basename>-<index>.png` files.
    pub(crate) overwrite: bool,
}

impl Debug for SplitOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SplitOptions")
            .field("batch_size", &self.batch_size)
            .field("overwrite", &self.overwrite)
            .finish_non_exhaustive()
    }
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitOptions {
    /// Create options with default settings.
    ///
    /// Defaults: no progress callback, batch size 1, overwrite enabled.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            overwrite: true,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// A value of 1 means every frame; 10 means every 10th frame.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Control whether existing output files are replaced.
    ///
    /// When `false`, a frame whose output file already exists is reported
    /// as a PNG write failure and skipped.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn limits_from_empty_environment() {
        let limits = DecodeLimits::from_lookup(lookup(&[])).unwrap();
        assert_eq!(limits, DecodeLimits::default());
    }

    #[test]
    fn limits_from_environment() {
        let limits = DecodeLimits::from_lookup(lookup(&[
            (MAX_ALLOC_ENV, "1048576"),
            (MAX_DIMENSION_ENV, " 4096 "),
        ]))
        .unwrap();
        assert_eq!(limits.max_alloc, Some(1_048_576));
        assert_eq!(limits.max_dimension, Some(4096));
    }

    #[test]
    fn limits_reject_garbage() {
        let error = DecodeLimits::from_lookup(lookup(&[(MAX_ALLOC_ENV, "lots")])).unwrap_err();
        assert!(matches!(error, SplitError::InvalidConfiguration(_)));

        let error = DecodeLimits::from_lookup(lookup(&[(MAX_DIMENSION_ENV, "0")])).unwrap_err();
        assert!(error.to_string().contains(MAX_DIMENSION_ENV));
    }

    #[test]
    fn dimension_check() {
        let limits = DecodeLimits::new().with_max_dimension(100);
        assert!(limits.check_dimensions(100, 100).is_ok());
        assert!(limits.check_dimensions(101, 1).is_err());
        assert!(DecodeLimits::new().check_dimensions(u32::MAX, u32::MAX).is_ok());
    }

    #[test]
    fn options_batch_size_clamps_zero() {
        let options = SplitOptions::new().with_batch_size(0);
        let debug = format!("{options:?}");
        assert!(debug.contains("batch_size: 1"));
        assert!(debug.contains("overwrite: true"));
    }
}

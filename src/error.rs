//! Error types for the `framesplit` crate.
//!
//! This module defines [`SplitError`], the unified error type returned by all
//! fallible operations in the crate. The `Display` text of each variant is
//! the human-readable diagnostic that ends up in a
//! [`SplitReport`](crate::SplitReport), so the messages are kept short and
//! stable. The underlying cause is kept in a separate field for logging.

use std::{io::Error as IoError, path::PathBuf};

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framesplit` operations.
///
/// Variants fall into two classes. Fatal errors
/// ([`DecoderInit`](SplitError::DecoderInit), [`Decode`](SplitError::Decode),
/// [`FrameCount`](SplitError::FrameCount)) stop a split before any frame is
/// attempted. Frame-local errors ([`FrameDecode`](SplitError::FrameDecode),
/// [`OutOfMemory`](SplitError::OutOfMemory),
/// [`PixelCopy`](SplitError::PixelCopy), [`PngWrite`](SplitError::PngWrite))
/// are recorded as diagnostics while the remaining frames are processed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SplitError {
    /// The process-wide imaging factory could not be created.
    #[error("Could not initialise imaging subsystem: {reason}")]
    DecoderInit {
        /// Why initialization failed.
        reason: String,
    },

    /// The input could not be opened as a recognised container format.
    #[error("Could not decode image: {reason}")]
    Decode {
        /// Path that was passed to [`DecoderSession::open`](crate::DecoderSession::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container's frame count is unreadable or out of range.
    #[error("Could not obtain frame count in image: {reason}")]
    FrameCount {
        /// Underlying reason.
        reason: String,
    },

    /// A frame could not be retrieved, converted to RGBA, or measured.
    #[error("Could not decode frame {index} (other images have been dumped)")]
    FrameDecode {
        /// Zero-based frame index.
        index: u32,
        /// Underlying reason, kept for logging.
        reason: String,
    },

    /// The pixel buffer for a frame could not be allocated.
    #[error("Could not decode frame {index} (out of memory)")]
    OutOfMemory {
        /// Zero-based frame index.
        index: u32,
    },

    /// Pixels could not be copied into the caller's buffer.
    #[error("Could not copy rgba pixels")]
    PixelCopy {
        /// Underlying reason, kept for logging.
        reason: String,
    },

    /// The PNG for a frame could not be written.
    #[error("Could not write PNG to {}", path.display())]
    PngWrite {
        /// Destination that failed.
        path: PathBuf,
        /// Underlying reason, kept for logging.
        reason: String,
    },

    /// A configuration value (builder or environment) is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl SplitError {
    /// Returns `true` if this error stops a split before any frame is
    /// processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SplitError::DecoderInit { .. }
                | SplitError::Decode { .. }
                | SplitError::FrameCount { .. }
                | SplitError::InvalidConfiguration(_)
        )
    }

    /// The underlying cause, when the variant carries one separately from
    /// its display text.
    pub fn reason(&self) -> Option<&str> {
        match self {
            SplitError::DecoderInit { reason }
            | SplitError::Decode { reason, .. }
            | SplitError::FrameCount { reason }
            | SplitError::FrameDecode { reason, .. }
            | SplitError::PixelCopy { reason }
            | SplitError::PngWrite { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

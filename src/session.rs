//! Decoder sessions.
//!
//! A [`DecoderSession`] wraps one opened container and hands out
//! [`FrameView`]s, one frame at a time. Both own their underlying decoder
//! state and release it when dropped, whichever path the caller takes.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use crate::error::SplitError;
use crate::factory::ImagingFactory;
use crate::format::{ContainerReader, FrameSource};
use crate::pixels;

/// Largest frame count a session accepts.
pub const MAX_FRAME_COUNT: u64 = i32::MAX as u64;

/// One opened multi-frame container.
///
/// # Example
///
/// ```no_run
/// use framesplit::{DecoderSession, ImagingFactory, SplitError};
///
/// let factory = ImagingFactory::shared()?;
/// let mut session = DecoderSession::open(factory, "scan.tif")?;
/// for index in 0..session.frame_count()? {
///     let mut frame = session.frame(index)?;
///     let (width, height) = frame.size();
///     let pixels = frame.to_rgba_buffer()?;
///     assert_eq!(pixels.len(), 4 * width as usize * height as usize);
/// }
/// # Ok::<(), SplitError>(())
/// ```
pub struct DecoderSession {
    reader: Box<dyn ContainerReader>,
    path: PathBuf,
}

impl Debug for DecoderSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecoderSession")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DecoderSession {
    /// Open `path` as a multi-frame container.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::Decode`] if the file cannot be opened as a
    /// recognised container format.
    pub fn open<P: AsRef<Path>>(factory: &ImagingFactory, path: P) -> Result<Self, SplitError> {
        let path = path.as_ref();
        let reader = factory.open(path)?;
        Ok(Self {
            reader,
            path: path.to_path_buf(),
        })
    }

    /// Path the session was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames in the container.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::FrameCount`] if the count cannot be read or
    /// exceeds [`MAX_FRAME_COUNT`].
    pub fn frame_count(&mut self) -> Result<u32, SplitError> {
        let count = self.reader.frame_count().map_err(|error| match error {
            SplitError::FrameCount { .. } => error,
            other => SplitError::FrameCount {
                reason: other.to_string(),
            },
        })?;

        if count > MAX_FRAME_COUNT {
            return Err(SplitError::FrameCount {
                reason: format!("container reports {count} frames, more than {MAX_FRAME_COUNT}"),
            });
        }
        Ok(count as u32)
    }

    /// Decode frame `index`, normalized to RGBA.
    ///
    /// A failure here only concerns this frame; the session stays usable
    /// for the remaining indices.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::FrameDecode`] if the frame cannot be retrieved,
    /// converted, or measured.
    pub fn frame(&mut self, index: u32) -> Result<FrameView, SplitError> {
        let source = self.reader.frame(index).map_err(|error| match error {
            SplitError::FrameDecode { .. } => error,
            other => SplitError::FrameDecode {
                index,
                reason: other.to_string(),
            },
        })?;
        Ok(FrameView { index, source })
    }
}

/// One decoded frame of a [`DecoderSession`].
pub struct FrameView {
    index: u32,
    source: Box<dyn FrameSource>,
}

impl Debug for FrameView {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameView")
            .field("index", &self.index)
            .field("size", &self.size())
            .finish()
    }
}

impl FrameView {
    /// Zero-based index of this frame in its container.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Frame dimensions as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.source.size()
    }

    /// Copy the RGBA pixels into `buffer`, one row every `stride` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::PixelCopy`] if `stride` is shorter than a row,
    /// `buffer` is not exactly `stride × height` bytes, or the source fails.
    pub fn copy_pixels(&mut self, stride: u32, buffer: &mut [u8]) -> Result<(), SplitError> {
        let (width, height) = self.size();
        let row_bytes = u64::from(width) * u64::from(pixels::RGBA_CHANNELS);
        if u64::from(stride) < row_bytes {
            return Err(SplitError::PixelCopy {
                reason: format!("stride {stride} is shorter than a {width} pixel row"),
            });
        }
        let expected = u64::from(stride) * u64::from(height);
        if buffer.len() as u64 != expected {
            return Err(SplitError::PixelCopy {
                reason: format!("buffer holds {} bytes, expected {expected}", buffer.len()),
            });
        }

        self.source
            .copy_pixels(stride, buffer)
            .map_err(|error| match error {
                SplitError::PixelCopy { .. } => error,
                other => SplitError::PixelCopy {
                    reason: other.to_string(),
                },
            })
    }

    /// Allocate a zeroed canonical buffer and copy the frame into it.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::OutOfMemory`] if the buffer cannot be
    /// allocated, or [`SplitError::PixelCopy`] if the copy fails.
    pub fn to_rgba_buffer(&mut self) -> Result<Vec<u8>, SplitError> {
        let (width, height) = self.size();
        let out_of_memory = SplitError::OutOfMemory { index: self.index };
        let stride = pixels::rgba_stride(width).ok_or(out_of_memory)?;
        let mut buffer = pixels::allocate_rgba(width, height)
            .ok_or(SplitError::OutOfMemory { index: self.index })?;
        self.copy_pixels(stride, &mut buffer)?;
        Ok(buffer)
    }
}

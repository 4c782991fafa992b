//! Container decoding backends.
//!
//! A backend is three small traits:
//!
//! - [`ContainerFormat`] recognises a file and opens it,
//! - [`ContainerReader`] is one opened container, giving its frame count and
//!   indexed frames,
//! - [`FrameSource`] is one decoded frame, already normalized to RGBA.
//!
//! The built-in formats are registered on every
//! [`ImagingFactory`](crate::ImagingFactory) in the order returned by
//! [`default_formats`]. Custom formats can be added through
//! [`FactoryBuilder::with_format`](crate::FactoryBuilder::with_format).

use std::path::Path;

use image::RgbaImage;

use crate::configuration::DecodeLimits;
use crate::error::SplitError;
use crate::pixels;

mod animated;
mod multipage;
mod still;

pub use animated::{GifFormat, PngFormat, WebPFormat};
pub use multipage::TiffFormat;
pub use still::StillFormat;

/// Number of leading bytes handed to [`ContainerFormat::probe`].
pub const PROBE_LENGTH: usize = 32;

/// A container format that can be recognised and opened.
///
/// Implementations must be `Send + Sync`; they are shared by every caller of
/// the process-wide factory.
pub trait ContainerFormat: Send + Sync {
    /// Short lowercase name used in logs (`"tiff"`, `"gif"`, ...).
    fn name(&self) -> &'static str;

    /// Decide whether this format handles a file, given up to
    /// [`PROBE_LENGTH`] leading bytes and the lowercase file extension.
    fn probe(&self, header: &[u8], extension: Option<&str>) -> bool;

    /// Open `path` as a container.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller as
    /// [`SplitError::Decode`](crate::SplitError::Decode).
    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError>;
}

/// One opened container.
pub trait ContainerReader {
    /// Number of frames in the container.
    ///
    /// Returned as `u64` so that out-of-range counts can be rejected by the
    /// session rather than silently truncated.
    fn frame_count(&mut self) -> Result<u64, SplitError>;

    /// Decode frame `index`, normalized to RGBA.
    ///
    /// Called only with `index < frame_count()`.
    fn frame(&mut self, index: u32) -> Result<Box<dyn FrameSource>, SplitError>;
}

/// One decoded frame.
pub trait FrameSource {
    /// Frame dimensions as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Copy the frame's RGBA pixels into `buffer`, one row every `stride`
    /// bytes. `buffer` is exactly `stride × height` bytes long.
    fn copy_pixels(&mut self, stride: u32, buffer: &mut [u8]) -> Result<(), SplitError>;
}

/// A frame already held in memory as an [`RgbaImage`].
///
/// Every built-in backend produces this; custom backends may use it too.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    image: RgbaImage,
}

impl RgbaFrame {
    /// Wrap a decoded image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// The wrapped image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl FrameSource for RgbaFrame {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn copy_pixels(&mut self, stride: u32, buffer: &mut [u8]) -> Result<(), SplitError> {
        pixels::copy_rgba_rows(&self.image, stride, buffer)
            .map_err(|reason| SplitError::PixelCopy { reason })
    }
}

/// The built-in formats, in probing order.
///
/// [`StillFormat`] comes last because it accepts anything the `image` crate
/// can guess.
pub fn default_formats() -> Vec<Box<dyn ContainerFormat>> {
    vec![
        Box::new(TiffFormat),
        Box::new(GifFormat),
        Box::new(PngFormat),
        Box::new(WebPFormat),
        Box::new(StillFormat),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_frame_copies_with_stride() {
        let mut frame = RgbaFrame::new(RgbaImage::from_raw(1, 1, vec![1, 2, 3, 4]).unwrap());
        assert_eq!(frame.size(), (1, 1));

        let mut buffer = vec![0; 4];
        frame.copy_pixels(4, &mut buffer).unwrap();
        assert_eq!(buffer, vec![1, 2, 3, 4]);

        let mut wrong = vec![0; 3];
        let error = frame.copy_pixels(4, &mut wrong).unwrap_err();
        assert!(matches!(error, SplitError::PixelCopy { .. }));
    }

    #[test]
    fn default_format_order() {
        let names: Vec<_> = default_formats().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["tiff", "gif", "png", "webp", "still"]);
    }
}

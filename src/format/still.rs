//! Single-image fallback backend.
//!
//! Any format the `image` crate can recognise (JPEG, BMP, ICO, QOI, ...) is
//! treated as a container holding exactly one frame. The pixels are decoded
//! when frame 0 is requested, so a file whose header is fine but whose data
//! is damaged surfaces as a frame failure rather than an open failure.

use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};

use super::{ContainerFormat, ContainerReader, FrameSource, RgbaFrame};
use crate::configuration::DecodeLimits;
use crate::error::SplitError;

/// Any single-image format supported by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StillFormat;

impl ContainerFormat for StillFormat {
    fn name(&self) -> &'static str {
        "still"
    }

    fn probe(&self, header: &[u8], extension: Option<&str>) -> bool {
        image::guess_format(header).is_ok()
            || extension.is_some_and(|extension| ImageFormat::from_extension(extension).is_some())
    }

    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().ok_or_else(|| SplitError::Decode {
            path: path.to_path_buf(),
            reason: "unrecognised image format".to_string(),
        })?;
        // The header must parse; an extension alone is not enough.
        reader.into_dimensions()?;
        Ok(Box::new(StillReader::new(path, Some(format), limits)))
    }
}

/// A one-frame container decoded through [`ImageReader`].
pub(super) struct StillReader {
    path: PathBuf,
    format: Option<ImageFormat>,
    limits: DecodeLimits,
}

impl StillReader {
    pub(super) fn new(path: &Path, format: Option<ImageFormat>, limits: DecodeLimits) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            limits,
        }
    }

    fn decode(&self) -> Result<RgbaFrame, SplitError> {
        let mut reader = ImageReader::open(&self.path)?;
        match self.format {
            Some(format) => reader.set_format(format),
            None => reader = reader.with_guessed_format()?,
        }
        reader.limits(self.limits.to_image_limits());
        Ok(RgbaFrame::new(reader.decode()?.to_rgba8()))
    }
}

impl ContainerReader for StillReader {
    fn frame_count(&mut self) -> Result<u64, SplitError> {
        Ok(1)
    }

    fn frame(&mut self, index: u32) -> Result<Box<dyn FrameSource>, SplitError> {
        if index != 0 {
            return Err(SplitError::FrameDecode {
                index,
                reason: "single-image file has only frame 0".to_string(),
            });
        }
        let frame = self.decode().map_err(|error| SplitError::FrameDecode {
            index,
            reason: error.to_string(),
        })?;
        Ok(Box::new(frame))
    }
}

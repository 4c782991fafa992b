//! Animated container backends (GIF, APNG, animated WebP).
//!
//! Frames come from [`image::AnimationDecoder`], which composites each frame
//! onto the full logical canvas, so every frame has the container's size and
//! is already RGBA. Plain PNG and WebP files without animation are handled
//! as one-frame containers.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use image::{
    AnimationDecoder, Frames, ImageDecoder, ImageFormat,
    codecs::{gif::GifDecoder, png::PngDecoder, webp::WebPDecoder},
};

use super::still::StillReader;
use super::{ContainerFormat, ContainerReader, FrameSource, RgbaFrame};
use crate::configuration::DecodeLimits;
use crate::error::SplitError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Animated GIF (GIF87a and GIF89a).
#[derive(Debug, Clone, Copy, Default)]
pub struct GifFormat;

impl ContainerFormat for GifFormat {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn probe(&self, header: &[u8], _extension: Option<&str>) -> bool {
        header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a")
    }

    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        let frames = gif_frames(path, limits)?;
        Ok(Box::new(AnimatedReader::new(path, limits, gif_frames, frames)))
    }
}

/// PNG, including animated PNG (APNG).
#[derive(Debug, Clone, Copy, Default)]
pub struct PngFormat;

impl ContainerFormat for PngFormat {
    fn name(&self) -> &'static str {
        "png"
    }

    fn probe(&self, header: &[u8], _extension: Option<&str>) -> bool {
        header.starts_with(PNG_SIGNATURE)
    }

    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        let reader = BufReader::new(File::open(path)?);
        let decoder = PngDecoder::with_limits(reader, limits.to_image_limits())?;
        if decoder.is_apng()? {
            let frames = decoder.apng()?.into_frames();
            Ok(Box::new(AnimatedReader::new(path, limits, apng_frames, frames)))
        } else {
            Ok(Box::new(StillReader::new(path, Some(ImageFormat::Png), limits)))
        }
    }
}

/// WebP, animated or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPFormat;

impl ContainerFormat for WebPFormat {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn probe(&self, header: &[u8], _extension: Option<&str>) -> bool {
        header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP"
    }

    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        let reader = BufReader::new(File::open(path)?);
        let mut decoder = WebPDecoder::new(reader)?;
        if decoder.has_animation() {
            decoder.set_limits(limits.to_image_limits())?;
            let frames = decoder.into_frames();
            Ok(Box::new(AnimatedReader::new(path, limits, webp_frames, frames)))
        } else {
            Ok(Box::new(StillReader::new(path, Some(ImageFormat::WebP), limits)))
        }
    }
}

/// Opens a fresh frame stream positioned before the first frame.
type OpenFrames = fn(&Path, DecodeLimits) -> Result<Frames<'static>, SplitError>;

fn gif_frames(path: &Path, limits: DecodeLimits) -> Result<Frames<'static>, SplitError> {
    let reader = BufReader::new(File::open(path)?);
    let mut decoder = GifDecoder::new(reader)?;
    decoder.set_limits(limits.to_image_limits())?;
    Ok(decoder.into_frames())
}

fn apng_frames(path: &Path, limits: DecodeLimits) -> Result<Frames<'static>, SplitError> {
    let reader = BufReader::new(File::open(path)?);
    let decoder = PngDecoder::with_limits(reader, limits.to_image_limits())?;
    Ok(decoder.apng()?.into_frames())
}

fn webp_frames(path: &Path, limits: DecodeLimits) -> Result<Frames<'static>, SplitError> {
    let reader = BufReader::new(File::open(path)?);
    let mut decoder = WebPDecoder::new(reader)?;
    decoder.set_limits(limits.to_image_limits())?;
    Ok(decoder.into_frames())
}

/// Frames of an animation, streamed front to back.
///
/// Animation streams have no frame count in their header, so counting is a
/// full pass that decodes and drops every frame. Frames are then decoded
/// again on demand from a second stream, so at most one frame is held at a
/// time. Asking for an earlier frame than the last one handed out reopens
/// the file.
///
/// A stream cannot be resynchronised after a bad frame: the first failure
/// is counted as a frame of its own and ends the animation.
struct AnimatedReader {
    path: PathBuf,
    limits: DecodeLimits,
    open: OpenFrames,
    frame_count: Option<u64>,
    stream: Option<Frames<'static>>,
    /// Index of the frame `stream` yields next.
    next_index: u32,
}

impl AnimatedReader {
    fn new(path: &Path, limits: DecodeLimits, open: OpenFrames, frames: Frames<'static>) -> Self {
        Self {
            path: path.to_path_buf(),
            limits,
            open,
            frame_count: None,
            stream: Some(frames),
            next_index: 0,
        }
    }

    fn reopen(&self) -> Result<Frames<'static>, SplitError> {
        (self.open)(&self.path, self.limits)
    }
}

impl ContainerReader for AnimatedReader {
    fn frame_count(&mut self) -> Result<u64, SplitError> {
        if let Some(count) = self.frame_count {
            return Ok(count);
        }

        let frames = match self.stream.take() {
            Some(frames) if self.next_index == 0 => frames,
            _ => self.reopen().map_err(|error| SplitError::FrameCount {
                reason: error.to_string(),
            })?,
        };
        let mut count = 0_u64;
        for frame in frames {
            count += 1;
            if let Err(error) = frame {
                log::debug!("Animation stream stopped at frame {}: {error}", count - 1);
                break;
            }
        }
        self.next_index = 0;

        self.frame_count = Some(count);
        Ok(count)
    }

    fn frame(&mut self, index: u32) -> Result<Box<dyn FrameSource>, SplitError> {
        let count = self.frame_count()?;
        if u64::from(index) >= count {
            return Err(SplitError::FrameDecode {
                index,
                reason: format!("animation has only {count} frame(s)"),
            });
        }

        let mut stream = match self.stream.take() {
            Some(stream) if index >= self.next_index => stream,
            _ => {
                self.next_index = 0;
                self.reopen().map_err(|error| SplitError::FrameDecode {
                    index,
                    reason: error.to_string(),
                })?
            }
        };

        loop {
            let position = self.next_index;
            match stream.next() {
                Some(Ok(frame)) => {
                    self.next_index += 1;
                    if position == index {
                        self.stream = Some(stream);
                        return Ok(Box::new(RgbaFrame::new(frame.into_buffer())));
                    }
                }
                Some(Err(error)) => {
                    let reason = if position == index {
                        error.to_string()
                    } else {
                        format!("stream failed at frame {position}: {error}")
                    };
                    return Err(SplitError::FrameDecode { index, reason });
                }
                None => {
                    return Err(SplitError::FrameDecode {
                        index,
                        reason: format!("stream ended after {position} frame(s)"),
                    });
                }
            }
        }
    }
}

//! Multi-page TIFF backend.
//!
//! Each image file directory (IFD) in the file is one frame. This is the
//! layout scanners and multifunction printers use when a single scan session
//! covers several pages.
//!
//! Counting pages only follows the chain of directories; a page whose tags
//! cannot be interpreted is still counted and fails on its own when decoded.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use image::RgbaImage;
use tiff::{
    TiffError,
    decoder::Decoder,
    tags::{IfdPointer, PhotometricInterpretation, Tag},
};

use super::{ContainerFormat, ContainerReader, FrameSource, RgbaFrame};
use crate::configuration::DecodeLimits;
use crate::error::SplitError;
use crate::pixels;

const MAGIC: [&[u8]; 4] = [b"II*\0", b"MM\0*", b"II+\0", b"MM\0+"];

/// Multi-page TIFF (classic and BigTIFF, either byte order).
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffFormat;

impl ContainerFormat for TiffFormat {
    fn name(&self) -> &'static str {
        "tiff"
    }

    fn probe(&self, header: &[u8], _extension: Option<&str>) -> bool {
        MAGIC.iter().any(|magic| header.starts_with(magic))
    }

    fn open(
        &self,
        path: &Path,
        limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|error| SplitError::Decode {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?
            .with_limits(limits.to_tiff_limits());
        let first_page = decoder.ifd_pointer();

        Ok(Box::new(TiffReader {
            path: path.to_path_buf(),
            decoder,
            first_page,
            limits,
            frame_count: None,
        }))
    }
}

struct TiffReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    first_page: Option<IfdPointer>,
    limits: DecodeLimits,
    frame_count: Option<u64>,
}

impl TiffReader {
    /// Decode the current page, which uses a colour map.
    ///
    /// The decoder reads sample data only for layouts it can name a colour
    /// type for, and indexed pages are not one of them. The page is therefore
    /// re-read from a copy of the file in which it is marked as grey, which
    /// yields the raw indices with every compression the decoder supports.
    fn read_palette_page(
        &mut self,
        index: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, String> {
        let colormap = self
            .decoder
            .get_tag_u16_vec(Tag::ColorMap)
            .map_err(|error| format!("colour map: {error}"))?;
        let bits = self
            .decoder
            .find_tag_unsigned_vec::<u8>(Tag::BitsPerSample)
            .map_err(|error| error.to_string())?
            .and_then(|bits| bits.first().copied())
            .unwrap_or(1);
        let page = self
            .decoder
            .ifd_pointer()
            .ok_or_else(|| "page has no directory".to_string())?;

        let mut bytes = fs::read(&self.path).map_err(|error| error.to_string())?;
        patch_photometric(&mut bytes, page, PhotometricInterpretation::BlackIsZero)?;

        let tiff_error = |error: TiffError| error.to_string();
        let mut indexed = Decoder::new(Cursor::new(bytes))
            .map_err(tiff_error)?
            .with_limits(self.limits.to_tiff_limits());
        indexed.seek_to_image(index as usize).map_err(tiff_error)?;
        let indices = indexed.read_image().map_err(tiff_error)?;

        pixels::palette_to_rgba(bits, &colormap, width, height, indices)
    }
}

impl ContainerReader for TiffReader {
    fn frame_count(&mut self) -> Result<u64, SplitError> {
        if let Some(count) = self.frame_count {
            return Ok(count);
        }

        let Some(mut page) = self.first_page else {
            return Ok(0);
        };
        let mut seen = HashSet::new();
        let mut count = 0_u64;
        loop {
            if !seen.insert(page) {
                return Err(SplitError::FrameCount {
                    reason: format!("directory chain loops back to offset {:#x}", page.0),
                });
            }
            let directory =
                self.decoder
                    .read_directory(page)
                    .map_err(|error| SplitError::FrameCount {
                        reason: format!("directory {count}: {error}"),
                    })?;
            count += 1;
            match directory.next() {
                Some(next) => page = next,
                None => break,
            }
        }

        log::debug!("TIFF has {count} page(s)");
        self.frame_count = Some(count);
        Ok(count)
    }

    fn frame(&mut self, index: u32) -> Result<Box<dyn FrameSource>, SplitError> {
        let frame_error = |reason: String| SplitError::FrameDecode { index, reason };
        let tiff_error = |error: TiffError| frame_error(error.to_string());

        self.decoder
            .seek_to_image(index as usize)
            .map_err(tiff_error)?;
        let (width, height) = self.decoder.dimensions().map_err(tiff_error)?;
        self.limits
            .check_dimensions(width, height)
            .map_err(frame_error)?;

        let photometric = self
            .decoder
            .find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)
            .map_err(tiff_error)?;
        let image = if photometric == Some(PhotometricInterpretation::RGBPalette.to_u16()) {
            self.read_palette_page(index, width, height)
                .map_err(frame_error)?
        } else {
            let color_type = self.decoder.colortype().map_err(tiff_error)?;
            let samples = self.decoder.read_image().map_err(tiff_error)?;
            pixels::tiff_to_rgba(color_type, width, height, samples).map_err(frame_error)?
        };
        Ok(Box::new(RgbaFrame::new(image)))
    }
}

/// Overwrite the `PhotometricInterpretation` value of the directory at
/// `page` in an in-memory TIFF file.
fn patch_photometric(
    bytes: &mut [u8],
    page: IfdPointer,
    value: PhotometricInterpretation,
) -> Result<(), String> {
    let truncated = || format!("directory at {:#x} is truncated", page.0);

    let little_endian = match bytes.get(..2) {
        Some(b"II") => true,
        Some(b"MM") => false,
        _ => return Err("missing TIFF byte order mark".to_string()),
    };
    let bigtiff = read_uint(bytes, 2, 2, little_endian) == Some(43);
    // Entry count width, entry size and offset of the value within an entry.
    let (count_len, entry_len, value_at) = if bigtiff { (8, 20, 12) } else { (2, 12, 8) };

    let start = usize::try_from(page.0).map_err(|_| truncated())?;
    let count = read_uint(bytes, start, count_len, little_endian).ok_or_else(truncated)?;
    for entry in 0..count as usize {
        let at = entry
            .checked_mul(entry_len)
            .and_then(|offset| offset.checked_add(start + count_len))
            .ok_or_else(truncated)?;
        let tag = read_uint(bytes, at, 2, little_endian);
        if tag != Some(u64::from(Tag::PhotometricInterpretation.to_u16())) {
            continue;
        }
        let width = match read_uint(bytes, at + 2, 2, little_endian) {
            Some(3) => 2,
            Some(4) => 4,
            other => {
                return Err(format!("unexpected field type {other:?} for photometric tag"));
            }
        };
        let value = u64::from(value.to_u16());
        return write_uint(bytes, at + value_at, width, value, little_endian)
            .ok_or_else(truncated);
    }
    Err(format!("directory at {:#x} has no photometric tag", page.0))
}

fn read_uint(bytes: &[u8], at: usize, len: usize, little_endian: bool) -> Option<u64> {
    let field = bytes.get(at..at.checked_add(len)?)?;
    let fold = |value: u64, &byte: &u8| (value << 8) | u64::from(byte);
    Some(if little_endian {
        field.iter().rev().fold(0, fold)
    } else {
        field.iter().fold(0, fold)
    })
}

fn write_uint(
    bytes: &mut [u8],
    at: usize,
    len: usize,
    value: u64,
    little_endian: bool,
) -> Option<()> {
    let field = bytes.get_mut(at..at.checked_add(len)?)?;
    for (position, byte) in field.iter_mut().enumerate() {
        let shift = if little_endian { position } else { len - 1 - position } * 8;
        *byte = (value >> shift) as u8;
    }
    Some(())
}

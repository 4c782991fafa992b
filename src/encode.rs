//! PNG output.
//!
//! Frames are written as 8-bit RGBA PNGs through the `image` crate's PNG
//! encoder. The encoder writes no timestamp or text chunks, so the same
//! pixels always produce the same bytes.

use std::{
    borrow::Cow,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::error::SplitError;
use crate::pixels::RGBA_CHANNELS;

/// Encode an RGBA buffer as a PNG file at `path`.
///
/// `pixels` holds `height` rows, one every `stride` bytes; bytes past
/// `4 × width` in a row are ignored. When `overwrite` is `false` an existing
/// file at `path` is left alone and reported as a failure.
///
/// # Errors
///
/// Returns [`SplitError::PngWrite`] if the buffer geometry is inconsistent,
/// the file cannot be created, or encoding fails. A partially written file
/// is removed.
pub fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    pixels: &[u8],
    stride: u32,
    overwrite: bool,
) -> Result<(), SplitError> {
    let write_error = |reason: String| SplitError::PngWrite {
        path: path.to_path_buf(),
        reason,
    };

    let rows = tight_rows(width, height, pixels, stride).map_err(write_error)?;
    let file = create(path, overwrite).map_err(|error| write_error(error.to_string()))?;

    log::trace!("Encoding {width}x{height} RGBA frame to {}", path.display());
    if let Err(reason) = encode(file, width, height, &rows) {
        // The file was created by us; do not leave a truncated PNG behind.
        let _ = fs::remove_file(path);
        return Err(write_error(reason));
    }
    Ok(())
}

fn create(path: &Path, overwrite: bool) -> std::io::Result<File> {
    if overwrite {
        File::create(path)
    } else {
        OpenOptions::new().write(true).create_new(true).open(path)
    }
}

fn encode(file: File, width: u32, height: u32, rows: &[u8]) -> Result<(), String> {
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer)
        .write_image(rows, width, height, ExtendedColorType::Rgba8)
        .map_err(|error| error.to_string())?;
    writer.flush().map_err(|error| error.to_string())
}

/// Strip row padding so the encoder sees `4 × width` bytes per row.
fn tight_rows(width: u32, height: u32, pixels: &[u8], stride: u32) -> Result<Cow<'_, [u8]>, String> {
    let row_bytes = width as usize * RGBA_CHANNELS as usize;
    let stride = stride as usize;
    if stride < row_bytes {
        return Err(format!("stride {stride} is shorter than a {width} pixel row"));
    }
    let expected = stride
        .checked_mul(height as usize)
        .ok_or_else(|| "buffer size overflows".to_string())?;
    if pixels.len() != expected {
        return Err(format!(
            "buffer holds {} bytes, expected {expected}",
            pixels.len()
        ));
    }

    if stride == row_bytes {
        return Ok(Cow::Borrowed(pixels));
    }
    let mut rows = Vec::with_capacity(row_bytes * height as usize);
    for row in pixels.chunks_exact(stride) {
        rows.extend_from_slice(&row[..row_bytes]);
    }
    Ok(Cow::Owned(rows))
}

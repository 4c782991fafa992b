//! Pixel buffer helpers.
//!
//! Everything that leaves a decoding backend is normalized to the canonical
//! layout: 8 bits per channel, interleaved RGBA, row-major, with a stride of
//! `4 × width` bytes and no padding.

use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba, RgbaImage};
use tiff::{ColorType, decoder::DecodingResult};

/// Bytes per pixel of the canonical layout.
pub const RGBA_CHANNELS: u32 = 4;

/// Row stride in bytes of a canonical buffer `width` pixels wide.
///
/// Returns `None` if the stride does not fit in a `u32`.
pub fn rgba_stride(width: u32) -> Option<u32> {
    width.checked_mul(RGBA_CHANNELS)
}

/// Allocate a zero-filled canonical buffer for a `width × height` frame.
///
/// Returns `None` when the size overflows or the allocator refuses the
/// reservation, so callers can report the frame as out of memory instead of
/// aborting the process.
pub fn allocate_rgba(width: u32, height: u32) -> Option<Vec<u8>> {
    let size = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(RGBA_CHANNELS as usize)?;
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(size).ok()?;
    buffer.resize(size, 0);
    Some(buffer)
}

/// Copy a decoded RGBA image into `buffer`, one row every `stride` bytes.
///
/// `buffer` must be exactly `stride × height` bytes and `stride` at least
/// `4 × width`. Bytes between the end of a row and the next stride are left
/// untouched.
pub fn copy_rgba_rows(image: &RgbaImage, stride: u32, buffer: &mut [u8]) -> Result<(), String> {
    let (width, height) = image.dimensions();
    let row_bytes = (width as usize) * RGBA_CHANNELS as usize;
    let stride = stride as usize;

    if stride < row_bytes {
        return Err(format!(
            "stride {stride} is smaller than a {width} pixel RGBA row"
        ));
    }
    let expected = stride
        .checked_mul(height as usize)
        .ok_or_else(|| "buffer size overflows".to_string())?;
    if buffer.len() != expected {
        return Err(format!(
            "buffer holds {} bytes, expected {expected}",
            buffer.len()
        ));
    }

    let data = image.as_raw();
    if stride == row_bytes {
        buffer.copy_from_slice(&data[..row_bytes * height as usize]);
    } else {
        for (row, source) in data.chunks_exact(row_bytes.max(1)).enumerate() {
            let start = row * stride;
            buffer[start..start + row_bytes].copy_from_slice(source);
        }
    }
    Ok(())
}

/// Convert the samples of one TIFF page to an RGBA image.
///
/// Handles the sample layouts produced by scanners and common tooling:
/// bilevel, 8/16-bit grey (with or without alpha), 8/16-bit and float RGB(A),
/// 8-bit YCbCr and 8-bit CMYK. Anything else is reported as unsupported.
/// Indexed pages go through [`palette_to_rgba`] instead.
pub fn tiff_to_rgba(
    color_type: ColorType,
    width: u32,
    height: u32,
    samples: DecodingResult,
) -> Result<RgbaImage, String> {
    let mismatch = || format!("{color_type:?} samples do not cover {width}x{height} pixels");

    let image = match (color_type, samples) {
        (ColorType::Gray(1), DecodingResult::U8(data)) => {
            let expanded: Vec<u8> = unpack_samples(&data, 1, width, height)
                .ok_or_else(mismatch)?
                .into_iter()
                .map(|bit| if bit == 1 { 255 } else { 0 })
                .collect();
            DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, expanded)
                    .ok_or_else(mismatch)?,
            )
        }
        (ColorType::Gray(8), DecodingResult::U8(data)) => DynamicImage::ImageLuma8(
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::Gray(16), DecodingResult::U16(data)) => DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        // Grey with an extra (alpha) sample is reported as two-band data.
        (
            ColorType::Multiband {
                bit_depth: 8,
                num_samples: 2,
            },
            DecodingResult::U8(data),
        ) => DynamicImage::ImageLumaA8(
            ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (
            ColorType::Multiband {
                bit_depth: 16,
                num_samples: 2,
            },
            DecodingResult::U16(data),
        ) => DynamicImage::ImageLumaA16(
            ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::RGB(8), DecodingResult::U8(data)) => DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::RGB(16), DecodingResult::U16(data)) => DynamicImage::ImageRgb16(
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::RGB(32), DecodingResult::F32(data)) => DynamicImage::ImageRgb32F(
            ImageBuffer::<Rgb<f32>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::RGBA(8), DecodingResult::U8(data)) => {
            // Already canonical; skip the DynamicImage round trip.
            return ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
                .ok_or_else(mismatch);
        }
        (ColorType::RGBA(16), DecodingResult::U16(data)) => DynamicImage::ImageRgba16(
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::RGBA(32), DecodingResult::F32(data)) => DynamicImage::ImageRgba32F(
            ImageBuffer::<Rgba<f32>, _>::from_raw(width, height, data).ok_or_else(mismatch)?,
        ),
        (ColorType::YCbCr(8), DecodingResult::U8(data)) => {
            return ycbcr_to_rgba(&data, width, height).ok_or_else(mismatch);
        }
        (ColorType::CMYK(8), DecodingResult::U8(data)) => {
            return cmyk_to_rgba(&data, width, height).ok_or_else(mismatch);
        }
        (other, _) => return Err(format!("unsupported TIFF colour type {other:?}")),
    };

    Ok(image.to_rgba8())
}

/// Look up the indices of a palette page in its TIFF `ColorMap`.
///
/// `colormap` holds `3 × 2^bits` 16-bit entries: all reds, then all greens,
/// then all blues. `indices` are the page's raw samples as read for a grey
/// page of the same depth.
pub fn palette_to_rgba(
    bits: u8,
    colormap: &[u16],
    width: u32,
    height: u32,
    indices: DecodingResult,
) -> Result<RgbaImage, String> {
    let mismatch = || format!("{bits}-bit palette samples do not cover {width}x{height} pixels");

    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("unsupported palette depth {bits}"));
    }
    let entries = 1_usize << bits;
    if colormap.len() != entries * 3 {
        return Err(format!(
            "colour map has {} values, expected {}",
            colormap.len(),
            entries * 3
        ));
    }
    let (red, rest) = colormap.split_at(entries);
    let (green, blue) = rest.split_at(entries);

    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(mismatch)?;
    let indices: Vec<usize> = match (bits, indices) {
        (16, DecodingResult::U16(data)) if data.len() >= pixels => {
            data[..pixels].iter().map(|&index| usize::from(index)).collect()
        }
        (16, _) => return Err(mismatch()),
        (_, DecodingResult::U8(data)) => unpack_samples(&data, bits, width, height)
            .ok_or_else(mismatch)?
            .into_iter()
            .map(usize::from)
            .collect(),
        _ => return Err(mismatch()),
    };

    let mut rgba = Vec::with_capacity(pixels * RGBA_CHANNELS as usize);
    for index in indices {
        rgba.extend_from_slice(&[
            (red[index] >> 8) as u8,
            (green[index] >> 8) as u8,
            (blue[index] >> 8) as u8,
            255,
        ]);
    }
    RgbaImage::from_raw(width, height, rgba).ok_or_else(mismatch)
}

/// Split packed rows of `bits`-wide samples (most significant bits first,
/// each row padded to a whole byte) into one byte per sample.
fn unpack_samples(data: &[u8], bits: u8, width: u32, height: u32) -> Option<Vec<u8>> {
    let bits = usize::from(bits);
    let width = width as usize;
    let height = height as usize;
    let row_bytes = width.checked_mul(bits)?.div_ceil(8);
    if data.len() < row_bytes.checked_mul(height)? {
        return None;
    }
    if bits == 8 {
        return Some(data[..width * height].to_vec());
    }

    let mask = (1_u16 << bits) - 1;
    let mut unpacked = Vec::with_capacity(width.checked_mul(height)?);
    for row in data.chunks_exact(row_bytes.max(1)).take(height) {
        for x in 0..width {
            let offset = x * bits;
            let shift = 8 - bits - offset % 8;
            unpacked.push(((u16::from(row[offset / 8]) >> shift) & mask) as u8);
        }
    }
    Some(unpacked)
}

/// Full-range BT.601 YCbCr, the TIFF default coefficients and reference
/// levels.
fn ycbcr_to_rgba(data: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if data.len() != pixels.checked_mul(3)? {
        return None;
    }

    let clamp = |value: f32| value.round().clamp(0.0, 255.0) as u8;
    let mut rgba = Vec::with_capacity(pixels * RGBA_CHANNELS as usize);
    for sample in data.chunks_exact(3) {
        let y = f32::from(sample[0]);
        let cb = f32::from(sample[1]) - 128.0;
        let cr = f32::from(sample[2]) - 128.0;
        rgba.extend_from_slice(&[
            clamp(y + 1.402 * cr),
            clamp(y - 0.344_136 * cb - 0.714_136 * cr),
            clamp(y + 1.772 * cb),
            255,
        ]);
    }
    RgbaImage::from_raw(width, height, rgba)
}

fn cmyk_to_rgba(data: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if data.len() != pixels.checked_mul(4)? {
        return None;
    }

    let mut rgba = Vec::with_capacity(data.len());
    for cmyk in data.chunks_exact(4) {
        let k = 255 - u16::from(cmyk[3]);
        for &ink in &cmyk[..3] {
            rgba.push(((255 - u16::from(ink)) * k / 255) as u8);
        }
        rgba.push(255);
    }
    RgbaImage::from_raw(width, height, rgba)
}

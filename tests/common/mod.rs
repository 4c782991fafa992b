//! Fixture helpers shared by the integration tests.
//!
//! Fixtures are synthesized on the fly so the tests need no binary files.

#![allow(dead_code)]

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use framesplit::{
    ContainerFormat, ContainerReader, DecodeLimits, FrameSource, ImagingFactory, RgbaFrame,
    SplitError,
};
use image::{Delay, Frame, Rgba, RgbaImage, codecs::gif::GifEncoder};
use tiff::{
    encoder::{TiffEncoder, colortype},
    tags::{ExtraSamples, PhotometricInterpretation, SampleFormat, Tag},
};

/// A solid `width × height` image of one colour.
pub fn solid(width: u32, height: u32, colour: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(colour))
}

/// Write a multi-page RGBA TIFF, one page per image.
pub fn write_tiff(path: &Path, pages: &[RgbaImage]) {
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).expect("Failed to create TIFF encoder");
        for page in pages {
            encoder
                .write_image::<colortype::RGBA8>(page.width(), page.height(), page.as_raw())
                .expect("Failed to write TIFF page");
        }
    }
    fs::write(path, bytes.into_inner()).expect("Failed to write TIFF fixture");
}

/// Write a three-page TIFF whose middle page uses 64-bit float samples,
/// a layout the splitter does not convert.
pub fn write_tiff_with_unsupported_middle_page(path: &Path, first: &RgbaImage, last: &RgbaImage) {
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).expect("Failed to create TIFF encoder");
        encoder
            .write_image::<colortype::RGBA8>(first.width(), first.height(), first.as_raw())
            .expect("Failed to write TIFF page");
        encoder
            .write_image::<colortype::Gray64Float>(2, 2, &[0.0, 0.25, 0.5, 1.0])
            .expect("Failed to write TIFF page");
        encoder
            .write_image::<colortype::RGBA8>(last.width(), last.height(), last.as_raw())
            .expect("Failed to write TIFF page");
    }
    fs::write(path, bytes.into_inner()).expect("Failed to write TIFF fixture");
}

/// Overwrite the `PhotometricInterpretation` of page `page` in a classic
/// TIFF written by [`TiffEncoder`].
pub fn patch_tiff_photometric(path: &Path, page: usize, value: u16) {
    let mut bytes = fs::read(path).expect("Failed to read TIFF fixture");
    let little_endian = &bytes[..2] == b"II";
    let u16_at = |bytes: &[u8], at: usize| {
        let field = [bytes[at], bytes[at + 1]];
        if little_endian { u16::from_le_bytes(field) } else { u16::from_be_bytes(field) }
    };
    let u32_at = |bytes: &[u8], at: usize| {
        let field = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        if little_endian { u32::from_le_bytes(field) } else { u32::from_be_bytes(field) }
    };

    let mut directory = u32_at(&bytes, 4) as usize;
    for _ in 0..page {
        let count = u16_at(&bytes, directory) as usize;
        directory = u32_at(&bytes, directory + 2 + 12 * count) as usize;
    }

    let count = u16_at(&bytes, directory) as usize;
    let entry = (0..count)
        .map(|entry| directory + 2 + 12 * entry)
        .find(|&at| u16_at(&bytes, at) == Tag::PhotometricInterpretation.to_u16())
        .expect("Page has no photometric tag");
    let value = if little_endian { value.to_le_bytes() } else { value.to_be_bytes() };
    bytes[entry + 8..entry + 10].copy_from_slice(&value);
    fs::write(path, bytes).expect("Failed to write TIFF fixture");
}

/// 8-bit indices into a colour map.
struct Indexed8;

impl colortype::ColorType for Indexed8 {
    type Inner = u8;
    const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::RGBPalette;
    const BITS_PER_SAMPLE: &'static [u16] = &[8];
    const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::Uint];

    fn horizontal_predict(row: &[u8], result: &mut Vec<u8>) {
        result.extend_from_slice(row);
    }
}

/// Write a two-page TIFF: an RGBA page, then an indexed page whose colour
/// map holds `palette` (remaining entries black).
pub fn write_palette_tiff(
    path: &Path,
    first: &RgbaImage,
    width: u32,
    height: u32,
    indices: &[u8],
    palette: &[[u8; 3]],
) {
    let mut colormap = vec![0_u16; 3 * 256];
    for (entry, rgb) in palette.iter().enumerate() {
        for (channel, &value) in rgb.iter().enumerate() {
            colormap[channel * 256 + entry] = u16::from(value) * 257;
        }
    }

    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).expect("Failed to create TIFF encoder");
        encoder
            .write_image::<colortype::RGBA8>(first.width(), first.height(), first.as_raw())
            .expect("Failed to write TIFF page");
        let mut page = encoder
            .new_image::<Indexed8>(width, height)
            .expect("Failed to start indexed page");
        page.encoder()
            .write_tag(Tag::ColorMap, &colormap[..])
            .expect("Failed to write colour map");
        page.write_data(indices).expect("Failed to write indexed page");
    }
    fs::write(path, bytes.into_inner()).expect("Failed to write TIFF fixture");
}

/// Write a one-page TIFF with interleaved grey and unassociated alpha
/// samples.
pub fn write_grey_alpha_tiff(path: &Path, width: u32, height: u32, samples: &[u8]) {
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).expect("Failed to create TIFF encoder");
        let mut page = encoder
            .new_image::<colortype::Gray8>(width, height)
            .expect("Failed to start grey page");
        page.extra_samples(&[ExtraSamples::UnassociatedAlpha])
            .expect("Failed to add alpha sample");
        page.write_data(samples).expect("Failed to write grey page");
    }
    fs::write(path, bytes.into_inner()).expect("Failed to write TIFF fixture");
}

/// Write a one-page uncompressed YCbCr TIFF without chroma subsampling.
pub fn write_ycbcr_tiff(path: &Path, width: u32, height: u32, samples: &[u8]) {
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut bytes).expect("Failed to create TIFF encoder");
        encoder
            .write_image::<colortype::YCbCr8>(width, height, samples)
            .expect("Failed to write TIFF page");
    }
    fs::write(path, bytes.into_inner()).expect("Failed to write TIFF fixture");
}

/// Write a one-page CCITT Group 4 fax TIFF. `true` is a black pel.
pub fn write_g4_tiff(path: &Path, rows: &[Vec<bool>]) {
    let width = rows.first().map_or(0, Vec::len);
    let mut encoder = fax::encoder::Encoder::new(fax::VecWriter::new());
    for row in rows {
        let pels = row
            .iter()
            .map(|&black| if black { fax::Color::Black } else { fax::Color::White });
        encoder
            .encode_line(pels, width as u16)
            .expect("Failed to encode fax line");
    }
    let data = encoder
        .finish()
        .expect("Failed to finish fax data")
        .finish();
    let tiff = fax::tiff::wrap(&data, width as u32, rows.len() as u32);
    fs::write(path, tiff).expect("Failed to write TIFF fixture");
}

/// Write an animated GIF, one frame per image.
pub fn write_gif(path: &Path, frames: &[RgbaImage]) {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder
            .encode_frames(frames.iter().map(|image| {
                Frame::from_parts(image.clone(), 0, 0, Delay::from_numer_denom_ms(100, 1))
            }))
            .expect("Failed to encode GIF");
    }
    fs::write(path, bytes).expect("Failed to write GIF fixture");
}

/// Names of the PNG files in `directory`, sorted.
pub fn png_files(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(directory)
        .expect("Failed to list output directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".png"))
        .collect();
    names.sort();
    names
}

/// Decode a written PNG back to RGBA.
pub fn read_png(path: &Path) -> RgbaImage {
    image::open(path).expect("Failed to read PNG back").to_rgba8()
}

/// One frame of a [`SyntheticFormat`] container.
#[derive(Clone)]
pub enum SyntheticFrame {
    /// Decodes to this image.
    Good(RgbaImage),
    /// Fails to decode.
    Corrupt,
    /// Decodes, but its pixels cannot be copied.
    Unreadable(u32, u32),
}

/// An in-memory container format recognised by the `SYNTH` magic.
pub struct SyntheticFormat {
    pub frames: Vec<SyntheticFrame>,
    /// Overrides the reported frame count.
    pub reported_count: Option<u64>,
}

pub const SYNTHETIC_MAGIC: &[u8] = b"SYNTH";

impl ContainerFormat for SyntheticFormat {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn probe(&self, header: &[u8], _extension: Option<&str>) -> bool {
        header.starts_with(SYNTHETIC_MAGIC)
    }

    fn open(
        &self,
        _path: &Path,
        _limits: DecodeLimits,
    ) -> Result<Box<dyn ContainerReader>, SplitError> {
        Ok(Box::new(SyntheticReader {
            frames: self.frames.clone(),
            reported_count: self.reported_count,
        }))
    }
}

struct SyntheticReader {
    frames: Vec<SyntheticFrame>,
    reported_count: Option<u64>,
}

impl ContainerReader for SyntheticReader {
    fn frame_count(&mut self) -> Result<u64, SplitError> {
        Ok(self.reported_count.unwrap_or(self.frames.len() as u64))
    }

    fn frame(&mut self, index: u32) -> Result<Box<dyn FrameSource>, SplitError> {
        match self.frames.get(index as usize) {
            Some(SyntheticFrame::Good(image)) => Ok(Box::new(RgbaFrame::new(image.clone()))),
            Some(SyntheticFrame::Unreadable(width, height)) => {
                Ok(Box::new(UnreadableFrame(*width, *height)))
            }
            _ => Err(SplitError::FrameDecode {
                index,
                reason: "synthetic corruption".to_string(),
            }),
        }
    }
}

struct UnreadableFrame(u32, u32);

impl FrameSource for UnreadableFrame {
    fn size(&self) -> (u32, u32) {
        (self.0, self.1)
    }

    fn copy_pixels(&mut self, _stride: u32, _buffer: &mut [u8]) -> Result<(), SplitError> {
        Err(SplitError::PixelCopy {
            reason: "lazy source went away".to_string(),
        })
    }
}

/// A factory that knows the synthetic format, and an input file for it.
pub fn synthetic_setup(
    directory: &Path,
    frames: Vec<SyntheticFrame>,
    reported_count: Option<u64>,
) -> (ImagingFactory, PathBuf) {
    let input = directory.join("input.synth");
    fs::write(&input, SYNTHETIC_MAGIC).expect("Failed to write synthetic input");
    let factory = ImagingFactory::builder()
        .with_format(Box::new(SyntheticFormat {
            frames,
            reported_count,
        }))
        .build();
    (factory, input)
}

//! The frame extraction pipeline.
//!
//! [`split_images`] turns one container into `<basename>-<index>.png` files,
//! one per frame. A frame that fails at any step is described in the
//! report's [`Diagnostics`] and skipped; the remaining frames are still
//! written. Only failing to open the container or to read its frame count
//! makes the whole split unsuccessful.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::configuration::SplitOptions;
use crate::diagnostics::Diagnostics;
use crate::encode;
use crate::error::SplitError;
use crate::factory::ImagingFactory;
use crate::pixels;
use crate::progress::ProgressTracker;
use crate::session::DecoderSession;

/// Outcome of a split.
#[derive(Debug, Clone, Default)]
pub struct SplitReport {
    /// `true` if the container was opened and its frame count read, even
    /// when individual frames failed.
    pub success: bool,
    /// Number of frames the container reported (0 if it never got that far).
    pub frame_count: u32,
    /// Files written, in frame order.
    pub written: Vec<PathBuf>,
    /// Every failure, in the order it happened.
    pub diagnostics: Diagnostics,
}

impl SplitReport {
    fn failed(error: &SplitError) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(error);
        Self {
            success: false,
            diagnostics,
            ..Self::default()
        }
    }

    /// Returns `true` if the split succeeded without any frame failure.
    pub fn is_clean(&self) -> bool {
        self.success && self.diagnostics.is_empty()
    }

    /// Number of frames that could not be written.
    pub fn failed_frames(&self) -> u32 {
        self.frame_count - self.written.len() as u32
    }
}

/// Output path of frame `index`: `<basename>-<index>.png`.
///
/// # Example
///
/// ```
/// use std::path::Path;
///
/// assert_eq!(
///     framesplit::output_filename("out/scan", 2),
///     Path::new("out/scan-2.png"),
/// );
/// ```
pub fn output_filename<B: AsRef<Path>>(basename: B, index: u32) -> PathBuf {
    let mut name = OsString::from(basename.as_ref().as_os_str());
    name.push(format!("-{index}.png"));
    PathBuf::from(name)
}

/// Split `input` into one PNG per frame using the process-wide factory.
///
/// If the factory cannot be initialised the report is unsuccessful and its
/// diagnostic describes the initialisation failure.
pub fn split_images_shared<P, B>(input: P, output_basename: B, options: &SplitOptions) -> SplitReport
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    match ImagingFactory::shared() {
        Ok(factory) => split_images(factory, input, output_basename, options),
        Err(error) => SplitReport::failed(&error),
    }
}

/// Split `input` into one PNG per frame, written to
/// `<output_basename>-<index>.png`.
///
/// Frames are processed one at a time in ascending order. Each frame's
/// decoder state and pixel buffer are released before the next frame is
/// touched, whether or not the frame succeeded.
///
/// # Example
///
/// ```no_run
/// use framesplit::{ImagingFactory, SplitOptions};
///
/// let factory = ImagingFactory::builder().build();
/// let report = framesplit::split_images(&factory, "scan.tif", "scan", &SplitOptions::new());
/// if !report.diagnostics.is_empty() {
///     eprintln!("ERROR: {}", report.diagnostics);
/// }
/// ```
pub fn split_images<P, B>(
    factory: &ImagingFactory,
    input: P,
    output_basename: B,
    options: &SplitOptions,
) -> SplitReport
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    let input = input.as_ref();
    let output_basename = output_basename.as_ref();

    let mut session = match DecoderSession::open(factory, input) {
        Ok(session) => session,
        Err(error) => {
            log::debug!("Could not open {}: {:?}", input.display(), error.reason());
            return SplitReport::failed(&error);
        }
    };

    let frame_count = match session.frame_count() {
        Ok(count) => count,
        Err(error) => {
            log::debug!(
                "Could not count frames of {}: {:?}",
                input.display(),
                error.reason()
            );
            return SplitReport::failed(&error);
        }
    };
    log::debug!("{} has {frame_count} frame(s)", input.display());

    let mut report = SplitReport {
        success: true,
        frame_count,
        ..SplitReport::default()
    };
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        Some(u64::from(frame_count)),
        options.batch_size,
    );

    for index in 0..frame_count {
        match split_frame(&mut session, index, output_basename, options) {
            Ok(path) => {
                log::debug!("Wrote frame {index} to {}", path.display());
                report.written.push(path);
                tracker.advance(index, true);
            }
            Err(error) => {
                log::warn!(
                    "{error} ({})",
                    error.reason().unwrap_or("no further detail")
                );
                report.diagnostics.record(&error);
                tracker.advance(index, false);
            }
        }
    }

    tracker.finish();
    report
}

/// Decode, normalize and encode one frame.
fn split_frame(
    session: &mut DecoderSession,
    index: u32,
    output_basename: &Path,
    options: &SplitOptions,
) -> Result<PathBuf, SplitError> {
    let mut frame = session.frame(index)?;
    let (width, height) = frame.size();

    let stride = pixels::rgba_stride(width).ok_or(SplitError::OutOfMemory { index })?;
    let mut buffer =
        pixels::allocate_rgba(width, height).ok_or(SplitError::OutOfMemory { index })?;
    frame.copy_pixels(stride, &mut buffer)?;

    let output = output_filename(output_basename, index);
    encode::write_png(&output, width, height, &buffer, stride, options.overwrite)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names() {
        assert_eq!(output_filename("scan", 0), PathBuf::from("scan-0.png"));
        assert_eq!(output_filename("scan", 12), PathBuf::from("scan-12.png"));
        assert_eq!(
            output_filename(Path::new("pages").join("doc.v2"), 1),
            Path::new("pages").join("doc.v2-1.png")
        );
    }

    #[test]
    fn failed_report_shape() {
        let report = SplitReport::failed(&SplitError::FrameCount {
            reason: "corrupt IFD chain".to_string(),
        });
        assert!(!report.success);
        assert!(!report.is_clean());
        assert_eq!(report.frame_count, 0);
        assert_eq!(report.failed_frames(), 0);
        assert_eq!(
            report.diagnostics.to_string(),
            "Could not obtain frame count in image: corrupt IFD chain"
        );
    }
}

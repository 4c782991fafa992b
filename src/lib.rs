//! # framesplit
//!
//! Split multi-frame images into one PNG per frame.
//!
//! Scanners and multifunction printers commonly save a whole scan session as
//! a single multi-page TIFF. `framesplit` opens such a container (or an
//! animated GIF, APNG or WebP), normalizes every frame to 8-bit RGBA and
//! writes it as `<basename>-<index>.png`. A damaged page never costs the
//! other pages: each frame failure is recorded and the split carries on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framesplit::SplitOptions;
//!
//! let report = framesplit::split_images_shared("scan.tif", "scan", &SplitOptions::new());
//! if !report.success {
//!     eprintln!("ERROR: {}", report.diagnostics);
//! } else {
//!     println!("wrote {} of {} page(s)", report.written.len(), report.frame_count);
//! }
//! ```
//!
//! ## Reading frames directly
//!
//! ```no_run
//! use framesplit::{DecoderSession, ImagingFactory, SplitError};
//!
//! let factory = ImagingFactory::shared()?;
//! let mut session = DecoderSession::open(factory, "scan.tif")?;
//! let mut first = session.frame(0)?;
//! let (width, height) = first.size();
//! let rgba = first.to_rgba_buffer()?;
//! println!("{width}x{height}, {} bytes", rgba.len());
//! # Ok::<(), SplitError>(())
//! ```
//!
//! ## Supported containers
//!
//! | Format | Frames |
//! |--------|--------|
//! | TIFF / BigTIFF | one per page (IFD) |
//! | GIF | one per composited animation frame |
//! | PNG / APNG | one per animation frame, or one |
//! | WebP | one per animation frame, or one |
//! | anything else `image` decodes | one |
//!
//! Additional formats can be registered with
//! [`FactoryBuilder::with_format`].

pub mod configuration;
pub mod diagnostics;
pub mod encode;
pub mod error;
pub mod factory;
pub mod format;
pub mod pixels;
pub mod progress;
pub mod session;
pub mod split;

pub use configuration::{DecodeLimits, SplitOptions};
pub use diagnostics::Diagnostics;
pub use error::SplitError;
pub use factory::{FactoryBuilder, ImagingFactory};
pub use format::{ContainerFormat, ContainerReader, FrameSource, RgbaFrame};
pub use progress::{ProgressCallback, ProgressInfo};
pub use session::{DecoderSession, FrameView};
pub use split::{SplitReport, output_filename, split_images, split_images_shared};

//! The imaging factory.
//!
//! [`ImagingFactory`] owns the registered container formats and the decoding
//! limits, and opens files by probing their leading bytes. One process-wide
//! instance is created lazily by [`ImagingFactory::shared`]; embedders that
//! need custom formats or limits build their own with
//! [`ImagingFactory::builder`] and pass it explicitly.

use std::{
    ffi::OsStr,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::File,
    io::Read,
    path::Path,
    sync::OnceLock,
};

use crate::configuration::DecodeLimits;
use crate::error::SplitError;
use crate::format::{ContainerFormat, ContainerReader, PROBE_LENGTH, default_formats};

static SHARED: OnceLock<Result<ImagingFactory, String>> = OnceLock::new();

/// Registry of container formats plus decoding limits.
///
/// Read-only once built, and safe to share between threads.
///
/// # Example
///
/// ```no_run
/// use framesplit::{DecodeLimits, DecoderSession, ImagingFactory, SplitError};
///
/// let factory = ImagingFactory::builder()
///     .with_limits(DecodeLimits::new().with_max_dimension(20_000))
///     .build();
/// let mut session = DecoderSession::open(&factory, "scan.tif")?;
/// println!("{} page(s)", session.frame_count()?);
/// # Ok::<(), SplitError>(())
/// ```
pub struct ImagingFactory {
    formats: Vec<Box<dyn ContainerFormat>>,
    limits: DecodeLimits,
}

impl Debug for ImagingFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImagingFactory")
            .field("formats", &self.format_names())
            .field("limits", &self.limits)
            .finish()
    }
}

impl ImagingFactory {
    /// The process-wide factory, created on first use.
    ///
    /// Initialization runs exactly once per process, with limits read from
    /// the environment (see [`DecodeLimits::from_env`]). Concurrent first
    /// callers block until it finishes. Every caller observes the same
    /// outcome: the same factory, or the same failure, which is never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::DecoderInit`] if initialization failed.
    pub fn shared() -> Result<&'static ImagingFactory, SplitError> {
        get_or_initialise(&SHARED, || {
            let limits = DecodeLimits::from_env()?;
            Ok(ImagingFactory::builder().with_limits(limits).build())
        })
    }

    /// Start building a factory with the default formats registered.
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    /// The limits applied to every decoder this factory creates.
    pub fn limits(&self) -> DecodeLimits {
        self.limits
    }

    /// Names of the registered formats, in probing order.
    pub fn format_names(&self) -> Vec<&'static str> {
        self.formats.iter().map(|format| format.name()).collect()
    }

    /// Open `path` with the first registered format that recognises it.
    ///
    /// # Errors
    ///
    /// Returns [`SplitError::Decode`] if the file cannot be read, no format
    /// recognises it, or the chosen format fails to open it.
    pub fn open(&self, path: &Path) -> Result<Box<dyn ContainerReader>, SplitError> {
        let decode_error = |reason: String| SplitError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let header = read_header(path).map_err(|error| decode_error(error.to_string()))?;
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);

        let format = self
            .formats
            .iter()
            .find(|format| format.probe(&header, extension.as_deref()))
            .ok_or_else(|| decode_error("unrecognised container format".to_string()))?;

        log::debug!("Opening {} as {}", path.display(), format.name());

        format.open(path, self.limits).map_err(|error| match error {
            SplitError::Decode { .. } => error,
            other => decode_error(other.to_string()),
        })
    }
}

/// Builder for an [`ImagingFactory`].
#[must_use]
pub struct FactoryBuilder {
    formats: Vec<Box<dyn ContainerFormat>>,
    limits: DecodeLimits,
}

impl Default for FactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryBuilder {
    /// A builder with the built-in formats and default limits.
    pub fn new() -> Self {
        Self {
            formats: default_formats(),
            limits: DecodeLimits::default(),
        }
    }

    /// Drop the built-in formats; only formats added afterwards are used.
    pub fn without_default_formats(mut self) -> Self {
        self.formats.clear();
        self
    }

    /// Register a format ahead of every format registered so far.
    pub fn with_format(mut self, format: Box<dyn ContainerFormat>) -> Self {
        self.formats.insert(0, format);
        self
    }

    /// Set the decoding limits.
    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Finish building.
    pub fn build(self) -> ImagingFactory {
        ImagingFactory {
            formats: self.formats,
            limits: self.limits,
        }
    }
}

fn get_or_initialise<F>(
    cell: &'static OnceLock<Result<ImagingFactory, String>>,
    initialise: F,
) -> Result<&'static ImagingFactory, SplitError>
where
    F: FnOnce() -> Result<ImagingFactory, SplitError>,
{
    cell.get_or_init(|| {
        log::debug!("Initialising imaging factory");
        initialise().map_err(|error| {
            log::warn!("Imaging factory initialisation failed: {error}");
            error.to_string()
        })
    })
    .as_ref()
    .map_err(|reason| SplitError::DecoderInit {
        reason: reason.clone(),
    })
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(PROBE_LENGTH);
    File::open(path)?
        .take(PROBE_LENGTH as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

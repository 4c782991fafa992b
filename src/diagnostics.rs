//! Diagnostic accumulation.
//!
//! A split reports every frame-local failure through one [`Diagnostics`]
//! value instead of failing on the first one. Messages are kept as an
//! ordered list and only joined with [`DELIMITER`] when displayed.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::SplitError;

/// Separator placed between messages when a [`Diagnostics`] is displayed.
pub const DELIMITER: &str = ", ";

/// Ordered, human-readable error descriptions collected during a split.
///
/// # Example
///
/// ```
/// use framesplit::Diagnostics;
///
/// let mut diagnostics = Diagnostics::new();
/// assert!(diagnostics.is_empty());
///
/// diagnostics.push("Could not decode frame 1 (other images have been dumped)");
/// diagnostics.push("Could not write PNG to scan-3.png");
/// assert_eq!(
///     diagnostics.to_string(),
///     "Could not decode frame 1 (other images have been dumped), Could not write PNG to scan-3.png",
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Append the diagnostic text of `error`.
    pub fn record(&mut self, error: &SplitError) {
        self.push(error.to_string());
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// The recorded messages, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Iterate over the recorded messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// The joined report, or `None` if nothing was recorded.
    pub fn joined(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.messages.join(DELIMITER))
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (position, message) in self.messages.iter().enumerate() {
            if position > 0 {
                f.write_str(DELIMITER)?;
            }
            f.write_str(message)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

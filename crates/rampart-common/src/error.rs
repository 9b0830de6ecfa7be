//! Error types shared across Rampart crates.

use thiserror::Error;

/// Top-level error type for Rampart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RampartError {
    /// A dispatch met a variant it has no handling for.
    ///
    /// This is a programming or configuration bug and must surface
    /// immediately rather than be swallowed.
    #[error("unsupported {kind} variant: {value}")]
    UnsupportedVariant {
        /// What was being dispatched on (e.g. "audio cue")
        kind: &'static str,
        /// The offending value
        value: String,
    },
}

impl RampartError {
    /// Builds an [`RampartError::UnsupportedVariant`].
    #[must_use]
    pub fn unsupported(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnsupportedVariant {
            kind,
            value: value.into(),
        }
    }
}

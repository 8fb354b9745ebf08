//! Error taxonomy for the capture pipeline
//!
//! None of these are fatal to a running watcher: timestamp errors are
//! recovered with a clock fallback, host errors skip an element or a scan,
//! and export errors become a user-visible notice.

use thiserror::Error;

/// Failures reported by the host tree while it is being queried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// A single message element did not have the expected shape.
    #[error("unexpected element structure: {0}")]
    Structure(String),

    /// The tree as a whole could not be queried.
    #[error("host tree unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("expected 1 or 2 comma-separated parts, found {0}")]
    Arity(usize),

    #[error("invalid {field} component: {value:?}")]
    Component { field: &'static str, value: String },

    #[error("components out of range: {0}")]
    OutOfRange(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShortcutError {
    #[error("shortcut needs exactly two modifiers and one letter, got {0:?}")]
    Shape(String),

    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),

    #[error("duplicate modifier {0:?}")]
    DuplicateModifier(String),
}

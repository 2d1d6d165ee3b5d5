//! Error types for opcflat
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for flatten operations
pub type Result<T> = std::result::Result<T, FlattenError>;

/// Main error type for flatten operations
#[derive(Error, Debug)]
pub enum FlattenError {
    /// Bracketed input that is not valid JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token scan failed on bracketed input
    #[error("Stream error at offset {offset}: {reason}")]
    Stream { offset: usize, reason: String },

    /// Reading lacks an identity field (or is not an object at all)
    #[error("Malformed reading #{index}: missing or invalid '{field}'")]
    MalformedReading { index: usize, field: String },

    /// Value envelope lacks the nested value field
    #[error("Malformed value for tag '{tag_id}': missing nested 'Value'")]
    MalformedValue { tag_id: String },

    /// Candidate name is empty and no override is registered
    #[error("No display name and no override registered for tag '{tag_id}'")]
    MissingOverride { tag_id: String },

    /// Resolution produced an empty output key
    #[error("Could not resolve a non-empty output key for tag '{tag_id}'")]
    IdentityResolution { tag_id: String },

    /// Output serialization failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Output sink failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification used in diagnostic records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    MalformedReading,
    MalformedValue,
    MissingOverride,
    IdentityResolution,
    Serialize,
    Io,
}

impl ErrorKind {
    /// Stable label (used in logs and metric labels).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::MalformedReading => "malformed_reading",
            ErrorKind::MalformedValue => "malformed_value",
            ErrorKind::MissingOverride => "missing_override",
            ErrorKind::IdentityResolution => "identity_resolution",
            ErrorKind::Serialize => "serialize",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FlattenError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlattenError::Parse(_) | FlattenError::Stream { .. } => ErrorKind::Parse,
            FlattenError::MalformedReading { .. } => ErrorKind::MalformedReading,
            FlattenError::MalformedValue { .. } => ErrorKind::MalformedValue,
            FlattenError::MissingOverride { .. } => ErrorKind::MissingOverride,
            FlattenError::IdentityResolution { .. } => ErrorKind::IdentityResolution,
            FlattenError::Serialize(_) => ErrorKind::Serialize,
            FlattenError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Errors raised while ingesting template and mapping documents
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Document is not valid JSON
    #[error("Invalid JSON document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Document root must be an object
    #[error("Document root must be a JSON object")]
    NotAnObject,

    /// Mapping document has no `NodesMapping` array
    #[error("Mapping document has no 'NodesMapping' array")]
    MissingNodesMapping,

    /// A `NodesMapping` element has the wrong shape
    #[error("Invalid mapping entry #{index}: {reason}")]
    InvalidMappingEntry { index: usize, reason: String },

    /// Same tag id mapped twice
    #[error("Duplicate mapping for tag '{tag_id}'")]
    DuplicateMapping { tag_id: String },
}

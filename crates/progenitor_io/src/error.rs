//! Error types for progenitor_io crate.
//!
//! Covers every way loading or publishing an artifact can go wrong, from
//! plain file system failures to schema drift in a stored envelope.

use thiserror::Error;

/// Main error type for artifact store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rkyv-specific errors
    #[error("Rkyv error: {0}")]
    Rkyv(String),

    /// File system errors
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Artifact missing at the requested path
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Envelope written for another type or another schema version
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Checksum or framing does not match the payload
    #[error("Corrupt artifact: {0}")]
    Corrupt(String),

    /// Publishing refused because the writer was cancelled
    #[error("Publish cancelled: {0}")]
    Cancelled(String),

    /// Object graph nests deeper than the configured budget
    #[error("Serialization depth {depth} exceeds budget {budget}")]
    DepthExceeded { depth: usize, budget: usize },

    /// Generic error with context
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<StoreError>,
    },
}

/// Result type alias for progenitor_io operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new Rkyv error.
    #[must_use]
    pub fn rkyv<S: Into<String>>(msg: S) -> Self {
        Self::Rkyv(msg.into())
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound(resource.into())
    }

    /// Creates a new corruption error.
    #[must_use]
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Wraps an error with additional context.
    #[must_use]
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strips context wrappers and returns the innermost error.
    #[must_use]
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the artifact is absent rather than unreadable.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self.root() {
            Self::NotFound(_) => true,
            Self::FileSystem(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True when the artifact exists but its contents cannot be trusted.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self.root(),
            Self::Corrupt(_) | Self::SchemaMismatch { .. } | Self::Rkyv(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::serialization("test error");
        assert_eq!(err.to_string(), "Serialization error: test error");
    }

    #[test]
    fn test_error_context() {
        let err = StoreError::not_found("sim_data.bin").with_context("loading sim data");
        assert!(err.to_string().contains("loading sim data"));
        assert!(err.is_missing());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::FileSystem(_)));
        assert!(err.is_missing());
    }

    #[test]
    fn test_corrupt_classification() {
        let err = StoreError::corrupt("bad checksum").with_context("reading cache");
        assert!(err.is_corrupt());
        assert!(!err.is_missing());
    }
}

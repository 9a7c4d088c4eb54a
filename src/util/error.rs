//! Error types for RIB emission.

use thiserror::Error;

/// Main error type for RIB emission and scene registry operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter declaration rejected by `ParameterRecord::try_set`
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// `write_next_grain` called after every grain was emitted
    #[error("All {granularity} grain(s) already written for {object}")]
    GrainsExhausted { object: String, granularity: u32 },

    /// Attribute expected from the host collaborator was not present
    #[error("Missing attribute '{attribute}' on {object}")]
    MissingAttribute { object: String, attribute: String },

    /// Registry lookup produced an ambiguous or inconsistent result
    #[error("Topology warning for {path}: {reason}")]
    Topology { path: String, reason: String },

    /// RibGen or custom geometry plugin failure
    #[error("Plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    /// Begin/End requests out of order
    #[error("Unbalanced {block} block: {reason}")]
    UnbalancedBlock { block: &'static str, reason: String },

    /// Stream was already finished
    #[error("RIB stream is already finished")]
    StreamFinished,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a parameter declaration error.
    pub fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name: name.into(), reason: reason.into() }
    }

    /// Create a plugin failure error.
    pub fn plugin(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Plugin { plugin: plugin.into(), reason: reason.into() }
    }

    /// Create an unbalanced block error.
    pub fn unbalanced(block: &'static str, reason: impl Into<String>) -> Self {
        Self::UnbalancedBlock { block, reason: reason.into() }
    }

    /// Fatal errors abort the render job; partial RIB is unusable.
    ///
    /// Everything else is local to one parameter or object and the caller
    /// may skip it and continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::StreamFinished | Self::UnbalancedBlock { .. }
        )
    }
}

/// Result type alias for RIB operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::GrainsExhausted { object: "|nurbsPlaneShape1".into(), granularity: 2 };
        assert!(e.to_string().contains("nurbsPlaneShape1"));
        assert!(e.to_string().contains("2"));

        let e = Error::parameter("", "empty name");
        assert!(e.to_string().contains("empty name"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(!Error::plugin("blobgen.so", "crashed").is_fatal());
        assert!(!Error::parameter("foo", "zero array size").is_fatal());
        assert!(Error::unbalanced("attribute", "end without begin").is_fatal());
    }
}

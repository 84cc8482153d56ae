//! Central error handling for the path tracing stage.
//!
//! Provides a unified StageError enum with consistent categorization
//! for shader, template and readback failures.

/// Centralized error type for all stage operations
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("Shader error: {0}")]
    Shader(String),

    #[error("Missing extension template '{name}' at {path:?}")]
    MissingTemplate {
        name: String,
        path: std::path::PathBuf,
    },

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Convenience constructors for common error types
    pub fn shader<T: ToString>(msg: T) -> Self {
        StageError::Shader(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        StageError::Readback(msg.to_string())
    }
}

/// Result type alias for stage operations
pub type StageResult<T> = Result<T, StageError>;

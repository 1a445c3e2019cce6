//! Unified error handling for the vdev runtime.
//!
//! One error type covers every component so callers match on a single enum
//! and the orchestrator can aggregate failures from any startup step.

use thiserror::Error;

/// Main error type for vdev operations.
#[derive(Debug, Error)]
pub enum VdevError {
    /// A control-surface entry or device record could not be created.
    /// Fatal to module startup; the orchestrator unwinds on it.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    /// The controller's configured match name did not equal the registered
    /// device's identity. At the controller boundary this is an outcome, not
    /// an error; the orchestrator converts it because an unmatched device is
    /// fatal to startup.
    #[error("device '{device}' does not match controller name '{match_name}'")]
    NoMatch { device: String, match_name: String },

    /// Malformed input to a single operation (non-parseable boolean write,
    /// zero worker interval, empty device name). Never mutates state and is
    /// never fatal to the module.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Write attempted through a read-only entry.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown handle, or a peer tried to bind an export that was never
    /// published.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision on an export, surface entry, or device registration.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Background worker failure (spawn or join).
    #[error("worker error: {0}")]
    Worker(String),

    /// Configuration parsing or validation errors.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for VdevError {
    fn from(err: serde_yaml::Error) -> Self {
        VdevError::Config(format!("YAML parse error: {}", err))
    }
}

impl From<std::io::Error> for VdevError {
    fn from(err: std::io::Error) -> Self {
        VdevError::Config(format!("IO error: {}", err))
    }
}

// Helper constructors, so call sites stay terse.
impl VdevError {
    /// Create a resource-creation error with a custom message.
    pub fn resource<S: Into<String>>(msg: S) -> Self {
        VdevError::ResourceCreation(msg.into())
    }

    /// Create an invalid-input error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        VdevError::InvalidInput(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        VdevError::NotFound(msg.into())
    }

    /// Create an already-exists error.
    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        VdevError::AlreadyExists(msg.into())
    }

    /// Create a worker error.
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        VdevError::Worker(msg.into())
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        VdevError::Config(msg.into())
    }
}

/// Convenience type alias for Results using VdevError.
pub type VdevResult<T> = std::result::Result<T, VdevError>;

/// Short alias, equivalent to `VdevResult<T>`.
pub type Result<T> = VdevResult<T>;

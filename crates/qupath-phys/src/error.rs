//! Error types for the physical model crate.

use thiserror::Error;

/// Errors raised by the physical operation model.
///
/// All of these are contract violations by the caller; none are retried.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PhysError {
    /// A calibration value or fidelity is outside its valid range, or a
    /// calibration tuple has the wrong arity.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The representation cannot be combined with the hardware profile.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An argument outside the accepted domain (gradient side, empty input).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation or representation name that the model does not know.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Result type for physical model operations.
pub type PhysResult<T> = Result<T, PhysError>;

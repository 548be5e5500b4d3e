//! Error types for tarifa operations.
//!
//! Provides rich error context for library consumers. The two variants
//! with contractual meaning for callers are [`TarifaError::SchemaMismatch`]
//! (surfaced to inference callers, who must fall back to the rule-based
//! fare) and [`TarifaError::DataValidation`] (always recovered internally
//! by the synthetic-data fallback of the training driver).

use std::fmt;

/// Main error type for tarifa operations.
///
/// # Examples
///
/// ```
/// use tarifa::error::TarifaError;
///
/// let err = TarifaError::SchemaMismatch { expected: 5, actual: 3 };
/// assert!(err.to_string().contains("schema mismatch"));
/// ```
#[derive(Debug)]
pub enum TarifaError {
    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Transform-time input columns don't match the fit-time schema.
    SchemaMismatch {
        /// Number of raw input columns fixed at fit time
        expected: usize,
        /// Number of columns actually supplied
        actual: usize,
    },

    /// Historical ride log failed validation (missing, too small,
    /// missing columns, non-binary flags).
    DataValidation {
        /// Validation failure message
        message: String,
    },

    /// A fitted component was required but `fit` has not been called.
    NotFitted {
        /// Name of the unfitted component
        what: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Model serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for TarifaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TarifaError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            TarifaError::SchemaMismatch { expected, actual } => {
                write!(
                    f,
                    "schema mismatch: expected {expected} input columns, got {actual}"
                )
            }
            TarifaError::DataValidation { message } => {
                write!(f, "data validation failed: {message}")
            }
            TarifaError::NotFitted { what } => {
                write!(f, "{what} is not fitted. Call fit() first")
            }
            TarifaError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            TarifaError::Io(e) => write!(f, "I/O error: {e}"),
            TarifaError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            TarifaError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TarifaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TarifaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TarifaError {
    fn from(err: std::io::Error) -> Self {
        TarifaError::Io(err)
    }
}

impl From<&str> for TarifaError {
    fn from(msg: &str) -> Self {
        TarifaError::Other(msg.to_string())
    }
}

impl From<String> for TarifaError {
    fn from(msg: String) -> Self {
        TarifaError::Other(msg)
    }
}

impl TarifaError {
    /// Create a data validation error with descriptive context.
    #[must_use]
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create a not-fitted error naming the offending component.
    #[must_use]
    pub fn not_fitted(what: &str) -> Self {
        Self::NotFitted {
            what: what.to_string(),
        }
    }

    /// True if this error is recoverable by the synthetic-data fallback.
    #[must_use]
    pub fn is_data_validation(&self) -> bool {
        matches!(self, TarifaError::DataValidation { .. })
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, TarifaError>;

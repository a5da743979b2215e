use std::fmt;

/// Result type for nnmeter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the nnmeter library
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Tensor shape does not fit the layer
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Numerical computation errors (zero denominators and the like)
    NumericalError(String),

    /// Serialization/deserialization errors
    SerializationError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            Error::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            Error::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::DimensionMismatch {
            expected: "compatible shape".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl Error {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        Error::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

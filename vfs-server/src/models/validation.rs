//! Validation error types

use std::fmt;

/// Request validation error, raised before any database call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Body, query or path could not be parsed into the expected shape
    Malformed { source: &'static str, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::Malformed { source, reason } => {
                write!(f, "invalid request {}: {}", source, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::InvalidFormat {
            field: "id",
            reason: "invalid UUID format",
        };
        assert_eq!(err.to_string(), "id: invalid UUID format");

        let err = ValidationError::Malformed {
            source: "body",
            reason: "missing field `name`".into(),
        };
        assert_eq!(err.to_string(), "invalid request body: missing field `name`");
    }
}

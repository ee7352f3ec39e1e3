//! Database error type and failure classification
//!
//! External functions should report failures with a SQLSTATE code; the
//! message-text heuristic only applies when no known code is present.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static CONFLICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)already exists|name conflict").expect("invalid conflict pattern")
});

static NOT_FOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)not found|access denied").expect("invalid not-found pattern")
});

static PERMISSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)permission denied").expect("invalid permission pattern"));

/// Coarse failure category reported by the external functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PermissionDenied,
    Internal,
}

impl ErrorKind {
    /// Classify a database failure.
    ///
    /// Structured SQLSTATE codes win; otherwise the message is matched
    /// case-insensitively against the phrases the external functions use.
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        if let Some(kind) = code.and_then(Self::from_sqlstate) {
            return kind;
        }
        Self::from_message(message)
    }

    /// Map well-known SQLSTATE codes.
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            // unique_violation
            "23505" => Some(Self::Conflict),
            // insufficient_privilege
            "42501" => Some(Self::PermissionDenied),
            // no_data / no_data_found
            "02000" | "P0002" => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Substring fallback for functions that only raise prose.
    pub fn from_message(message: &str) -> Self {
        if CONFLICT_RE.is_match(message) {
            Self::Conflict
        } else if NOT_FOUND_RE.is_match(message) {
            Self::NotFound
        } else if PERMISSION_RE.is_match(message) {
            Self::PermissionDenied
        } else {
            Self::Internal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PermissionDenied => "permission_denied",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A statement failed inside the database.
    #[error("{message}")]
    Query { kind: ErrorKind, message: String },

    /// No connection could be leased within the retry bound.
    #[error("connection pool exhausted after {attempts} attempts: {reason}")]
    PoolExhausted { attempts: u32, reason: String },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("failed to open database connection: {0}")]
    Connect(String),

    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// The function returned something other than the documented shape.
    #[error("unexpected result from {function}: {reason}")]
    Decode {
        function: &'static str,
        reason: String,
    },
}

impl DbError {
    /// Build a query error from a database code and message.
    pub fn query(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Query {
            kind: ErrorKind::classify(code, &message),
            message,
        }
    }

    pub fn decode(function: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            function,
            reason: reason.into(),
        }
    }

    /// Failure category as seen by API clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Query { kind, .. } => *kind,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => Self::query(db.code().as_deref(), db.message()),
            sqlx::Error::PoolClosed => Self::PoolClosed,
            other => Self::Query {
                kind: ErrorKind::Internal,
                message: other.to_string(),
            },
        }
    }
}

//! Error types for oiot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for oiot operations.
pub type Result<T> = std::result::Result<T, OiotError>;

/// Classification of a failed connector call.
///
/// This is the small `Copy` tag that pollers record as their last error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport failure, timeout, non-success status or malformed body.
    CannotConnect,
    /// A well-formed response that rejected the credentials.
    InvalidAuth,
    /// A well-formed successful response that did not match the schema.
    ParseError,
}

impl ErrorKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CannotConnect => "cannot_connect",
            Self::InvalidAuth => "invalid_auth",
            Self::ParseError => "parse_error",
        }
    }

    /// Returns true if a poller may retry after this error on its next tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidAuth)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the connector and surfaced by the poller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OiotError {
    /// The service could not be reached or answered with garbage.
    #[error("Cannot connect: {0}")]
    CannotConnect(String),

    /// The service rejected the credentials.
    #[error("Invalid authentication: {0}")]
    InvalidAuth(String),

    /// The service answered successfully but the payload was unusable.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OiotError {
    /// Returns the taxonomy tag for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CannotConnect(_) => ErrorKind::CannotConnect,
            Self::InvalidAuth(_) => ErrorKind::InvalidAuth,
            Self::Parse(_) => ErrorKind::ParseError,
        }
    }

    /// Returns the human-readable reason without the kind prefix.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::CannotConnect(reason) | Self::InvalidAuth(reason) | Self::Parse(reason) => {
                reason
            }
        }
    }
}

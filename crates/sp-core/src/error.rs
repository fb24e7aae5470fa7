//! Host-facing error type.
//!
//! Error messages are informative for operators but never expose protocol
//! details to end users. The specific SAML failure is logged where it occurs;
//! callers only ever see [`Error::Authentication`].

use thiserror::Error;

/// Result type alias using the host error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type surfaced to the host application.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication error.
    ///
    /// Uses a generic message so the failure reason is not disclosed.
    #[error("authentication failed")]
    Authentication,

    /// Session store error.
    #[error("session error: {0}")]
    Session(String),

    /// Validation error for host input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error.
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Session(_) | Self::Internal)
    }

    /// Returns whether this error represents a client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Authentication | Self::Validation(_))
    }
}

//! SAML error types.
//!
//! Every rejection made by the protocol engine has its own variant so the
//! cause can be logged precisely. Callers outside the crate convert to
//! [`sp_core::Error`], which only ever says "authentication failed".

use thiserror::Error;

use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Broad classification of a [`SamlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Local configuration is unusable.
    Configuration,
    /// Certificates or IdP trust could not be established.
    Trust,
    /// The peer sent a message that violates the protocol.
    Protocol,
    /// A signature was missing, malformed or did not verify.
    Signature,
    /// A local store or other internal component failed.
    Internal,
}

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Response is not a well-formed, single-assertion `samlp:Response`.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The IdP answered with a non-success status.
    #[error("responder status {status}")]
    ResponderStatus {
        /// Top-level status code URI.
        status: String,
        /// Second-level status code URI, if any.
        sub_status: Option<String>,
        /// Status message, if any.
        message: Option<String>,
    },

    /// Issuer is not the trusted IdP.
    #[error("invalid issuer: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Trusted IdP entity ID.
        expected: String,
        /// Issuer found in the message.
        actual: String,
    },

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Exclusive canonicalization could not be applied.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// No trusted certificate matches.
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// Every matching certificate is outside its validity window.
    #[error("certificate expired: {0}")]
    CertificateExpired(String),

    /// `InResponseTo` does not match an outstanding request.
    #[error("correlation mismatch: {0}")]
    CorrelationMismatch(String),

    /// Assertion or confirmation window has passed.
    #[error("assertion expired")]
    ExpiredAssertion,

    /// Assertion or confirmation window has not started.
    #[error("assertion not yet valid")]
    NotYetValid,

    /// Audience restriction does not include this SP.
    #[error("audience restriction does not include {expected}")]
    AudienceMismatch {
        /// SP entity ID.
        expected: String,
    },

    /// Assertion ID was already accepted.
    #[error("assertion {0} was already used")]
    ReplayDetected(String),

    /// Inbound request or binding parameters are invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Binding is not supported.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// IdP metadata could not be used.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Relay state token is invalid, tampered or expired.
    #[error("invalid relay state: {0}")]
    RelayState(String),

    /// Logout state machine rejected an event.
    #[error("invalid logout transition from {from} on {event}")]
    InvalidTransition {
        /// State the session was in.
        from: &'static str,
        /// Event that was applied.
        event: &'static str,
    },

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Local configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The host refused the authenticated principal.
    #[error("rejected by host: {0}")]
    Rejected(String),

    /// Session binder error.
    #[error("session error: {0}")]
    Session(String),

    /// Replay cache or correlation store error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::CertificateNotFound(_)
            | Self::CertificateExpired(_)
            | Self::IssuerMismatch { .. }
            | Self::InvalidMetadata(_) => ErrorCategory::Trust,
            Self::SignatureInvalid(_) | Self::Canonicalization(_) => ErrorCategory::Signature,
            Self::Crypto(_) | Self::Session(_) | Self::Cache(_) | Self::Internal(_) => {
                ErrorCategory::Internal
            }
            _ => ErrorCategory::Protocol,
        }
    }

    /// Returns a stable short code for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedResponse(_) => "malformed_response",
            Self::ResponderStatus { .. } => "responder_status",
            Self::IssuerMismatch { .. } => "issuer_mismatch",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::Canonicalization(_) => "canonicalization",
            Self::CertificateNotFound(_) => "certificate_not_found",
            Self::CertificateExpired(_) => "certificate_expired",
            Self::CorrelationMismatch(_) => "correlation_mismatch",
            Self::ExpiredAssertion => "expired_assertion",
            Self::NotYetValid => "not_yet_valid",
            Self::AudienceMismatch { .. } => "audience_mismatch",
            Self::ReplayDetected(_) => "replay_detected",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedBinding(_) => "unsupported_binding",
            Self::InvalidMetadata(_) => "invalid_metadata",
            Self::RelayState(_) => "relay_state",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Base64Decode(_) => "base64_decode",
            Self::Deflate(_) => "deflate",
            Self::Xml(_) => "xml",
            Self::Configuration(_) => "configuration",
            Self::Crypto(_) => "crypto",
            Self::Rejected(_) => "rejected",
            Self::Session(_) => "session",
            Self::Cache(_) => "cache",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the SAML status code to report for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Internal => status_codes::RESPONDER,
            _ => status_codes::REQUESTER,
        }
    }

    /// Returns a sub-status code if applicable.
    #[must_use]
    pub const fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedBinding(_) => Some(sub_status_codes::UNSUPPORTED_BINDING),
            Self::IssuerMismatch { .. } | Self::CertificateNotFound(_) | Self::Rejected(_) => {
                Some(sub_status_codes::REQUEST_DENIED)
            }
            Self::Session(_) => Some(sub_status_codes::PARTIAL_LOGOUT),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::UnsupportedBinding(_)
            | Self::RelayState(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::Xml(_) => 400,
            Self::InvalidTransition { .. } => 409,
            _ => match self.category() {
                ErrorCategory::Configuration | ErrorCategory::Internal => 500,
                _ => 401,
            },
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<roxmltree::Error> for SamlError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for SamlError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<sp_cache::CacheError> for SamlError {
    fn from(err: sp_cache::CacheError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<sp_crypto::SignatureError> for SamlError {
    fn from(err: sp_crypto::SignatureError) -> Self {
        match err {
            sp_crypto::SignatureError::Verification => {
                Self::SignatureInvalid("signature value does not verify".to_string())
            }
            sp_crypto::SignatureError::UnsupportedAlgorithm(msg) => Self::SignatureInvalid(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<sp_core::Error> for SamlError {
    fn from(err: sp_core::Error) -> Self {
        match err {
            sp_core::Error::Config(msg) => Self::Configuration(msg),
            sp_core::Error::Session(msg) => Self::Session(msg),
            sp_core::Error::Authentication => Self::Rejected("authentication refused".to_string()),
            sp_core::Error::Validation(msg) => Self::Rejected(msg),
            sp_core::Error::Internal => Self::Internal("host failure".to_string()),
        }
    }
}

impl From<SamlError> for sp_core::Error {
    fn from(err: SamlError) -> Self {
        match err.category() {
            ErrorCategory::Configuration => Self::Config(err.to_string()),
            ErrorCategory::Internal => match err {
                SamlError::Session(msg) => Self::Session(msg),
                _ => Self::Internal,
            },
            _ => Self::Authentication,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let err = SamlError::MalformedResponse("no assertion".to_string());
        assert_eq!(err.status_code(), status_codes::REQUESTER);
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.category(), ErrorCategory::Protocol);

        let err = SamlError::InvalidRequest("missing SAMLRequest".to_string());
        assert_eq!(err.http_status(), 400);

        let err = SamlError::Internal("boom".to_string());
        assert_eq!(err.status_code(), status_codes::RESPONDER);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn categories() {
        assert_eq!(
            SamlError::CertificateExpired("idp".to_string()).category(),
            ErrorCategory::Trust
        );
        assert_eq!(
            SamlError::Canonicalization("prefix".to_string()).category(),
            ErrorCategory::Signature
        );
        assert_eq!(
            SamlError::Configuration("key".to_string()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(SamlError::ExpiredAssertion.kind(), "expired_assertion");
    }

    #[test]
    fn host_error_hides_protocol_detail() {
        let host: sp_core::Error = SamlError::ReplayDetected("_a1".to_string()).into();
        assert_eq!(host.to_string(), "authentication failed");

        let host: sp_core::Error = SamlError::Configuration("no key".to_string()).into();
        assert!(matches!(host, sp_core::Error::Config(_)));
    }

    #[test]
    fn verification_failure_maps_to_signature_invalid() {
        let err: SamlError = sp_crypto::SignatureError::Verification.into();
        assert!(matches!(err, SamlError::SignatureInvalid(_)));
    }
}

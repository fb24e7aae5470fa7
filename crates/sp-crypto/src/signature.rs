//! Digital signature errors and the signing seam.

use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;

/// Error type for signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification failed.
    #[error("signature verification failed")]
    Verification,

    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Algorithm not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

/// Trait for signature providers.
///
/// Protocol code signs through this trait so tests and hosts can supply
/// their own key material.
pub trait SignatureProvider: Send + Sync {
    /// Signs the given data.
    ///
    /// ## Errors
    ///
    /// Returns an error if signing fails.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError>;

    /// Returns the signature algorithm.
    fn algorithm(&self) -> SignatureAlgorithm;
}

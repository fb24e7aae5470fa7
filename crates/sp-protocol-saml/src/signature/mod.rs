//! XML Signature support for SAML.
//!
//! Enveloped XML-DSig for POST messages and detached query-string
//! signatures for the Redirect binding.
//!
//! # Algorithms
//!
//! Accepted for signatures: RSA and ECDSA with SHA-256, SHA-384 or SHA-512.
//! Accepted for digests: SHA-256, SHA-384 and SHA-512. Canonicalization is
//! always Exclusive XML Canonicalization 1.0. SHA-1 is refused everywhere.

mod c14n;
mod signer;
mod verifier;

pub use c14n::*;
pub use signer::*;
pub use verifier::*;

use base64::Engine;
use sp_crypto::{HashAlgorithm, SignatureAlgorithm};

use crate::error::{SamlError, SamlResult};
use crate::types::{digest_algorithms, signature_algorithms};

/// Namespace of the `InclusiveNamespaces` element.
pub const EXC_C14N_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Returns the XML-DSig URI of a signature algorithm.
#[must_use]
pub const fn algorithm_uri(algorithm: SignatureAlgorithm) -> &'static str {
    match algorithm {
        SignatureAlgorithm::Rs256 => signature_algorithms::RSA_SHA256,
        SignatureAlgorithm::Rs384 => signature_algorithms::RSA_SHA384,
        SignatureAlgorithm::Rs512 => signature_algorithms::RSA_SHA512,
        SignatureAlgorithm::Es256 => signature_algorithms::ECDSA_SHA256,
        SignatureAlgorithm::Es384 => signature_algorithms::ECDSA_SHA384,
        SignatureAlgorithm::Es512 => signature_algorithms::ECDSA_SHA512,
    }
}

/// Parses a signature algorithm URI.
///
/// # Errors
///
/// Returns [`SamlError::SignatureInvalid`] for SHA-1 and unknown URIs.
pub fn algorithm_from_uri(uri: &str) -> SamlResult<SignatureAlgorithm> {
    match uri {
        signature_algorithms::RSA_SHA256 => Ok(SignatureAlgorithm::Rs256),
        signature_algorithms::RSA_SHA384 => Ok(SignatureAlgorithm::Rs384),
        signature_algorithms::RSA_SHA512 => Ok(SignatureAlgorithm::Rs512),
        signature_algorithms::ECDSA_SHA256 => Ok(SignatureAlgorithm::Es256),
        signature_algorithms::ECDSA_SHA384 => Ok(SignatureAlgorithm::Es384),
        signature_algorithms::ECDSA_SHA512 => Ok(SignatureAlgorithm::Es512),
        signature_algorithms::RSA_SHA1 => Err(SamlError::SignatureInvalid(
            "SHA-1 signatures are not accepted".to_string(),
        )),
        other => Err(SamlError::SignatureInvalid(format!(
            "unsupported signature algorithm: {other}"
        ))),
    }
}

/// Returns the XML-DSig URI of a digest algorithm.
#[must_use]
pub const fn digest_uri(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha1 => digest_algorithms::SHA1,
        HashAlgorithm::Sha256 => digest_algorithms::SHA256,
        HashAlgorithm::Sha384 => digest_algorithms::SHA384,
        HashAlgorithm::Sha512 => digest_algorithms::SHA512,
    }
}

/// Parses a digest algorithm URI.
///
/// # Errors
///
/// Returns [`SamlError::SignatureInvalid`] for SHA-1 and unknown URIs.
pub fn digest_from_uri(uri: &str) -> SamlResult<HashAlgorithm> {
    match uri {
        digest_algorithms::SHA256 => Ok(HashAlgorithm::Sha256),
        digest_algorithms::SHA384 => Ok(HashAlgorithm::Sha384),
        digest_algorithms::SHA512 => Ok(HashAlgorithm::Sha512),
        digest_algorithms::SHA1 => Err(SamlError::SignatureInvalid(
            "SHA-1 digests are not accepted".to_string(),
        )),
        other => Err(SamlError::SignatureInvalid(format!(
            "unsupported digest algorithm: {other}"
        ))),
    }
}

/// Decodes a base64 element value, ignoring line breaks and indentation.
pub(crate) fn decode_base64_text(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SamlError::SignatureInvalid(format!("invalid base64 value: {e}")))
}

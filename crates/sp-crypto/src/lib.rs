//! # sp-crypto
//!
//! Cryptographic operations for the SAML service provider using aws-lc-rs.
//!
//! ## Algorithm Policy
//!
//! - Signatures: RSA PKCS#1 v1.5 and ECDSA (P-256, P-384, P-521) with
//!   SHA-256, SHA-384 or SHA-512
//! - SHA-1 is only available as a certificate thumbprint function and never
//!   as a signature or digest algorithm
//!
//! ## Modules
//!
//! - [`algorithm`] - Signature and hash algorithm identifiers
//! - [`hash`] - Digests and HMAC
//! - [`keys`] - Signing keys and public key verification
//! - [`random`] - Secure random identifiers
//! - [`signature`] - Signature errors and the signing trait

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod hash;
pub mod keys;
pub mod random;
pub mod signature;

pub use algorithm::{AlgorithmError, EllipticCurve, HashAlgorithm, SignatureAlgorithm};
pub use hash::{
    digest, hmac_sha256, hmac_sha256_verify, sha1_thumbprint, sha256, sha384, sha512, to_upper_hex,
};
pub use keys::{EcdsaSigningKey, KeyKind, PublicKey, RsaSigningKey, SigningKey};
pub use random::{generate_message_id, generate_session_id, random_base64url, random_bytes};
pub use signature::{SignatureError, SignatureProvider};

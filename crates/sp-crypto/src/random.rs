//! Cryptographically secure random generation.
//!
//! This module provides secure random generation for:
//! - SAML message identifiers
//! - Local session handles
//! - HMAC secrets

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

use crate::hash::to_upper_hex;

/// Number of random bytes in a SAML message identifier.
pub const MESSAGE_ID_BYTES: usize = 20;

/// Generates a cryptographically secure random byte array.
///
/// # Arguments
///
/// * `len` - Number of random bytes to generate
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a cryptographically secure random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a SAML message identifier.
///
/// The identifier is an `xs:ID`: an underscore followed by 160 random bits
/// in hex, so it never starts with a digit.
#[must_use]
pub fn generate_message_id() -> String {
    let hex = to_upper_hex(&random_bytes(MESSAGE_ID_BYTES)).to_ascii_lowercase();
    format!("_{hex}")
}

/// Generates a secure random session handle.
///
/// The handle has approximately 190 bits of entropy (log2(62^32)).
#[must_use]
pub fn generate_session_id() -> String {
    random_alphanumeric(32)
}

/// Generates a URL-safe base64-encoded random string.
///
/// # Arguments
///
/// * `byte_len` - Number of random bytes (output will be ~4/3 this length)
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    let bytes = random_bytes(byte_len);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

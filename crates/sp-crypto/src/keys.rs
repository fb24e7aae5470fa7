//! Key management and signing operations.
//!
//! This module provides RSA and ECDSA signing keys and public key
//! verification using aws-lc-rs.
//!
//! ## Supported Algorithms
//!
//! ### RSA
//! - RS256, RS384, RS512 (RSA PKCS#1 v1.5, modulus 2048-8192 bits)
//!
//! ### ECDSA
//! - ES256 (P-256), ES384 (P-384), ES512 (P-521)
//!
//! ECDSA signatures use the fixed-length `r || s` encoding required by
//! XML Signature, not ASN.1 DER.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        self, EcdsaKeyPair, EcdsaSigningAlgorithm, KeyPair, RsaKeyPair, UnparsedPublicKey,
        VerificationAlgorithm, ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
        ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};

use crate::algorithm::{EllipticCurve, SignatureAlgorithm};
use crate::signature::{SignatureError, SignatureProvider};

/// RSA key pair for signing.
pub struct RsaSigningKey {
    key_pair: RsaKeyPair,
    algorithm: SignatureAlgorithm,
}

impl RsaSigningKey {
    /// Creates a new RSA signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Arguments
    ///
    /// * `pkcs8_der` - The PKCS#8 DER-encoded private key
    /// * `algorithm` - The signature algorithm (must be RSA-based)
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or algorithm is not RSA-based.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| SignatureError::InvalidKey(format!("Invalid RSA PKCS#8 key: {e}")))?;
        Self::new(key_pair, algorithm)
    }

    /// Creates a new RSA signing key from a DER-encoded `RSAPrivateKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or algorithm is not RSA-based.
    pub fn from_der(der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let key_pair = RsaKeyPair::from_der(der)
            .map_err(|e| SignatureError::InvalidKey(format!("Invalid RSA DER key: {e}")))?;
        Self::new(key_pair, algorithm)
    }

    fn new(key_pair: RsaKeyPair, algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        if !algorithm.is_rsa() {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} is not an RSA algorithm"
            )));
        }

        let key_bits = key_pair.public_modulus_len() * 8;
        #[allow(clippy::cast_possible_truncation)]
        SignatureAlgorithm::validate_rsa_key_size(key_bits as u32)
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key_pair,
            algorithm,
        })
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let rng = SystemRandom::new();
        let mut signature = vec![0u8; self.key_pair.public_modulus_len()];

        let padding: &'static dyn signature::RsaEncoding = match self.algorithm {
            SignatureAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
            SignatureAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
            SignatureAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
            _ => {
                return Err(SignatureError::UnsupportedAlgorithm(format!(
                    "{:?} not supported for RSA signing",
                    self.algorithm
                )));
            }
        };

        self.key_pair
            .sign(padding, &rng, data, &mut signature)
            .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;

        Ok(signature)
    }

    /// Returns the public half of this key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey::rsa(self.key_pair.public_key().as_ref().to_vec())
    }
}

/// ECDSA key pair for signing.
pub struct EcdsaSigningKey {
    key_pair: EcdsaKeyPair,
    algorithm: SignatureAlgorithm,
}

impl EcdsaSigningKey {
    /// Creates a new ECDSA signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Arguments
    ///
    /// * `pkcs8_der` - The PKCS#8 DER-encoded private key
    /// * `algorithm` - The signature algorithm (must be ECDSA-based)
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the curve does not match the
    /// algorithm, or the algorithm is not ECDSA-based.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let signing_alg = ecdsa_signing_algorithm(algorithm)?;

        let key_pair = EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8_der)
            .map_err(|e| SignatureError::InvalidKey(format!("Invalid ECDSA PKCS#8 key: {e}")))?;

        Ok(Self {
            key_pair,
            algorithm,
        })
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let rng = SystemRandom::new();

        let signature = self
            .key_pair
            .sign(&rng, data)
            .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}")))?;

        Ok(signature.as_ref().to_vec())
    }

    /// Returns the public half of this key.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm has no curve.
    pub fn public_key(&self) -> Result<PublicKey, SignatureError> {
        let curve = self
            .algorithm
            .curve()
            .ok_or_else(|| SignatureError::UnsupportedAlgorithm(format!("{:?}", self.algorithm)))?;
        Ok(PublicKey::ec(curve, self.key_pair.public_key().as_ref().to_vec()))
    }
}

fn ecdsa_signing_algorithm(
    algorithm: SignatureAlgorithm,
) -> Result<&'static EcdsaSigningAlgorithm, SignatureError> {
    match algorithm {
        SignatureAlgorithm::Es256 => Ok(&ECDSA_P256_SHA256_FIXED_SIGNING),
        SignatureAlgorithm::Es384 => Ok(&ECDSA_P384_SHA384_FIXED_SIGNING),
        SignatureAlgorithm::Es512 => Ok(&ECDSA_P521_SHA512_FIXED_SIGNING),
        _ => Err(SignatureError::UnsupportedAlgorithm(format!(
            "{algorithm:?} is not an ECDSA algorithm"
        ))),
    }
}

/// A private key of either family.
pub enum SigningKey {
    /// RSA key.
    Rsa(RsaSigningKey),
    /// ECDSA key.
    Ecdsa(EcdsaSigningKey),
}

impl SigningKey {
    /// Loads a PKCS#8 private key, detecting the key family and curve.
    ///
    /// RSA keys sign with RS256; ECDSA keys use the hash matching their curve.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a supported RSA or ECDSA key.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self, SignatureError> {
        if let Ok(key) = RsaSigningKey::from_pkcs8(pkcs8_der, SignatureAlgorithm::Rs256) {
            return Ok(Self::Rsa(key));
        }

        for algorithm in [
            SignatureAlgorithm::Es256,
            SignatureAlgorithm::Es384,
            SignatureAlgorithm::Es512,
        ] {
            if let Ok(key) = EcdsaSigningKey::from_pkcs8(pkcs8_der, algorithm) {
                return Ok(Self::Ecdsa(key));
            }
        }

        Err(SignatureError::InvalidKey(
            "not a supported RSA or ECDSA PKCS#8 key".to_string(),
        ))
    }

    /// Loads a DER-encoded `RSAPrivateKey` (PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_rsa_der(der: &[u8]) -> Result<Self, SignatureError> {
        RsaSigningKey::from_der(der, SignatureAlgorithm::Rs256).map(Self::Rsa)
    }

    /// Returns the public half of this key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be derived.
    pub fn public_key(&self) -> Result<PublicKey, SignatureError> {
        match self {
            Self::Rsa(key) => Ok(key.public_key()),
            Self::Ecdsa(key) => key.public_key(),
        }
    }
}

impl SignatureProvider for SigningKey {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        match self {
            Self::Rsa(key) => key.sign(data),
            Self::Ecdsa(key) => key.sign(data),
        }
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Rsa(key) => key.algorithm(),
            Self::Ecdsa(key) => key.algorithm(),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Key family of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA public key, bytes are a DER `RSAPublicKey`.
    Rsa,
    /// EC public key, bytes are an uncompressed point.
    Ec(EllipticCurve),
}

/// A public key extracted from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    kind: KeyKind,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Creates an RSA public key from a DER `RSAPublicKey`.
    #[must_use]
    pub const fn rsa(pkcs1_der: Vec<u8>) -> Self {
        Self {
            kind: KeyKind::Rsa,
            bytes: pkcs1_der,
        }
    }

    /// Creates an EC public key from an uncompressed point.
    #[must_use]
    pub const fn ec(curve: EllipticCurve, point: Vec<u8>) -> Self {
        Self {
            kind: KeyKind::Ec(curve),
            bytes: point,
        }
    }

    /// Returns the key family.
    #[must_use]
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Verifies `signature` over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::UnsupportedAlgorithm`] if the algorithm does
    /// not fit this key, or [`SignatureError::Verification`] if the signature
    /// is invalid.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        let verification: &'static dyn VerificationAlgorithm = match (self.kind, algorithm) {
            (KeyKind::Rsa, SignatureAlgorithm::Rs256) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (KeyKind::Rsa, SignatureAlgorithm::Rs384) => &signature::RSA_PKCS1_2048_8192_SHA384,
            (KeyKind::Rsa, SignatureAlgorithm::Rs512) => &signature::RSA_PKCS1_2048_8192_SHA512,
            (KeyKind::Ec(EllipticCurve::P256), SignatureAlgorithm::Es256) => {
                &signature::ECDSA_P256_SHA256_FIXED
            }
            (KeyKind::Ec(EllipticCurve::P384), SignatureAlgorithm::Es384) => {
                &signature::ECDSA_P384_SHA384_FIXED
            }
            (KeyKind::Ec(EllipticCurve::P521), SignatureAlgorithm::Es512) => {
                &signature::ECDSA_P521_SHA512_FIXED
            }
            (kind, alg) => {
                return Err(SignatureError::UnsupportedAlgorithm(format!(
                    "{alg:?} cannot be used with a {kind:?} key"
                )));
            }
        };

        UnparsedPublicKey::new(verification, &self.bytes)
            .verify(message, signature)
            .map_err(|_| SignatureError::Verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lc_rs::rand::SystemRandom;

    fn p256_pkcs8() -> Vec<u8> {
        EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &SystemRandom::new())
            .unwrap()
            .as_ref()
            .to_vec()
    }

    #[test]
    fn ecdsa_algorithm_validation() {
        let result = EcdsaSigningKey::from_pkcs8(&[], SignatureAlgorithm::Rs256);
        assert!(matches!(result, Err(SignatureError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn garbage_key_is_rejected() {
        assert!(SigningKey::from_pkcs8(b"not a key").is_err());
    }

    #[test]
    fn detects_p256_key() {
        let key = SigningKey::from_pkcs8(&p256_pkcs8()).unwrap();
        assert_eq!(key.algorithm(), SignatureAlgorithm::Es256);
        assert_eq!(
            key.public_key().unwrap().kind(),
            KeyKind::Ec(EllipticCurve::P256)
        );
    }

    #[test]
    fn sign_then_verify() {
        let key = SigningKey::from_pkcs8(&p256_pkcs8()).unwrap();
        let public = key.public_key().unwrap();

        let sig = key.sign(b"signed info").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(public.verify(SignatureAlgorithm::Es256, b"signed info", &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = SigningKey::from_pkcs8(&p256_pkcs8()).unwrap();
        let public = key.public_key().unwrap();

        let sig = key.sign(b"signed info").unwrap();
        let result = public.verify(SignatureAlgorithm::Es256, b"signed inf0", &sig);
        assert!(matches!(result, Err(SignatureError::Verification)));
    }

    #[test]
    fn algorithm_must_fit_key() {
        let key = SigningKey::from_pkcs8(&p256_pkcs8()).unwrap();
        let public = key.public_key().unwrap();
        let sig = key.sign(b"data").unwrap();

        let result = public.verify(SignatureAlgorithm::Rs256, b"data", &sig);
        assert!(matches!(result, Err(SignatureError::UnsupportedAlgorithm(_))));

        let result = public.verify(SignatureAlgorithm::Es384, b"data", &sig);
        assert!(matches!(result, Err(SignatureError::UnsupportedAlgorithm(_))));
    }
}

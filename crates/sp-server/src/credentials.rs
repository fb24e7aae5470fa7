//! SP key material.
//!
//! Certificates and the private key are read from PEM files. The key may be
//! PKCS#8 (`PRIVATE KEY`) or PKCS#1 RSA (`RSA PRIVATE KEY`), and may share a
//! file with the certificates.

use std::path::Path;

use anyhow::Context;
use sp_core::config::CertificateIdentifierType;
use sp_crypto::SigningKey;
use sp_protocol_saml::trust::{select_certificate, Certificate, SigningCredential};

/// Loads the SP signing credential.
///
/// With `signing_certificate_id` the certificate is selected by
/// `identifier_type`, otherwise the first certificate in the file is used.
///
/// # Errors
///
/// Returns an error if a file cannot be read, holds no usable certificate
/// or key, or the key does not belong to the certificate.
pub fn load_signing_credential(
    cert_path: &Path,
    key_path: &Path,
    identifier_type: CertificateIdentifierType,
    signing_certificate_id: Option<&str>,
) -> anyhow::Result<SigningCredential> {
    let cert_pem = read(cert_path)?;
    let certificates = Certificate::all_from_pem(&cert_pem)
        .with_context(|| format!("reading certificates from {}", cert_path.display()))?;

    let certificate = match signing_certificate_id {
        Some(id) => select_certificate(&certificates, identifier_type, id)?,
        None => certificates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no certificate in {}", cert_path.display()))?,
    };

    let key = parse_private_key(&read(key_path)?)
        .with_context(|| format!("reading private key from {}", key_path.display()))?;

    tracing::info!(
        subject = certificate.subject(),
        serial = certificate.serial_number(),
        "loaded SP signing certificate"
    );
    Ok(SigningCredential::new(certificate, key)?)
}

/// Loads the first certificate of a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no certificate.
pub fn load_certificate(path: &Path) -> anyhow::Result<Certificate> {
    Certificate::all_from_pem(&read(path)?)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no certificate in {}", path.display()))
}

/// Parses the first private key block of a PEM document.
///
/// # Errors
///
/// Returns an error if no supported key block is present.
pub fn parse_private_key(pem_text: &str) -> anyhow::Result<SigningKey> {
    let blocks = pem::parse_many(pem_text)?;
    for block in &blocks {
        match block.tag() {
            "PRIVATE KEY" => return Ok(SigningKey::from_pkcs8(block.contents())?),
            "RSA PRIVATE KEY" => return Ok(SigningKey::from_rsa_der(block.contents())?),
            _ => {}
        }
    }
    anyhow::bail!("no PRIVATE KEY or RSA PRIVATE KEY block found")
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

//! Trust material: certificates, the SP signing credential and the
//! identity provider trust set.
//!
//! The IdP trust set is swapped as a whole. Readers take an
//! `Arc<IdentityProviderTrust>` and keep a consistent view for the duration
//! of one validation even if [`TrustStore::reload`] runs concurrently.

use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sp_core::config::CertificateIdentifierType;
use sp_crypto::{sha1_thumbprint, to_upper_hex, EllipticCurve, PublicKey, SignatureProvider, SigningKey};
use x509_parser::prelude::{FromDer, ParsedExtension, X509Certificate};
use x509_parser::public_key::PublicKey as ParsedKey;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// A parsed X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    serial_number: String,
    thumbprint: String,
    subject_key_identifier: Option<String>,
    subject: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: PublicKey,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Crypto`] if the certificate cannot be parsed or
    /// carries a key type other than RSA or EC P-256/P-384/P-521.
    pub fn from_der(der: &[u8]) -> SamlResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| SamlError::Crypto(format!("failed to parse X.509: {e:?}")))?;

        let spki = cert.public_key();
        let key_bytes = spki.subject_public_key.data.to_vec();
        let public_key = match spki.parsed() {
            Ok(ParsedKey::RSA(_)) => PublicKey::rsa(key_bytes),
            Ok(ParsedKey::EC(_)) => {
                let curve = EllipticCurve::from_point_len(key_bytes.len()).ok_or_else(|| {
                    SamlError::Crypto("unsupported elliptic curve".to_string())
                })?;
                PublicKey::ec(curve, key_bytes)
            }
            _ => {
                return Err(SamlError::Crypto(
                    "certificate key is neither RSA nor EC".to_string(),
                ))
            }
        };

        let subject_key_identifier = cert.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(ski) => Some(to_upper_hex(ski.0)),
                _ => None,
            }
        });

        let timestamp = |ts: i64| {
            DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| SamlError::Crypto("certificate validity out of range".to_string()))
        };

        Ok(Self {
            der: der.to_vec(),
            serial_number: to_upper_hex(cert.raw_serial()),
            thumbprint: sha1_thumbprint(der),
            subject_key_identifier,
            subject: cert.subject().to_string(),
            not_before: timestamp(cert.validity().not_before.timestamp())?,
            not_after: timestamp(cert.validity().not_after.timestamp())?,
            public_key,
        })
    }

    /// Parses the base64 DER text found in `X509Certificate` elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not base64 or not a certificate.
    pub fn from_base64(text: &str) -> SamlResult<Self> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD.decode(compact.as_bytes())?;
        Self::from_der(&der)
    }

    /// Parses every `CERTIFICATE` block of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed, holds no certificate, or a
    /// certificate does not parse.
    pub fn all_from_pem(pem_text: &str) -> SamlResult<Vec<Self>> {
        let blocks = pem::parse_many(pem_text)
            .map_err(|e| SamlError::Crypto(format!("failed to parse PEM: {e}")))?;
        let certificates = blocks
            .iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(|block| Self::from_der(block.contents()))
            .collect::<SamlResult<Vec<_>>>()?;
        if certificates.is_empty() {
            return Err(SamlError::Crypto("no CERTIFICATE block in PEM".to_string()));
        }
        Ok(certificates)
    }

    /// DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 DER, as published in metadata and `KeyInfo`.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.der)
    }

    /// Serial number as uppercase hex.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// SHA-1 thumbprint as uppercase hex.
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Subject key identifier as uppercase hex, if the extension is present.
    #[must_use]
    pub fn subject_key_identifier(&self) -> Option<&str> {
        self.subject_key_identifier.as_deref()
    }

    /// Subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Start of the validity window.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity window.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Public key used to verify signatures.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the identifier of the given type.
    #[must_use]
    pub fn identifier(&self, kind: CertificateIdentifierType) -> Option<&str> {
        match kind {
            CertificateIdentifierType::SerialNumber => Some(&self.serial_number),
            CertificateIdentifierType::Thumbprint => Some(&self.thumbprint),
            CertificateIdentifierType::SubjectKeyIdentifier => self.subject_key_identifier(),
        }
    }

    /// Returns true if the identifier of the given type equals `value`.
    ///
    /// Comparison ignores case, spaces and colons so values copied from
    /// certificate viewers match.
    #[must_use]
    pub fn matches(&self, kind: CertificateIdentifierType, value: &str) -> bool {
        let normalized: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        self.identifier(kind)
            .is_some_and(|id| id.eq_ignore_ascii_case(&normalized))
    }

    /// Returns true if `now` lies in the validity window widened by `skew`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.not_before - skew <= now && now <= self.not_after + skew
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("serial_number", &self.serial_number)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Picks the certificate whose identifier of `kind` equals `value`.
///
/// # Errors
///
/// Returns [`SamlError::CertificateNotFound`] if none matches.
pub fn select_certificate(
    certificates: &[Certificate],
    kind: CertificateIdentifierType,
    value: &str,
) -> SamlResult<Certificate> {
    certificates
        .iter()
        .find(|c| c.matches(kind, value))
        .cloned()
        .ok_or_else(|| SamlError::CertificateNotFound(format!("{kind:?} {value}")))
}

/// The SP certificate paired with its private key.
#[derive(Clone)]
pub struct SigningCredential {
    certificate: Arc<Certificate>,
    signer: Arc<dyn SignatureProvider>,
}

impl SigningCredential {
    /// Pairs a certificate with a signing key.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the key does not belong to
    /// the certificate.
    pub fn new(certificate: Certificate, key: SigningKey) -> SamlResult<Self> {
        Self::from_provider(certificate, Arc::new(key))
    }

    /// Pairs a certificate with any signature provider.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if a test signature does not
    /// verify with the certificate's public key.
    pub fn from_provider(
        certificate: Certificate,
        signer: Arc<dyn SignatureProvider>,
    ) -> SamlResult<Self> {
        const SAMPLE: &[u8] = b"signing credential check";
        let signature = signer.sign(SAMPLE)?;
        certificate
            .public_key()
            .verify(signer.algorithm(), SAMPLE, &signature)
            .map_err(|_| {
                SamlError::Configuration(format!(
                    "private key does not match certificate {}",
                    certificate.subject()
                ))
            })?;
        Ok(Self {
            certificate: Arc::new(certificate),
            signer,
        })
    }

    /// The SP certificate.
    #[must_use]
    pub fn certificate(&self) -> &Arc<Certificate> {
        &self.certificate
    }

    /// The signing key.
    #[must_use]
    pub fn signer(&self) -> &dyn SignatureProvider {
        self.signer.as_ref()
    }
}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("certificate", &self.certificate)
            .field("algorithm", &self.signer.algorithm())
            .finish_non_exhaustive()
    }
}

/// A protocol endpoint of the IdP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint URL.
    pub url: String,
    /// Binding the endpoint expects.
    pub binding: SamlBinding,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(url: impl Into<String>, binding: SamlBinding) -> Self {
        Self {
            url: url.into(),
            binding,
        }
    }
}

/// Everything the SP trusts about its identity provider.
#[derive(Debug, Clone)]
pub struct IdentityProviderTrust {
    /// IdP entity ID; the only accepted issuer.
    pub entity_id: String,
    /// Single sign-on endpoint.
    pub sso: Endpoint,
    /// Single logout endpoint.
    pub slo: Option<Endpoint>,
    /// Trusted signing certificates. Several during key rollover.
    pub certificates: Vec<Arc<Certificate>>,
}

impl IdentityProviderTrust {
    /// Creates a trust set.
    pub fn new(entity_id: impl Into<String>, sso: Endpoint, certificates: Vec<Certificate>) -> Self {
        Self {
            entity_id: entity_id.into(),
            sso,
            slo: None,
            certificates: certificates.into_iter().map(Arc::new).collect(),
        }
    }

    /// Sets the single logout endpoint.
    #[must_use]
    pub fn with_slo(mut self, slo: Endpoint) -> Self {
        self.slo = Some(slo);
        self
    }

    /// Returns the single logout endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnsupportedBinding`] if the IdP publishes none.
    pub fn slo_endpoint(&self) -> SamlResult<&Endpoint> {
        self.slo.as_ref().ok_or_else(|| {
            SamlError::UnsupportedBinding(format!(
                "identity provider {} has no single logout service",
                self.entity_id
            ))
        })
    }

    fn validate(&self) -> SamlResult<()> {
        if self.entity_id.trim().is_empty() {
            return Err(SamlError::InvalidMetadata("IdP entity ID is empty".to_string()));
        }
        if self.certificates.is_empty() {
            return Err(SamlError::InvalidMetadata(format!(
                "identity provider {} has no signing certificate",
                self.entity_id
            )));
        }
        Ok(())
    }
}

/// Certificate store for the SP and its identity provider.
pub struct TrustStore {
    idp: RwLock<Arc<IdentityProviderTrust>>,
    credential: SigningCredential,
    encryption_certificate: Option<Arc<Certificate>>,
    identifier_type: CertificateIdentifierType,
    clock_skew: chrono::Duration,
}

impl TrustStore {
    /// Creates a trust store.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMetadata`] if the IdP trust set has no
    /// entity ID or no certificate.
    pub fn new(
        idp: IdentityProviderTrust,
        credential: SigningCredential,
        identifier_type: CertificateIdentifierType,
        clock_skew: std::time::Duration,
    ) -> SamlResult<Self> {
        idp.validate()?;
        Ok(Self {
            idp: RwLock::new(Arc::new(idp)),
            credential,
            encryption_certificate: None,
            identifier_type,
            clock_skew: chrono::Duration::from_std(clock_skew)
                .map_err(|e| SamlError::Configuration(format!("clock skew: {e}")))?,
        })
    }

    /// Publishes a separate encryption certificate in metadata.
    #[must_use]
    pub fn with_encryption_certificate(mut self, certificate: Certificate) -> Self {
        self.encryption_certificate = Some(Arc::new(certificate));
        self
    }

    /// Current IdP trust set.
    #[must_use]
    pub fn idp(&self) -> Arc<IdentityProviderTrust> {
        Arc::clone(&self.idp.read())
    }

    /// Atomically replaces the IdP trust set.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMetadata`] and keeps the current set if
    /// the new one has no entity ID or no certificate.
    pub fn reload(&self, trust: IdentityProviderTrust) -> SamlResult<()> {
        trust.validate()?;
        let count = trust.certificates.len();
        let entity_id = trust.entity_id.clone();
        *self.idp.write() = Arc::new(trust);
        tracing::info!(issuer = %entity_id, certificates = count, "identity provider trust reloaded");
        Ok(())
    }

    /// The SP signing credential.
    #[must_use]
    pub const fn signing_certificate(&self) -> &SigningCredential {
        &self.credential
    }

    /// The SP encryption certificate, if configured.
    #[must_use]
    pub fn encryption_certificate(&self) -> Option<&Arc<Certificate>> {
        self.encryption_certificate.as_ref()
    }

    /// Allowed clock difference.
    #[must_use]
    pub const fn clock_skew(&self) -> chrono::Duration {
        self.clock_skew
    }

    /// Finds a certificate by the configured identifier type and checks
    /// that it is valid at `now`, allowing the clock skew.
    ///
    /// IdP certificates are searched first, then the SP's own.
    ///
    /// # Errors
    ///
    /// - [`SamlError::CertificateNotFound`] if nothing matches
    /// - [`SamlError::CertificateExpired`] if the match is outside its
    ///   validity window
    pub fn resolve(&self, identifier: &str, now: DateTime<Utc>) -> SamlResult<Arc<Certificate>> {
        let idp = self.idp();
        let certificate = idp
            .certificates
            .iter()
            .chain(std::iter::once(self.credential.certificate()))
            .chain(self.encryption_certificate.iter())
            .find(|c| c.matches(self.identifier_type, identifier))
            .cloned()
            .ok_or_else(|| {
                SamlError::CertificateNotFound(format!("{:?} {identifier}", self.identifier_type))
            })?;
        if !certificate.is_valid_at(now, self.clock_skew) {
            return Err(SamlError::CertificateExpired(format!(
                "{:?} {identifier} is outside its validity window",
                self.identifier_type
            )));
        }
        Ok(certificate)
    }

    /// Returns the certificates a signature by `issuer` may be checked
    /// against.
    ///
    /// An embedded `KeyInfo` certificate narrows the set to itself only when
    /// it resolves to a trusted certificate with identical DER. Anything else
    /// it says is ignored.
    ///
    /// # Errors
    ///
    /// - [`SamlError::IssuerMismatch`] if `issuer` is not the trusted IdP
    /// - [`SamlError::CertificateExpired`] if every candidate is outside its
    ///   validity window
    pub fn verification_candidates(
        &self,
        issuer: &str,
        embedded: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> SamlResult<Vec<Arc<Certificate>>> {
        let idp = self.idp();
        if issuer != idp.entity_id {
            return Err(SamlError::IssuerMismatch {
                expected: idp.entity_id.clone(),
                actual: issuer.to_string(),
            });
        }

        let pinned = embedded.and_then(|der| {
            let embedded = match Certificate::from_der(der) {
                Ok(cert) => cert,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unparsable KeyInfo certificate");
                    return None;
                }
            };
            let identifier = embedded.identifier(self.identifier_type)?;
            idp.certificates
                .iter()
                .find(|c| c.matches(self.identifier_type, identifier) && c.der() == der)
                .cloned()
        });

        let candidates = match pinned {
            Some(cert) => vec![cert],
            None => idp.certificates.clone(),
        };
        if candidates.is_empty() {
            return Err(SamlError::CertificateNotFound(format!(
                "no certificate trusted for {issuer}"
            )));
        }

        let valid: Vec<_> = candidates
            .iter()
            .filter(|c| c.is_valid_at(now, self.clock_skew))
            .cloned()
            .collect();
        if valid.is_empty() {
            return Err(SamlError::CertificateExpired(format!(
                "every certificate trusted for {issuer} is outside its validity window"
            )));
        }
        Ok(valid)
    }
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("idp", &self.idp().entity_id)
            .field("identifier_type", &self.identifier_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Datelike;

    use super::*;

    /// Generates a self-signed P-256 certificate and its key.
    pub(crate) fn generate(
        common_name: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> (Certificate, SigningKey) {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(
            not_before.year(),
            not_before.month() as u8,
            not_before.day() as u8,
        );
        params.not_after = rcgen::date_time_ymd(
            not_after.year(),
            not_after.month() as u8,
            not_after.day() as u8,
        );
        let cert = params.self_signed(&key_pair).unwrap();
        let certificate = Certificate::from_der(cert.der()).unwrap();
        let key = SigningKey::from_pkcs8(&key_pair.serialize_der()).unwrap();
        (certificate, key)
    }

    /// A certificate valid from a year ago to a year from now.
    pub(crate) fn current(common_name: &str) -> (Certificate, SigningKey) {
        let now = Utc::now();
        generate(
            common_name,
            now - chrono::Duration::days(365),
            now + chrono::Duration::days(365),
        )
    }

    pub(crate) fn credential(common_name: &str) -> SigningCredential {
        let (cert, key) = current(common_name);
        SigningCredential::new(cert, key).unwrap()
    }

    pub(crate) fn idp_trust(certificates: Vec<Certificate>) -> IdentityProviderTrust {
        IdentityProviderTrust::new(
            "https://idp.example.org",
            Endpoint::new("https://idp.example.org/sso", SamlBinding::HttpRedirect),
            certificates,
        )
        .with_slo(Endpoint::new(
            "https://idp.example.org/slo",
            SamlBinding::HttpRedirect,
        ))
    }

    pub(crate) fn store(idp_certificates: Vec<Certificate>) -> TrustStore {
        TrustStore::new(
            idp_trust(idp_certificates),
            credential("sp.example.org"),
            CertificateIdentifierType::SerialNumber,
            std::time::Duration::from_secs(120),
        )
        .unwrap()
    }
}

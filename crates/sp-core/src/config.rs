//! Service provider configuration.
//!
//! [`ServiceProviderConfig`] is built once at startup, validated with
//! [`ServiceProviderConfig::validate`] and then shared read-only.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Path of the assertion consumer service relative to the base URL.
pub const ACS_PATH: &str = "/saml/acs";

/// Path of the single logout service relative to the base URL.
pub const SLO_PATH: &str = "/saml/slo";

/// Path of the metadata endpoint relative to the base URL.
pub const METADATA_PATH: &str = "/saml/metadata";

/// Path of the login endpoint relative to the base URL.
pub const LOGIN_PATH: &str = "/saml/login";

/// Default path that starts SP-initiated sign-out.
pub const DEFAULT_SIGN_OUT_PATH: &str = "/signedout";

/// Largest clock skew accepted by [`ServiceProviderConfig::validate`].
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(10 * 60);

/// How the SP signing certificate is selected from the certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CertificateIdentifierType {
    /// Match on the certificate serial number (uppercase hex).
    #[default]
    SerialNumber,
    /// Match on the SHA-1 thumbprint (uppercase hex).
    Thumbprint,
    /// Match on the subject key identifier extension (uppercase hex).
    SubjectKeyIdentifier,
}

impl std::str::FromStr for CertificateIdentifierType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serialnumber" | "serial_number" | "serial" => Ok(Self::SerialNumber),
            "thumbprint" => Ok(Self::Thumbprint),
            "subjectkeyidentifier" | "subject_key_identifier" | "ski" => {
                Ok(Self::SubjectKeyIdentifier)
            }
            other => Err(Error::Config(format!(
                "unknown certificate identifier type: {other}"
            ))),
        }
    }
}

/// Organization published in SP metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Legal name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Organization URL.
    pub url: String,
}

/// Contact type published in SP metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    /// Technical contact.
    Technical,
    /// Support contact.
    #[default]
    Support,
    /// Administrative contact.
    Administrative,
    /// Billing contact.
    Billing,
    /// Other contact.
    Other,
}

impl ContactType {
    /// Returns the metadata attribute value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Support => "support",
            Self::Administrative => "administrative",
            Self::Billing => "billing",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for ContactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "technical" => Ok(Self::Technical),
            "support" => Ok(Self::Support),
            "administrative" => Ok(Self::Administrative),
            "billing" => Ok(Self::Billing),
            "other" => Ok(Self::Other),
            other => Err(Error::Config(format!("unknown contact type: {other}"))),
        }
    }
}

/// Contact person published in SP metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactPerson {
    /// Contact type.
    pub contact_type: ContactType,
    /// Company name.
    pub company: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Email addresses, in order.
    pub email_addresses: Vec<String>,
    /// Telephone numbers, in order.
    pub telephone_numbers: Vec<String>,
}

/// Process-wide service provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    /// SAML entity ID of this SP.
    pub entity_id: String,
    /// Absolute URL of the assertion consumer service.
    pub assertion_consumer_service_url: String,
    /// Absolute URL of the single logout service.
    pub single_logout_url: String,
    /// Local path that starts SP-initiated sign-out.
    pub sign_out_path: String,
    /// Request `ForceAuthn` on every AuthnRequest.
    pub force_authn: bool,
    /// Service name for the `AttributeConsumingService` element.
    pub service_name: Option<String>,
    /// Language tag for localized metadata values.
    pub language: String,
    /// Organization metadata.
    pub organization: Option<Organization>,
    /// Contact person metadata.
    pub contact_person: Option<ContactPerson>,
    /// How `signing_certificate_id` is interpreted.
    pub certificate_identifier_type: CertificateIdentifierType,
    /// Identifier of the SP signing certificate, if one must be selected.
    pub signing_certificate_id: Option<String>,
    /// Allowed clock difference between SP and IdP.
    pub clock_skew: Duration,
    /// Lifetime of a pending request correlation record.
    pub request_ttl: Duration,
    /// Advertise and require signed assertions.
    pub want_assertions_signed: bool,
    /// Sign outgoing AuthnRequests.
    pub authn_requests_signed: bool,
    /// Accept IdP-initiated responses without `InResponseTo`.
    pub allow_unsolicited: bool,
}

impl ServiceProviderConfig {
    /// Creates a configuration with endpoint URLs derived from `base_url`.
    ///
    /// # Arguments
    ///
    /// * `entity_id` - SAML entity ID of this SP
    /// * `base_url` - Public base URL the SP endpoints are served under
    #[must_use]
    pub fn new(entity_id: impl Into<String>, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            entity_id: entity_id.into(),
            assertion_consumer_service_url: format!("{base}{ACS_PATH}"),
            single_logout_url: format!("{base}{SLO_PATH}"),
            sign_out_path: DEFAULT_SIGN_OUT_PATH.to_string(),
            force_authn: false,
            service_name: None,
            language: "en".to_string(),
            organization: None,
            contact_person: None,
            certificate_identifier_type: CertificateIdentifierType::default(),
            signing_certificate_id: None,
            clock_skew: Duration::from_secs(120),
            request_ttl: Duration::from_secs(5 * 60),
            want_assertions_signed: true,
            authn_requests_signed: true,
            allow_unsolicited: false,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.trim().is_empty() {
            return Err(Error::Config("entity_id must not be empty".to_string()));
        }

        require_absolute_url(
            "assertion_consumer_service_url",
            &self.assertion_consumer_service_url,
        )?;
        require_absolute_url("single_logout_url", &self.single_logout_url)?;

        if !self.sign_out_path.starts_with('/') {
            return Err(Error::Config(format!(
                "sign_out_path must start with '/': {}",
                self.sign_out_path
            )));
        }

        if self.language.trim().is_empty() {
            return Err(Error::Config("language must not be empty".to_string()));
        }

        if self.clock_skew > MAX_CLOCK_SKEW {
            return Err(Error::Config(format!(
                "clock_skew of {}s exceeds the maximum of {}s",
                self.clock_skew.as_secs(),
                MAX_CLOCK_SKEW.as_secs()
            )));
        }

        if self.request_ttl.is_zero() {
            return Err(Error::Config("request_ttl must be positive".to_string()));
        }

        if let Some(id) = &self.signing_certificate_id {
            if id.trim().is_empty() {
                return Err(Error::Config(
                    "signing_certificate_id must not be blank".to_string(),
                ));
            }
        }

        if let Some(org) = &self.organization {
            if org.name.trim().is_empty() {
                return Err(Error::Config("organization name must not be empty".to_string()));
            }
            require_absolute_url("organization url", &org.url)?;
        }

        Ok(())
    }
}

fn require_absolute_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{field} is not a URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{field} must be an absolute URL")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_urls_use_base() {
        let config = ServiceProviderConfig::new("https://sp.example.org", "https://sp.example.org/");
        assert_eq!(
            config.assertion_consumer_service_url,
            "https://sp.example.org/saml/acs"
        );
        assert_eq!(config.single_logout_url, "https://sp.example.org/saml/slo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_entity_id_is_rejected() {
        let config = ServiceProviderConfig::new(" ", "https://sp.example.org");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn relative_acs_url_is_rejected() {
        let mut config = ServiceProviderConfig::new("sp", "https://sp.example.org");
        config.assertion_consumer_service_url = "/saml/acs".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn excessive_clock_skew_is_rejected() {
        let mut config = ServiceProviderConfig::new("sp", "https://sp.example.org");
        config.clock_skew = Duration::from_secs(3600);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn sign_out_path_must_be_absolute() {
        let mut config = ServiceProviderConfig::new("sp", "https://sp.example.org");
        config.sign_out_path = "signedout".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn identifier_type_parses_case_insensitively() {
        assert_eq!(
            "Thumbprint".parse::<CertificateIdentifierType>().unwrap(),
            CertificateIdentifierType::Thumbprint
        );
        assert_eq!(
            "SubjectKeyIdentifier".parse::<CertificateIdentifierType>().unwrap(),
            CertificateIdentifierType::SubjectKeyIdentifier
        );
        assert!("issuer".parse::<CertificateIdentifierType>().is_err());
    }

    #[test]
    fn contact_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContactType::Technical).unwrap();
        assert_eq!(json, "\"technical\"");
    }
}

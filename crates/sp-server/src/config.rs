//! Server configuration.
//!
//! Configuration is loaded from environment variables (and a `.env` file if
//! present) with sensible defaults. `SP_ENTITY_ID`, `SP_KEY_PATH` and
//! `IDP_METADATA_ADDRESS` are required.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sp_core::config::{
    CertificateIdentifierType, ContactPerson, ContactType, Organization, ServiceProviderConfig,
    DEFAULT_SIGN_OUT_PATH,
};
use sp_protocol_saml::endpoints::DEFAULT_COOKIE_NAME;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Public base URL the SAML endpoints are served under.
    pub base_url: String,

    /// SAML entity ID of this SP.
    pub entity_id: String,

    /// Local path that starts SP-initiated sign-out.
    pub sign_out_path: String,

    /// Request `ForceAuthn` on every AuthnRequest.
    pub force_authn: bool,

    /// Service name published in metadata.
    pub service_name: Option<String>,

    /// Language of localized metadata values.
    pub language: String,

    /// Organization published in metadata.
    pub organization: Option<Organization>,

    /// Contact person published in metadata.
    pub contact_person: Option<ContactPerson>,

    /// How `signing_certificate_id` is matched.
    pub certificate_identifier_type: CertificateIdentifierType,

    /// Selects one certificate from `cert_path` when it holds several.
    pub signing_certificate_id: Option<String>,

    /// PEM file with the SP certificate(s). Defaults to `key_path`.
    pub cert_path: PathBuf,

    /// PEM file with the SP private key.
    pub key_path: PathBuf,

    /// PEM file with a separate encryption certificate.
    pub encryption_cert_path: Option<PathBuf>,

    /// URL or file path of the IdP metadata.
    pub idp_metadata_address: String,

    /// Entity ID to pick from a multi-entity metadata document.
    pub idp_entity_id: Option<String>,

    /// Write SP metadata to `metadata_file` at startup.
    pub create_metadata_file: bool,

    /// Where SP metadata is written.
    pub metadata_file: PathBuf,

    /// Interval between IdP metadata refreshes. `None` disables refresh.
    pub metadata_refresh: Option<Duration>,

    /// Allowed clock difference between SP and IdP.
    pub clock_skew: Duration,

    /// Secret for RelayState tokens. A random one is used when unset.
    pub relay_state_secret: Option<String>,

    /// Session cookie name.
    pub cookie_name: String,

    /// Whether the session cookie is `Secure`.
    pub cookie_secure: bool,

    /// Log level.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = env_or("SP_HOST", "0.0.0.0");
        let port = env_parse("SP_PORT")?.unwrap_or(8080);
        let base_url = std::env::var("SP_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"));

        let entity_id = required("SP_ENTITY_ID")?;
        let key_path = PathBuf::from(required("SP_KEY_PATH")?);
        let idp_metadata_address = required("IDP_METADATA_ADDRESS")?;

        let cert_path = optional("SP_CERT_PATH").map_or_else(|| key_path.clone(), PathBuf::from);

        let organization = match optional("SP_ORG_NAME") {
            Some(name) => Some(Organization {
                display_name: optional("SP_ORG_DISPLAY_NAME").unwrap_or_else(|| name.clone()),
                url: required("SP_ORG_URL")?,
                name,
            }),
            None => None,
        };

        let contact_person = contact_from_env()?;

        let certificate_identifier_type = match optional("SP_CERT_IDENTIFIER_TYPE") {
            Some(value) => CertificateIdentifierType::from_str(&value)?,
            None => CertificateIdentifierType::default(),
        };

        let metadata_refresh = match env_parse::<u64>("SP_METADATA_REFRESH_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(3600)), // 1 hour
        };

        Ok(Self {
            host,
            port,
            base_url,
            entity_id,
            sign_out_path: env_or("SP_SIGN_OUT_PATH", DEFAULT_SIGN_OUT_PATH),
            force_authn: env_flag("SP_FORCE_AUTHN", false),
            service_name: optional("SP_SERVICE_NAME"),
            language: env_or("SP_LANGUAGE", "en"),
            organization,
            contact_person,
            certificate_identifier_type,
            signing_certificate_id: optional("SP_SIGNING_CERT_ID"),
            cert_path,
            key_path,
            encryption_cert_path: optional("SP_ENCRYPTION_CERT_PATH").map(PathBuf::from),
            idp_metadata_address,
            idp_entity_id: optional("IDP_ENTITY_ID"),
            create_metadata_file: env_flag("SP_CREATE_METADATA_FILE", false),
            metadata_file: PathBuf::from(env_or("SP_METADATA_FILE", "sp-metadata.xml")),
            metadata_refresh,
            clock_skew: Duration::from_secs(env_parse("SP_CLOCK_SKEW_SECS")?.unwrap_or(120)),
            relay_state_secret: optional("SP_RELAY_STATE_SECRET"),
            cookie_name: env_or("SP_COOKIE_NAME", DEFAULT_COOKIE_NAME),
            cookie_secure: env_flag("SP_COOKIE_SECURE", true),
            log_level: env_or("RUST_LOG", "info"),
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing(key_path: impl Into<PathBuf>, idp_metadata_address: &str) -> Self {
        let key_path = key_path.into();
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            base_url: "https://sp.example.org".to_string(),
            entity_id: "https://sp.example.org".to_string(),
            cert_path: key_path.clone(),
            key_path,
            idp_metadata_address: idp_metadata_address.to_string(),
            metadata_refresh: None,
            relay_state_secret: Some("test-relay-state-secret-0123456789abcdef".to_string()),
            cookie_secure: false,
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Builds the protocol configuration for the SAML engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration does not validate.
    pub fn service_provider(&self) -> anyhow::Result<ServiceProviderConfig> {
        let mut sp = ServiceProviderConfig::new(self.entity_id.clone(), &self.base_url);
        sp.sign_out_path = self.sign_out_path.clone();
        sp.force_authn = self.force_authn;
        sp.service_name = self.service_name.clone();
        sp.language = self.language.clone();
        sp.organization = self.organization.clone();
        sp.contact_person = self.contact_person.clone();
        sp.certificate_identifier_type = self.certificate_identifier_type;
        sp.signing_certificate_id = self.signing_certificate_id.clone();
        sp.clock_skew = self.clock_skew;
        sp.validate()?;
        Ok(sp)
    }

    /// Returns the address the server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            entity_id: "http://localhost:8080".to_string(),
            sign_out_path: DEFAULT_SIGN_OUT_PATH.to_string(),
            force_authn: false,
            service_name: None,
            language: "en".to_string(),
            organization: None,
            contact_person: None,
            certificate_identifier_type: CertificateIdentifierType::default(),
            signing_certificate_id: None,
            cert_path: PathBuf::from("sp.pem"),
            key_path: PathBuf::from("sp.pem"),
            encryption_cert_path: None,
            idp_metadata_address: "idp-metadata.xml".to_string(),
            idp_entity_id: None,
            create_metadata_file: false,
            metadata_file: PathBuf::from("sp-metadata.xml"),
            metadata_refresh: Some(Duration::from_secs(3600)),
            clock_skew: Duration::from_secs(120),
            relay_state_secret: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: true,
            log_level: "info".to_string(),
        }
    }
}

fn contact_from_env() -> anyhow::Result<Option<ContactPerson>> {
    let emails = list("SP_CONTACT_EMAIL");
    let phones = list("SP_CONTACT_PHONE");
    let company = optional("SP_CONTACT_COMPANY");
    let given_name = optional("SP_CONTACT_GIVEN_NAME");
    let surname = optional("SP_CONTACT_SURNAME");

    if emails.is_empty()
        && phones.is_empty()
        && company.is_none()
        && given_name.is_none()
        && surname.is_none()
    {
        return Ok(None);
    }

    let contact_type = match optional("SP_CONTACT_TYPE") {
        Some(value) => ContactType::from_str(&value)?,
        None => ContactType::default(),
    };

    Ok(Some(ContactPerson {
        contact_type,
        company,
        given_name,
        surname,
        email_addresses: emails,
        telephone_numbers: phones,
    }))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &str) -> anyhow::Result<String> {
    optional(name).ok_or_else(|| anyhow::anyhow!("{name} environment variable is required"))
}

fn env_or(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

fn env_flag(name: &str, default: bool) -> bool {
    optional(name).map_or(default, |v| parse_flag(&v))
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(name)
        .map(|v| {
            v.parse()
                .map_err(|e| anyhow::anyhow!("{name} has an invalid value {v:?}: {e}"))
        })
        .transpose()
}

fn list(name: &str) -> Vec<String> {
    optional(name).map_or_else(Vec::new, |v| split_list(&v))
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_config_builds_service_provider() {
        let config = ServerConfig::for_testing("sp.pem", "idp-metadata.xml");
        let sp = config.service_provider().unwrap();
        assert_eq!(sp.entity_id, "https://sp.example.org");
        assert_eq!(sp.assertion_consumer_service_url, "https://sp.example.org/saml/acs");
        assert_eq!(sp.sign_out_path, DEFAULT_SIGN_OUT_PATH);
        assert_eq!(config.cert_path, config.key_path);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = ServerConfig::for_testing("sp.pem", "idp-metadata.xml");
        config.base_url = "not a url".to_string();
        assert!(config.service_provider().is_err());
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn lists_skip_blank_items() {
        assert_eq!(
            split_list("ops@example.org, ,help@example.org"),
            vec!["ops@example.org", "help@example.org"]
        );
    }
}

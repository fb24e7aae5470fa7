//! SAML AuthnRequest types.
//!
//! Authentication request message sent by this service provider to the
//! identity provider.

use chrono::{DateTime, Utc};
use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};

use super::{format_instant, NameIdPolicy, SamlBinding, XmlWriter, SAMLP_NS, SAML_NS, SAML_VERSION};
use crate::error::SamlResult;

/// SAML Authentication Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request, also the correlation ID.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of this service provider.
    pub issuer: String,

    /// IdP endpoint this request is sent to.
    pub destination: String,

    /// The URL where the response should be sent.
    pub assertion_consumer_service_url: String,

    /// Binding the IdP should use for the response.
    pub protocol_binding: SamlBinding,

    /// Name ID policy constraints.
    #[serde(skip)]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(default)]
    pub force_authn: bool,

    /// A human-readable name for the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

impl AuthnRequest {
    /// Creates a new authentication request.
    ///
    /// The response binding defaults to HTTP-POST, the only binding the
    /// assertion consumer service accepts.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        issuer: impl Into<String>,
        destination: impl Into<String>,
        acs_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: destination.into(),
            assertion_consumer_service_url: acs_url.into(),
            protocol_binding: SamlBinding::HttpPost,
            name_id_policy: Some(NameIdPolicy::default()),
            force_authn: false,
            provider_name: None,
        }
    }

    /// Sets the issue instant.
    #[must_use]
    pub const fn issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: Option<NameIdPolicy>) -> Self {
        self.name_id_policy = policy;
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: Option<String>) -> Self {
        self.provider_name = name;
        self
    }

    /// Serializes the request without a signature.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn to_xml(&self) -> SamlResult<String> {
        let issue_instant = format_instant(self.issue_instant);
        let mut root = BytesStart::new("samlp:AuthnRequest");
        root.push_attribute(("xmlns:samlp", SAMLP_NS));
        root.push_attribute(("xmlns:saml", SAML_NS));
        root.push_attribute(("ID", self.id.as_str()));
        root.push_attribute(("Version", SAML_VERSION));
        root.push_attribute(("IssueInstant", issue_instant.as_str()));
        root.push_attribute(("Destination", self.destination.as_str()));
        if self.force_authn {
            root.push_attribute(("ForceAuthn", "true"));
        }
        if let Some(name) = &self.provider_name {
            root.push_attribute(("ProviderName", name.as_str()));
        }
        root.push_attribute(("ProtocolBinding", self.protocol_binding.uri()));
        root.push_attribute((
            "AssertionConsumerServiceURL",
            self.assertion_consumer_service_url.as_str(),
        ));

        let mut writer = XmlWriter::new();
        writer.start(root)?;
        writer.text_element("saml:Issuer", &[], &self.issuer)?;
        if let Some(policy) = &self.name_id_policy {
            policy.write(&mut writer)?;
        }
        writer.end("samlp:AuthnRequest")?;
        writer.into_string()
    }
}

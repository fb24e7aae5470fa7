//! Simulated identity provider for end-to-end tests.
//!
//! [`MockIdp`] owns a freshly generated signing key and produces what a real
//! IdP would send: metadata, signed responses and signed logout messages.

use chrono::{DateTime, Duration, Utc};
use sp_crypto::SigningKey;
use sp_protocol_saml::bindings::{HttpRedirectBinding, SamlMessageType};
use sp_protocol_saml::signature::XmlSigner;
use sp_protocol_saml::{format_instant, status_codes, Certificate, SigningCredential};

/// Entity ID of the simulated IdP.
pub const IDP_ENTITY_ID: &str = "https://idp.example.org";

/// SSO endpoint of the simulated IdP.
pub const IDP_SSO_URL: &str = "https://idp.example.org/sso";

/// SLO endpoint of the simulated IdP.
pub const IDP_SLO_URL: &str = "https://idp.example.org/slo";

/// SP entity ID and base URL used by the tests.
pub const SP_ENTITY_ID: &str = "https://sp.example.org";

/// ACS URL of the SP under test.
pub const SP_ACS_URL: &str = "https://sp.example.org/saml/acs";

/// SLO URL of the SP under test.
pub const SP_SLO_URL: &str = "https://sp.example.org/saml/slo";

/// Generates a self-signed certificate and returns it with its key as PEM.
pub fn pem_credential(common_name: &str) -> anyhow::Result<(String, String)> {
    let key = rcgen::KeyPair::generate()?;
    let params = rcgen::CertificateParams::new(vec![common_name.to_string()])?;
    let cert = params.self_signed(&key)?;
    Ok((cert.pem(), key.serialize_pem()))
}

/// A simulated identity provider.
pub struct MockIdp {
    credential: SigningCredential,
    signer: XmlSigner,
}

impl MockIdp {
    /// Creates an IdP with a new signing key.
    pub fn new() -> anyhow::Result<Self> {
        let key = rcgen::KeyPair::generate()?;
        let params = rcgen::CertificateParams::new(vec!["idp.example.org".to_string()])?;
        let cert = params.self_signed(&key)?;
        let credential = SigningCredential::new(
            Certificate::from_der(cert.der())?,
            SigningKey::from_pkcs8(&key.serialize_der())?,
        )?;
        Ok(Self {
            signer: XmlSigner::new(credential.clone()),
            credential,
        })
    }

    /// The IdP signing credential.
    pub fn credential(&self) -> &SigningCredential {
        &self.credential
    }

    /// IdP metadata with Redirect SSO and SLO endpoints.
    pub fn metadata(&self) -> String {
        format!(
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" entityID="{IDP_ENTITY_ID}">
  <md:IDPSSODescriptor WantAuthnRequestsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:KeyDescriptor use="signing"><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></md:KeyDescriptor>
    <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{IDP_SLO_URL}"/>
    <md:NameIDFormat>urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress</md:NameIDFormat>
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{IDP_SSO_URL}"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#,
            cert = self.credential.certificate().to_base64()
        )
    }

    /// Signs the assertion of `spec`'s response.
    pub fn signed_response(&self, spec: &ResponseSpec) -> anyhow::Result<String> {
        let xml = spec.response_xml(&spec.assertion_xml());
        Ok(self.signer.sign_enveloped(&xml, &spec.assertion_id)?)
    }

    /// Signs a logout message for the Redirect binding.
    ///
    /// Returns the query string the browser would carry to the SP.
    pub fn redirect_query(
        &self,
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> anyhow::Result<String> {
        let url = HttpRedirectBinding::encode(
            xml,
            SP_SLO_URL,
            relay_state,
            message_type,
            Some(self.signer.provider()),
        )?;
        query_of(&url)
    }
}

/// Returns the query part of a URL.
pub fn query_of(url: &str) -> anyhow::Result<String> {
    url.split_once('?')
        .map(|(_, query)| query.to_string())
        .ok_or_else(|| anyhow::anyhow!("no query string in {url}"))
}

/// Extracts the root `ID` attribute of a SAML message.
pub fn message_id(xml: &str) -> anyhow::Result<String> {
    let start = xml
        .find(" ID=\"")
        .ok_or_else(|| anyhow::anyhow!("message has no ID"))?
        + 5;
    let len = xml[start..]
        .find('"')
        .ok_or_else(|| anyhow::anyhow!("unterminated ID"))?;
    Ok(xml[start..start + len].to_string())
}

/// The parts of an IdP response a test may want to vary.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    /// Response ID.
    pub response_id: String,
    /// Assertion ID.
    pub assertion_id: String,
    /// Issuer of response and assertion.
    pub issuer: String,
    /// `InResponseTo` on the response and the bearer confirmation.
    pub in_response_to: Option<String>,
    /// Response `Destination` and confirmation `Recipient`.
    pub destination: String,
    /// Audience restriction.
    pub audience: String,
    /// Subject NameID.
    pub name_id: String,
    /// `SessionIndex` of the authentication statement.
    pub session_index: String,
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    pub not_on_or_after: DateTime<Utc>,
}

impl ResponseSpec {
    /// A valid response to `in_response_to`, valid from a minute ago for
    /// five minutes.
    pub fn new(in_response_to: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            response_id: sp_crypto::generate_message_id(),
            assertion_id: sp_crypto::generate_message_id(),
            issuer: IDP_ENTITY_ID.to_string(),
            in_response_to: in_response_to.map(str::to_string),
            destination: SP_ACS_URL.to_string(),
            audience: SP_ENTITY_ID.to_string(),
            name_id: "user@example.org".to_string(),
            session_index: "_session1".to_string(),
            not_before: now - Duration::minutes(1),
            not_on_or_after: now + Duration::minutes(5),
        }
    }

    /// The assertion element.
    pub fn assertion_xml(&self) -> String {
        self.assertion_with_id(&self.assertion_id, &self.name_id)
    }

    /// An assertion with another ID and subject, as an attacker would add.
    pub fn assertion_with_id(&self, id: &str, name_id: &str) -> String {
        format!(
            concat!(
                r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0" IssueInstant="{now}">"#,
                r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                r#"<saml:Subject><saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">{name_id}</saml:NameID>"#,
                r#"<saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">"#,
                r#"<saml:SubjectConfirmationData{irt} NotOnOrAfter="{noa}" Recipient="{acs}"/>"#,
                r#"</saml:SubjectConfirmation></saml:Subject>"#,
                r#"<saml:Conditions NotBefore="{nb}" NotOnOrAfter="{noa}">"#,
                r#"<saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction>"#,
                r#"</saml:Conditions>"#,
                r#"<saml:AuthnStatement AuthnInstant="{now}" SessionIndex="{session_index}">"#,
                r#"<saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</saml:AuthnContextClassRef></saml:AuthnContext>"#,
                r#"</saml:AuthnStatement>"#,
                r#"<saml:AttributeStatement>"#,
                r#"<saml:Attribute Name="displayName"><saml:AttributeValue>Test User</saml:AttributeValue></saml:Attribute>"#,
                r#"</saml:AttributeStatement>"#,
                r#"</saml:Assertion>"#,
            ),
            id = id,
            now = format_instant(Utc::now()),
            issuer = self.issuer,
            name_id = name_id,
            irt = self.in_response_to_attribute(),
            noa = format_instant(self.not_on_or_after),
            nb = format_instant(self.not_before),
            acs = self.destination,
            audience = self.audience,
            session_index = self.session_index,
        )
    }

    /// The response element around `assertions`.
    pub fn response_xml(&self, assertions: &str) -> String {
        format!(
            concat!(
                r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0" IssueInstant="{now}" Destination="{acs}"{irt}>"#,
                r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                r#"<samlp:Status><samlp:StatusCode Value="{status}"/></samlp:Status>"#,
                "{assertions}",
                r#"</samlp:Response>"#,
            ),
            id = self.response_id,
            now = format_instant(Utc::now()),
            acs = self.destination,
            irt = self.in_response_to_attribute(),
            issuer = self.issuer,
            status = status_codes::SUCCESS,
            assertions = assertions,
        )
    }

    /// The unsigned response.
    pub fn unsigned(&self) -> String {
        self.response_xml(&self.assertion_xml())
    }

    fn in_response_to_attribute(&self) -> String {
        self.in_response_to
            .as_ref()
            .map(|id| format!(r#" InResponseTo="{id}""#))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_reads_root_id() {
        let xml = r#"<samlp:AuthnRequest xmlns:samlp="urn:x" ID="_abc" Version="2.0"/>"#;
        assert_eq!(message_id(xml).unwrap(), "_abc");
        assert!(message_id("<x/>").is_err());
    }
}

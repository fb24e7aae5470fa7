//! Outbound SAML requests.
//!
//! Every request gets a fresh 160-bit ID that is recorded in the
//! [`CorrelationStore`] so the answer can be matched exactly once.

use std::sync::Arc;

use chrono::Utc;
use sp_cache::CorrelationStore;
use sp_core::claims::ClaimsSet;
use sp_core::config::ServiceProviderConfig;
use sp_crypto::generate_message_id;

use crate::bindings::{HttpPostBinding, HttpRedirectBinding, OutboundMessage, SamlMessageType};
use crate::error::SamlResult;
use crate::relay_state::RelayStateCodec;
use crate::signature::XmlSigner;
use crate::trust::{Endpoint, TrustStore};
use crate::types::{AuthnRequest, LogoutRequest, LogoutResponse, NameId, SamlBinding, Status};

/// Builds, signs and encodes requests to the identity provider.
pub struct RequestGenerator {
    config: Arc<ServiceProviderConfig>,
    trust: Arc<TrustStore>,
    correlation: Arc<dyn CorrelationStore>,
    relay_state: Arc<RelayStateCodec>,
    signer: XmlSigner,
}

impl RequestGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(
        config: Arc<ServiceProviderConfig>,
        trust: Arc<TrustStore>,
        correlation: Arc<dyn CorrelationStore>,
        relay_state: Arc<RelayStateCodec>,
    ) -> Self {
        let signer = XmlSigner::new(trust.signing_certificate().clone());
        Self {
            config,
            trust,
            correlation,
            relay_state,
            signer,
        }
    }

    /// Starts SP-initiated login.
    ///
    /// The binding is the one the IdP publishes for its SSO endpoint unless
    /// `binding` overrides it. The RelayState token carries the request ID
    /// and `return_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the correlation record cannot be stored or
    /// encoding or signing fails.
    pub async fn new_authn_request(
        &self,
        binding: Option<SamlBinding>,
        return_to: Option<&str>,
    ) -> SamlResult<(AuthnRequest, OutboundMessage)> {
        let idp = self.trust.idp();
        let endpoint = Endpoint::new(idp.sso.url.clone(), binding.unwrap_or(idp.sso.binding));

        let request = AuthnRequest::new(
            generate_message_id(),
            &self.config.entity_id,
            &endpoint.url,
            &self.config.assertion_consumer_service_url,
        )
        .force_authn(self.config.force_authn)
        .with_provider_name(self.config.service_name.clone());

        let relay_state =
            self.relay_state
                .encode(Some(&request.id), return_to.unwrap_or("/"), Utc::now())?;
        let message = self.deliver(
            &request.to_xml()?,
            &request.id,
            &endpoint,
            Some(&relay_state),
            SamlMessageType::Request,
            self.config.authn_requests_signed,
        )?;
        self.correlation.put(&request.id, self.config.request_ttl).await?;

        tracing::info!(
            request_id = %request.id,
            destination = %endpoint.url,
            binding = ?endpoint.binding,
            "issued authentication request"
        );
        Ok((request, message))
    }

    /// Starts SP-initiated logout for the session described by `claims`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnsupportedBinding`](crate::SamlError) if the
    /// IdP has no logout endpoint, or an error from storing, encoding or
    /// signing.
    pub async fn new_logout_request(
        &self,
        claims: &ClaimsSet,
        return_to: Option<&str>,
    ) -> SamlResult<(LogoutRequest, OutboundMessage)> {
        let idp = self.trust.idp();
        let endpoint = idp.slo_endpoint()?;
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.request_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));

        let name_id =
            NameId::new(&claims.name_id).with_format_uri(claims.name_id_format.clone());
        let mut request = LogoutRequest::new(generate_message_id(), &self.config.entity_id, name_id)
            .with_destination(&endpoint.url)
            .with_reason(LogoutRequest::REASON_USER)
            .valid_until(now + ttl);
        if let Some(index) = &claims.session_index {
            request = request.with_session_index(index);
        }

        let relay_state = self
            .relay_state
            .encode(Some(&request.id), return_to.unwrap_or("/"), now)?;
        let message = self.deliver(
            &request.to_xml()?,
            &request.id,
            endpoint,
            Some(&relay_state),
            SamlMessageType::Request,
            true,
        )?;
        self.correlation.put(&request.id, self.config.request_ttl).await?;

        tracing::info!(
            request_id = %request.id,
            name_id = %claims.name_id,
            "issued logout request"
        );
        Ok((request, message))
    }

    /// Answers an IdP-initiated logout request.
    ///
    /// The IdP's RelayState is passed back unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the IdP has no logout endpoint or encoding or
    /// signing fails.
    pub fn new_logout_response(
        &self,
        in_response_to: &str,
        status: Status,
        relay_state: Option<&str>,
    ) -> SamlResult<(LogoutResponse, OutboundMessage)> {
        let idp = self.trust.idp();
        let endpoint = idp.slo_endpoint()?;
        let response = LogoutResponse::new(generate_message_id(), &self.config.entity_id, status)
            .in_response_to(in_response_to)
            .with_destination(&endpoint.url);
        let message = self.deliver(
            &response.to_xml()?,
            &response.id,
            endpoint,
            relay_state,
            SamlMessageType::Response,
            true,
        )?;
        Ok((response, message))
    }

    fn deliver(
        &self,
        xml: &str,
        id: &str,
        endpoint: &Endpoint,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        sign: bool,
    ) -> SamlResult<OutboundMessage> {
        match endpoint.binding {
            SamlBinding::HttpRedirect => {
                let signer = sign.then(|| self.signer.provider());
                Ok(OutboundMessage::Redirect(HttpRedirectBinding::encode(
                    xml,
                    &endpoint.url,
                    relay_state,
                    message_type,
                    signer,
                )?))
            }
            SamlBinding::HttpPost => {
                let xml = if sign {
                    self.signer.sign_enveloped(xml, id)?
                } else {
                    xml.to_string()
                };
                Ok(OutboundMessage::PostForm(HttpPostBinding::encode(
                    &xml,
                    &endpoint.url,
                    relay_state,
                    message_type,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use roxmltree::Document;
    use sp_cache::InMemoryCorrelationStore;

    use super::*;
    use crate::signature::XmlSignatureVerifier;
    use crate::trust::test_support::{credential, current, idp_trust};
    use crate::types::{is_element, SAMLP_NS};
    use sp_core::config::CertificateIdentifierType;

    struct Fixture {
        generator: RequestGenerator,
        trust: Arc<TrustStore>,
        correlation: Arc<InMemoryCorrelationStore>,
    }

    fn fixture(sso_binding: SamlBinding) -> Fixture {
        let (idp_cert, _) = current("idp.example.org");
        let mut idp = idp_trust(vec![idp_cert]);
        idp.sso.binding = sso_binding;
        idp.slo = Some(Endpoint::new("https://idp.example.org/slo", sso_binding));
        let trust = Arc::new(
            TrustStore::new(
                idp,
                credential("sp.example.org"),
                CertificateIdentifierType::SerialNumber,
                std::time::Duration::from_secs(120),
            )
            .unwrap(),
        );
        let config = Arc::new(ServiceProviderConfig::new(
            "https://sp.example.org",
            "https://sp.example.org",
        ));
        let correlation = Arc::new(InMemoryCorrelationStore::new());
        let codec = Arc::new(
            RelayStateCodec::new(&[1u8; 32], std::time::Duration::from_secs(300)).unwrap(),
        );
        Fixture {
            generator: RequestGenerator::new(config, Arc::clone(&trust), correlation.clone(), codec),
            trust,
            correlation,
        }
    }

    #[tokio::test]
    async fn redirect_authn_request_is_signed_and_recorded() {
        let f = fixture(SamlBinding::HttpRedirect);
        let (request, message) = f.generator.new_authn_request(None, Some("/home")).await.unwrap();

        assert!(request.id.starts_with('_'));
        assert_eq!(request.id.len(), 41);
        let OutboundMessage::Redirect(url) = message else {
            panic!("expected redirect");
        };
        assert!(url.starts_with("https://idp.example.org/sso?SAMLRequest="));

        let decoded = HttpRedirectBinding::decode_query(url.split_once('?').unwrap().1).unwrap();
        assert!(decoded.xml.contains(&request.id));
        let detached = decoded.detached_signature.unwrap();
        let sp_cert = Arc::clone(f.trust.signing_certificate().certificate());
        assert!(XmlSignatureVerifier::verify_detached(&detached, &[sp_cert]).is_ok());

        assert!(f.correlation.take_if_present(&request.id).await.unwrap());
    }

    #[tokio::test]
    async fn post_authn_request_carries_enveloped_signature() {
        let f = fixture(SamlBinding::HttpPost);
        let (request, message) = f.generator.new_authn_request(None, None).await.unwrap();
        let OutboundMessage::PostForm(html) = message else {
            panic!("expected form");
        };
        let needle = "name=\"SAMLRequest\" value=\"";
        let start = html.find(needle).unwrap() + needle.len();
        let end = start + html[start..].find('"').unwrap();
        let params = crate::bindings::SamlParams {
            saml_request: Some(html[start..end].to_string()),
            ..Default::default()
        };
        let xml = HttpPostBinding::decode(&params).unwrap().xml;
        let doc = Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert!(is_element(root, SAMLP_NS, "AuthnRequest"));
        let sp_cert = Arc::clone(f.trust.signing_certificate().certificate());
        let verified = XmlSignatureVerifier::verify(root, &[sp_cert]).unwrap();
        assert_eq!(verified.reference_id, request.id);
    }

    #[tokio::test]
    async fn logout_request_names_the_session() {
        let f = fixture(SamlBinding::HttpRedirect);
        let mut claims = ClaimsSet::new("user@example.org", "https://idp.example.org", "_a1");
        claims.session_index = Some("_s1".to_string());

        let (request, _) = f.generator.new_logout_request(&claims, None).await.unwrap();
        assert_eq!(request.name_id.value, "user@example.org");
        assert_eq!(request.session_indexes, vec!["_s1".to_string()]);
        assert_eq!(request.destination.as_deref(), Some("https://idp.example.org/slo"));
        assert!(f.correlation.take_if_present(&request.id).await.unwrap());
    }

    #[tokio::test]
    async fn logout_response_answers_request() {
        let f = fixture(SamlBinding::HttpRedirect);
        let (response, message) = f
            .generator
            .new_logout_response("_idp_req", Status::success(), Some("idp-state"))
            .unwrap();
        assert_eq!(response.in_response_to.as_deref(), Some("_idp_req"));
        let OutboundMessage::Redirect(url) = message else {
            panic!("expected redirect");
        };
        assert!(url.contains("SAMLResponse="));
        assert!(url.contains("RelayState=idp-state"));
        assert!(url.contains("Signature="));
    }
}

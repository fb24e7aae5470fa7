//! Inbound message validation.
//!
//! [`ResponseValidator::validate`] turns a `SAMLResponse` into a
//! [`ClaimsSet`] only after every check has passed:
//!
//! 1. structure: one `samlp:Response`, version 2.0, Success status, exactly
//!    one plain `saml:Assertion` in the whole document, no DTD
//! 2. issuer and signatures
//! 3. correlation with an outstanding request
//! 4. time window
//! 5. audience
//! 6. replay
//!
//! The first failing check decides the error. The correlation record is
//! only consumed once the replay insert has succeeded, so a resubmitted
//! response is reported as a replay and a losing racer cannot burn the
//! record of the winner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use sp_cache::{CorrelationStore, ReplayCache};
use sp_core::claims::ClaimsSet;
use sp_core::config::ServiceProviderConfig;

use crate::bindings::{DecodedMessage, HttpPostBinding, SamlParams};
use crate::error::{SamlError, SamlResult};
use crate::signature::{VerifiedSignature, XmlSignatureVerifier};
use crate::trust::TrustStore;
use crate::types::{
    child, is_element, Assertion, LogoutRequest, LogoutResponse, Response, SAML_NS,
};

/// Validates responses and logout messages from the trusted IdP.
pub struct ResponseValidator {
    config: Arc<ServiceProviderConfig>,
    trust: Arc<TrustStore>,
    replay: Arc<dyn ReplayCache>,
    correlation: Arc<dyn CorrelationStore>,
}

impl ResponseValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        config: Arc<ServiceProviderConfig>,
        trust: Arc<TrustStore>,
        replay: Arc<dyn ReplayCache>,
        correlation: Arc<dyn CorrelationStore>,
    ) -> Self {
        Self {
            config,
            trust,
            replay,
            correlation,
        }
    }

    /// Validates a base64 `SAMLResponse` form value.
    ///
    /// `expected_request_id` comes from the RelayState token, when one came
    /// back with the response.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing check.
    pub async fn validate(
        &self,
        raw_response: &str,
        expected_request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> SamlResult<ClaimsSet> {
        let params = SamlParams {
            saml_response: Some(raw_response.to_string()),
            ..SamlParams::default()
        };
        let xml = HttpPostBinding::decode(&params)
            .map_err(|e| SamlError::MalformedResponse(e.to_string()))?
            .xml;
        self.validate_xml(&xml, expected_request_id, now).await
    }

    /// Validates a decoded response document.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing check.
    pub async fn validate_xml(
        &self,
        xml: &str,
        expected_request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> SamlResult<ClaimsSet> {
        let result = self.check_response(xml, expected_request_id, now).await;
        match &result {
            Ok(claims) => tracing::info!(
                assertion_id = %claims.assertion_id,
                issuer = %claims.issuer,
                "response accepted"
            ),
            Err(e) => tracing::warn!(error.kind = e.kind(), error = %e, "response rejected"),
        }
        result
    }

    async fn check_response(
        &self,
        xml: &str,
        expected_request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> SamlResult<ClaimsSet> {
        let doc = Document::parse(xml)
            .map_err(|e| SamlError::MalformedResponse(format!("response is not XML: {e}")))?;
        let root = doc.root_element();
        let response = Response::from_node(root)?;
        if !response.is_success() {
            return Err(SamlError::ResponderStatus {
                status: response.status.status_code.value.clone(),
                sub_status: response.status.status_code.sub_status_value().map(str::to_string),
                message: response.status.status_message.clone(),
            });
        }
        let assertion_node = single_assertion(&doc, root)?;

        // Step 2: issuer and signatures.
        let idp = self.trust.idp();
        if let Some(issuer) = &response.issuer {
            check_issuer(&idp.entity_id, issuer)?;
        }
        let assertion = Assertion::from_node(assertion_node)?;
        check_issuer(&idp.entity_id, &assertion.issuer)?;
        self.check_signatures(root, assertion_node, &assertion.issuer, now)?;

        if let Some(destination) = &response.destination {
            if destination != &self.config.assertion_consumer_service_url {
                return Err(SamlError::MalformedResponse(format!(
                    "response destination {destination} is not this SP"
                )));
            }
        }
        self.check_bearer(&assertion)?;

        // Step 3: correlation.
        let in_response_to = match (response.in_response_to.as_deref(), assertion.in_response_to()) {
            (Some(outer), Some(inner)) if outer != inner => {
                return Err(SamlError::CorrelationMismatch(
                    "response and assertion answer different requests".to_string(),
                ))
            }
            (outer, inner) => outer.or(inner),
        };
        let correlation_id = self.correlation_id(in_response_to, expected_request_id)?;

        // Steps 4 and 5.
        assertion.check_time(now, self.trust.clock_skew())?;
        assertion.check_audience(&self.config.entity_id)?;

        // Step 6: replay, remembered until the assertion could no longer be
        // accepted anyway.
        let expires_at = assertion.not_on_or_after().ok_or_else(|| {
            SamlError::MalformedResponse("assertion has no NotOnOrAfter".to_string())
        })? + self.trust.clock_skew();
        if !self.replay.insert_if_absent(&assertion.id, expires_at).await? {
            return Err(SamlError::ReplayDetected(assertion.id));
        }
        if let Some(request_id) = correlation_id {
            self.take_correlation(request_id).await?;
        }

        claims_from(assertion)
    }

    /// Verifies the Response and Assertion signatures.
    ///
    /// The assertion must be covered by a verified signature: its own, or,
    /// unless assertions are required to be signed, the Response's. Any
    /// signature that is present must verify.
    fn check_signatures(
        &self,
        response: Node<'_, '_>,
        assertion: Node<'_, '_>,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        let response_signed = XmlSignatureVerifier::signature_node(response)?.is_some();
        let assertion_signed = XmlSignatureVerifier::signature_node(assertion)?.is_some();

        if self.config.want_assertions_signed && !assertion_signed {
            return Err(SamlError::SignatureInvalid("assertion is not signed".to_string()));
        }
        if !response_signed && !assertion_signed {
            return Err(SamlError::SignatureInvalid(
                "neither response nor assertion is signed".to_string(),
            ));
        }

        if response_signed {
            let verified = self.verify_enveloped(response, issuer, now)?;
            tracing::debug!(reference = %verified.reference_id, "response signature verified");
        }
        if assertion_signed {
            let verified = self.verify_enveloped(assertion, issuer, now)?;
            tracing::debug!(reference = %verified.reference_id, "assertion signature verified");
        }
        Ok(())
    }

    fn verify_enveloped(
        &self,
        element: Node<'_, '_>,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<VerifiedSignature> {
        let embedded = XmlSignatureVerifier::signature_node(element)?
            .map(XmlSignatureVerifier::embedded_certificate)
            .transpose()?
            .flatten();
        let candidates = self
            .trust
            .verification_candidates(issuer, embedded.as_deref(), now)?;
        XmlSignatureVerifier::verify(element, &candidates)
    }

    /// Bearer confirmations must exist, carry an expiry and name this SP
    /// as recipient when they name one at all.
    fn check_bearer(&self, assertion: &Assertion) -> SamlResult<()> {
        let mut confirmations = assertion.bearer_confirmations().peekable();
        if confirmations.peek().is_none() {
            return Err(SamlError::MalformedResponse(
                "assertion has no bearer subject confirmation".to_string(),
            ));
        }
        for data in confirmations {
            if data.not_on_or_after.is_none() {
                return Err(SamlError::MalformedResponse(
                    "bearer subject confirmation has no NotOnOrAfter".to_string(),
                ));
            }
            if let Some(recipient) = &data.recipient {
                if recipient != &self.config.assertion_consumer_service_url {
                    return Err(SamlError::MalformedResponse(format!(
                        "bearer recipient {recipient} is not this SP"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Decides which outstanding request a response answers, without
    /// consuming it. `None` means an accepted unsolicited response.
    fn correlation_id<'a>(
        &self,
        in_response_to: Option<&'a str>,
        expected_request_id: Option<&'a str>,
    ) -> SamlResult<Option<&'a str>> {
        match (in_response_to, expected_request_id) {
            (Some(actual), Some(expected)) if actual != expected => {
                Err(SamlError::CorrelationMismatch(format!(
                    "response answers {actual}, expected {expected}"
                )))
            }
            (Some(id), _) => Ok(Some(id)),
            (None, Some(expected)) => Err(SamlError::CorrelationMismatch(format!(
                "response does not answer {expected}"
            ))),
            (None, None) if self.config.allow_unsolicited => {
                tracing::debug!("accepting unsolicited response");
                Ok(None)
            }
            (None, None) => Err(SamlError::CorrelationMismatch(
                "unsolicited responses are not accepted".to_string(),
            )),
        }
    }

    async fn take_correlation(&self, request_id: &str) -> SamlResult<()> {
        if self.correlation.take_if_present(request_id).await? {
            Ok(())
        } else {
            Err(SamlError::CorrelationMismatch(format!(
                "request {request_id} is unknown, expired or already answered"
            )))
        }
    }

    /// Validates a LogoutResponse answering `expected_request_id`.
    ///
    /// The message must carry a detached (Redirect) or enveloped (POST)
    /// signature from the IdP.
    ///
    /// # Errors
    ///
    /// Returns an error on a bad structure, issuer, signature or
    /// correlation, and [`SamlError::ResponderStatus`] if the IdP reports
    /// failure.
    pub async fn validate_logout_response(
        &self,
        message: &DecodedMessage,
        expected_request_id: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutResponse> {
        let doc = Document::parse(&message.xml)?;
        let root = doc.root_element();
        let response = LogoutResponse::from_node(root)?;
        check_issuer(&self.trust.idp().entity_id, &response.issuer)?;
        self.verify_message(message, root, &response.issuer, now)?;
        self.check_logout_destination(response.destination.as_deref())?;

        if response.in_response_to.as_deref() != Some(expected_request_id) {
            return Err(SamlError::CorrelationMismatch(format!(
                "logout response does not answer {expected_request_id}"
            )));
        }
        self.take_correlation(expected_request_id).await?;

        if !response.is_success() {
            return Err(SamlError::ResponderStatus {
                status: response.status.status_code.value.clone(),
                sub_status: response.status.status_code.sub_status_value().map(str::to_string),
                message: response.status.status_message.clone(),
            });
        }
        Ok(response)
    }

    /// Validates an IdP-initiated LogoutRequest.
    ///
    /// # Errors
    ///
    /// Returns an error on a bad structure, issuer or signature, if the
    /// request has expired, or if its ID was seen before.
    pub async fn validate_logout_request(
        &self,
        message: &DecodedMessage,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutRequest> {
        let doc = Document::parse(&message.xml)?;
        let root = doc.root_element();
        let request = LogoutRequest::from_node(root)?;
        check_issuer(&self.trust.idp().entity_id, &request.issuer)?;
        self.verify_message(message, root, &request.issuer, now)?;
        self.check_logout_destination(request.destination.as_deref())?;

        let skew = self.trust.clock_skew();
        if request.is_expired_at(now - skew) {
            return Err(SamlError::ExpiredAssertion);
        }
        let expires_at = request.not_on_or_after.unwrap_or_else(|| {
            now + chrono::Duration::from_std(self.config.request_ttl)
                .unwrap_or_else(|_| chrono::Duration::minutes(5))
        }) + skew;
        if !self.replay.insert_if_absent(&request.id, expires_at).await? {
            return Err(SamlError::ReplayDetected(request.id));
        }
        Ok(request)
    }

    fn verify_message(
        &self,
        message: &DecodedMessage,
        root: Node<'_, '_>,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        match &message.detached_signature {
            Some(detached) => {
                let candidates = self.trust.verification_candidates(issuer, None, now)?;
                XmlSignatureVerifier::verify_detached(detached, &candidates)?;
            }
            None => {
                if XmlSignatureVerifier::signature_node(root)?.is_none() {
                    return Err(SamlError::SignatureInvalid(format!(
                        "{} is not signed",
                        root.tag_name().name()
                    )));
                }
                self.verify_enveloped(root, issuer, now)?;
            }
        }
        Ok(())
    }

    fn check_logout_destination(&self, destination: Option<&str>) -> SamlResult<()> {
        match destination {
            Some(url) if url != self.config.single_logout_url => Err(SamlError::InvalidRequest(
                format!("logout destination {url} is not this SP"),
            )),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("entity_id", &self.config.entity_id)
            .finish_non_exhaustive()
    }
}

fn check_issuer(expected: &str, actual: &str) -> SamlResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SamlError::IssuerMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// The response's only assertion.
///
/// Any other `Assertion` or `EncryptedAssertion` anywhere in the document
/// rejects the response, so a wrapped copy can never be read.
fn single_assertion<'a, 'i>(
    doc: &'a Document<'i>,
    root: Node<'a, 'i>,
) -> SamlResult<Node<'a, 'i>> {
    if doc
        .descendants()
        .any(|n| is_element(n, SAML_NS, "EncryptedAssertion"))
    {
        return Err(SamlError::MalformedResponse(
            "encrypted assertions are not supported".to_string(),
        ));
    }
    let total = doc
        .descendants()
        .filter(|n| is_element(*n, SAML_NS, "Assertion"))
        .count();
    if total != 1 {
        return Err(SamlError::MalformedResponse(format!(
            "expected exactly one assertion, found {total}"
        )));
    }
    child(root, SAML_NS, "Assertion").ok_or_else(|| {
        SamlError::MalformedResponse("assertion is not a child of the response".to_string())
    })
}

fn claims_from(assertion: Assertion) -> SamlResult<ClaimsSet> {
    let name_id = assertion
        .subject
        .name_id
        .ok_or_else(|| SamlError::MalformedResponse("assertion has no NameID".to_string()))?;

    let mut claims = ClaimsSet::new(name_id.value, assertion.issuer, assertion.id);
    claims.name_id_format = name_id.format;
    if let Some(statement) = assertion.authn_statement {
        claims.session_index = statement.session_index;
        claims.authn_instant = Some(statement.authn_instant);
    }
    for attribute in assertion.attributes {
        for value in attribute.values {
            claims.add_attribute(attribute.name.clone(), value);
        }
    }
    Ok(claims)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};

    use crate::signature::XmlSigner;
    use crate::trust::SigningCredential;
    use crate::types::format_instant;

    /// Builds IdP responses for tests.
    #[derive(Debug, Clone)]
    pub(crate) struct ResponseFixture {
        pub(crate) response_id: String,
        pub(crate) assertion_id: String,
        pub(crate) issuer: String,
        pub(crate) in_response_to: Option<String>,
        pub(crate) destination: String,
        pub(crate) audience: String,
        pub(crate) name_id: String,
        pub(crate) not_before: DateTime<Utc>,
        pub(crate) not_on_or_after: DateTime<Utc>,
        pub(crate) status: String,
    }

    impl ResponseFixture {
        pub(crate) fn new(in_response_to: Option<&str>) -> Self {
            let now = Utc::now();
            Self {
                response_id: sp_crypto::generate_message_id(),
                assertion_id: sp_crypto::generate_message_id(),
                issuer: "https://idp.example.org".to_string(),
                in_response_to: in_response_to.map(str::to_string),
                destination: "https://sp.example.org/saml/acs".to_string(),
                audience: "https://sp.example.org".to_string(),
                name_id: "user@example.org".to_string(),
                not_before: now - chrono::Duration::minutes(1),
                not_on_or_after: now + chrono::Duration::minutes(5),
                status: crate::types::status_codes::SUCCESS.to_string(),
            }
        }

        pub(crate) fn assertion_xml(&self) -> String {
            let irt = self
                .in_response_to
                .as_ref()
                .map(|id| format!(r#" InResponseTo="{id}""#))
                .unwrap_or_default();
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
                    r#"<saml:AuthnStatement AuthnInstant="{now}" SessionIndex="_session1">"#,
                    r#"<saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</saml:AuthnContextClassRef></saml:AuthnContext>"#,
                    r#"</saml:AuthnStatement>"#,
                    r#"<saml:AttributeStatement>"#,
                    r#"<saml:Attribute Name="groups"><saml:AttributeValue>staff</saml:AttributeValue><saml:AttributeValue>admins</saml:AttributeValue></saml:Attribute>"#,
                    r#"</saml:AttributeStatement>"#,
                    r#"</saml:Assertion>"#,
                ),
                id = self.assertion_id,
                now = format_instant(Utc::now()),
                issuer = self.issuer,
                name_id = self.name_id,
                irt = irt,
                noa = format_instant(self.not_on_or_after),
                nb = format_instant(self.not_before),
                acs = self.destination,
                audience = self.audience,
            )
        }

        /// The response around `assertion`.
        pub(crate) fn response_xml(&self, assertion: &str) -> String {
            let irt = self
                .in_response_to
                .as_ref()
                .map(|id| format!(r#" InResponseTo="{id}""#))
                .unwrap_or_default();
            format!(
                concat!(
                    r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0" IssueInstant="{now}" Destination="{acs}"{irt}>"#,
                    r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                    r#"<samlp:Status><samlp:StatusCode Value="{status}"/></samlp:Status>"#,
                    "{assertion}",
                    r#"</samlp:Response>"#,
                ),
                id = self.response_id,
                now = format_instant(Utc::now()),
                acs = self.destination,
                irt = irt,
                issuer = self.issuer,
                status = self.status,
                assertion = assertion,
            )
        }

        /// Response with a signed assertion.
        pub(crate) fn signed(&self, idp: &SigningCredential) -> String {
            let xml = self.response_xml(&self.assertion_xml());
            XmlSigner::new(idp.clone())
                .sign_enveloped(&xml, &self.assertion_id)
                .unwrap()
        }

        /// Response with both the assertion and the response signed.
        pub(crate) fn fully_signed(&self, idp: &SigningCredential) -> String {
            let signer = XmlSigner::new(idp.clone());
            let xml = self.signed(idp);
            signer.sign_enveloped(&xml, &self.response_id).unwrap()
        }

        pub(crate) fn unsigned(&self) -> String {
            self.response_xml(&self.assertion_xml())
        }
    }
}

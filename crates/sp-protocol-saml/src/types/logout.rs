//! SAML Logout types.
//!
//! Single Logout (SLO) request and response messages, both directions.

use chrono::{DateTime, Utc};
use quick_xml::events::BytesStart;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use super::{
    child, child_text, children, format_instant, instant_attribute, is_element, NameId, Status,
    XmlWriter, SAMLP_NS, SAML_NS, SAML_VERSION,
};
use crate::error::{SamlError, SamlResult};

/// SAML Logout Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the requester.
    pub issuer: String,

    /// The URL where this request was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The name identifier of the principal to log out.
    pub name_id: NameId,

    /// Session indexes to terminate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,

    /// Reason for the logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Time after which the request is no longer valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl LogoutRequest {
    /// User logout reason.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Creates a new logout request.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: impl Into<String>, name_id: NameId) -> Self {
        Self {
            id: id.into(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            name_id,
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
        }
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a session index to terminate.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the logout reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the time after which the request is no longer valid.
    #[must_use]
    pub const fn valid_until(mut self, not_on_or_after: DateTime<Utc>) -> Self {
        self.not_on_or_after = Some(not_on_or_after);
        self
    }

    /// Returns true if the request is no longer valid at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.not_on_or_after.is_some_and(|not_after| now >= not_after)
    }

    /// Serializes the request without a signature.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn to_xml(&self) -> SamlResult<String> {
        let issue_instant = format_instant(self.issue_instant);
        let not_on_or_after = self.not_on_or_after.map(format_instant);

        let mut root = BytesStart::new("samlp:LogoutRequest");
        root.push_attribute(("xmlns:samlp", SAMLP_NS));
        root.push_attribute(("xmlns:saml", SAML_NS));
        root.push_attribute(("ID", self.id.as_str()));
        root.push_attribute(("Version", SAML_VERSION));
        root.push_attribute(("IssueInstant", issue_instant.as_str()));
        if let Some(destination) = &self.destination {
            root.push_attribute(("Destination", destination.as_str()));
        }
        if let Some(reason) = &self.reason {
            root.push_attribute(("Reason", reason.as_str()));
        }
        if let Some(not_on_or_after) = &not_on_or_after {
            root.push_attribute(("NotOnOrAfter", not_on_or_after.as_str()));
        }

        let mut writer = XmlWriter::new();
        writer.start(root)?;
        writer.text_element("saml:Issuer", &[], &self.issuer)?;
        self.name_id.write(&mut writer)?;
        for index in &self.session_indexes {
            writer.text_element("samlp:SessionIndex", &[], index)?;
        }
        writer.end("samlp:LogoutRequest")?;
        writer.into_string()
    }

    /// Reads a `samlp:LogoutRequest` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] if required parts are missing.
    pub fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        if !is_element(node, SAMLP_NS, "LogoutRequest") {
            return Err(SamlError::InvalidRequest(format!(
                "expected LogoutRequest, got {}",
                node.tag_name().name()
            )));
        }
        require_version(node)?;

        let id = node
            .attribute("ID")
            .ok_or_else(|| SamlError::InvalidRequest("LogoutRequest has no ID".to_string()))?;
        let issue_instant = instant_attribute(node, "IssueInstant")?
            .ok_or_else(|| SamlError::InvalidRequest("LogoutRequest has no IssueInstant".to_string()))?;
        let issuer = child_text(node, SAML_NS, "Issuer")
            .ok_or_else(|| SamlError::InvalidRequest("LogoutRequest has no Issuer".to_string()))?;
        let name_id = child(node, SAML_NS, "NameID")
            .map(NameId::from_node)
            .ok_or_else(|| SamlError::InvalidRequest("LogoutRequest has no NameID".to_string()))?;

        Ok(Self {
            id: id.to_string(),
            issue_instant,
            issuer,
            destination: node.attribute("Destination").map(str::to_string),
            name_id,
            session_indexes: children(node, SAMLP_NS, "SessionIndex")
                .map(super::text_of)
                .collect(),
            reason: node.attribute("Reason").map(str::to_string),
            not_on_or_after: instant_attribute(node, "NotOnOrAfter")?,
        })
    }
}

/// SAML Logout Response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Unique identifier for this response.
    pub id: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the responder.
    pub issuer: String,

    /// The ID of the request this response is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,
}

impl LogoutResponse {
    /// Creates a new logout response with the given status.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            in_response_to: None,
            destination: None,
            status,
        }
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serializes the response without a signature.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn to_xml(&self) -> SamlResult<String> {
        let issue_instant = format_instant(self.issue_instant);

        let mut root = BytesStart::new("samlp:LogoutResponse");
        root.push_attribute(("xmlns:samlp", SAMLP_NS));
        root.push_attribute(("xmlns:saml", SAML_NS));
        root.push_attribute(("ID", self.id.as_str()));
        root.push_attribute(("Version", SAML_VERSION));
        root.push_attribute(("IssueInstant", issue_instant.as_str()));
        if let Some(destination) = &self.destination {
            root.push_attribute(("Destination", destination.as_str()));
        }
        if let Some(in_response_to) = &self.in_response_to {
            root.push_attribute(("InResponseTo", in_response_to.as_str()));
        }

        let mut writer = XmlWriter::new();
        writer.start(root)?;
        writer.text_element("saml:Issuer", &[], &self.issuer)?;
        self.status.write(&mut writer)?;
        writer.end("samlp:LogoutResponse")?;
        writer.into_string()
    }

    /// Reads a `samlp:LogoutResponse` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] if required parts are missing.
    pub fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        if !is_element(node, SAMLP_NS, "LogoutResponse") {
            return Err(SamlError::InvalidRequest(format!(
                "expected LogoutResponse, got {}",
                node.tag_name().name()
            )));
        }
        require_version(node)?;

        let id = node
            .attribute("ID")
            .ok_or_else(|| SamlError::InvalidRequest("LogoutResponse has no ID".to_string()))?;
        let issue_instant = instant_attribute(node, "IssueInstant")?.ok_or_else(|| {
            SamlError::InvalidRequest("LogoutResponse has no IssueInstant".to_string())
        })?;
        let issuer = child_text(node, SAML_NS, "Issuer")
            .ok_or_else(|| SamlError::InvalidRequest("LogoutResponse has no Issuer".to_string()))?;
        let status = child(node, SAMLP_NS, "Status")
            .and_then(Status::from_node)
            .ok_or_else(|| SamlError::InvalidRequest("LogoutResponse has no Status".to_string()))?;

        Ok(Self {
            id: id.to_string(),
            issue_instant,
            issuer,
            in_response_to: node.attribute("InResponseTo").map(str::to_string),
            destination: node.attribute("Destination").map(str::to_string),
            status,
        })
    }
}

fn require_version(node: Node<'_, '_>) -> SamlResult<()> {
    match node.attribute("Version") {
        Some(SAML_VERSION) => Ok(()),
        other => Err(SamlError::InvalidRequest(format!(
            "unsupported SAML version: {}",
            other.unwrap_or("none")
        ))),
    }
}

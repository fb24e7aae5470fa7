//! SAML Response types.
//!
//! Envelope of a `samlp:Response` sent by the identity provider. The
//! assertion is read separately, after the signature that covers it has
//! been verified.

use chrono::{DateTime, Utc};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use super::{child, child_text, instant_attribute, is_element, Status, SAMLP_NS, SAML_NS, SAML_VERSION};
use crate::error::{SamlError, SamlResult};

/// SAML Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the identity provider, when the envelope names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// The ID of the request this response is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,
}

impl Response {
    /// Reads the envelope of a `samlp:Response` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MalformedResponse`] if the element is not a
    /// version 2.0 response or lacks an ID, IssueInstant or Status.
    pub fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        if !is_element(node, SAMLP_NS, "Response") {
            return Err(SamlError::MalformedResponse(format!(
                "root element is {}, not samlp:Response",
                node.tag_name().name()
            )));
        }
        if node.attribute("Version") != Some(SAML_VERSION) {
            return Err(SamlError::MalformedResponse(
                "response version is not 2.0".to_string(),
            ));
        }

        let id = node
            .attribute("ID")
            .ok_or_else(|| SamlError::MalformedResponse("response has no ID".to_string()))?;
        let issue_instant = instant_attribute(node, "IssueInstant")?.ok_or_else(|| {
            SamlError::MalformedResponse("response has no IssueInstant".to_string())
        })?;
        let status = child(node, SAMLP_NS, "Status")
            .and_then(Status::from_node)
            .ok_or_else(|| SamlError::MalformedResponse("response has no Status".to_string()))?;

        Ok(Self {
            id: id.to_string(),
            issue_instant,
            issuer: child_text(node, SAML_NS, "Issuer"),
            in_response_to: node.attribute("InResponseTo").map(str::to_string),
            destination: node.attribute("Destination").map(str::to_string),
            status,
        })
    }

    /// Returns true if the top-level status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

//! SAML Status types.
//!
//! Status information carried by `samlp:Response` and `samlp:LogoutResponse`.

use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};

use super::{status_codes, sub_status_codes, XmlWriter};
use crate::error::SamlResult;

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::success(),
            status_message: None,
        }
    }

    /// Creates a requester error status.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::requester(),
            status_message: Some(message.into()),
        }
    }

    /// Creates a responder error status.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::responder(),
            status_message: Some(message.into()),
        }
    }

    /// Creates a partial logout status: success at the top level with a
    /// `PartialLogout` sub-status.
    #[must_use]
    pub fn partial_logout() -> Self {
        Self {
            status_code: StatusCode::success()
                .with_sub_status(StatusCode::new(sub_status_codes::PARTIAL_LOGOUT)),
            status_message: Some("Some sessions could not be terminated".to_string()),
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Sets the status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    /// Reads a `samlp:Status` element.
    #[must_use]
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Option<Self> {
        let code = super::child(node, super::SAMLP_NS, "StatusCode")?;
        Some(Self {
            status_code: StatusCode::from_node(code)?,
            status_message: super::child_text(node, super::SAMLP_NS, "StatusMessage"),
        })
    }

    pub(crate) fn write(&self, writer: &mut XmlWriter) -> SamlResult<()> {
        writer.start(BytesStart::new("samlp:Status"))?;
        self.status_code.write(writer)?;
        if let Some(message) = &self.status_message {
            writer.text_element("samlp:StatusMessage", &[], message)?;
        }
        writer.end("samlp:Status")
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code.
///
/// Status codes can be nested, with a top-level code and optional sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Creates a success status code.
    #[must_use]
    pub fn success() -> Self {
        Self::new(status_codes::SUCCESS)
    }

    /// Creates a requester error status code.
    #[must_use]
    pub fn requester() -> Self {
        Self::new(status_codes::REQUESTER)
    }

    /// Creates a responder error status code.
    #[must_use]
    pub fn responder() -> Self {
        Self::new(status_codes::RESPONDER)
    }

    /// Adds a sub-status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: StatusCode) -> Self {
        self.status_code = Some(Box::new(sub));
        self
    }

    /// Returns true if this is a success status code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the sub-status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }

    fn write(&self, writer: &mut XmlWriter) -> SamlResult<()> {
        let mut start = BytesStart::new("samlp:StatusCode");
        start.push_attribute(("Value", self.value.as_str()));
        match &self.status_code {
            Some(nested) => {
                writer.start(start)?;
                nested.write(writer)?;
                writer.end("samlp:StatusCode")
            }
            None => writer.empty(start),
        }
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Option<Self> {
        let value = node.attribute("Value")?;
        let nested = super::child(node, super::SAMLP_NS, "StatusCode").and_then(Self::from_node);
        Some(Self {
            value: value.to_string(),
            status_code: nested.map(Box::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_success() {
        let status = Status::success();
        assert!(status.is_success());
        assert!(status.status_message.is_none());
    }

    #[test]
    fn partial_logout_is_success_with_sub_status() {
        let status = Status::partial_logout();
        assert!(status.is_success());
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::PARTIAL_LOGOUT)
        );
    }

    #[test]
    fn parses_nested_status() {
        let xml = r#"<samlp:Status xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">
            <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Responder">
                <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:AuthnFailed"/>
            </samlp:StatusCode>
            <samlp:StatusMessage>bad password</samlp:StatusMessage>
        </samlp:Status>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let status = Status::from_node(doc.root_element()).unwrap();

        assert!(!status.is_success());
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::AUTHN_FAILED)
        );
        assert_eq!(status.status_message.as_deref(), Some("bad password"));
    }
}

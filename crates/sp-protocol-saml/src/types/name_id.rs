//! SAML Name ID types.
//!
//! Name identifiers are used to identify subjects in SAML assertions and
//! logout requests.

use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};

use super::{text_of, NameIdFormat, XmlWriter};
use crate::error::SamlResult;

/// SAML Name ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
        }
    }

    /// Creates a new email name ID.
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self::new(email).with_format(NameIdFormat::Email)
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the format URI verbatim.
    #[must_use]
    pub fn with_format_uri(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Reads a `saml:NameID` element.
    #[must_use]
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        Self {
            value: text_of(node),
            format: node.attribute("Format").map(str::to_string),
            name_qualifier: node.attribute("NameQualifier").map(str::to_string),
            sp_name_qualifier: node.attribute("SPNameQualifier").map(str::to_string),
        }
    }

    pub(crate) fn write(&self, writer: &mut XmlWriter) -> SamlResult<()> {
        let mut attributes = Vec::new();
        if let Some(format) = &self.format {
            attributes.push(("Format", format.as_str()));
        }
        if let Some(qualifier) = &self.name_qualifier {
            attributes.push(("NameQualifier", qualifier.as_str()));
        }
        if let Some(qualifier) = &self.sp_name_qualifier {
            attributes.push(("SPNameQualifier", qualifier.as_str()));
        }
        writer.text_element("saml:NameID", &attributes, &self.value)
    }
}

/// Name ID policy for authentication requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// The requested name ID format.
    pub format: NameIdFormat,

    /// Whether the IdP may create a new identifier.
    pub allow_create: bool,
}

impl Default for NameIdPolicy {
    fn default() -> Self {
        Self {
            format: NameIdFormat::Unspecified,
            allow_create: true,
        }
    }
}

impl NameIdPolicy {
    pub(crate) fn write(&self, writer: &mut XmlWriter) -> SamlResult<()> {
        let mut start = BytesStart::new("samlp:NameIDPolicy");
        start.push_attribute(("Format", self.format.uri()));
        start.push_attribute(("AllowCreate", if self.allow_create { "true" } else { "false" }));
        writer.empty(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_name_id() {
        let name_id = NameId::email("user@example.org");
        assert_eq!(name_id.parsed_format(), NameIdFormat::Email);
    }

    #[test]
    fn reads_qualifiers() {
        let xml = r#"<saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
            Format="urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"
            SPNameQualifier="https://sp.example.org"> abc123 </saml:NameID>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let name_id = NameId::from_node(doc.root_element());

        assert_eq!(name_id.value, "abc123");
        assert_eq!(name_id.parsed_format(), NameIdFormat::Persistent);
        assert_eq!(
            name_id.sp_name_qualifier.as_deref(),
            Some("https://sp.example.org")
        );
    }

    #[test]
    fn writes_name_id() {
        let mut writer = XmlWriter::new();
        NameId::email("a&b@example.org").write(&mut writer).unwrap();
        let xml = writer.into_string().unwrap();
        assert_eq!(
            xml,
            "<saml:NameID Format=\"urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress\">a&amp;b@example.org</saml:NameID>"
        );
    }
}

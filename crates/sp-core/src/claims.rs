//! Claims extracted from a validated assertion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity claims established by a validated assertion.
///
/// Attributes keep the order in which the IdP sent them, and so do the values
/// of each attribute. The caller owns the set after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsSet {
    /// Subject `NameID` value.
    pub name_id: String,
    /// Subject `NameID` format, when sent.
    pub name_id_format: Option<String>,
    /// `SessionIndex` from the authentication statement.
    pub session_index: Option<String>,
    /// Entity ID of the asserting IdP.
    pub issuer: String,
    /// `AuthnInstant` from the authentication statement.
    pub authn_instant: Option<DateTime<Utc>>,
    /// Assertion ID the claims were extracted from.
    pub assertion_id: String,
    attributes: Vec<(String, Vec<String>)>,
}

impl ClaimsSet {
    /// Creates a claims set with no attributes.
    #[must_use]
    pub fn new(
        name_id: impl Into<String>,
        issuer: impl Into<String>,
        assertion_id: impl Into<String>,
    ) -> Self {
        Self {
            name_id: name_id.into(),
            name_id_format: None,
            session_index: None,
            issuer: issuer.into(),
            authn_instant: None,
            assertion_id: assertion_id.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends a value to an attribute, creating the attribute if needed.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.attributes.push((name, vec![value])),
        }
    }

    /// Returns all values of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the first value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Iterates attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_keep_order_and_merge_values() {
        let mut claims = ClaimsSet::new("user@example.org", "https://idp.example.org", "_a1");
        claims.add_attribute("role", "admin");
        claims.add_attribute("mail", "user@example.org");
        claims.add_attribute("role", "auditor");

        let names: Vec<&str> = claims.attributes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["role", "mail"]);
        assert_eq!(
            claims.attribute("role"),
            Some(&["admin".to_string(), "auditor".to_string()][..])
        );
        assert_eq!(claims.first("mail"), Some("user@example.org"));
        assert_eq!(claims.first("missing"), None);
    }
}

//! SAML Assertion types.
//!
//! Owned view of a `saml:Assertion` received from the identity provider.
//! Only the parts the service provider acts on are kept.

use chrono::{DateTime, Duration, Utc};
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use super::{
    child, child_text, children, instant_attribute, text_of, NameId, BEARER_CONFIRMATION,
    SAML_NS, SAML_VERSION,
};
use crate::error::{SamlError, SamlResult};

/// SAML Assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the issuer.
    pub issuer: String,

    /// The subject of this assertion.
    pub subject: Subject,

    /// Conditions under which this assertion is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_statement: Option<AuthnStatement>,

    /// Attributes from every attribute statement, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl Assertion {
    /// Reads a `saml:Assertion` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MalformedResponse`] if required parts are missing
    /// or timestamps do not parse.
    pub fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        if node.attribute("Version") != Some(SAML_VERSION) {
            return Err(SamlError::MalformedResponse(
                "assertion version is not 2.0".to_string(),
            ));
        }
        let id = node
            .attribute("ID")
            .ok_or_else(|| SamlError::MalformedResponse("assertion has no ID".to_string()))?;
        let issue_instant = instant_attribute(node, "IssueInstant")?.ok_or_else(|| {
            SamlError::MalformedResponse("assertion has no IssueInstant".to_string())
        })?;
        let issuer = child_text(node, SAML_NS, "Issuer")
            .ok_or_else(|| SamlError::MalformedResponse("assertion has no Issuer".to_string()))?;
        let subject = child(node, SAML_NS, "Subject")
            .map(Subject::from_node)
            .transpose()?
            .ok_or_else(|| SamlError::MalformedResponse("assertion has no Subject".to_string()))?;
        let conditions = child(node, SAML_NS, "Conditions")
            .map(Conditions::from_node)
            .transpose()?;
        let authn_statement = child(node, SAML_NS, "AuthnStatement")
            .map(AuthnStatement::from_node)
            .transpose()?;
        let attributes = children(node, SAML_NS, "AttributeStatement")
            .flat_map(|statement| children(statement, SAML_NS, "Attribute"))
            .filter_map(Attribute::from_node)
            .collect();

        Ok(Self {
            id: id.to_string(),
            issue_instant,
            issuer,
            subject,
            conditions,
            authn_statement,
            attributes,
        })
    }

    /// Bearer subject confirmations.
    pub fn bearer_confirmations(&self) -> impl Iterator<Item = &SubjectConfirmationData> {
        self.subject
            .subject_confirmations
            .iter()
            .filter(|c| c.method == BEARER_CONFIRMATION)
            .filter_map(|c| c.subject_confirmation_data.as_ref())
    }

    /// `InResponseTo` carried by the bearer confirmation, if any.
    #[must_use]
    pub fn in_response_to(&self) -> Option<&str> {
        self.bearer_confirmations()
            .find_map(|data| data.in_response_to.as_deref())
    }

    /// Instant after which the assertion must no longer be accepted.
    ///
    /// The `Conditions` bound wins; the bearer confirmation bound is the
    /// fallback when no `Conditions/@NotOnOrAfter` was sent.
    #[must_use]
    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.conditions
            .as_ref()
            .and_then(|c| c.not_on_or_after)
            .or_else(|| self.bearer_confirmations().find_map(|d| d.not_on_or_after))
    }

    /// Checks the temporal bounds of `Conditions` and every bearer
    /// confirmation at `now`, allowing `skew` on both ends.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::NotYetValid`] or [`SamlError::ExpiredAssertion`].
    pub fn check_time(&self, now: DateTime<Utc>, skew: Duration) -> SamlResult<()> {
        let windows = self
            .conditions
            .iter()
            .map(|c| (c.not_before, c.not_on_or_after))
            .chain(self.bearer_confirmations().map(|d| (d.not_before, d.not_on_or_after)));

        for (not_before, not_on_or_after) in windows {
            if let Some(not_before) = not_before {
                if now < not_before - skew {
                    return Err(SamlError::NotYetValid);
                }
            }
            if let Some(not_on_or_after) = not_on_or_after {
                if now >= not_on_or_after + skew {
                    return Err(SamlError::ExpiredAssertion);
                }
            }
        }
        Ok(())
    }

    /// Checks that every audience restriction admits `audience`.
    ///
    /// An assertion without any audience restriction is not accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::AudienceMismatch`].
    pub fn check_audience(&self, audience: &str) -> SamlResult<()> {
        let restrictions = self
            .conditions
            .as_ref()
            .map(|c| c.audience_restrictions.as_slice())
            .unwrap_or_default();

        let admitted = !restrictions.is_empty()
            && restrictions
                .iter()
                .all(|r| r.audiences.iter().any(|a| a == audience));
        if admitted {
            Ok(())
        } else {
            Err(SamlError::AudienceMismatch {
                expected: audience.to_string(),
            })
        }
    }
}

/// Subject of an assertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Subject confirmation methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        let subject_confirmations = children(node, SAML_NS, "SubjectConfirmation")
            .map(SubjectConfirmation::from_node)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self {
            name_id: child(node, SAML_NS, "NameID").map(NameId::from_node),
            subject_confirmations,
        })
    }
}

/// Subject confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method URI.
    pub method: String,

    /// Additional confirmation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_confirmation_data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        let method = node.attribute("Method").ok_or_else(|| {
            SamlError::MalformedResponse("SubjectConfirmation has no Method".to_string())
        })?;
        let data = child(node, SAML_NS, "SubjectConfirmationData")
            .map(SubjectConfirmationData::from_node)
            .transpose()?;
        Ok(Self {
            method: method.to_string(),
            subject_confirmation_data: data,
        })
    }
}

/// Subject confirmation data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// The request ID this confirmation is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Time after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Time before which the subject cannot be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// The URL the assertion was delivered to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl SubjectConfirmationData {
    fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        Ok(Self {
            in_response_to: node.attribute("InResponseTo").map(str::to_string),
            not_on_or_after: instant_attribute(node, "NotOnOrAfter")?,
            not_before: instant_attribute(node, "NotBefore")?,
            recipient: node.attribute("Recipient").map(str::to_string),
        })
    }
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience_restrictions: Vec<AudienceRestriction>,
}

impl Conditions {
    fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        Ok(Self {
            not_before: instant_attribute(node, "NotBefore")?,
            not_on_or_after: instant_attribute(node, "NotOnOrAfter")?,
            audience_restrictions: children(node, SAML_NS, "AudienceRestriction")
                .map(|restriction| AudienceRestriction {
                    audiences: children(restriction, SAML_NS, "Audience")
                        .map(text_of)
                        .collect(),
                })
                .collect(),
        })
    }
}

/// Audience restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// Allowed audiences.
    pub audiences: Vec<String>,
}

/// Authentication statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// Time of authentication.
    pub authn_instant: DateTime<Utc>,

    /// Session index at the IdP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// Time after which the IdP session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_not_on_or_after: Option<DateTime<Utc>>,
}

impl AuthnStatement {
    fn from_node(node: Node<'_, '_>) -> SamlResult<Self> {
        let authn_instant = instant_attribute(node, "AuthnInstant")?.ok_or_else(|| {
            SamlError::MalformedResponse("AuthnStatement has no AuthnInstant".to_string())
        })?;
        Ok(Self {
            authn_instant,
            session_index: node.attribute("SessionIndex").map(str::to_string),
            session_not_on_or_after: instant_attribute(node, "SessionNotOnOrAfter")?,
        })
    }
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,

    /// The attribute name format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Attribute values, in document order.
    pub values: Vec<String>,
}

impl Attribute {
    fn from_node(node: Node<'_, '_>) -> Option<Self> {
        Some(Self {
            name: node.attribute("Name")?.to_string(),
            name_format: node.attribute("NameFormat").map(str::to_string),
            friendly_name: node.attribute("FriendlyName").map(str::to_string),
            values: children(node, SAML_NS, "AttributeValue")
                .map(text_of)
                .collect(),
        })
    }
}

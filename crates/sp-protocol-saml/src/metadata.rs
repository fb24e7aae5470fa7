//! SAML 2.0 metadata.
//!
//! [`MetadataBuilder`] describes this SP for the identity provider.
//! [`IdentityProviderMetadata`] reads the identity provider's metadata into
//! an [`IdentityProviderTrust`]. Neither does any I/O.

use chrono::{DateTime, Utc};
use quick_xml::events::BytesStart;
use roxmltree::{Document, Node};
use sp_core::config::ServiceProviderConfig;

use crate::error::{SamlError, SamlResult};
use crate::trust::{Certificate, Endpoint, IdentityProviderTrust};
use crate::types::{
    children, format_instant, is_element, parse_instant, text_of, NameIdFormat, SamlBinding,
    XmlWriter, MD_NS, SAMLP_NS, XMLDSIG_NS,
};

/// Media type of SAML metadata documents.
pub const METADATA_CONTENT_TYPE: &str = "application/samlmetadata+xml";

/// A rendered metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    xml: String,
}

impl MetadataDocument {
    /// The XML text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consumes the document, returning the XML text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.xml
    }
}

/// Builds SP metadata.
pub struct MetadataBuilder;

impl MetadataBuilder {
    /// Renders the `md:EntityDescriptor` of this SP.
    ///
    /// The output depends only on the arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if XML writing fails.
    pub fn build(
        config: &ServiceProviderConfig,
        signing_certificate: &Certificate,
        encryption_certificate: Option<&Certificate>,
        valid_until: Option<DateTime<Utc>>,
    ) -> SamlResult<MetadataDocument> {
        let lang = config.language.as_str();
        let mut writer = XmlWriter::new();

        let mut root = BytesStart::new("md:EntityDescriptor");
        root.push_attribute(("xmlns:md", MD_NS));
        root.push_attribute(("xmlns:ds", XMLDSIG_NS));
        root.push_attribute(("entityID", config.entity_id.as_str()));
        let valid_until = valid_until.map(format_instant);
        if let Some(instant) = &valid_until {
            root.push_attribute(("validUntil", instant.as_str()));
        }
        writer.start(root)?;

        let mut sp = BytesStart::new("md:SPSSODescriptor");
        sp.push_attribute(("AuthnRequestsSigned", bool_str(config.authn_requests_signed)));
        sp.push_attribute(("WantAssertionsSigned", bool_str(config.want_assertions_signed)));
        sp.push_attribute(("protocolSupportEnumeration", SAMLP_NS));
        writer.start(sp)?;

        write_key_descriptor(&mut writer, "signing", signing_certificate)?;
        if let Some(certificate) = encryption_certificate {
            write_key_descriptor(&mut writer, "encryption", certificate)?;
        }

        for binding in [SamlBinding::HttpRedirect, SamlBinding::HttpPost] {
            let mut slo = BytesStart::new("md:SingleLogoutService");
            slo.push_attribute(("Binding", binding.uri()));
            slo.push_attribute(("Location", config.single_logout_url.as_str()));
            writer.empty(slo)?;
        }

        for format in NameIdFormat::ADVERTISED {
            writer.text_element("md:NameIDFormat", &[], format.uri())?;
        }

        let mut acs = BytesStart::new("md:AssertionConsumerService");
        acs.push_attribute(("Binding", SamlBinding::HttpPost.uri()));
        acs.push_attribute(("Location", config.assertion_consumer_service_url.as_str()));
        acs.push_attribute(("index", "0"));
        acs.push_attribute(("isDefault", "true"));
        writer.empty(acs)?;

        if let Some(service_name) = &config.service_name {
            let mut service = BytesStart::new("md:AttributeConsumingService");
            service.push_attribute(("index", "0"));
            service.push_attribute(("isDefault", "true"));
            writer.start(service)?;
            writer.text_element("md:ServiceName", &[("xml:lang", lang)], service_name)?;
            writer.end("md:AttributeConsumingService")?;
        }

        writer.end("md:SPSSODescriptor")?;

        if let Some(org) = &config.organization {
            writer.start(BytesStart::new("md:Organization"))?;
            writer.text_element("md:OrganizationName", &[("xml:lang", lang)], &org.name)?;
            writer.text_element(
                "md:OrganizationDisplayName",
                &[("xml:lang", lang)],
                &org.display_name,
            )?;
            writer.text_element("md:OrganizationURL", &[("xml:lang", lang)], &org.url)?;
            writer.end("md:Organization")?;
        }

        if let Some(contact) = &config.contact_person {
            let mut person = BytesStart::new("md:ContactPerson");
            person.push_attribute(("contactType", contact.contact_type.as_str()));
            writer.start(person)?;
            if let Some(company) = &contact.company {
                writer.text_element("md:Company", &[], company)?;
            }
            if let Some(given_name) = &contact.given_name {
                writer.text_element("md:GivenName", &[], given_name)?;
            }
            if let Some(surname) = &contact.surname {
                writer.text_element("md:SurName", &[], surname)?;
            }
            for email in &contact.email_addresses {
                writer.text_element("md:EmailAddress", &[], email)?;
            }
            for phone in &contact.telephone_numbers {
                writer.text_element("md:TelephoneNumber", &[], phone)?;
            }
            writer.end("md:ContactPerson")?;
        }

        writer.end("md:EntityDescriptor")?;
        Ok(MetadataDocument {
            xml: writer.into_string()?,
        })
    }
}

fn write_key_descriptor(
    writer: &mut XmlWriter,
    usage: &str,
    certificate: &Certificate,
) -> SamlResult<()> {
    let mut descriptor = BytesStart::new("md:KeyDescriptor");
    descriptor.push_attribute(("use", usage));
    writer.start(descriptor)?;
    writer.start(BytesStart::new("ds:KeyInfo"))?;
    writer.start(BytesStart::new("ds:X509Data"))?;
    writer.text_element("ds:X509Certificate", &[], &certificate.to_base64())?;
    writer.end("ds:X509Data")?;
    writer.end("ds:KeyInfo")?;
    writer.end("md:KeyDescriptor")
}

const fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Reads identity provider metadata.
pub struct IdentityProviderMetadata;

impl IdentityProviderMetadata {
    /// Extracts the trust set of one identity provider.
    ///
    /// The document may be a single `EntityDescriptor` or an
    /// `EntitiesDescriptor`. With `idp_entity_id` the matching entity is
    /// used, otherwise the first entity with an `IDPSSODescriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMetadata`] if the document has expired,
    /// names no matching identity provider, has no SSO endpoint with a
    /// supported binding, or carries no signing certificate.
    pub fn parse(xml: &str, idp_entity_id: Option<&str>) -> SamlResult<IdentityProviderTrust> {
        let doc = Document::parse(xml)
            .map_err(|e| SamlError::InvalidMetadata(format!("metadata is not well-formed: {e}")))?;
        let root = doc.root_element();
        check_valid_until(root)?;

        let entity = if is_element(root, MD_NS, "EntityDescriptor") {
            root
        } else if is_element(root, MD_NS, "EntitiesDescriptor") {
            root.descendants()
                .find(|n| {
                    is_element(*n, MD_NS, "EntityDescriptor")
                        && idp_entity_id.map_or_else(
                            || idp_descriptor(*n).is_some(),
                            |id| n.attribute("entityID") == Some(id),
                        )
                })
                .ok_or_else(|| {
                    SamlError::InvalidMetadata("no matching EntityDescriptor".to_string())
                })?
        } else {
            return Err(SamlError::InvalidMetadata(format!(
                "unexpected root element {}",
                root.tag_name().name()
            )));
        };
        check_valid_until(entity)?;

        let entity_id = entity
            .attribute("entityID")
            .ok_or_else(|| SamlError::InvalidMetadata("EntityDescriptor has no entityID".to_string()))?;
        if let Some(expected) = idp_entity_id {
            if expected != entity_id {
                return Err(SamlError::InvalidMetadata(format!(
                    "metadata describes {entity_id}, expected {expected}"
                )));
            }
        }

        let descriptor = idp_descriptor(entity).ok_or_else(|| {
            SamlError::InvalidMetadata(format!("{entity_id} has no SAML 2.0 IDPSSODescriptor"))
        })?;

        let sso = preferred_endpoint(descriptor, "SingleSignOnService").ok_or_else(|| {
            SamlError::InvalidMetadata(format!(
                "{entity_id} has no SingleSignOnService with a supported binding"
            ))
        })?;
        let slo = preferred_endpoint(descriptor, "SingleLogoutService");

        let mut certificates = Vec::new();
        for key_descriptor in children(descriptor, MD_NS, "KeyDescriptor") {
            if key_descriptor.attribute("use").is_some_and(|u| u != "signing") {
                continue;
            }
            for cert in key_descriptor
                .descendants()
                .filter(|n| is_element(*n, XMLDSIG_NS, "X509Certificate"))
            {
                certificates.push(Certificate::from_base64(&text_of(cert))?);
            }
        }
        if certificates.is_empty() {
            return Err(SamlError::InvalidMetadata(format!(
                "{entity_id} publishes no signing certificate"
            )));
        }

        tracing::debug!(
            issuer = %entity_id,
            sso = %sso.url,
            certificates = certificates.len(),
            "parsed identity provider metadata"
        );

        let mut trust = IdentityProviderTrust::new(entity_id, sso, certificates);
        trust.slo = slo;
        Ok(trust)
    }
}

fn idp_descriptor<'a, 'i>(entity: Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    children(entity, MD_NS, "IDPSSODescriptor").find(|d| {
        d.attribute("protocolSupportEnumeration")
            .is_some_and(|p| p.split_ascii_whitespace().any(|uri| uri == SAMLP_NS))
    })
}

/// Redirect endpoints are preferred over POST.
fn preferred_endpoint(descriptor: Node<'_, '_>, name: &str) -> Option<Endpoint> {
    let endpoints: Vec<Endpoint> = children(descriptor, MD_NS, name)
        .filter_map(|n| {
            let binding = SamlBinding::from_uri(n.attribute("Binding")?)?;
            Some(Endpoint::new(n.attribute("Location")?, binding))
        })
        .collect();
    endpoints
        .iter()
        .find(|e| e.binding == SamlBinding::HttpRedirect)
        .or_else(|| endpoints.first())
        .cloned()
}

fn check_valid_until(node: Node<'_, '_>) -> SamlResult<()> {
    if let Some(value) = node.attribute("validUntil") {
        let valid_until = parse_instant(value)
            .map_err(|_| SamlError::InvalidMetadata(format!("invalid validUntil: {value}")))?;
        if valid_until <= Utc::now() {
            return Err(SamlError::InvalidMetadata(format!(
                "metadata expired at {value}"
            )));
        }
    }
    Ok(())
}

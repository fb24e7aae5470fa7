//! SAML 2.0 types and data structures.
//!
//! Outbound messages (`AuthnRequest`, `LogoutRequest`, `LogoutResponse`)
//! serialize themselves with `quick-xml`. Inbound messages are read from a
//! `roxmltree` document into owned views.

mod assertion;
mod authn_request;
mod constants;
mod logout;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use logout::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

use std::io::Cursor;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;

use crate::error::{SamlError, SamlResult};

/// Returns the first element child with the given namespace and local name.
pub(crate) fn child<'a, 'i>(node: Node<'a, 'i>, ns: &str, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is_element(*n, ns, name))
}

/// Iterates element children with the given namespace and local name.
pub(crate) fn children<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    ns: &'a str,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| is_element(*n, ns, name))
}

/// Returns true if `node` is an element with the given namespace and local name.
pub(crate) fn is_element(node: Node<'_, '_>, ns: &str, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
}

/// Concatenated, trimmed text content of an element.
///
/// Comments split text nodes; concatenating every descendant text node keeps
/// the value identical to what the canonical form signed.
pub(crate) fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Text content of the first matching child element.
pub(crate) fn child_text(node: Node<'_, '_>, ns: &str, name: &str) -> Option<String> {
    child(node, ns, name).map(text_of)
}

/// Parses an `xs:dateTime` attribute value.
pub(crate) fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::MalformedResponse(format!("invalid dateTime '{value}': {e}")))
}

/// Parses an optional `xs:dateTime` attribute.
pub(crate) fn instant_attribute(
    node: Node<'_, '_>,
    name: &str,
) -> SamlResult<Option<DateTime<Utc>>> {
    node.attribute(name).map(parse_instant).transpose()
}

/// Formats an instant the way SAML peers expect (UTC, second precision).
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Thin wrapper around a `quick-xml` writer used by the message builders.
pub(crate) struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        Self {
            inner: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub(crate) fn start(&mut self, element: BytesStart<'_>) -> SamlResult<()> {
        self.inner.write_event(Event::Start(element))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, element: BytesStart<'_>) -> SamlResult<()> {
        self.inner.write_event(Event::Empty(element))?;
        Ok(())
    }

    pub(crate) fn end(&mut self, name: &str) -> SamlResult<()> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes `<name attrs...>text</name>`.
    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> SamlResult<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.start(start)?;
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn into_string(self) -> SamlResult<String> {
        Ok(String::from_utf8(self.inner.into_inner().into_inner())?)
    }
}

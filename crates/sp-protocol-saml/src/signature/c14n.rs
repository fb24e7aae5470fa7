//! Exclusive XML Canonicalization 1.0.
//!
//! Works directly on a parsed `roxmltree` subtree. roxmltree resolves
//! namespaces but does not keep the prefixes an element or attribute was
//! written with, so those are recovered by lexing the start tag from the
//! input text.
//!
//! Supported: the `InclusiveNamespaces PrefixList`, the enveloped-signature
//! transform (by excluding one node) and the `#WithComments` variant.

use roxmltree::{Node, NodeId, NodeType};

use crate::error::{SamlError, SamlResult};

/// Exclusive canonicalizer for one subtree.
#[derive(Debug, Clone, Default)]
pub struct ExclusiveCanonicalizer {
    inclusive_prefixes: Vec<String>,
    with_comments: bool,
    exclude: Option<NodeId>,
}

/// Namespace declarations rendered on one output element.
struct Frame {
    qname: String,
    declared: Vec<(String, String)>,
}

impl ExclusiveCanonicalizer {
    /// Creates a canonicalizer without comments or inclusive prefixes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps comments in the output.
    #[must_use]
    pub const fn with_comments(mut self, with_comments: bool) -> Self {
        self.with_comments = with_comments;
        self
    }

    /// Sets the whitespace-separated `PrefixList`. `#default` names the
    /// default namespace.
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, prefix_list: &str) -> Self {
        self.inclusive_prefixes = prefix_list
            .split_ascii_whitespace()
            .map(|p| if p == "#default" { String::new() } else { p.to_string() })
            .collect();
        self
    }

    /// Leaves `node` and its descendants out of the output.
    #[must_use]
    pub const fn excluding(mut self, node: NodeId) -> Self {
        self.exclude = Some(node);
        self
    }

    /// Canonicalizes the subtree rooted at `apex`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Canonicalization`] if a start tag cannot be
    /// matched against the parsed element.
    pub fn canonicalize(&self, apex: Node<'_, '_>) -> SamlResult<String> {
        let mut out = String::new();
        let mut frames: Vec<Frame> = Vec::new();
        self.write_node(apex, &mut frames, &mut out)?;
        Ok(out)
    }

    fn write_node(
        &self,
        node: Node<'_, '_>,
        frames: &mut Vec<Frame>,
        out: &mut String,
    ) -> SamlResult<()> {
        if Some(node.id()) == self.exclude {
            return Ok(());
        }
        match node.node_type() {
            NodeType::Element => {
                let frame = self.open_element(node, frames, out)?;
                frames.push(frame);
                for child in node.children() {
                    self.write_node(child, frames, out)?;
                }
                let frame = frames.pop().ok_or_else(|| {
                    SamlError::Canonicalization("unbalanced element traversal".to_string())
                })?;
                out.push_str("</");
                out.push_str(&frame.qname);
                out.push('>');
            }
            NodeType::Root => {
                for child in node.children() {
                    self.write_node(child, frames, out)?;
                }
            }
            NodeType::Text => escape_text(node.text().unwrap_or_default(), out),
            NodeType::Comment => {
                if self.with_comments {
                    out.push_str("<!--");
                    out.push_str(node.text().unwrap_or_default());
                    out.push_str("-->");
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    out.push_str("<?");
                    out.push_str(pi.target);
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        out.push(' ');
                        out.push_str(value);
                    }
                    out.push_str("?>");
                }
            }
        }
        Ok(())
    }

    fn open_element(
        &self,
        node: Node<'_, '_>,
        frames: &[Frame],
        out: &mut String,
    ) -> SamlResult<Frame> {
        let tag = lex_start_tag(node)?;
        let attributes: Vec<_> = node.attributes().collect();
        if attributes.len() != tag.attributes.len() {
            return Err(SamlError::Canonicalization(format!(
                "attribute count mismatch on <{}>",
                tag.name
            )));
        }

        // Visibly utilized namespaces: the element's own prefix and every
        // prefixed attribute, then the inclusive prefix list.
        let mut utilized: Vec<(String, String)> = Vec::new();
        let element_uri = node.tag_name().namespace().unwrap_or_default();
        let element_prefix = prefix_of(tag.name);
        if !element_prefix.is_empty() && element_uri.is_empty() {
            return Err(SamlError::Canonicalization(format!(
                "prefix '{element_prefix}' on <{}> is not bound",
                tag.name
            )));
        }
        add_unique(&mut utilized, element_prefix, element_uri);

        let mut rendered_attributes = Vec::with_capacity(attributes.len());
        for (attribute, qname) in attributes.iter().zip(&tag.attributes) {
            if local_of(qname) != attribute.name() {
                return Err(SamlError::Canonicalization(format!(
                    "attribute '{qname}' does not match parsed '{}'",
                    attribute.name()
                )));
            }
            let uri = attribute.namespace().unwrap_or_default();
            let prefix = prefix_of(qname);
            if !prefix.is_empty() {
                add_unique(&mut utilized, prefix, uri);
            }
            rendered_attributes.push((uri, attribute.name(), *qname, attribute.value()));
        }

        for prefix in &self.inclusive_prefixes {
            let in_scope = node
                .namespaces()
                .find(|ns| ns.name().unwrap_or_default() == prefix.as_str());
            if let Some(ns) = in_scope {
                add_unique(&mut utilized, prefix, ns.uri());
            }
        }

        let mut declared: Vec<(String, String)> = utilized
            .into_iter()
            .filter(|(prefix, uri)| {
                if prefix == "xml" {
                    return false;
                }
                let inherited = lookup(frames, prefix);
                if prefix.is_empty() && uri.is_empty() {
                    inherited.is_some_and(|u| !u.is_empty())
                } else {
                    inherited != Some(uri.as_str())
                }
            })
            .collect();
        declared.sort_by(|a, b| a.0.cmp(&b.0));
        rendered_attributes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        out.push('<');
        out.push_str(tag.name);
        for (prefix, uri) in &declared {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            escape_attribute(uri, out);
            out.push('"');
        }
        for (_, _, qname, value) in rendered_attributes {
            out.push(' ');
            out.push_str(qname);
            out.push_str("=\"");
            escape_attribute(value, out);
            out.push('"');
        }
        out.push('>');

        Ok(Frame {
            qname: tag.name.to_string(),
            declared,
        })
    }
}

/// Qualified names from a start tag, in source order.
struct StartTag<'i> {
    name: &'i str,
    attributes: Vec<&'i str>,
}

/// Lexes the start tag of `node` from the document input.
///
/// Namespace declarations are dropped; roxmltree does not report them as
/// attributes either.
fn lex_start_tag<'i>(node: Node<'_, 'i>) -> SamlResult<StartTag<'i>> {
    let malformed = || SamlError::Canonicalization("cannot lex start tag".to_string());
    let input: &'i str = node.document().input_text();
    let mut rest = input
        .get(node.range().start..)
        .and_then(|s| s.strip_prefix('<'))
        .ok_or_else(malformed)?;

    let name_end = rest
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .ok_or_else(malformed)?;
    let name = &rest[..name_end];
    rest = &rest[name_end..];

    let mut attributes = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        if rest.is_empty() || rest.starts_with('>') || rest.starts_with('/') {
            break;
        }
        let eq = rest.find('=').ok_or_else(malformed)?;
        let attribute = rest[..eq].trim_end();
        rest = rest[eq + 1..].trim_start_matches(|c: char| c.is_ascii_whitespace());
        let quote = rest
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(malformed)?;
        let close = rest[1..].find(quote).ok_or_else(malformed)?;
        rest = &rest[close + 2..];

        if attribute != "xmlns" && !attribute.starts_with("xmlns:") {
            attributes.push(attribute);
        }
    }

    Ok(StartTag { name, attributes })
}

fn prefix_of(qname: &str) -> &str {
    qname.split_once(':').map_or("", |(prefix, _)| prefix)
}

fn local_of(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

fn add_unique(list: &mut Vec<(String, String)>, prefix: &str, uri: &str) {
    if !list.iter().any(|(p, _)| p == prefix) {
        list.push((prefix.to_string(), uri.to_string()));
    }
}

/// Namespace URI rendered for `prefix` by the nearest output ancestor.
fn lookup<'f>(frames: &'f [Frame], prefix: &str) -> Option<&'f str> {
    frames.iter().rev().find_map(|frame| {
        frame
            .declared
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    })
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        ExclusiveCanonicalizer::new()
            .canonicalize(doc.root_element())
            .unwrap()
    }

    #[test]
    fn renders_only_utilized_namespaces() {
        let xml = r#"<a:root xmlns:b="urn:b" xmlns:a="urn:a" a:y='2' z="1"><a:child>t&amp;</a:child><b:c/></a:root>"#;
        assert_eq!(
            c14n(xml),
            r#"<a:root xmlns:a="urn:a" z="1" a:y="2"><a:child>t&amp;</a:child><b:c xmlns:b="urn:b"></b:c></a:root>"#
        );
    }

    #[test]
    fn subtree_declares_inherited_namespaces() {
        let xml = r#"<a:root xmlns:a="urn:a"><a:child ID="_1">x</a:child></a:root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let child = doc.root_element().first_element_child().unwrap();
        let out = ExclusiveCanonicalizer::new().canonicalize(child).unwrap();
        assert_eq!(out, r#"<a:child xmlns:a="urn:a" ID="_1">x</a:child>"#);
    }

    #[test]
    fn default_namespace_is_undeclared_when_needed() {
        let xml = r#"<r xmlns="urn:d"><x xmlns=""/><y/></r>"#;
        assert_eq!(
            c14n(xml),
            r#"<r xmlns="urn:d"><x xmlns=""></x><y></y></r>"#
        );
    }

    #[test]
    fn comments_are_dropped_unless_requested() {
        let xml = "<r><!-- note -->v<?pi data?></r>";
        assert_eq!(c14n(xml), "<r>v<?pi data?></r>");

        let doc = roxmltree::Document::parse(xml).unwrap();
        let out = ExclusiveCanonicalizer::new()
            .with_comments(true)
            .canonicalize(doc.root_element())
            .unwrap();
        assert_eq!(out, "<r><!-- note -->v<?pi data?></r>");
    }

    #[test]
    fn escapes_text_and_attributes() {
        let xml = "<r a=\"&lt;&quot;&#9;&#10;\">&gt;&#13;</r>";
        assert_eq!(c14n(xml), "<r a=\"&lt;&quot;&#x9;&#xA;\">&gt;&#xD;</r>");
    }

    #[test]
    fn inclusive_prefix_list_forces_declaration() {
        let xml = r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b"><a:x/></a:root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let out = ExclusiveCanonicalizer::new()
            .with_inclusive_prefixes("b")
            .canonicalize(doc.root_element())
            .unwrap();
        assert_eq!(
            out,
            r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b"><a:x></a:x></a:root>"#
        );
    }

    #[test]
    fn excluded_node_is_omitted() {
        let xml = r#"<r xmlns:ds="urn:ds"><ds:Signature><ds:V>1</ds:V></ds:Signature><k>v</k></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let signature = doc.root_element().first_element_child().unwrap();
        let out = ExclusiveCanonicalizer::new()
            .excluding(signature.id())
            .canonicalize(doc.root_element())
            .unwrap();
        assert_eq!(out, "<r><k>v</k></r>");
    }

    #[test]
    fn redeclared_prefix_is_rendered_again() {
        let xml = r#"<p:a xmlns:p="urn:1"><p:b xmlns:p="urn:2"/></p:a>"#;
        assert_eq!(
            c14n(xml),
            r#"<p:a xmlns:p="urn:1"><p:b xmlns:p="urn:2"></p:b></p:a>"#
        );
    }
}

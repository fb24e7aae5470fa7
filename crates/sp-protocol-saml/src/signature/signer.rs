//! XML Signature creation.
//!
//! Produces enveloped signatures for messages sent with the POST binding.
//! Redirect binding signatures are detached and created by
//! [`HttpRedirectBinding::encode`](crate::bindings::HttpRedirectBinding::encode)
//! through [`XmlSigner::provider`].

use base64::Engine;
use quick_xml::escape::escape;
use roxmltree::{Document, Node};
use sp_crypto::{digest, SignatureProvider};

use super::{algorithm_uri, digest_uri, ExclusiveCanonicalizer};
use crate::error::{SamlError, SamlResult};
use crate::trust::SigningCredential;
use crate::types::{canonicalization_algorithms, child, SAML_NS, XMLDSIG_NS};

/// XML document signer.
///
/// Signs with the SP signing credential and always embeds its certificate
/// in `KeyInfo`.
#[derive(Debug, Clone)]
pub struct XmlSigner {
    credential: SigningCredential,
}

impl XmlSigner {
    /// Creates a signer for the given credential.
    #[must_use]
    pub const fn new(credential: SigningCredential) -> Self {
        Self { credential }
    }

    /// The signature provider, for detached signatures.
    #[must_use]
    pub fn provider(&self) -> &dyn SignatureProvider {
        self.credential.signer()
    }

    /// Signs the element whose `ID` is `reference_id`.
    ///
    /// The `<ds:Signature>` is inserted directly after the element's
    /// `saml:Issuer`. Elements nested inside the target must be signed
    /// before the target itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not parse, no element carries the
    /// ID, the element has no Issuer, or signing fails.
    pub fn sign_enveloped(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let doc = Document::parse(xml)?;
        let element = doc
            .descendants()
            .find(|n| n.is_element() && n.attribute("ID") == Some(reference_id))
            .ok_or_else(|| {
                SamlError::Internal(format!("no element with ID {reference_id} to sign"))
            })?;
        let insert_at = insertion_point(element)?;

        let algorithm = self.credential.signer().algorithm();
        let canonical = ExclusiveCanonicalizer::new().canonicalize(element)?;
        let digest_algorithm = algorithm.hash_algorithm();
        let digest_value = base64::engine::general_purpose::STANDARD
            .encode(digest(digest_algorithm, canonical.as_bytes()));

        let signed_info = format!(
            concat!(
                r#"<ds:SignedInfo xmlns:ds="{ds}">"#,
                r#"<ds:CanonicalizationMethod Algorithm="{c14n}"/>"#,
                r#"<ds:SignatureMethod Algorithm="{alg}"/>"#,
                r##"<ds:Reference URI="#{id}">"##,
                r#"<ds:Transforms>"#,
                r#"<ds:Transform Algorithm="{enveloped}"/>"#,
                r#"<ds:Transform Algorithm="{c14n}"/>"#,
                r#"</ds:Transforms>"#,
                r#"<ds:DigestMethod Algorithm="{digest}"/>"#,
                r#"<ds:DigestValue>{digest_value}</ds:DigestValue>"#,
                r#"</ds:Reference>"#,
                r#"</ds:SignedInfo>"#,
            ),
            ds = XMLDSIG_NS,
            c14n = canonicalization_algorithms::EXCLUSIVE_C14N,
            alg = algorithm_uri(algorithm),
            id = escape(reference_id),
            enveloped = canonicalization_algorithms::ENVELOPED_SIGNATURE,
            digest = digest_uri(digest_algorithm),
            digest_value = digest_value,
        );

        let signed_info_doc = Document::parse(&signed_info)?;
        let canonical_signed_info =
            ExclusiveCanonicalizer::new().canonicalize(signed_info_doc.root_element())?;
        let signature_value = base64::engine::general_purpose::STANDARD
            .encode(self.credential.signer().sign(canonical_signed_info.as_bytes())?);

        let signature = format!(
            concat!(
                r#"<ds:Signature xmlns:ds="{ds}">{signed_info}"#,
                r#"<ds:SignatureValue>{value}</ds:SignatureValue>"#,
                r#"<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>"#,
                r#"</ds:Signature>"#,
            ),
            ds = XMLDSIG_NS,
            signed_info = signed_info,
            value = signature_value,
            cert = self.credential.certificate().to_base64(),
        );

        let mut signed = String::with_capacity(xml.len() + signature.len());
        signed.push_str(&xml[..insert_at]);
        signed.push_str(&signature);
        signed.push_str(&xml[insert_at..]);
        Ok(signed)
    }
}

/// Byte offset just past the element's `saml:Issuer`.
fn insertion_point(element: Node<'_, '_>) -> SamlResult<usize> {
    child(element, SAML_NS, "Issuer")
        .map(|issuer| issuer.range().end)
        .ok_or_else(|| {
            SamlError::Internal(format!(
                "<{}> has no Issuer to place the signature after",
                element.tag_name().name()
            ))
        })
}

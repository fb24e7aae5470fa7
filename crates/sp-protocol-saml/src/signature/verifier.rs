//! XML Signature verification.
//!
//! Verification is bound to one element: the reference must point at that
//! element's ID, and the ID must be unique in the document. Callers read
//! data only from the element they passed in, so a signature over some
//! other element cannot vouch for it.

use std::sync::Arc;

use roxmltree::Node;
use sp_crypto::{digest, HashAlgorithm, SignatureAlgorithm};

use super::{algorithm_from_uri, decode_base64_text, digest_from_uri, ExclusiveCanonicalizer, EXC_C14N_NS};
use crate::bindings::DetachedSignature;
use crate::error::{SamlError, SamlResult};
use crate::trust::Certificate;
use crate::types::{canonicalization_algorithms, child, children, text_of, XMLDSIG_NS};

/// Outcome of a successful enveloped signature check.
#[derive(Debug, Clone)]
pub struct VerifiedSignature {
    /// ID of the signed element.
    pub reference_id: String,
    /// Signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// Digest algorithm.
    pub digest_algorithm: HashAlgorithm,
    /// Certificate whose key verified the signature.
    pub certificate: Arc<Certificate>,
}

/// XML signature verifier.
pub struct XmlSignatureVerifier;

impl XmlSignatureVerifier {
    /// Returns the `ds:Signature` child of `element`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if there is more than one.
    pub fn signature_node<'a, 'i>(element: Node<'a, 'i>) -> SamlResult<Option<Node<'a, 'i>>> {
        let mut signatures = children(element, XMLDSIG_NS, "Signature");
        let first = signatures.next();
        if signatures.next().is_some() {
            return Err(invalid("element carries more than one Signature"));
        }
        Ok(first)
    }

    /// DER of the first `KeyInfo/X509Data/X509Certificate` of a signature.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the value is not base64.
    pub fn embedded_certificate(signature: Node<'_, '_>) -> SamlResult<Option<Vec<u8>>> {
        child(signature, XMLDSIG_NS, "KeyInfo")
            .and_then(|key_info| child(key_info, XMLDSIG_NS, "X509Data"))
            .and_then(|data| child(data, XMLDSIG_NS, "X509Certificate"))
            .map(|cert| decode_base64_text(&text_of(cert)))
            .transpose()
    }

    /// Verifies the enveloped signature of `element`.
    ///
    /// # Errors
    ///
    /// - [`SamlError::SignatureInvalid`] for a missing or duplicated
    ///   signature, a reference to anything but this element, a duplicated
    ///   ID, a transform or algorithm outside the allow-list, a digest
    ///   mismatch, or a signature value no candidate verifies
    /// - [`SamlError::Canonicalization`] if the element cannot be
    ///   canonicalized
    pub fn verify(
        element: Node<'_, '_>,
        candidates: &[Arc<Certificate>],
    ) -> SamlResult<VerifiedSignature> {
        let id = element
            .attribute("ID")
            .ok_or_else(|| invalid("signed element has no ID"))?;
        let signature =
            Self::signature_node(element)?.ok_or_else(|| invalid("element is not signed"))?;

        let signed_info = single(signature, "SignedInfo")?;
        let signed_info_c14n = canonicalizer_for(single(signed_info, "CanonicalizationMethod")?)?;
        let algorithm =
            algorithm_from_uri(single(signed_info, "SignatureMethod")?.attribute("Algorithm").unwrap_or_default())?;

        let reference = single(signed_info, "Reference")?;
        if reference.attribute("URI").and_then(|uri| uri.strip_prefix('#')) != Some(id) {
            return Err(invalid("reference does not point at the signed element"));
        }
        let occurrences = element
            .document()
            .descendants()
            .filter(|n| n.attribute("ID") == Some(id) || n.attribute("Id") == Some(id))
            .count();
        if occurrences != 1 {
            return Err(invalid("signed ID is not unique in the document"));
        }

        let mut enveloped = false;
        let mut reference_c14n = None;
        if let Some(transforms) = child(reference, XMLDSIG_NS, "Transforms") {
            for transform in children(transforms, XMLDSIG_NS, "Transform") {
                match transform.attribute("Algorithm") {
                    Some(canonicalization_algorithms::ENVELOPED_SIGNATURE) => enveloped = true,
                    Some(
                        canonicalization_algorithms::EXCLUSIVE_C14N
                        | canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS,
                    ) => reference_c14n = Some(canonicalizer_for(transform)?),
                    other => {
                        return Err(SamlError::SignatureInvalid(format!(
                            "unsupported transform: {}",
                            other.unwrap_or("<none>")
                        )))
                    }
                }
            }
        }
        if !enveloped {
            return Err(invalid("enveloped-signature transform missing"));
        }
        let reference_c14n =
            reference_c14n.ok_or_else(|| invalid("exclusive canonicalization transform missing"))?;

        let digest_algorithm =
            digest_from_uri(single(reference, "DigestMethod")?.attribute("Algorithm").unwrap_or_default())?;
        let expected_digest = decode_base64_text(&text_of(single(reference, "DigestValue")?))?;
        let canonical = reference_c14n.excluding(signature.id()).canonicalize(element)?;
        if digest(digest_algorithm, canonical.as_bytes()) != expected_digest {
            return Err(invalid("digest mismatch"));
        }

        let canonical_signed_info = signed_info_c14n.canonicalize(signed_info)?;
        let signature_value = decode_base64_text(&text_of(single(signature, "SignatureValue")?))?;
        let certificate = verify_with_any(
            candidates,
            algorithm,
            canonical_signed_info.as_bytes(),
            &signature_value,
        )?;

        tracing::debug!(
            reference = %id,
            algorithm = ?algorithm,
            certificate = %certificate.serial_number(),
            "enveloped signature verified"
        );
        Ok(VerifiedSignature {
            reference_id: id.to_string(),
            algorithm,
            digest_algorithm,
            certificate,
        })
    }

    /// Verifies a Redirect binding signature over the raw query octets.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] for a refused algorithm, a
    /// malformed value, or a signature no candidate verifies.
    pub fn verify_detached(
        detached: &DetachedSignature,
        candidates: &[Arc<Certificate>],
    ) -> SamlResult<Arc<Certificate>> {
        let algorithm = algorithm_from_uri(&detached.sig_alg)?;
        // Form decoding turns an unescaped '+' into a space; base64 has no spaces.
        let signature = decode_base64_text(&detached.signature.replace(' ', "+"))?;
        verify_with_any(
            candidates,
            algorithm,
            detached.signed_query.as_bytes(),
            &signature,
        )
    }
}

fn verify_with_any(
    candidates: &[Arc<Certificate>],
    algorithm: SignatureAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> SamlResult<Arc<Certificate>> {
    candidates
        .iter()
        .find(|cert| cert.public_key().verify(algorithm, message, signature).is_ok())
        .cloned()
        .ok_or_else(|| invalid("signature does not verify with any trusted certificate"))
}

/// The single `ds:{name}` child of `node`.
fn single<'a, 'i>(node: Node<'a, 'i>, name: &str) -> SamlResult<Node<'a, 'i>> {
    let mut found = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == name && n.tag_name().namespace() == Some(XMLDSIG_NS));
    match (found.next(), found.next()) {
        (Some(only), None) => Ok(only),
        (None, _) => Err(SamlError::SignatureInvalid(format!("missing ds:{name}"))),
        (Some(_), Some(_)) => Err(SamlError::SignatureInvalid(format!("more than one ds:{name}"))),
    }
}

/// Canonicalizer configured by a `CanonicalizationMethod` or `Transform`.
fn canonicalizer_for(method: Node<'_, '_>) -> SamlResult<ExclusiveCanonicalizer> {
    let with_comments = match method.attribute("Algorithm") {
        Some(canonicalization_algorithms::EXCLUSIVE_C14N) => false,
        Some(canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS) => true,
        other => {
            return Err(SamlError::SignatureInvalid(format!(
                "unsupported canonicalization: {}",
                other.unwrap_or("<none>")
            )))
        }
    };
    let prefixes = child(method, EXC_C14N_NS, "InclusiveNamespaces")
        .and_then(|n| n.attribute("PrefixList"))
        .unwrap_or_default();
    Ok(ExclusiveCanonicalizer::new()
        .with_comments(with_comments)
        .with_inclusive_prefixes(prefixes))
}

fn invalid(reason: &str) -> SamlError {
    SamlError::SignatureInvalid(reason.to_string())
}

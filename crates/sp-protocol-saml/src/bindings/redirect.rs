//! HTTP-Redirect Binding implementation.
//!
//! Messages travel in the query string as raw DEFLATE, base64 and URL
//! encoding. A signature, when present, is detached and covers
//! `SAMLRequest=..&RelayState=..&SigAlg=..` in that order.

use std::io::{Read, Write};

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use sp_crypto::SignatureProvider;

use crate::error::{SamlError, SamlResult};
use crate::signature::algorithm_uri;

use super::{DecodedMessage, DetachedSignature, SamlMessageType, MAX_MESSAGE_SIZE};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML message for HTTP-Redirect binding.
    ///
    /// Returns the destination URL with the encoded message appended. When a
    /// `signer` is given, `SigAlg` and `Signature` are appended as well.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or signing fails.
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: Option<&dyn SignatureProvider>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);

        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(rs) = relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }

        if let Some(signer) = signer {
            query.push_str("&SigAlg=");
            query.push_str(&urlencoding::encode(algorithm_uri(signer.algorithm())));
            let signature = signer.sign(query.as_bytes())?;
            query.push_str("&Signature=");
            query.push_str(&urlencoding::encode(
                &base64::engine::general_purpose::STANDARD.encode(signature),
            ));
        }

        let separator = if destination.contains('?') { '&' } else { '?' };
        Ok(format!("{destination}{separator}{query}"))
    }

    /// Decodes a SAML message from a raw (still URL-encoded) query string.
    ///
    /// The signed portion is rebuilt from the raw parameter text so the
    /// signature is checked over exactly the octets the sender signed.
    ///
    /// # Errors
    ///
    /// Returns an error if no SAML parameter is present, a parameter repeats,
    /// or decoding fails.
    pub fn decode_query(raw_query: &str) -> SamlResult<DecodedMessage> {
        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state = None;
        let mut sig_alg = None;
        let mut signature = None;

        for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match key {
                "SAMLRequest" => &mut saml_request,
                "SAMLResponse" => &mut saml_response,
                "RelayState" => &mut relay_state,
                "SigAlg" => &mut sig_alg,
                "Signature" => &mut signature,
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return Err(SamlError::InvalidRequest(format!(
                    "duplicate {key} parameter"
                )));
            }
        }

        let (message_type, raw_message) = match (saml_request, saml_response) {
            (Some(req), None) => (SamlMessageType::Request, req),
            (None, Some(resp)) => (SamlMessageType::Response, resp),
            (Some(_), Some(_)) => {
                return Err(SamlError::InvalidRequest(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                ))
            }
            (None, None) => {
                return Err(SamlError::InvalidRequest(
                    "No SAMLRequest or SAMLResponse parameter".to_string(),
                ))
            }
        };

        let detached_signature = match (sig_alg, signature) {
            (Some(alg), Some(sig)) => {
                let mut signed_query = format!("{}={raw_message}", message_type.form_param());
                if let Some(rs) = relay_state {
                    signed_query.push_str("&RelayState=");
                    signed_query.push_str(rs);
                }
                signed_query.push_str("&SigAlg=");
                signed_query.push_str(alg);
                Some(DetachedSignature {
                    signed_query,
                    signature: url_decode(sig)?,
                    sig_alg: url_decode(alg)?,
                })
            }
            (None, None) => None,
            _ => {
                return Err(SamlError::InvalidRequest(
                    "SigAlg and Signature must be sent together".to_string(),
                ))
            }
        };

        let b64_decoded = base64::engine::general_purpose::STANDARD
            .decode(url_decode(raw_message)?.as_bytes())
            .map_err(|e| SamlError::Base64Decode(e.to_string()))?;
        let xml = String::from_utf8(deflate_decompress(&b64_decoded)?)
            .map_err(|e| SamlError::InvalidRequest(format!("Invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(url_decode).transpose()?,
            detached_signature,
        })
    }
}

/// Form-style URL decoding (`+` is a space).
fn url_decode(value: &str) -> SamlResult<String> {
    urlencoding::decode(&value.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SamlError::InvalidRequest(format!("URL decode error: {e}")))
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("Compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("Compression finish error: {e}")))
}

/// Decompresses DEFLATE data, refusing output larger than [`MAX_MESSAGE_SIZE`].
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decompressed = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("Decompression error: {e}")))?;
    if decompressed.len() > MAX_MESSAGE_SIZE {
        return Err(SamlError::Deflate(format!(
            "inflated message exceeds {MAX_MESSAGE_SIZE} bytes"
        )));
    }
    Ok(decompressed)
}

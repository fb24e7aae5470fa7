//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! # Usage
//!
//! ```rust,ignore
//! use sp_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
//!
//! // Signed AuthnRequest for the Redirect binding
//! let url = HttpRedirectBinding::encode(&xml, &sso_url, Some(&relay), SamlMessageType::Request, Some(&key))?;
//!
//! // Decode an inbound Redirect message, keeping the raw signed query
//! let message = HttpRedirectBinding::decode_query(raw_query)?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

use serde::Deserialize;

/// Largest accepted inflated or decoded message, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// Request message (`AuthnRequest`, `LogoutRequest`).
    Request,
    /// Response message (`Response`, `LogoutResponse`).
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
    /// Detached signature and the exact octets it covers (Redirect binding).
    pub detached_signature: Option<DetachedSignature>,
}

/// Detached signature received with a Redirect binding message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    /// `SAMLRequest=..[&RelayState=..]&SigAlg=..` exactly as received.
    pub signed_query: String,
    /// Base64 signature value.
    pub signature: String,
    /// Signature algorithm URI.
    pub sig_alg: String,
}

/// A message ready to be delivered to the IdP through the user agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Redirect the browser to this URL.
    Redirect(String),
    /// Serve this auto-submitting HTML form.
    PostForm(String),
}

/// SAML protocol parameters as sent in a query string or form body.
#[derive(Debug, Default, Deserialize)]
pub struct SamlParams {
    /// SAML request (base64 encoded).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,
    /// SAML response (base64 encoded).
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

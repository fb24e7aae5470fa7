//! SAML 2.0 service provider protocol engine.
//!
//! This crate provides the SP side of SAML 2.0 Web Browser SSO:
//!
//! - **Trust** - the SP signing credential and the IdP's certificates
//! - **XML signature** - exclusive C14N, enveloped signing and verification
//! - **Metadata** - SP metadata generation and IdP metadata parsing
//! - **Requests** - signed AuthnRequests and logout messages
//! - **Validation** - responses, with replay and correlation defenses
//! - **Single Logout** - SP- and IdP-initiated logout
//! - **POST and Redirect bindings**
//!
//! # Architecture
//!
//! - [`trust`] - certificates, [`TrustStore`]
//! - [`signature`] - XML signatures and canonicalization
//! - [`metadata`] - [`MetadataBuilder`], IdP metadata
//! - [`request`] - [`RequestGenerator`]
//! - [`validator`] - [`ResponseValidator`]
//! - [`logout`] - [`LogoutOrchestrator`]
//! - [`session`] - the [`SessionBinder`] host seam
//! - [`relay_state`] - signed RelayState tokens
//! - [`bindings`] - POST and Redirect binding codecs
//! - [`endpoints`] - Axum HTTP handlers
//! - [`types`] - SAML message types
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use sp_protocol_saml::endpoints::{sp_router, SpState};
//!
//! let state = SpState::new(config, trust, replay, correlation, sessions, relay_state);
//! let app = sp_router(&state).with_state(state);
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [SAML 2.0 Metadata](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod endpoints;
pub mod error;
pub mod logout;
pub mod metadata;
pub mod relay_state;
pub mod request;
pub mod session;
pub mod signature;
pub mod trust;
pub mod types;
pub mod validator;

pub use error::{SamlError, SamlResult};
pub use logout::{LogoutOrchestrator, LogoutSession, LogoutState};
pub use metadata::{IdentityProviderMetadata, MetadataBuilder, MetadataDocument};
pub use relay_state::RelayStateCodec;
pub use request::RequestGenerator;
pub use session::{SessionBinder, SessionHandle};
pub use sp_core::claims::ClaimsSet;
pub use trust::{Certificate, IdentityProviderTrust, SigningCredential, TrustStore};
pub use types::*;
pub use validator::ResponseValidator;

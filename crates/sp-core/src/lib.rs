//! # sp-core
//!
//! Core types shared by the SAML service provider crates.
//!
//! - [`config`]: the validated, process-wide SP configuration
//! - [`error`]: the host-facing error type
//! - [`claims`]: claims extracted from a validated assertion
//! - [`event`]: audit events and login-flow hooks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod config;
pub mod error;
pub mod event;

pub use claims::ClaimsSet;
pub use config::ServiceProviderConfig;
pub use error::{Error, Result};

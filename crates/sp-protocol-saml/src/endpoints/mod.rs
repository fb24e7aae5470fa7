//! SP endpoint handlers.
//!
//! Axum handlers for the browser-facing side of the SP:
//!
//! - **Metadata** - serves SP metadata
//! - **Login** - starts SP-initiated login
//! - **ACS** - consumes the IdP's response and signs the user in
//! - **Sign-out** - starts SP-initiated logout
//! - **SLO** - handles IdP logout requests and logout responses
//!
//! # Example
//!
//! ```rust,ignore
//! use sp_protocol_saml::endpoints::{sp_router, SpState};
//!
//! let app = sp_router(&state).with_state(state);
//! ```

mod acs;
mod cookie;
mod login;
mod metadata;
mod reply;
mod router;
mod sign_out;
mod slo;
mod state;

pub use acs::*;
pub use cookie::*;
pub use login::*;
pub use metadata::*;
pub use reply::AUTHENTICATION_FAILED;
pub use router::*;
pub use sign_out::*;
pub use slo::*;
pub use state::*;

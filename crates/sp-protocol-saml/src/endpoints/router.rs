//! SP router.

use axum::{
    routing::{get, post},
    Router,
};
use sp_core::config::{ACS_PATH, LOGIN_PATH, METADATA_PATH, SLO_PATH};

use super::acs::acs;
use super::login::login;
use super::metadata::sp_metadata;
use super::sign_out::sign_out;
use super::slo::{slo_post, slo_redirect};
use super::state::SpState;

/// Creates the SP router.
///
/// | Method   | Path                 | Handler        |
/// |----------|----------------------|----------------|
/// | GET      | `/saml/metadata`     | `sp_metadata`  |
/// | GET      | `/saml/login`        | `login`        |
/// | POST     | `/saml/acs`          | `acs`          |
/// | GET/POST | `/saml/slo`          | `slo_*`        |
/// | GET/POST | `{sign_out_path}`    | `sign_out`     |
///
/// ```rust,ignore
/// let app = sp_router(&state).with_state(state);
/// ```
pub fn sp_router(state: &SpState) -> Router<SpState> {
    Router::new()
        .route(METADATA_PATH, get(sp_metadata))
        .route(LOGIN_PATH, get(login))
        .route(ACS_PATH, post(acs))
        .route(SLO_PATH, get(slo_redirect).post(slo_post))
        .route(&state.config.sign_out_path, get(sign_out).post(sign_out))
}

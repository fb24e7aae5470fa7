//! SP-initiated login.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use crate::relay_state::sanitize_return_path;

use super::reply::{deliver, error_response};
use super::state::SpState;

/// Query parameters of the login endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    /// Local path to return to after login.
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// `GET /saml/login?returnUrl=`.
///
/// Sends the browser to the IdP with a fresh AuthnRequest.
pub async fn login(State(state): State<SpState>, Query(params): Query<LoginParams>) -> Response {
    let return_to = sanitize_return_path(params.return_url.as_deref());
    match state.requests.new_authn_request(None, Some(&return_to)).await {
        Ok((_, message)) => deliver(message, HeaderMap::new()),
        Err(e) => {
            tracing::error!(error.kind = e.kind(), error = %e, "could not start login");
            error_response(&e)
        }
    }
}

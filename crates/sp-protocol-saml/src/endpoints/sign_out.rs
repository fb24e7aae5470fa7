//! SP-initiated logout.

use axum::{
    extract::State,
    http::HeaderMap,
    response::Response,
};
use sp_core::event::{Event, EventType};

use crate::error::SamlError;
use crate::logout::LogoutSession;

use super::reply::{deliver, error_response, local_redirect};
use super::state::SpState;

/// `GET|POST {sign_out_path}`.
///
/// Sends a LogoutRequest to the IdP for the current session. Without a
/// session there is nothing to do. If the IdP offers no logout endpoint or
/// the session is unknown, the session ends locally only.
pub async fn sign_out(State(state): State<SpState>, headers: HeaderMap) -> Response {
    let Some(handle) = state.cookie.extract(&headers) else {
        return local_redirect("/", HeaderMap::new());
    };

    let mut session = LogoutSession::active(handle);
    match state.logout.begin(&mut session, Some("/")).await {
        Ok(message) => deliver(message, HeaderMap::new()),
        Err(e @ (SamlError::UnsupportedBinding(_) | SamlError::Session(_))) => {
            tracing::info!(error.kind = e.kind(), "ending session locally only");
            if let Err(e) = state.sessions.terminate(session.handle()).await {
                tracing::warn!(error = %e, "local session termination failed");
            }
            state.audit.record(
                &Event::builder(EventType::Logout)
                    .success()
                    .session(session.handle().to_string())
                    .detail("scope", "local")
                    .build(),
            );
            let mut reply = HeaderMap::new();
            state.cookie.remove(&mut reply);
            local_redirect("/", reply)
        }
        Err(e) => {
            tracing::error!(error.kind = e.kind(), error = %e, "could not start logout");
            error_response(&e)
        }
    }
}

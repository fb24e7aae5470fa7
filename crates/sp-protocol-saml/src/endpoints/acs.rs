//! Assertion Consumer Service.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use chrono::Utc;
use sp_core::event::{Event, EventType, RemoteFailure};

use crate::bindings::SamlParams;
use crate::error::{SamlError, SamlResult};
use crate::session::SessionHandle;

use super::reply::{local_redirect, AUTHENTICATION_FAILED};
use super::state::SpState;

/// `POST /saml/acs`.
///
/// Validates the response, establishes a session, sets the cookie and
/// redirects to the return path carried in the RelayState. Any failure
/// answers 401 "authentication failed".
pub async fn acs(State(state): State<SpState>, Form(params): Form<SamlParams>) -> Response {
    match consume(&state, &params).await {
        Ok((handle, return_to)) => {
            let mut headers = HeaderMap::new();
            state.cookie.set(&mut headers, &handle);
            local_redirect(&return_to, headers)
        }
        Err(e) => {
            state.hooks.on_remote_failure(&RemoteFailure {
                kind: e.kind(),
                message: e.to_string(),
                issuer: Some(state.trust.idp().entity_id.clone()),
            });
            state.audit.record(
                &Event::builder(EventType::LoginError)
                    .failure(e.kind())
                    .detail("message", e.to_string())
                    .build(),
            );
            let status = if e.http_status() == 500 {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::UNAUTHORIZED
            };
            (status, AUTHENTICATION_FAILED).into_response()
        }
    }
}

async fn consume(
    state: &SpState,
    params: &SamlParams,
) -> SamlResult<(SessionHandle, String)> {
    let raw = params
        .saml_response
        .as_deref()
        .ok_or_else(|| SamlError::InvalidRequest("no SAMLResponse".to_string()))?;
    let now = Utc::now();
    let relay = params
        .relay_state
        .as_deref()
        .map(|token| state.relay_state.decode(token, now))
        .transpose()?;
    let expected = relay.as_ref().and_then(|r| r.request_id.as_deref());

    let mut claims = state.validator.validate(raw, expected, now).await?;
    state.hooks.on_ticket_received(&mut claims)?;
    let handle = state.sessions.establish(&claims).await?;

    state.audit.record(
        &Event::builder(EventType::Login)
            .success()
            .issuer(claims.issuer.clone())
            .name_id(claims.name_id.clone())
            .session(handle.to_string())
            .detail("assertion_id", claims.assertion_id.clone())
            .build(),
    );
    let return_to = relay.map_or_else(|| "/".to_string(), |r| r.return_to);
    Ok((handle, return_to))
}

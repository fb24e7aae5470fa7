//! Single Logout Service.
//!
//! Receives IdP-initiated LogoutRequests and the LogoutResponses that
//! complete SP-initiated logout, over HTTP-Redirect (GET) or HTTP-POST.

use axum::{
    extract::{RawQuery, State},
    http::HeaderMap,
    response::Response,
    Form,
};
use chrono::Utc;
use sp_core::event::{Event, EventType, RemoteFailure};

use crate::bindings::{
    DecodedMessage, HttpPostBinding, HttpRedirectBinding, SamlMessageType, SamlParams,
};
use crate::error::{SamlError, SamlResult};
use crate::logout::LogoutSession;

use super::reply::{deliver, error_response, local_redirect};
use super::state::SpState;

/// `GET /saml/slo` (HTTP-Redirect binding).
pub async fn slo_redirect(
    State(state): State<SpState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let decoded = query
        .as_deref()
        .ok_or_else(|| SamlError::InvalidRequest("no query string".to_string()))
        .and_then(HttpRedirectBinding::decode_query);
    dispatch(&state, &headers, decoded).await
}

/// `POST /saml/slo` (HTTP-POST binding).
pub async fn slo_post(
    State(state): State<SpState>,
    headers: HeaderMap,
    Form(params): Form<SamlParams>,
) -> Response {
    dispatch(&state, &headers, HttpPostBinding::decode(&params)).await
}

async fn dispatch(
    state: &SpState,
    headers: &HeaderMap,
    decoded: SamlResult<DecodedMessage>,
) -> Response {
    let message = match decoded {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error.kind = e.kind(), error = %e, "undecodable logout message");
            return error_response(&e);
        }
    };
    match message.message_type {
        SamlMessageType::Request => idp_initiated(state, headers, &message).await,
        SamlMessageType::Response => sp_initiated_completion(state, headers, &message).await,
    }
}

async fn idp_initiated(state: &SpState, headers: &HeaderMap, message: &DecodedMessage) -> Response {
    match state.logout.handle_idp_request(message, Utc::now()).await {
        Ok(outcome) => {
            let mut reply = HeaderMap::new();
            if let Some(current) = state.cookie.extract(headers) {
                if outcome.terminated.contains(&current) {
                    state.cookie.remove(&mut reply);
                }
            }
            for handle in &outcome.terminated {
                state.audit.record(
                    &Event::builder(EventType::Logout)
                        .success()
                        .issuer(state.trust.idp().entity_id.clone())
                        .session(handle.to_string())
                        .detail("initiator", "idp")
                        .build(),
                );
            }
            deliver(outcome.response, reply)
        }
        Err(e) => {
            report(state, &e);
            error_response(&e)
        }
    }
}

async fn sp_initiated_completion(
    state: &SpState,
    headers: &HeaderMap,
    message: &DecodedMessage,
) -> Response {
    let now = Utc::now();
    let relay = match message
        .relay_state
        .as_deref()
        .ok_or_else(|| SamlError::RelayState("logout response without relay state".to_string()))
        .and_then(|token| state.relay_state.decode(token, now))
    {
        Ok(relay) => relay,
        Err(e) => {
            report(state, &e);
            return error_response(&e);
        }
    };
    let (Some(handle), Some(request_id)) = (state.cookie.extract(headers), relay.request_id) else {
        let e = SamlError::InvalidRequest("logout response without a pending session".to_string());
        report(state, &e);
        return error_response(&e);
    };

    let mut session = LogoutSession::pending(handle, request_id);
    let mut reply = HeaderMap::new();
    match state.logout.complete(&mut session, message, now).await {
        Ok(()) => {
            state.audit.record(
                &Event::builder(EventType::Logout)
                    .success()
                    .session(session.handle().to_string())
                    .detail("initiator", "sp")
                    .build(),
            );
        }
        Err(e @ SamlError::InvalidTransition { .. }) => return error_response(&e),
        Err(e) => report(state, &e),
    }
    state.cookie.remove(&mut reply);
    local_redirect(&relay.return_to, reply)
}

fn report(state: &SpState, err: &SamlError) {
    state.hooks.on_remote_failure(&RemoteFailure {
        kind: err.kind(),
        message: err.to_string(),
        issuer: Some(state.trust.idp().entity_id.clone()),
    });
    state.audit.record(
        &Event::builder(EventType::LogoutError)
            .failure(err.kind())
            .detail("message", err.to_string())
            .build(),
    );
}

//! Response helpers shared by the handlers.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::bindings::OutboundMessage;
use crate::error::SamlError;

/// Body of every rejected login.
pub const AUTHENTICATION_FAILED: &str = "authentication failed";

/// Sends an outbound message to the browser.
pub(crate) fn deliver(message: OutboundMessage, headers: HeaderMap) -> Response {
    match message {
        OutboundMessage::Redirect(url) => (headers, Redirect::to(&url)).into_response(),
        OutboundMessage::PostForm(form) => (headers, Html(form)).into_response(),
    }
}

/// Redirects within the site.
pub(crate) fn local_redirect(path: &str, headers: HeaderMap) -> Response {
    (headers, Redirect::to(path)).into_response()
}

/// Maps an error to a status and a short fixed message.
///
/// Detail stays in the logs.
pub(crate) fn error_response(err: &SamlError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match status {
        StatusCode::UNAUTHORIZED => AUTHENTICATION_FAILED,
        StatusCode::BAD_REQUEST => "invalid request",
        StatusCode::CONFLICT => "invalid logout state",
        _ => "internal error",
    };
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_hide_detail() {
        let response = error_response(&SamlError::ReplayDetected("_a1".to_string()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = error_response(&SamlError::InvalidRequest("no SAMLResponse".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&SamlError::Internal("store down".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn post_form_is_html() {
        let response = deliver(
            OutboundMessage::PostForm("<form></form>".to_string()),
            HeaderMap::new(),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }
}

//! Router configuration.
//!
//! This module creates the main Axum router that combines the SAML endpoints
//! with health checks and a small session info endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use sp_protocol_saml::endpoints::{sp_router, SpState};
use tower_http::trace::TraceLayer;

/// Creates the main application router.
pub fn create_router(state: SpState) -> Router {
    let health = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check));

    let app = Router::new()
        .route("/", get(root))
        .route("/session", get(current_session));

    sp_router(&state)
        .merge(app)
        .with_state(state)
        .merge(health)
        .layer(TraceLayer::new_for_http())
}

/// Server information response.
#[derive(Serialize)]
pub struct ServerInfo {
    name: &'static str,
    version: &'static str,
    entity_id: String,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
}

/// Claims of the signed-in user.
#[derive(Serialize)]
pub struct SessionInfo {
    name_id: String,
    issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_index: Option<String>,
    attributes: Vec<SessionAttribute>,
}

/// One attribute of [`SessionInfo`].
#[derive(Serialize)]
pub struct SessionAttribute {
    name: String,
    values: Vec<String>,
}

/// Root endpoint handler.
async fn root(State(state): State<SpState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: "sp-server",
        version: env!("CARGO_PKG_VERSION"),
        entity_id: state.config.entity_id.clone(),
    })
}

/// `GET /session`: the claims behind the session cookie.
async fn current_session(State(state): State<SpState>, headers: HeaderMap) -> Response {
    let Some(handle) = state.cookie.extract(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match state.sessions.claims(&handle).await {
        Ok(Some(claims)) => Json(SessionInfo {
            attributes: claims
                .attributes()
                .map(|(name, values)| SessionAttribute {
                    name: name.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
            name_id: claims.name_id,
            issuer: claims.issuer,
            session_index: claims.session_index,
        })
        .into_response(),
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION")),
    })
}

/// Liveness check.
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Readiness check.
async fn readiness_check() -> StatusCode {
    StatusCode::OK
}

//! SP metadata endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::metadata::{MetadataBuilder, METADATA_CONTENT_TYPE};

use super::reply::error_response;
use super::state::SpState;

/// `GET /saml/metadata`.
pub async fn sp_metadata(State(state): State<SpState>) -> Response {
    let built = MetadataBuilder::build(
        &state.config,
        state.trust.signing_certificate().certificate(),
        state.trust.encryption_certificate().map(AsRef::as_ref),
        None,
    );
    match built {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, METADATA_CONTENT_TYPE)],
            document.into_string(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error.kind = e.kind(), error = %e, "metadata generation failed");
            error_response(&e)
        }
    }
}

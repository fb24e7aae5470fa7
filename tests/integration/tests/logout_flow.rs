//! Single Logout tests, SP- and IdP-initiated.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sp_integration_tests::{query_of, IDP_ENTITY_ID, IDP_SLO_URL, SP_SLO_URL};
use sp_protocol_saml::bindings::{HttpRedirectBinding, SamlMessageType};
use sp_protocol_saml::{status_codes, LogoutRequest, LogoutResponse, NameId, Status};

use crate::common::{clears_cookie, decode_redirect, location, TestEnv};

fn idp_logout_request(id: &str) -> anyhow::Result<String> {
    Ok(LogoutRequest::new(id, IDP_ENTITY_ID, NameId::email("user@example.org"))
        .with_destination(SP_SLO_URL)
        .with_session_index("_session1")
        .valid_until(Utc::now() + Duration::minutes(5))
        .to_xml()?)
}

/// Tests SP-initiated logout through to the IdP's confirmation.
#[tokio::test]
async fn test_sp_initiated_logout() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let cookie = env.sign_in().await?;

    let response = env.get("/signedout", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let url = location(&response)?;
    assert!(
        url.starts_with(&format!("{IDP_SLO_URL}?SAMLRequest=")),
        "Expected redirect to the IdP SLO endpoint, got {url}"
    );

    let request = decode_redirect(&url)?;
    assert!(request.xml.contains("user@example.org"), "LogoutRequest should name the subject");
    assert!(request.xml.contains("_session1"), "LogoutRequest should carry the session index");
    let request_id = sp_integration_tests::message_id(&request.xml)?;
    let relay_state = request.relay_state.expect("relay state");

    let answer = LogoutResponse::new("_idp_resp", IDP_ENTITY_ID, Status::success())
        .in_response_to(&request_id)
        .with_destination(SP_SLO_URL)
        .to_xml()?;
    let query = env
        .idp
        .redirect_query(&answer, Some(&relay_state), SamlMessageType::Response)?;

    let response = env.get(&format!("/saml/slo?{query}"), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/");
    assert!(clears_cookie(&response), "Logout should clear the session cookie");

    let session = env.get("/session", Some(&cookie)).await?;
    assert_eq!(session.status(), StatusCode::UNAUTHORIZED, "Session should be gone");

    Ok(())
}

/// Tests that a refused logout still ends the local session.
#[tokio::test]
async fn test_refused_logout_ends_local_session() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let cookie = env.sign_in().await?;

    let response = env.get("/signedout", Some(&cookie)).await?;
    let request = decode_redirect(&location(&response)?)?;
    let request_id = sp_integration_tests::message_id(&request.xml)?;

    let answer = LogoutResponse::new(
        "_idp_resp",
        IDP_ENTITY_ID,
        Status::responder_error("logout failed"),
    )
    .in_response_to(&request_id)
    .with_destination(SP_SLO_URL)
    .to_xml()?;
    let query = env.idp.redirect_query(
        &answer,
        request.relay_state.as_deref(),
        SamlMessageType::Response,
    )?;

    let response = env.get(&format!("/saml/slo?{query}"), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(clears_cookie(&response));

    let session = env.get("/session", Some(&cookie)).await?;
    assert_eq!(session.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

/// Tests IdP-initiated logout: the session ends and the IdP gets a
/// signed confirmation.
#[tokio::test]
async fn test_idp_initiated_logout() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let cookie = env.sign_in().await?;

    let xml = idp_logout_request("_idp_lo")?;
    let query = env
        .idp
        .redirect_query(&xml, Some("idp-state"), SamlMessageType::Request)?;

    let response = env.get(&format!("/saml/slo?{query}"), Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(clears_cookie(&response), "Current session cookie should be cleared");

    let url = location(&response)?;
    assert!(
        url.starts_with(&format!("{IDP_SLO_URL}?SAMLResponse=")),
        "Expected LogoutResponse to the IdP, got {url}"
    );
    assert!(url.contains("&Signature="), "LogoutResponse should be signed");
    let answer = decode_redirect(&url)?;
    assert!(answer.xml.contains(r#"InResponseTo="_idp_lo""#));
    assert!(answer.xml.contains(status_codes::SUCCESS));
    assert_eq!(answer.relay_state.as_deref(), Some("idp-state"));

    let session = env.get("/session", Some(&cookie)).await?;
    assert_eq!(session.status(), StatusCode::UNAUTHORIZED);

    // The same request cannot be played again
    let again = env.get(&format!("/saml/slo?{query}"), None).await?;
    assert!(again.status().is_client_error(), "Replayed LogoutRequest accepted");

    Ok(())
}

/// Tests that logout messages without a signature are refused.
#[tokio::test]
async fn test_unsigned_logout_request_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let cookie = env.sign_in().await?;

    let xml = idp_logout_request("_unsigned_lo")?;
    let url = HttpRedirectBinding::encode(&xml, SP_SLO_URL, None, SamlMessageType::Request, None)?;

    let response = env
        .get(&format!("/saml/slo?{}", query_of(&url)?), Some(&cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session = env.get("/session", Some(&cookie)).await?;
    assert_eq!(session.status(), StatusCode::OK, "Session must survive");

    Ok(())
}

/// Tests that a logout response without a pending logout is refused.
#[tokio::test]
async fn test_unexpected_logout_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let answer = LogoutResponse::new("_idp_resp", IDP_ENTITY_ID, Status::success())
        .in_response_to("_never_sent")
        .with_destination(SP_SLO_URL)
        .to_xml()?;
    let query = env
        .idp
        .redirect_query(&answer, None, SamlMessageType::Response)?;

    let response = env.get(&format!("/saml/slo?{query}"), None).await?;
    assert!(response.status().is_client_error());

    Ok(())
}

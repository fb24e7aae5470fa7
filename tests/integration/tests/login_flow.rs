//! SP-initiated login tests.
//!
//! Login request, signed response, session establishment and the replay and
//! correlation defenses, end to end.

use axum::http::StatusCode;
use sp_integration_tests::{ResponseSpec, IDP_SSO_URL, SP_ENTITY_ID};
use sp_protocol_saml::endpoints::AUTHENTICATION_FAILED;

use crate::common::{body_string, decode_redirect, location, session_cookie, TestEnv};

/// Tests that the login endpoint sends a signed AuthnRequest to the IdP.
#[tokio::test]
async fn test_login_redirects_to_idp() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.get("/saml/login?returnUrl=/reports", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let url = location(&response)?;
    assert!(
        url.starts_with(&format!("{IDP_SSO_URL}?SAMLRequest=")),
        "Expected redirect to the IdP SSO endpoint, got {url}"
    );
    assert!(url.contains("&SigAlg="), "AuthnRequest should be signed");
    assert!(url.contains("&Signature="), "AuthnRequest should be signed");

    let request = decode_redirect(&url)?;
    assert!(request.xml.contains("AuthnRequest"), "Expected an AuthnRequest");
    assert!(
        request.xml.contains(&format!("<saml:Issuer>{SP_ENTITY_ID}</saml:Issuer>")),
        "AuthnRequest should name the SP as issuer"
    );
    assert!(
        request.xml.contains(r#"AssertionConsumerServiceURL="https://sp.example.org/saml/acs""#),
        "AuthnRequest should carry the ACS URL"
    );
    assert!(request.relay_state.is_some(), "Expected a RelayState token");

    Ok(())
}

/// Tests the full round trip: request, signed response, session.
#[tokio::test]
async fn test_login_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/reports?tab=1").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&env.idp.signed_response(&spec)?, Some(&relay_state))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/reports?tab=1");
    let cookie = session_cookie(&response).expect("session cookie");
    assert!(cookie.starts_with("sp_session="), "Unexpected cookie {cookie}");

    let session = env.get("/session", Some(&cookie)).await?;
    assert_eq!(session.status(), StatusCode::OK);
    let info: serde_json::Value = serde_json::from_str(&body_string(session).await?)?;
    assert_eq!(info["name_id"], "user@example.org");
    assert_eq!(info["issuer"], "https://idp.example.org");
    assert_eq!(info["session_index"], "_session1");
    assert_eq!(info["attributes"][0]["name"], "displayName");
    assert_eq!(info["attributes"][0]["values"][0], "Test User");

    Ok(())
}

/// Tests that the same response cannot sign in twice.
#[tokio::test]
async fn test_resubmitted_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let signed = env.idp.signed_response(&ResponseSpec::new(Some(&request_id)))?;

    let first = env.post_response(&signed, Some(&relay_state)).await?;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = env.post_response(&signed, Some(&relay_state)).await?;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&second).is_none(), "Replay must not create a session");
    assert_eq!(body_string(second).await?, AUTHENTICATION_FAILED);
    assert_eq!(
        env.failures.last(),
        Some("replay_detected"),
        "Resubmission should be reported as a replay"
    );

    Ok(())
}

/// Tests that a response to a request this SP never sent is rejected.
#[tokio::test]
async fn test_response_to_unknown_request_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (_, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some("_never_sent"));
    let response = env
        .post_response(&env.idp.signed_response(&spec)?, Some(&relay_state))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// Tests that IdP-initiated responses need explicit opt-in.
#[tokio::test]
async fn test_unsolicited_response_is_rejected_by_default() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let spec = ResponseSpec::new(None);
    let response = env.post_response(&env.idp.signed_response(&spec)?, None).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// Tests the time window and audience checks.
#[tokio::test]
async fn test_expired_or_misaddressed_assertions_are_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let mut expired = ResponseSpec::new(Some(&request_id));
    expired.not_before = chrono::Utc::now() - chrono::Duration::hours(2);
    expired.not_on_or_after = chrono::Utc::now() - chrono::Duration::hours(1);
    let response = env
        .post_response(&env.idp.signed_response(&expired)?, Some(&relay_state))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "expired assertion");

    let (request_id, relay_state) = env.start_login("/").await?;
    let mut foreign = ResponseSpec::new(Some(&request_id));
    foreign.audience = "https://other-sp.example.org".to_string();
    let response = env
        .post_response(&env.idp.signed_response(&foreign)?, Some(&relay_state))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "foreign audience");

    Ok(())
}

/// Tests that a tampered RelayState token fails the login.
#[tokio::test]
async fn test_tampered_relay_state_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let mut tampered = relay_state.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered)?;

    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&env.idp.signed_response(&spec)?, Some(&tampered))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

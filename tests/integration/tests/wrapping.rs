//! Signature and wrapping defenses at the ACS.

use axum::http::StatusCode;
use sp_integration_tests::{MockIdp, ResponseSpec};

use crate::common::{session_cookie, TestEnv};

/// Tests that an unsigned response never signs anyone in.
#[tokio::test]
async fn test_unsigned_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env.post_response(&spec.unsigned(), Some(&relay_state)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());
    Ok(())
}

/// Tests that a signature by a key outside the IdP metadata is rejected.
#[tokio::test]
async fn test_response_signed_by_unknown_key_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let impostor = MockIdp::new()?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&impostor.signed_response(&spec)?, Some(&relay_state))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// Tests that an attacker assertion next to a signed one is never used.
#[tokio::test]
async fn test_injected_second_assertion_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let signed = env.idp.signed_response(&spec)?;

    let evil = spec.assertion_with_id("_evil", "admin@example.org");
    let wrapped = signed.replacen("<saml:Assertion ", &format!("{evil}<saml:Assertion "), 1);
    assert_ne!(wrapped, signed);

    let response = env.post_response(&wrapped, Some(&relay_state)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());
    Ok(())
}

/// Tests that editing a signed assertion breaks its signature.
#[tokio::test]
async fn test_modified_signed_assertion_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let signed = env.idp.signed_response(&spec)?;
    let modified = signed.replace("user@example.org", "admin@example.org");
    assert_ne!(modified, signed);

    let response = env.post_response(&modified, Some(&relay_state)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

/// Tests that a document type declaration is refused before anything else.
#[tokio::test]
async fn test_doctype_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let signed = env.idp.signed_response(&spec)?;
    let with_dtd = format!("<!DOCTYPE r [<!ENTITY x \"y\">]>{signed}");

    let response = env.post_response(&with_dtd, Some(&relay_state)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

//! Endpoint integration tests.
//!
//! Metadata, health checks, error handling and trust reload.

use axum::http::{header, StatusCode};
use sp_integration_tests::{MockIdp, ResponseSpec};

use crate::common::{body_string, location, session_cookie, TestEnv};

/// Tests that the SP metadata endpoint returns valid metadata.
#[tokio::test]
async fn test_sp_metadata_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.get("/saml/metadata", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(
        content_type.contains("samlmetadata+xml"),
        "Expected SAML metadata content type, got {content_type}"
    );

    let body = body_string(response).await?;
    assert!(
        body.contains(r#"entityID="https://sp.example.org""#),
        "Metadata should carry the SP entity ID"
    );
    assert!(body.contains("SPSSODescriptor"), "Metadata should contain SPSSODescriptor");
    assert!(
        body.contains(r#"Location="https://sp.example.org/saml/acs""#),
        "Metadata should contain the ACS location"
    );
    assert!(
        body.contains(r#"Location="https://sp.example.org/saml/slo""#),
        "Metadata should contain the SLO location"
    );
    assert!(body.contains("X509Certificate"), "Metadata should contain the certificate");

    Ok(())
}

/// Tests that metadata is written to disk when configured.
#[tokio::test]
async fn test_metadata_file_is_written() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!(
        "sp-metadata-{}.xml",
        sp_crypto::random_base64url(9)
    ));
    let target = path.clone();
    let _env = TestEnv::with_config(move |config| {
        config.create_metadata_file = true;
        config.metadata_file = target;
    })
    .await?;

    let written = std::fs::read_to_string(&path)?;
    std::fs::remove_file(&path)?;
    assert!(written.contains("EntityDescriptor"));
    assert!(written.contains("https://sp.example.org"));

    Ok(())
}

/// Tests the health endpoints.
#[tokio::test]
async fn test_health_endpoints() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.get("/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(body["status"], "healthy");

    for path in ["/health/live", "/health/ready"] {
        let response = env.get(path, None).await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    Ok(())
}

/// Tests requests that carry no session or no SAML message.
#[tokio::test]
async fn test_requests_without_session_or_message() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.get("/session", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = env.get("/signedout", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/");

    let response = env.get("/saml/slo", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = env
        .post_form("/saml/acs", "SAMLResponse=bm90IHhtbA%3D%3D".to_string(), None)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());

    Ok(())
}

/// Tests that a login return URL cannot leave the site.
#[tokio::test]
async fn test_open_redirect_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let (request_id, relay_state) = env.start_login("https://evil.example.com/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&env.idp.signed_response(&spec)?, Some(&relay_state))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response)?, "/");
    Ok(())
}

/// Tests that reloading IdP metadata swaps the trusted keys.
#[tokio::test]
async fn test_metadata_refresh_swaps_trust() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let rolled = MockIdp::new()?;

    std::fs::write(env.path("idp-metadata.xml"), rolled.metadata())?;
    env.server.refresh_metadata().await?;

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&env.idp.signed_response(&spec)?, Some(&relay_state))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "old key must be dropped");

    let (request_id, relay_state) = env.start_login("/").await?;
    let spec = ResponseSpec::new(Some(&request_id));
    let response = env
        .post_response(&rolled.signed_response(&spec)?, Some(&relay_state))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "new key must be trusted");

    Ok(())
}

/// Tests that a broken metadata document keeps the current trust.
#[tokio::test]
async fn test_failed_refresh_keeps_trust() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    std::fs::write(env.path("idp-metadata.xml"), "<not-metadata/>")?;
    assert!(env.server.refresh_metadata().await.is_err());

    let cookie = env.sign_in().await?;
    assert!(cookie.starts_with("sp_session="));
    Ok(())
}

//! Common test utilities and fixtures.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use base64::Engine;
use parking_lot::Mutex;
use sp_core::event::{AuthEventListener, RemoteFailure};
use tower::ServiceExt;

use sp_integration_tests::{message_id, pem_credential, query_of, MockIdp};
use sp_protocol_saml::bindings::{DecodedMessage, HttpRedirectBinding};
use sp_server::{Server, ServerConfig};

/// An SP server wired to a simulated IdP, driven in-process.
pub struct TestEnv {
    /// The simulated identity provider.
    pub idp: MockIdp,
    /// The running server's state and configuration.
    pub server: Server,
    /// Router under test.
    pub router: Router,
    /// Failures reported through the login flow hooks.
    pub failures: Arc<FailureLog>,
    dir: PathBuf,
}

/// Records the kind of every failure the endpoints report.
#[derive(Default)]
pub struct FailureLog {
    kinds: Mutex<Vec<&'static str>>,
}

impl FailureLog {
    /// Kind of the most recent failure.
    pub fn last(&self) -> Option<&'static str> {
        self.kinds.lock().last().copied()
    }
}

impl AuthEventListener for FailureLog {
    fn on_remote_failure(&self, failure: &RemoteFailure) {
        self.kinds.lock().push(failure.kind);
    }
}

impl TestEnv {
    /// Creates a new test environment with default settings.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Creates a test environment after letting `adjust` change the config.
    pub async fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> anyhow::Result<Self> {
        // Initialize tracing for tests
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sp_server=debug,sp_protocol_saml=debug")
            .with_test_writer()
            .try_init();

        let dir = std::env::temp_dir().join(format!(
            "sp-it-{}",
            sp_crypto::random_base64url(9)
        ));
        std::fs::create_dir_all(&dir)?;

        let (cert, key) = pem_credential("sp.example.org")?;
        let sp_pem = dir.join("sp.pem");
        std::fs::write(&sp_pem, format!("{cert}{key}"))?;

        let idp = MockIdp::new()?;
        let metadata = dir.join("idp-metadata.xml");
        std::fs::write(&metadata, idp.metadata())?;

        let mut config = ServerConfig::for_testing(&sp_pem, &metadata.to_string_lossy());
        adjust(&mut config);

        let failures = Arc::new(FailureLog::default());
        let server = Server::new(config)
            .await?
            .with_hooks(Arc::clone(&failures) as Arc<dyn AuthEventListener>);
        let router = server.test_router();

        Ok(Self {
            idp,
            server,
            router,
            failures,
            dir,
        })
    }

    /// Path of a file inside the environment's scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Sends a GET request.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> anyhow::Result<Response<Body>> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        Ok(self.router.clone().oneshot(request.body(Body::empty())?).await?)
    }

    /// Sends a form POST.
    pub async fn post_form(
        &self,
        uri: &str,
        form: String,
        cookie: Option<&str>,
    ) -> anyhow::Result<Response<Body>> {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        Ok(self.router.clone().oneshot(request.body(Body::from(form))?).await?)
    }

    /// Starts SP-initiated login and returns the AuthnRequest ID and the
    /// RelayState token the IdP must echo back.
    pub async fn start_login(&self, return_url: &str) -> anyhow::Result<(String, String)> {
        let response = self
            .get(
                &format!("/saml/login?returnUrl={}", urlencoding::encode(return_url)),
                None,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        let request = decode_redirect(&location(&response)?)?;
        let relay_state = request
            .relay_state
            .ok_or_else(|| anyhow::anyhow!("AuthnRequest without RelayState"))?;
        Ok((message_id(&request.xml)?, relay_state))
    }

    /// Posts a response to the ACS.
    pub async fn post_response(
        &self,
        response_xml: &str,
        relay_state: Option<&str>,
    ) -> anyhow::Result<Response<Body>> {
        self.post_form("/saml/acs", acs_form(response_xml, relay_state), None)
            .await
    }

    /// Completes a full login and returns the session cookie.
    pub async fn sign_in(&self) -> anyhow::Result<String> {
        let (request_id, relay_state) = self.start_login("/app").await?;
        let spec = sp_integration_tests::ResponseSpec::new(Some(&request_id));
        let response = self
            .post_response(&self.idp.signed_response(&spec)?, Some(&relay_state))
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should succeed");
        session_cookie(&response).ok_or_else(|| anyhow::anyhow!("no session cookie"))
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Form body for the ACS.
pub fn acs_form(response_xml: &str, relay_state: Option<&str>) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(response_xml);
    let mut form = format!("SAMLResponse={}", urlencoding::encode(&encoded));
    if let Some(relay_state) = relay_state {
        form.push_str("&RelayState=");
        form.push_str(&urlencoding::encode(relay_state));
    }
    form
}

/// The `Location` header of a redirect.
pub fn location(response: &Response<Body>) -> anyhow::Result<String> {
    Ok(response
        .headers()
        .get(header::LOCATION)
        .ok_or_else(|| anyhow::anyhow!("no Location header"))?
        .to_str()?
        .to_string())
}

/// Decodes the SAML message carried by a Redirect binding URL.
pub fn decode_redirect(url: &str) -> anyhow::Result<DecodedMessage> {
    Ok(HttpRedirectBinding::decode_query(&query_of(url)?)?)
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

/// Whether a response clears the session cookie.
pub fn clears_cookie(response: &Response<Body>) -> bool {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("Max-Age=0"))
}

/// Reads the whole response body.
pub async fn body_string(response: Response<Body>) -> anyhow::Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

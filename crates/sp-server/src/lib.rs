//! # sp-server
//!
//! Standalone SAML 2.0 service provider.
//!
//! This crate hosts the protocol engine from `sp-protocol-saml`:
//! - Loads the SP credential from PEM files
//! - Loads IdP metadata from a URL or file and refreshes it periodically
//! - Keeps sessions, the replay cache and pending requests in memory
//! - Serves the SAML endpoints plus health checks
//!
//! ## Usage
//!
//! ```ignore
//! use sp_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config).await?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod credentials;
pub mod idp_metadata;
pub mod router;
pub mod session;

pub use config::ServerConfig;
pub use idp_metadata::MetadataSource;
pub use router::create_router;
pub use session::InMemorySessionStore;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use sp_cache::{CorrelationStore, InMemoryCorrelationStore, InMemoryReplayCache, ReplayCache};
use sp_core::event::{AuthEventListener, EventListener, TracingEventListener};
use sp_protocol_saml::endpoints::{SessionCookie, SpState};
use sp_protocol_saml::{MetadataBuilder, RelayStateCodec, TrustStore};
use tokio::net::TcpListener;

/// How often expired replay and correlation entries are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// The SAML service provider server.
pub struct Server {
    config: ServerConfig,
    state: SpState,
    metadata: MetadataSource,
    replay: Arc<dyn ReplayCache>,
    correlation: Arc<dyn CorrelationStore>,
    audit: Arc<dyn EventListener>,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// Loads the SP credential and the IdP metadata and validates the
    /// configuration. Any failure aborts startup.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let sp = Arc::new(config.service_provider()?);

        let credential = credentials::load_signing_credential(
            &config.cert_path,
            &config.key_path,
            sp.certificate_identifier_type,
            sp.signing_certificate_id.as_deref(),
        )?;

        let metadata = MetadataSource::new(
            config.idp_metadata_address.clone(),
            config.idp_entity_id.clone(),
        )?;
        let idp = metadata.load().await?;
        tracing::info!(issuer = %idp.entity_id, sso = %idp.sso.url, "IdP metadata loaded");

        let mut trust = TrustStore::new(
            idp,
            credential,
            sp.certificate_identifier_type,
            sp.clock_skew,
        )?;
        if let Some(path) = &config.encryption_cert_path {
            trust = trust.with_encryption_certificate(credentials::load_certificate(path)?);
        }
        let trust = Arc::new(trust);

        let secret = match &config.relay_state_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!("SP_RELAY_STATE_SECRET not set, pending logins will not survive a restart");
                sp_crypto::random_bytes(32)
            }
        };
        let relay_state = Arc::new(RelayStateCodec::new(&secret, sp.request_ttl)?);

        let replay: Arc<dyn ReplayCache> = Arc::new(InMemoryReplayCache::new());
        let correlation: Arc<dyn CorrelationStore> = Arc::new(InMemoryCorrelationStore::new());
        let audit: Arc<dyn EventListener> = Arc::new(TracingEventListener);

        let state = SpState::new(
            Arc::clone(&sp),
            Arc::clone(&trust),
            Arc::clone(&replay),
            Arc::clone(&correlation),
            Arc::new(InMemorySessionStore::new()),
            relay_state,
        )
        .with_cookie(SessionCookie::new(
            config.cookie_name.clone(),
            config.cookie_secure,
        ))
        .with_audit(Arc::clone(&audit));

        if config.create_metadata_file {
            let document = MetadataBuilder::build(
                &sp,
                trust.signing_certificate().certificate(),
                trust.encryption_certificate().map(AsRef::as_ref),
                None,
            )?;
            tokio::fs::write(&config.metadata_file, document.as_str()).await?;
            tracing::info!(path = %config.metadata_file.display(), "SP metadata written");
        }

        Ok(Self {
            config,
            state,
            metadata,
            replay,
            correlation,
            audit,
        })
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and the background tasks and blocks until
    /// it receives a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let refresh = self.config.metadata_refresh.map(|every| {
            tracing::info!(every_secs = every.as_secs(), "IdP metadata refresh enabled");
            idp_metadata::spawn_refresh(
                self.metadata.clone(),
                Arc::clone(&self.state.trust),
                Arc::clone(&self.audit),
                every,
            )
        });
        let purge = spawn_purge(Arc::clone(&self.replay), Arc::clone(&self.correlation));

        let app = create_router(self.state.clone());

        // Bind to address
        let addr: SocketAddr = self.config.bind_address().parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(entity_id = %self.state.config.entity_id, "Server listening on http://{}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(task) = refresh {
            task.abort();
        }
        purge.abort();

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Installs login flow hooks, replacing the tracing default.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn AuthEventListener>) -> Self {
        self.state = self.state.with_hooks(hooks);
        self
    }

    /// Returns the endpoint state.
    #[must_use]
    pub const fn state(&self) -> &SpState {
        &self.state
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Re-reads the IdP metadata now.
    ///
    /// # Errors
    ///
    /// Returns an error and keeps the current trust set if loading fails.
    pub async fn refresh_metadata(&self) -> anyhow::Result<()> {
        self.metadata.refresh(&self.state.trust).await
    }

    /// Creates a test router without starting the server.
    ///
    /// This is useful for integration testing.
    pub fn test_router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Spawns the periodic purge of expired replay and correlation entries.
fn spawn_purge(
    replay: Arc<dyn ReplayCache>,
    correlation: Arc<dyn CorrelationStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match replay.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "purged replay cache"),
                Err(e) => tracing::warn!(error = %e, "replay cache purge failed"),
            }
            match correlation.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "purged pending requests"),
                Err(e) => tracing::warn!(error = %e, "correlation purge failed"),
            }
        }
    })
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

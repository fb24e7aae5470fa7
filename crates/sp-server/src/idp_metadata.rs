//! Identity provider metadata loading and refresh.
//!
//! The metadata address is either an `http(s)` URL or a local file path.
//! A background task re-reads it periodically and swaps the trust set; a
//! failed refresh keeps the current one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sp_core::event::{Event, EventListener, EventType};
use sp_protocol_saml::{IdentityProviderMetadata, IdentityProviderTrust, TrustStore};
use tokio::task::JoinHandle;

/// Reads IdP metadata from a URL or a file.
#[derive(Debug, Clone)]
pub struct MetadataSource {
    address: String,
    entity_id: Option<String>,
    client: reqwest::Client,
}

impl MetadataSource {
    /// Creates a source.
    ///
    /// # Arguments
    ///
    /// * `address` - `http(s)` URL or file path of the metadata document
    /// * `entity_id` - entity to pick when the document lists several
    pub fn new(address: impl Into<String>, entity_id: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            address: address.into(),
            entity_id,
            client,
        })
    }

    /// Whether the address is fetched over HTTP.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.address.starts_with("https://") || self.address.starts_with("http://")
    }

    /// Fetches and parses the metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or does not describe
    /// a usable identity provider.
    pub async fn load(&self) -> anyhow::Result<IdentityProviderTrust> {
        let xml = if self.is_remote() {
            self.client
                .get(&self.address)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(&self.address).await?
        };
        let trust = IdentityProviderMetadata::parse(&xml, self.entity_id.as_deref())
            .with_context(|| format!("parsing IdP metadata from {}", self.address))?;
        tracing::debug!(
            address = %self.address,
            issuer = %trust.entity_id,
            certificates = trust.certificates.len(),
            "loaded IdP metadata"
        );
        Ok(trust)
    }

    /// Loads the metadata once and swaps it into `trust`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or the trust store rejects the set.
    pub async fn refresh(&self, trust: &TrustStore) -> anyhow::Result<()> {
        let idp = self.load().await?;
        trust.reload(idp)?;
        Ok(())
    }
}

/// Spawns the periodic metadata refresh.
pub fn spawn_refresh(
    source: MetadataSource,
    trust: Arc<TrustStore>,
    audit: Arc<dyn EventListener>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately and startup already loaded
        interval.tick().await;
        loop {
            interval.tick().await;
            let event = match source.refresh(&trust).await {
                Ok(()) => Event::builder(EventType::TrustReloaded)
                    .success()
                    .issuer(trust.idp().entity_id.clone())
                    .build(),
                Err(e) => {
                    tracing::warn!(error = %e, "IdP metadata refresh failed, keeping current trust");
                    Event::builder(EventType::TrustReloaded)
                        .failure("invalid_metadata")
                        .detail("message", e.to_string())
                        .build()
                }
            };
            audit.record(&event);
        }
    })
}

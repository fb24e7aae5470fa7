//! Shared endpoint state.

use std::sync::Arc;

use sp_cache::{CorrelationStore, ReplayCache};
use sp_core::config::ServiceProviderConfig;
use sp_core::event::{AuthEventListener, EventListener, TracingEventListener};

use crate::logout::LogoutOrchestrator;
use crate::relay_state::RelayStateCodec;
use crate::request::RequestGenerator;
use crate::session::SessionBinder;
use crate::trust::TrustStore;
use crate::validator::ResponseValidator;

use super::cookie::SessionCookie;

/// State shared by all SP endpoints.
///
/// Cheap to clone; every component sits behind an `Arc`.
#[derive(Clone)]
pub struct SpState {
    /// SP configuration.
    pub config: Arc<ServiceProviderConfig>,
    /// SP credential and IdP trust.
    pub trust: Arc<TrustStore>,
    /// Outbound request builder.
    pub requests: Arc<RequestGenerator>,
    /// Inbound message validator.
    pub validator: Arc<ResponseValidator>,
    /// Single logout driver.
    pub logout: Arc<LogoutOrchestrator>,
    /// Host session seam.
    pub sessions: Arc<dyn SessionBinder>,
    /// RelayState token codec.
    pub relay_state: Arc<RelayStateCodec>,
    /// Session cookie settings.
    pub cookie: SessionCookie,
    /// Audit event sink.
    pub audit: Arc<dyn EventListener>,
    /// Login flow hooks.
    pub hooks: Arc<dyn AuthEventListener>,
}

impl SpState {
    /// Wires the protocol components together.
    #[must_use]
    pub fn new(
        config: Arc<ServiceProviderConfig>,
        trust: Arc<TrustStore>,
        replay: Arc<dyn ReplayCache>,
        correlation: Arc<dyn CorrelationStore>,
        sessions: Arc<dyn SessionBinder>,
        relay_state: Arc<RelayStateCodec>,
    ) -> Self {
        let requests = Arc::new(RequestGenerator::new(
            Arc::clone(&config),
            Arc::clone(&trust),
            Arc::clone(&correlation),
            Arc::clone(&relay_state),
        ));
        let validator = Arc::new(ResponseValidator::new(
            Arc::clone(&config),
            Arc::clone(&trust),
            replay,
            correlation,
        ));
        let logout = Arc::new(LogoutOrchestrator::new(
            Arc::clone(&requests),
            Arc::clone(&validator),
            Arc::clone(&sessions),
        ));
        Self {
            config,
            trust,
            requests,
            validator,
            logout,
            sessions,
            relay_state,
            cookie: SessionCookie::default(),
            audit: Arc::new(TracingEventListener),
            hooks: Arc::new(TracingEventListener),
        }
    }

    /// Replaces the session cookie settings.
    #[must_use]
    pub fn with_cookie(mut self, cookie: SessionCookie) -> Self {
        self.cookie = cookie;
        self
    }

    /// Replaces the audit event sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn EventListener>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the login flow hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn AuthEventListener>) -> Self {
        self.hooks = hooks;
        self
    }
}

impl std::fmt::Debug for SpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpState")
            .field("entity_id", &self.config.entity_id)
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}

//! Authentication events.
//!
//! Two seams live here:
//!
//! - [`EventListener`] receives structured audit [`Event`]s for every login,
//!   logout and trust reload.
//! - [`AuthEventListener`] lets the host take part in the login flow: it can
//!   enrich claims before a session is established and observe remote
//!   failures.
//!
//! All events include:
//! - Timestamp (ISO 8601)
//! - Event type
//! - Subject `NameID` and issuer (when available)
//! - Outcome (success/failure)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claims::ClaimsSet;
use crate::error::Result;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Login completed.
    Login,
    /// Login failed.
    LoginError,
    /// Logout completed.
    Logout,
    /// Logout failed.
    LogoutError,
    /// IdP trust set replaced.
    TrustReloaded,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A security event for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event (ISO 8601).
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// IdP entity ID involved.
    pub issuer: Option<String>,

    /// Subject `NameID`.
    pub name_id: Option<String>,

    /// Local session handle.
    pub session_id: Option<String>,

    /// Source IP address.
    pub ip_address: Option<String>,

    /// Error kind (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    issuer: Option<String>,
    name_id: Option<String>,
    session_id: Option<String>,
    ip_address: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            issuer: None,
            name_id: None,
            session_id: None,
            ip_address: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to success.
    #[must_use]
    pub const fn success(mut self) -> Self {
        self.outcome = EventOutcome::Success;
        self
    }

    /// Sets the outcome to failure with an error kind.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the IdP entity ID.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the subject `NameID`.
    #[must_use]
    pub fn name_id(mut self, name_id: impl Into<String>) -> Self {
        self.name_id = Some(name_id.into());
        self
    }

    /// Sets the session handle.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the IP address.
    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            issuer: self.issuer,
            name_id: self.name_id,
            session_id: self.session_id,
            ip_address: self.ip_address,
            error: self.error,
            details: self.details,
        }
    }
}

/// Receives audit events.
pub trait EventListener: Send + Sync {
    /// Records an event.
    fn record(&self, event: &Event);
}

/// A failure reported by the remote authentication flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Stable error kind, e.g. `replay_detected`.
    pub kind: &'static str,
    /// Operator-facing description.
    pub message: String,
    /// Issuer of the failed message, when known.
    pub issuer: Option<String>,
}

/// Hooks into the login flow.
///
/// Both methods have no-op defaults.
pub trait AuthEventListener: Send + Sync {
    /// Called after an assertion is validated and before the session is
    /// established. Implementations may add or rewrite claims.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the login.
    fn on_ticket_received(&self, claims: &mut ClaimsSet) -> Result<()> {
        let _ = claims;
        Ok(())
    }

    /// Called when a response or logout message fails validation.
    fn on_remote_failure(&self, failure: &RemoteFailure) {
        let _ = failure;
    }
}

/// Listener that writes events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventListener;

impl EventListener for TracingEventListener {
    fn record(&self, event: &Event) {
        match event.outcome {
            EventOutcome::Success => tracing::info!(
                event.id = %event.id,
                event.kind = ?event.event_type,
                issuer = event.issuer.as_deref().unwrap_or("-"),
                name_id = event.name_id.as_deref().unwrap_or("-"),
                "audit event"
            ),
            EventOutcome::Failure => tracing::warn!(
                event.id = %event.id,
                event.kind = ?event.event_type,
                issuer = event.issuer.as_deref().unwrap_or("-"),
                error.kind = event.error.as_deref().unwrap_or("-"),
                "audit event"
            ),
        }
    }
}

impl AuthEventListener for TracingEventListener {
    fn on_remote_failure(&self, failure: &RemoteFailure) {
        tracing::warn!(
            error.kind = failure.kind,
            issuer = failure.issuer.as_deref().unwrap_or("-"),
            "remote authentication failure: {}",
            failure.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder_creates_success_event() {
        let event = Event::builder(EventType::Login)
            .success()
            .issuer("https://idp.example.org")
            .name_id("user@example.org")
            .ip_address("192.168.1.1")
            .build();

        assert_eq!(event.event_type, EventType::Login);
        assert_eq!(event.outcome, EventOutcome::Success);
        assert_eq!(event.issuer.as_deref(), Some("https://idp.example.org"));
        assert_eq!(event.name_id.as_deref(), Some("user@example.org"));
        assert!(event.error.is_none());
    }

    #[test]
    fn event_builder_creates_failure_event() {
        let event = Event::builder(EventType::LoginError)
            .failure("replay_detected")
            .detail("assertion_id", "_abc")
            .build();

        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.error.as_deref(), Some("replay_detected"));
        assert_eq!(event.details, vec![("assertion_id".into(), "_abc".into())]);
    }

    #[test]
    fn event_has_timestamp() {
        let before = Utc::now();
        let event = Event::builder(EventType::Logout).build();
        let after = Utc::now();

        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }

    #[test]
    fn event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventType::TrustReloaded).unwrap();
        assert_eq!(json, "\"TRUST_RELOADED\"");
    }

    struct Enricher;

    impl AuthEventListener for Enricher {
        fn on_ticket_received(&self, claims: &mut ClaimsSet) -> Result<()> {
            claims.add_attribute("tenant", "acme");
            Ok(())
        }
    }

    #[test]
    fn ticket_hook_can_enrich_claims() {
        let mut claims = ClaimsSet::new("user", "idp", "_1");
        Enricher.on_ticket_received(&mut claims).unwrap();
        assert_eq!(claims.first("tenant"), Some("acme"));

        // default hook is a no-op
        TracingEventListener.on_ticket_received(&mut claims).unwrap();
        assert_eq!(claims.attributes().count(), 1);
    }
}

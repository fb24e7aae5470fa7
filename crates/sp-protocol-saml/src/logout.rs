//! Single logout.
//!
//! A host session moves through [`LogoutState`]:
//!
//! ```text
//! Active --begin--> LogoutPending --response ok--> LoggedOut
//!                                 \-response bad-> LogoutFailed
//! Active --IdP request--> LoggedOut
//! ```
//!
//! `LoggedOut` and `LogoutFailed` are terminal. The local session is ended
//! whatever the IdP answers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bindings::{DecodedMessage, OutboundMessage};
use crate::error::{SamlError, SamlResult};
use crate::request::RequestGenerator;
use crate::session::{SessionBinder, SessionHandle};
use crate::types::Status;
use crate::validator::ResponseValidator;

/// Logout progress of one host session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutState {
    /// Signed in.
    Active,
    /// LogoutRequest sent, waiting for the IdP.
    LogoutPending,
    /// Logged out everywhere.
    LoggedOut,
    /// The IdP did not confirm; the local session is gone regardless.
    LogoutFailed,
}

impl LogoutState {
    /// Stable name for logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::LogoutPending => "logout_pending",
            Self::LoggedOut => "logged_out",
            Self::LogoutFailed => "logout_failed",
        }
    }

    /// True for states no event can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::LoggedOut | Self::LogoutFailed)
    }
}

#[derive(Debug, Clone, Copy)]
enum LogoutEvent {
    Begin,
    Confirmed,
    Refused,
    IdpRequest,
}

impl LogoutEvent {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Confirmed => "confirmed",
            Self::Refused => "refused",
            Self::IdpRequest => "idp_request",
        }
    }
}

fn next_state(from: LogoutState, event: LogoutEvent) -> SamlResult<LogoutState> {
    match (from, event) {
        (LogoutState::Active, LogoutEvent::Begin) => Ok(LogoutState::LogoutPending),
        (LogoutState::Active | LogoutState::LogoutPending, LogoutEvent::IdpRequest)
        | (LogoutState::LogoutPending, LogoutEvent::Confirmed) => Ok(LogoutState::LoggedOut),
        (LogoutState::LogoutPending, LogoutEvent::Refused) => Ok(LogoutState::LogoutFailed),
        _ => Err(SamlError::InvalidTransition {
            from: from.as_str(),
            event: event.as_str(),
        }),
    }
}

/// A host session together with its logout progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutSession {
    handle: SessionHandle,
    state: LogoutState,
    request_id: Option<String>,
}

impl LogoutSession {
    /// A signed-in session.
    #[must_use]
    pub const fn active(handle: SessionHandle) -> Self {
        Self {
            handle,
            state: LogoutState::Active,
            request_id: None,
        }
    }

    /// A session waiting for the answer to `request_id`.
    ///
    /// Used when the pending state was carried across HTTP requests, for
    /// instance in the RelayState token.
    pub fn pending(handle: SessionHandle, request_id: impl Into<String>) -> Self {
        Self {
            handle,
            state: LogoutState::LogoutPending,
            request_id: Some(request_id.into()),
        }
    }

    /// The host session.
    #[must_use]
    pub const fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LogoutState {
        self.state
    }

    /// ID of the outstanding LogoutRequest.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    fn apply(&mut self, event: LogoutEvent) -> SamlResult<()> {
        let to = next_state(self.state, event)?;
        tracing::debug!(
            session = %self.handle,
            from = self.state.as_str(),
            to = to.as_str(),
            "logout transition"
        );
        self.state = to;
        Ok(())
    }
}

/// Result of an IdP-initiated logout.
#[derive(Debug)]
pub struct IdpLogoutOutcome {
    /// Sessions that were ended.
    pub terminated: Vec<SessionHandle>,
    /// LogoutResponse to send back to the IdP.
    pub response: OutboundMessage,
}

/// Drives SP- and IdP-initiated single logout.
pub struct LogoutOrchestrator {
    requests: Arc<RequestGenerator>,
    validator: Arc<ResponseValidator>,
    sessions: Arc<dyn SessionBinder>,
}

impl LogoutOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        requests: Arc<RequestGenerator>,
        validator: Arc<ResponseValidator>,
        sessions: Arc<dyn SessionBinder>,
    ) -> Self {
        Self {
            requests,
            validator,
            sessions,
        }
    }

    /// Starts SP-initiated logout and moves `session` to `LogoutPending`.
    ///
    /// # Errors
    ///
    /// - [`SamlError::InvalidTransition`] unless the session is `Active`
    /// - [`SamlError::Session`] if the binder does not know the session
    /// - [`SamlError::UnsupportedBinding`] if the IdP has no logout endpoint
    pub async fn begin(
        &self,
        session: &mut LogoutSession,
        return_to: Option<&str>,
    ) -> SamlResult<OutboundMessage> {
        next_state(session.state, LogoutEvent::Begin)?;
        let claims = self
            .sessions
            .claims(&session.handle)
            .await?
            .ok_or_else(|| SamlError::Session(format!("unknown session {}", session.handle)))?;

        let (request, message) = self.requests.new_logout_request(&claims, return_to).await?;
        session.request_id = Some(request.id);
        session.apply(LogoutEvent::Begin)?;
        Ok(message)
    }

    /// Completes SP-initiated logout with the IdP's LogoutResponse.
    ///
    /// The local session is terminated whether or not the response is
    /// acceptable. A bad response leaves the session in `LogoutFailed` and
    /// its error is returned. The terminal state is recorded even when the
    /// binder fails to end the local session.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidTransition`] unless the session is
    /// `LogoutPending`, the validation error of a bad response, or the
    /// binder's error if the response was fine but termination failed.
    pub async fn complete(
        &self,
        session: &mut LogoutSession,
        message: &DecodedMessage,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        next_state(session.state, LogoutEvent::Confirmed)?;
        let request_id = session
            .request_id
            .clone()
            .ok_or_else(|| SamlError::Internal("pending logout without request ID".to_string()))?;

        let outcome = self
            .validator
            .validate_logout_response(message, &request_id, now)
            .await;
        let terminated = self.sessions.terminate(&session.handle).await;

        match &outcome {
            Ok(_) => {
                session.apply(LogoutEvent::Confirmed)?;
                tracing::info!(session = %session.handle, "logout confirmed by identity provider");
            }
            Err(e) => {
                session.apply(LogoutEvent::Refused)?;
                tracing::warn!(
                    session = %session.handle,
                    error.kind = e.kind(),
                    error = %e,
                    "logout not confirmed by identity provider"
                );
            }
        }

        if let Err(e) = terminated {
            tracing::error!(
                session = %session.handle,
                error = %e,
                "failed to terminate local session"
            );
            outcome?;
            return Err(e.into());
        }
        outcome.map(|_| ())
    }

    /// Handles a LogoutRequest sent by the IdP.
    ///
    /// Every session matching the NameID (and session indexes, when given)
    /// is terminated. If any termination fails the IdP is told the logout
    /// was partial.
    ///
    /// # Errors
    ///
    /// Returns the validation error of a bad request, or an error from
    /// finding sessions or building the response.
    pub async fn handle_idp_request(
        &self,
        message: &DecodedMessage,
        now: DateTime<Utc>,
    ) -> SamlResult<IdpLogoutOutcome> {
        let request = self.validator.validate_logout_request(message, now).await?;

        let mut matching = Vec::new();
        if request.session_indexes.is_empty() {
            matching = self.sessions.find(&request.name_id.value, None).await?;
        } else {
            for index in &request.session_indexes {
                for handle in self.sessions.find(&request.name_id.value, Some(index)).await? {
                    if !matching.contains(&handle) {
                        matching.push(handle);
                    }
                }
            }
        }

        let mut terminated = Vec::with_capacity(matching.len());
        let mut partial = false;
        for handle in matching {
            let mut session = LogoutSession::active(handle);
            match self.sessions.terminate(&session.handle).await {
                Ok(()) => {
                    session.apply(LogoutEvent::IdpRequest)?;
                    terminated.push(session.handle);
                }
                Err(e) => {
                    partial = true;
                    tracing::warn!(session = %session.handle, error = %e, "session termination failed");
                }
            }
        }

        let status = if partial {
            Status::partial_logout()
        } else {
            Status::success()
        };
        let (_, response) = self.requests.new_logout_response(
            &request.id,
            status,
            message.relay_state.as_deref(),
        )?;

        tracing::info!(
            request_id = %request.id,
            sessions = terminated.len(),
            partial,
            "identity provider logout handled"
        );
        Ok(IdpLogoutOutcome {
            terminated,
            response,
        })
    }
}

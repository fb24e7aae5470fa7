//! Host session seam.
//!
//! The engine never stores sessions itself. After a response validates it
//! hands the claims to a [`SessionBinder`], and logout goes back through the
//! same binder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sp_core::claims::ClaimsSet;

/// Opaque host session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wraps a host session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binds validated claims to host sessions.
#[async_trait]
pub trait SessionBinder: Send + Sync {
    /// Creates a session for a validated principal.
    async fn establish(&self, claims: &ClaimsSet) -> sp_core::Result<SessionHandle>;

    /// Ends a session. Ending an unknown session is not an error.
    async fn terminate(&self, handle: &SessionHandle) -> sp_core::Result<()>;

    /// Sessions of `name_id`, restricted to `session_index` when given.
    async fn find(
        &self,
        name_id: &str,
        session_index: Option<&str>,
    ) -> sp_core::Result<Vec<SessionHandle>>;

    /// Claims the session was established with.
    async fn claims(&self, handle: &SessionHandle) -> sp_core::Result<Option<ClaimsSet>>;
}

//! In-memory session store.
//!
//! Sessions live only as long as the process. Each handle is a random
//! identifier carried in the session cookie.

use async_trait::async_trait;
use dashmap::DashMap;
use sp_protocol_saml::{ClaimsSet, SessionBinder, SessionHandle};

/// Process-local [`SessionBinder`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionHandle, ClaimsSet>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionBinder for InMemorySessionStore {
    async fn establish(&self, claims: &ClaimsSet) -> sp_core::Result<SessionHandle> {
        let handle = SessionHandle::new(sp_crypto::generate_session_id());
        self.sessions.insert(handle.clone(), claims.clone());
        tracing::debug!(name_id = %claims.name_id, "session established");
        Ok(handle)
    }

    async fn terminate(&self, handle: &SessionHandle) -> sp_core::Result<()> {
        if self.sessions.remove(handle).is_some() {
            tracing::debug!("session terminated");
        }
        Ok(())
    }

    async fn find(
        &self,
        name_id: &str,
        session_index: Option<&str>,
    ) -> sp_core::Result<Vec<SessionHandle>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| {
                let claims = entry.value();
                claims.name_id == name_id
                    && session_index.map_or(true, |i| claims.session_index.as_deref() == Some(i))
            })
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn claims(&self, handle: &SessionHandle) -> sp_core::Result<Option<ClaimsSet>> {
        Ok(self.sessions.get(handle).map(|entry| entry.value().clone()))
    }
}

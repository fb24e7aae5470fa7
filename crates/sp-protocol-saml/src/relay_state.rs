//! RelayState tokens.
//!
//! The RelayState sent to the IdP is an HMAC-SHA256 protected, expiring
//! token carrying the request correlation ID and the local path to return
//! to after login. Format: `base64url(json) "." base64url(tag)`.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sp_crypto::{hmac_sha256, hmac_sha256_verify};

use crate::error::{SamlError, SamlResult};

/// Largest RelayState accepted from the IdP.
pub const MAX_RELAY_STATE_LEN: usize = 1024;

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Decoded RelayState contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayState {
    /// ID of the request this state belongs to.
    #[serde(rename = "rid", skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    /// Local path to return to.
    #[serde(rename = "ret")]
    pub return_to: String,
    /// Expiry as Unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Issues and checks RelayState tokens.
pub struct RelayStateCodec {
    key: Vec<u8>,
    ttl: chrono::Duration,
}

impl RelayStateCodec {
    /// Creates a codec.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] or the TTL is out of range.
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> SamlResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SamlError::Configuration(format!(
                "relay state secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(Self {
            key: secret.to_vec(),
            ttl: chrono::Duration::from_std(ttl)
                .map_err(|e| SamlError::Configuration(format!("relay state ttl: {e}")))?,
        })
    }

    /// Issues a token.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(
        &self,
        request_id: Option<&str>,
        return_to: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<String> {
        let state = RelayState {
            request_id: request_id.map(str::to_string),
            return_to: sanitize_return_path(Some(return_to)),
            expires_at: (now + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&state)
            .map_err(|e| SamlError::Internal(format!("relay state encoding: {e}")))?;
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let body = engine.encode(payload);
        let tag = engine.encode(hmac_sha256(&self.key, body.as_bytes()));
        Ok(format!("{body}.{tag}"))
    }

    /// Checks and decodes a token.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::RelayState`] if the token is oversized,
    /// malformed, tampered with or expired.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> SamlResult<RelayState> {
        if token.len() > MAX_RELAY_STATE_LEN {
            return Err(SamlError::RelayState("relay state too long".to_string()));
        }
        let (body, tag) = token
            .split_once('.')
            .ok_or_else(|| SamlError::RelayState("relay state is not a token".to_string()))?;
        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let tag = engine
            .decode(tag)
            .map_err(|_| SamlError::RelayState("relay state tag is not base64url".to_string()))?;
        if !hmac_sha256_verify(&self.key, body.as_bytes(), &tag) {
            return Err(SamlError::RelayState("relay state tag mismatch".to_string()));
        }

        let payload = engine
            .decode(body)
            .map_err(|_| SamlError::RelayState("relay state body is not base64url".to_string()))?;
        let state: RelayState = serde_json::from_slice(&payload)
            .map_err(|e| SamlError::RelayState(format!("relay state body: {e}")))?;
        if state.expires_at <= now.timestamp() {
            return Err(SamlError::RelayState("relay state expired".to_string()));
        }
        Ok(state)
    }
}

impl std::fmt::Debug for RelayStateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStateCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Reduces a requested return target to a local absolute path.
///
/// Anything that could leave the site (scheme, authority, `//`, `\`) falls
/// back to `/`.
#[must_use]
pub fn sanitize_return_path(candidate: Option<&str>) -> String {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

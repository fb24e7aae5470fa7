//! Session cookie.
//!
//! The cookie carries only the opaque [`SessionHandle`]. It is `HttpOnly`,
//! `SameSite=Lax` so the redirect after the ACS POST still sends it, and
//! `Secure` unless turned off for plain-HTTP development.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::session::SessionHandle;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "sp_session";

/// Cookie lifetime in seconds (8 hours).
pub const SESSION_COOKIE_MAX_AGE: i64 = 8 * 60 * 60;

/// Session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Whether to add the `Secure` flag.
    pub secure: bool,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            secure: true,
        }
    }
}

impl SessionCookie {
    /// Creates cookie settings.
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    fn secure_flag(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }

    /// `Set-Cookie` value establishing `handle`.
    #[must_use]
    pub fn create(&self, handle: &SessionHandle) -> String {
        format!(
            "{}={handle}; HttpOnly{}; SameSite=Lax; Path=/; Max-Age={SESSION_COOKIE_MAX_AGE}",
            self.name,
            self.secure_flag()
        )
    }

    /// `Set-Cookie` value removing the cookie.
    #[must_use]
    pub fn clear(&self) -> String {
        format!(
            "{}=; HttpOnly{}; SameSite=Lax; Path=/; Max-Age=0",
            self.name,
            self.secure_flag()
        )
    }

    /// Adds a cookie establishing `handle` to response headers.
    pub fn set(&self, headers: &mut HeaderMap, handle: &SessionHandle) {
        if let Ok(value) = HeaderValue::from_str(&self.create(handle)) {
            headers.insert(SET_COOKIE, value);
        }
    }

    /// Adds a cookie removal to response headers.
    pub fn remove(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.clear()) {
            headers.insert(SET_COOKIE, value);
        }
    }

    /// Reads the session handle from request headers.
    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> Option<SessionHandle> {
        let prefix = format!("{}=", self.name);
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .find_map(|part| part.trim().strip_prefix(&prefix).map(str::trim))
            .filter(|value| !value.is_empty())
            .map(SessionHandle::new)
    }
}

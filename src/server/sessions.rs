//! In-memory session storage.
//!
//! Sessions are opaque tokens handed out at sign-in and carried in the
//! `auth-token` cookie (or a Bearer header). They expire after a
//! configurable time and can be revoked on logout.

use rand::Rng;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Longest lifetime a session may have; longer TTLs are clamped to it.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Data associated with a session.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Uid of the signed-in user.
    pub user_id: String,
    /// Email the user signed in with.
    pub email: String,
    /// When the session was created.
    pub created_at: Instant,
    /// When the session expires.
    pub expires_at: Instant,
}

/// In-memory session store with expiry.
///
/// Thread-safe via internal RwLock.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a new session store whose sessions live `ttl_minutes`,
    /// at most [`MAX_SESSION_TTL`].
    pub fn new(ttl_minutes: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)).min(MAX_SESSION_TTL),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session for a user and returns its token (32 bytes,
    /// base64url encoded).
    pub fn create_session(&self, user_id: &str, email: &str) -> String {
        self.create_session_with_ttl(user_id, email, self.ttl)
    }

    pub fn create_session_with_ttl(&self, user_id: &str, email: &str, ttl: Duration) -> String {
        let token = generate_token();
        let now = Instant::now();
        let expires_at = now + ttl.min(MAX_SESSION_TTL);

        let data = SessionData {
            user_id: user_id.to_string(),
            email: email.to_string(),
            created_at: now,
            expires_at,
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), data);

        token
    }

    /// Returns the session for a token if it is known and unexpired.
    ///
    /// Unlike sign-in tokens, sessions are not consumed by verification.
    pub fn verify(&self, token: &str) -> Option<SessionData> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let data = sessions.get(token)?;

        if Instant::now() > data.expires_at {
            return None;
        }

        Some(data.clone())
    }

    /// Ends a session. Returns whether the token was known.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    /// Removes all expired sessions.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, data| data.expires_at > now);
        before - sessions.len()
    }

    /// Returns the number of sessions currently stored.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SESSION_TTL_MINUTES as u64)
    }
}

/// Generates a secure random token.
///
/// Returns 32 random bytes encoded as base64url (no padding).
fn generate_token() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

//! End-user session model.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::FromRow;
use uuid::Uuid;

/// Namespacing prefix so app and console session ids can never collide.
pub const APP_SESSION_PREFIX: &str = "app_sess_";

/// End-user session. Logout revokes (flags) the row rather than deleting
/// it, so "never existed" and "existed and was ended" stay distinguishable.
#[derive(Debug, Clone, FromRow)]
pub struct AppSession {
    pub session_id: String,
    pub user_id: Uuid,
    pub active_membership_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub csrf_token: Option<String>,
    pub revoked: bool,
}

impl AppSession {
    /// Create a new session with a freshly generated id.
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: generate_session_id(APP_SESSION_PREFIX),
            user_id,
            active_membership_id: None,
            created_at: now,
            expires_at: now + ttl,
            csrf_token: None,
            revoked: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Valid means not revoked and not expired.
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}

/// 32 random bytes, hex-encoded, under a kind-specific prefix.
pub fn generate_session_id(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id(APP_SESSION_PREFIX);
        assert!(id.starts_with(APP_SESSION_PREFIX));
        assert_eq!(id.len(), APP_SESSION_PREFIX.len() + 64);
    }

    #[test]
    fn test_fresh_session_is_valid() {
        let s = AppSession::new(Uuid::new_v4(), Duration::hours(24));
        assert!(s.is_valid());
        assert!(s.expires_at > s.created_at);
    }

    #[test]
    fn test_revoked_session_is_invalid_regardless_of_expiry() {
        let mut s = AppSession::new(Uuid::new_v4(), Duration::hours(24));
        s.revoked = true;
        assert!(!s.is_expired());
        assert!(!s.is_valid());
    }

    #[test]
    fn test_expired_session_is_invalid_regardless_of_revocation() {
        let mut s = AppSession::new(Uuid::new_v4(), Duration::hours(24));
        s.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!s.revoked);
        assert!(!s.is_valid());
    }
}

//! Operator-console session model.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::app_session::generate_session_id;

pub const CONSOLE_SESSION_PREFIX: &str = "console_sess_";

/// Console session row. The signed console token embeds this row's id; the
/// row stays the source of truth and can be revoked independently of the
/// token's own expiry.
#[derive(Debug, Clone, FromRow)]
pub struct ConsoleSession {
    pub session_id: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ConsoleSession {
    pub fn new(organization_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: generate_session_id(CONSOLE_SESSION_PREFIX),
            organization_id,
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_prefix() {
        let s = ConsoleSession::new(Uuid::new_v4(), Duration::hours(24));
        assert!(s.session_id.starts_with(CONSOLE_SESSION_PREFIX));
    }

    #[test]
    fn test_validity() {
        let mut s = ConsoleSession::new(Uuid::new_v4(), Duration::hours(24));
        assert!(s.is_valid());
        s.revoked_at = Some(Utc::now());
        assert!(!s.is_valid());

        let mut s = ConsoleSession::new(Uuid::new_v4(), Duration::hours(24));
        s.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!s.is_valid());
    }
}

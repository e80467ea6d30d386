//! One-time OAuth exchange state - anti-replay/anti-CSRF record.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

use crate::error::AppError;

/// An unconsumed state is only accepted within this window.
pub const OAUTH_STATE_TTL_MINUTES: i64 = 15;

/// Server-held state for one in-flight OAuth login attempt. Created at
/// login start, consumed exactly once at the callback, never mutated after.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthState {
    pub state: String,
    pub code_verifier: String,
    pub nonce: String,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OAuthState {
    pub fn new(state: String, code_verifier: String, nonce: String) -> Result<Self, AppError> {
        if state.is_empty() {
            return Err(AppError::Validation("OAuth state is required".to_string()));
        }
        if code_verifier.is_empty() {
            return Err(AppError::Validation(
                "Code verifier is required".to_string(),
            ));
        }
        if nonce.is_empty() {
            return Err(AppError::Validation("Nonce is required".to_string()));
        }

        Ok(Self {
            state,
            code_verifier,
            nonce,
            created_at: Utc::now(),
            consumed_at: None,
        })
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + Duration::minutes(OAUTH_STATE_TTL_MINUTES)
    }

    /// Valid means never consumed and still inside the window.
    pub fn is_valid(&self) -> bool {
        !self.is_consumed() && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> OAuthState {
        OAuthState::new("s".repeat(43), "v".repeat(43), "n".repeat(43)).unwrap()
    }

    #[test]
    fn test_fresh_state_is_valid() {
        assert!(state().is_valid());
    }

    #[test]
    fn test_consumed_state_is_invalid() {
        let mut s = state();
        s.consumed_at = Some(Utc::now());
        assert!(!s.is_valid());
    }

    #[test]
    fn test_state_outside_window_is_invalid() {
        let mut s = state();
        s.created_at = Utc::now() - Duration::minutes(OAUTH_STATE_TTL_MINUTES + 1);
        assert!(!s.is_consumed());
        assert!(!s.is_valid());
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(OAuthState::new(String::new(), "v".into(), "n".into()).is_err());
        assert!(OAuthState::new("s".into(), String::new(), "n".into()).is_err());
        assert!(OAuthState::new("s".into(), "v".into(), String::new()).is_err());
    }
}

//! Operator-console authentication.
//!
//! The console logs in with a pre-shared organization id and key, compared
//! in constant time, and gets back a signed compact token whose `sid`
//! points at a revocable session row. Token validity alone is never enough;
//! the row is the source of truth.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::ConsoleConfig;
use crate::db::AuthStore;
use crate::error::AppError;
use crate::models::ConsoleSession;
use crate::services::jwt::{TokenClaims, TokenCodec, TokenError};

/// Claims carried by a console token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleClaims {
    pub sub: String,
    pub org: Uuid,
    pub sid: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
}

impl TokenClaims for ConsoleClaims {
    fn issued_at(&self) -> i64 {
        self.iat
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
    fn set_issued_at(&mut self, iat: i64) {
        self.iat = iat;
    }
    fn set_expires_at(&mut self, exp: i64) {
        self.exp = exp;
    }
}

/// Successful console login.
#[derive(Debug, Clone)]
pub struct ConsoleLogin {
    pub session_token: String,
    pub expires_in_seconds: i64,
}

#[derive(Clone)]
pub struct ConsoleAuthService {
    store: Arc<dyn AuthStore>,
    codec: TokenCodec,
    expected: ConsoleConfig,
    session_ttl: Duration,
}

impl ConsoleAuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        codec: TokenCodec,
        expected: ConsoleConfig,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            codec,
            expected,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Verify the presented credentials and mint a session plus token.
    /// Nothing is persisted on a failed login.
    pub async fn login(
        &self,
        organization_id: Uuid,
        organization_key: &str,
    ) -> Result<ConsoleLogin, AppError> {
        if !self.credentials_match(organization_id, organization_key) {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let session = ConsoleSession::new(organization_id, self.session_ttl);
        self.store.create_console_session(&session).await?;

        let mut claims = ConsoleClaims {
            sub: "console".to_string(),
            org: organization_id,
            sid: session.session_id.clone(),
            iat: 0,
            exp: 0,
        };
        let session_token = self
            .codec
            .generate(&mut claims, self.session_ttl)
            .map_err(map_token_error)?;

        tracing::info!(organization_id = %organization_id, "Console login");
        Ok(ConsoleLogin {
            session_token,
            expires_in_seconds: self.session_ttl.num_seconds(),
        })
    }

    /// Both checks run unconditionally and combine with a non-short-circuit
    /// AND, so timing reveals nothing about which credential was wrong.
    fn credentials_match(&self, organization_id: Uuid, organization_key: &str) -> bool {
        let id_ok: bool = self
            .expected
            .organization_id
            .as_bytes()
            .ct_eq(organization_id.as_bytes())
            .into();

        let expected_key = self.expected.organization_key.as_bytes();
        let presented_key = organization_key.as_bytes();
        let key_ok = expected_key.len() == presented_key.len()
            && bool::from(expected_key.ct_eq(presented_key));

        id_ok & key_ok
    }

    /// Validate a bearer token: signature and expiry first, then the session
    /// row it names, then that the row belongs to the token's organization.
    pub async fn validate_session(&self, token: &str) -> Result<ConsoleClaims, AppError> {
        let claims: ConsoleClaims = self.codec.validate(token).map_err(map_token_error)?;

        let session = self
            .store
            .get_console_session(&claims.sid)
            .await?
            .ok_or_else(AppError::unauthenticated)?;

        if !session.is_valid() {
            return Err(AppError::unauthenticated());
        }

        if session.organization_id != claims.org {
            return Err(AppError::Unauthorized(
                "Organization mismatch".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Revoke the session behind the token. Requires the token to still
    /// validate; an already-revoked session makes this a no-op 401.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let claims = self.validate_session(token).await?;
        self.store.revoke_console_session(&claims.sid).await?;
        tracing::info!(organization_id = %claims.org, "Console logout");
        Ok(())
    }
}

fn map_token_error(err: TokenError) -> AppError {
    match err {
        // A bad secret is a server configuration problem, not a caller one.
        TokenError::InvalidSecret => {
            AppError::Config(anyhow::anyhow!("invalid token signing secret"))
        }
        _ => AppError::Unauthorized("Invalid or expired token".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> ConsoleAuthService {
        ConsoleAuthService::new(
            store,
            TokenCodec::new("test-secret").unwrap(),
            ConsoleConfig {
                organization_id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
                organization_key: "org-key".to_string(),
            },
            24,
        )
    }

    fn org_id() -> Uuid {
        Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap()
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let login = service.login(org_id(), "org-key").await.unwrap();
        assert_eq!(login.expires_in_seconds, 24 * 3600);

        let claims = service.validate_session(&login.session_token).await.unwrap();
        assert_eq!(claims.sub, "console");
        assert_eq!(claims.org, org_id());
        assert!(claims.sid.starts_with("console_sess_"));
    }

    #[tokio::test]
    async fn test_wrong_key_rejected_without_persisting() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let err = service.login(org_id(), "wrong-key").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_wrong_organization_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        let err = service.login(Uuid::new_v4(), "org-key").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let login = service.login(org_id(), "org-key").await.unwrap();
        service.logout(&login.session_token).await.unwrap();

        // Token itself has not expired, but the session row is revoked.
        let err = service
            .validate_session(&login.session_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_token_without_session_row_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        // Correctly signed token whose sid was never persisted.
        let codec = TokenCodec::new("test-secret").unwrap();
        let mut claims = ConsoleClaims {
            sub: "console".to_string(),
            org: org_id(),
            sid: "console_sess_unknown".to_string(),
            iat: 0,
            exp: 0,
        };
        let token = codec.generate(&mut claims, Duration::hours(1)).unwrap();

        let err = service.validate_session(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_organization_mismatch_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let login = service.login(org_id(), "org-key").await.unwrap();
        let claims = service.validate_session(&login.session_token).await.unwrap();

        // Forge a token for a different org against the same session row.
        let codec = TokenCodec::new("test-secret").unwrap();
        let mut forged = ConsoleClaims {
            sub: "console".to_string(),
            org: Uuid::new_v4(),
            sid: claims.sid,
            iat: 0,
            exp: 0,
        };
        let token = codec.generate(&mut forged, Duration::hours(1)).unwrap();

        let err = service.validate_session(&token).await.unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert_eq!(msg, "Organization mismatch"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        let other_codec = TokenCodec::new("other-secret").unwrap();
        let mut claims = ConsoleClaims {
            sub: "console".to_string(),
            org: org_id(),
            sid: "console_sess_x".to_string(),
            iat: 0,
            exp: 0,
        };
        let token = other_codec.generate(&mut claims, Duration::hours(1)).unwrap();

        let err = service.validate_session(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}

//! Persistence layer.
//!
//! All storage access goes through the [`AuthStore`] trait so services and
//! flows can run against [`memory::MemoryStore`] in tests. The Postgres
//! implementation lives here; tenant-scoped connection handling is in
//! [`scope`].

pub mod memory;
pub mod scope;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::models::{AppSession, ConsoleSession, OAuthState, User, UserIdentity};

/// Storage operations required by the authentication flows.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn save_oauth_state(&self, state: &OAuthState) -> Result<(), AppError>;
    async fn get_oauth_state(&self, state: &str) -> Result<Option<OAuthState>, AppError>;
    /// Atomically mark a state consumed. Returns true only for the caller
    /// that actually flipped it; a replay gets false.
    async fn consume_oauth_state(&self, state: &str) -> Result<bool, AppError>;

    async fn create_app_session(&self, session: &AppSession) -> Result<(), AppError>;
    async fn get_app_session(&self, session_id: &str) -> Result<Option<AppSession>, AppError>;
    async fn revoke_app_session(&self, session_id: &str) -> Result<(), AppError>;

    async fn create_console_session(&self, session: &ConsoleSession) -> Result<(), AppError>;
    async fn get_console_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConsoleSession>, AppError>;
    async fn revoke_console_session(&self, session_id: &str) -> Result<(), AppError>;

    async fn find_user_by_identity(
        &self,
        provider: &str,
        provider_subject: &str,
    ) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;
    async fn upsert_user(&self, user: &User) -> Result<User, AppError>;
    async fn link_identity(&self, identity: &UserIdentity) -> Result<(), AppError>;
}

/// Build the shared connection pool. Released connections get their tenant
/// settings reset unconditionally so a pooled connection can never leak one
/// request's scope into the next.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .after_release(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("RESET keygate.organization_id")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("RESET keygate.membership_id")
                    .execute(&mut *conn)
                    .await?;
                Ok(true)
            })
        })
        .connect(&config.url)
        .await
        .map_err(AppError::from)
}

/// Postgres-backed [`AuthStore`].
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuthStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn save_oauth_state(&self, state: &OAuthState) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, code_verifier, nonce, created_at, consumed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&state.state)
        .bind(&state.code_verifier)
        .bind(&state.nonce)
        .bind(state.created_at)
        .bind(state.consumed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_oauth_state(&self, state: &str) -> Result<Option<OAuthState>, AppError> {
        let row = sqlx::query_as::<_, OAuthState>(
            "SELECT state, code_verifier, nonce, created_at, consumed_at FROM oauth_states WHERE state = $1",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn consume_oauth_state(&self, state: &str) -> Result<bool, AppError> {
        // The WHERE clause is the whole mechanism: only one concurrent
        // caller can match the NULL consumed_at.
        let result = sqlx::query(
            "UPDATE oauth_states SET consumed_at = now() WHERE state = $1 AND consumed_at IS NULL",
        )
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_app_session(&self, session: &AppSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO app_sessions
                (session_id, user_id, active_membership_id, created_at, expires_at, csrf_token, revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(session.active_membership_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(&session.csrf_token)
        .bind(session.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_app_session(&self, session_id: &str) -> Result<Option<AppSession>, AppError> {
        let row = sqlx::query_as::<_, AppSession>(
            r#"
            SELECT session_id, user_id, active_membership_id, created_at, expires_at, csrf_token, revoked
            FROM app_sessions WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn revoke_app_session(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE app_sessions SET revoked = TRUE WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_console_session(&self, session: &ConsoleSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO console_sessions (session_id, organization_id, created_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.organization_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_console_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConsoleSession>, AppError> {
        let row = sqlx::query_as::<_, ConsoleSession>(
            r#"
            SELECT session_id, organization_id, created_at, expires_at, revoked_at
            FROM console_sessions WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn revoke_console_session(&self, session_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE console_sessions SET revoked_at = now() WHERE session_id = $1 AND revoked_at IS NULL",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_identity(
        &self,
        provider: &str,
        provider_subject: &str,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT u.user_id, u.email, u.display_name, u.picture_url, u.created_at
            FROM users u
            JOIN user_identities i ON i.user_id = u.user_id
            WHERE i.provider = $1 AND i.provider_subject = $2
            "#,
        )
        .bind(provider)
        .bind(provider_subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT user_id, email, display_name, picture_url, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_user(&self, user: &User) -> Result<User, AppError> {
        // Email is the merge key: logging in again with a fresher profile
        // updates the display fields in place.
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, display_name, picture_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
                SET display_name = EXCLUDED.display_name,
                    picture_url = EXCLUDED.picture_url
            RETURNING user_id, email, display_name, picture_url, created_at
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.picture_url)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn link_identity(&self, identity: &UserIdentity) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_identities (user_id, provider, provider_subject, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_subject) DO NOTHING
            "#,
        )
        .bind(identity.user_id)
        .bind(&identity.provider)
        .bind(&identity.provider_subject)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_database() -> Option<Database> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .ok()?;
        Some(Database::new(pool))
    }

    #[tokio::test]
    #[ignore] // requires DATABASE_URL pointing at a migrated database
    async fn test_oauth_state_consumed_exactly_once() {
        let Some(db) = test_database().await else {
            return;
        };

        let state = OAuthState::new(
            Uuid::new_v4().to_string(),
            "verifier".to_string(),
            "nonce".to_string(),
        )
        .unwrap();
        db.save_oauth_state(&state).await.unwrap();

        assert!(db.consume_oauth_state(&state.state).await.unwrap());
        assert!(!db.consume_oauth_state(&state.state).await.unwrap());

        let stored = db.get_oauth_state(&state.state).await.unwrap().unwrap();
        assert!(stored.is_consumed());
    }

    #[tokio::test]
    #[ignore] // requires DATABASE_URL pointing at a migrated database
    async fn test_app_session_revocation() {
        let Some(db) = test_database().await else {
            return;
        };

        let user = db
            .upsert_user(&User::new(
                format!("{}@example.com", Uuid::new_v4()),
                None,
                None,
            ))
            .await
            .unwrap();

        let session = AppSession::new(user.user_id, Duration::hours(24));
        db.create_app_session(&session).await.unwrap();

        let stored = db.get_app_session(&session.session_id).await.unwrap().unwrap();
        assert!(stored.is_valid());

        db.revoke_app_session(&session.session_id).await.unwrap();
        let stored = db.get_app_session(&session.session_id).await.unwrap().unwrap();
        assert!(stored.revoked);
        assert!(!stored.is_valid());
    }
}

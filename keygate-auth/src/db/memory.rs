//! In-memory [`AuthStore`] for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::AuthStore;
use crate::error::AppError;
use crate::models::{AppSession, ConsoleSession, OAuthState, User, UserIdentity};

#[derive(Default)]
struct Inner {
    oauth_states: HashMap<String, OAuthState>,
    app_sessions: HashMap<String, AppSession>,
    console_sessions: HashMap<String, ConsoleSession>,
    users: HashMap<Uuid, User>,
    identities: HashMap<(String, String), Uuid>,
}

/// Everything behind one lock, so consume-once has the same all-or-nothing
/// behavior as the SQL conditional update.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn save_oauth_state(&self, state: &OAuthState) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner.oauth_states.insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn get_oauth_state(&self, state: &str) -> Result<Option<OAuthState>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.oauth_states.get(state).cloned())
    }

    async fn consume_oauth_state(&self, state: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        match inner.oauth_states.get_mut(state) {
            Some(stored) if stored.consumed_at.is_none() => {
                stored.consumed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_app_session(&self, session: &AppSession) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner
            .app_sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_app_session(&self, session_id: &str) -> Result<Option<AppSession>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.app_sessions.get(session_id).cloned())
    }

    async fn revoke_app_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.app_sessions.get_mut(session_id) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn create_console_session(&self, session: &ConsoleSession) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner
            .console_sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_console_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConsoleSession>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.console_sessions.get(session_id).cloned())
    }

    async fn revoke_console_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.console_sessions.get_mut(session_id) {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn find_user_by_identity(
        &self,
        provider: &str,
        provider_subject: &str,
    ) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().await;
        let key = (provider.to_string(), provider_subject.to_string());
        Ok(inner
            .identities
            .get(&key)
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<User, AppError> {
        let mut inner = self.inner.lock().await;
        // Merge on email like the SQL ON CONFLICT clause does.
        if let Some(existing) = inner.users.values().find(|u| u.email == user.email) {
            let mut merged = existing.clone();
            merged.display_name = user.display_name.clone();
            merged.picture_url = user.picture_url.clone();
            let user_id = merged.user_id;
            inner.users.insert(user_id, merged.clone());
            return Ok(merged);
        }
        inner.users.insert(user.user_id, user.clone());
        Ok(user.clone())
    }

    async fn link_identity(&self, identity: &UserIdentity) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let key = (identity.provider.clone(), identity.provider_subject.clone());
        inner.identities.entry(key).or_insert(identity.user_id);
        Ok(())
    }
}

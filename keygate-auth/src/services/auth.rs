//! End-user login flow: OAuth2 Authorization Code + PKCE against Google,
//! exchanged for a server-side app session.

use chrono::Duration;
use std::sync::Arc;

use crate::db::AuthStore;
use crate::error::AppError;
use crate::models::{AppSession, OAuthState, User, UserIdentity};
use crate::services::oauth::{
    code_challenge, generate_code_verifier, random_urlsafe_token, OAuthProvider,
};

pub const GOOGLE_PROVIDER: &str = "google";

/// Result of starting a login attempt.
#[derive(Debug, Clone)]
pub struct LoginStart {
    pub auth_url: String,
    pub state: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    provider: Arc<dyn OAuthProvider>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        provider: Arc<dyn OAuthProvider>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            provider,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Begin a login attempt: persist fresh state, verifier and nonce, then
    /// hand back the provider authorization URL to redirect the browser to.
    pub async fn start_login(&self) -> Result<LoginStart, AppError> {
        let code_verifier = generate_code_verifier();
        let challenge = code_challenge(&code_verifier);
        let state_value = random_urlsafe_token();
        let nonce = random_urlsafe_token();

        let state = OAuthState::new(state_value.clone(), code_verifier, nonce.clone())?;
        self.store.save_oauth_state(&state).await?;

        let auth_url = self
            .provider
            .build_auth_url(&state_value, &nonce, &challenge)?;

        Ok(LoginStart {
            auth_url,
            state: state_value,
        })
    }

    /// Complete the callback leg. The state must be known, unconsumed and
    /// inside its window, and is burned before any provider call is made;
    /// a replayed callback dies here no matter what the code is worth.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(User, AppSession), AppError> {
        if code.is_empty() {
            return Err(AppError::Validation(
                "Authorization code is required".to_string(),
            ));
        }
        if state.is_empty() {
            return Err(AppError::Validation("State is required".to_string()));
        }

        let stored = self
            .store
            .get_oauth_state(state)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid state".to_string()))?;

        if !stored.is_valid() {
            return Err(AppError::Unauthorized(
                "Invalid or expired state".to_string(),
            ));
        }

        if !self.store.consume_oauth_state(state).await? {
            // Someone else burned it between our read and our write.
            tracing::warn!(state = %state, "OAuth state replay detected");
            return Err(AppError::Unauthorized(
                "Invalid or expired state".to_string(),
            ));
        }

        let tokens = self
            .provider
            .exchange_code(code, &stored.code_verifier)
            .await?;
        let identity = self
            .provider
            .verify_id_token(&tokens.id_token, &stored.nonce)
            .await?;

        let user = self.resolve_user(identity).await?;
        let session = AppSession::new(user.user_id, self.session_ttl);
        self.store.create_app_session(&session).await?;

        tracing::info!(user_id = %user.user_id, "User logged in");
        Ok((user, session))
    }

    /// Resolve the verified identity to a local user, creating the user and
    /// the identity link on first login.
    async fn resolve_user(
        &self,
        identity: crate::services::oauth::VerifiedIdentity,
    ) -> Result<User, AppError> {
        if let Some(user) = self
            .store
            .find_user_by_identity(GOOGLE_PROVIDER, &identity.subject)
            .await?
        {
            return Ok(user);
        }

        let user = self
            .store
            .upsert_user(&User::new(identity.email, identity.name, identity.picture))
            .await?;
        self.store
            .link_identity(&UserIdentity::new(
                user.user_id,
                GOOGLE_PROVIDER.to_string(),
                identity.subject,
            ))
            .await?;

        tracing::info!(user_id = %user.user_id, "New user provisioned");
        Ok(user)
    }

    /// Authenticate a request by its session cookie. Every failure collapses
    /// to the same generic 401 so callers cannot probe session ids.
    pub async fn authenticate(&self, session_id: &str) -> Result<(User, AppSession), AppError> {
        if session_id.is_empty() {
            return Err(AppError::unauthenticated());
        }

        let session = self
            .store
            .get_app_session(session_id)
            .await?
            .ok_or_else(AppError::unauthenticated)?;

        if !session.is_valid() {
            return Err(AppError::unauthenticated());
        }

        let user = self
            .store
            .find_user_by_id(session.user_id)
            .await?
            .ok_or_else(AppError::unauthenticated)?;

        Ok((user, session))
    }

    /// Revoke the session. Idempotent: logging out twice is not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        if !session_id.is_empty() {
            self.store.revoke_app_session(session_id).await?;
        }
        Ok(())
    }
}

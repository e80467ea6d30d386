//! OAuth2 Authorization-Code + PKCE client for Google.
//!
//! The provider is behind a trait so login flows can be exercised without
//! network access. ID tokens are verified locally against Google's
//! published JWKS with issuer and audience pinned.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{jwk::JwkSet, Algorithm, DecodingKey, Validation};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::GoogleOAuthConfig;
use crate::error::AppError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Generate a 32-byte PKCE code verifier, base64url-encoded.
pub fn generate_code_verifier() -> String {
    random_urlsafe_token()
}

/// Derive the S256 code challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// 32 random bytes, base64url-encoded. Used for `state` and `nonce`.
pub fn random_urlsafe_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

/// Identity attested by a verified ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// External identity provider operations used by the login flow.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Authorization URL carrying state, nonce and the PKCE challenge.
    fn build_auth_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> Result<String, AppError>;

    /// Exchange an authorization code (plus the original verifier) for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderTokens, AppError>;

    /// Verify the ID token's signature, issuer, audience, expiry, nonce and
    /// email-verification status.
    async fn verify_id_token(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<VerifiedIdentity, AppError>;
}

pub struct GoogleOAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
    jwks_cache: RwLock<Option<(Instant, JwkSet)>>,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, AppError> {
        if config.client_id.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!("client ID is required")));
        }
        if config.client_secret.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "client secret is required"
            )));
        }
        if config.redirect_uri.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "redirect URI is required"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            http,
            jwks_cache: RwLock::new(None),
        })
    }

    async fn jwks(&self) -> Result<JwkSet, AppError> {
        if let Some((fetched_at, keys)) = self.jwks_cache.read().await.as_ref() {
            if fetched_at.elapsed() < JWKS_CACHE_TTL {
                return Ok(keys.clone());
            }
        }

        let keys: JwkSet = self
            .http
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to fetch JWKS: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to parse JWKS: {}", e)))?;

        *self.jwks_cache.write().await = Some((Instant::now(), keys.clone()));
        Ok(keys)
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn build_auth_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> Result<String, AppError> {
        let query = serde_urlencoded::to_string([
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
            ("nonce", nonce),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ])
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        Ok(format!("{}?{}", GOOGLE_AUTH_URL, query))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderTokens, AppError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Body goes to the log for diagnostics, never to the caller.
            tracing::error!(status = %status, body = %body, "Token exchange rejected by provider");
            return Err(AppError::Internal(anyhow::anyhow!(
                "token exchange failed with status {}",
                status
            )));
        }

        response
            .json::<ProviderTokens>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid token response: {}", e)))
    }

    async fn verify_id_token(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<VerifiedIdentity, AppError> {
        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|_| AppError::Unauthorized("Authentication failed".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Authentication failed".to_string()))?;

        let jwks = self.jwks().await?;
        let jwk = jwks
            .find(&kid)
            .ok_or_else(|| AppError::Unauthorized("Authentication failed".to_string()))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("unusable JWKS key: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let data = jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "ID token verification failed");
                AppError::Unauthorized("Authentication failed".to_string())
            })?;
        let claims = data.claims;

        // Nonce binds the token to the login attempt that requested it.
        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(AppError::Unauthorized("Invalid nonce".to_string()));
        }

        if !claims.email_verified {
            return Err(AppError::Unauthorized("Email not verified".to_string()));
        }

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

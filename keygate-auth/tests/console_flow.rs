//! Operator-console login and logout over the full router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use keygate_auth::config::{
    AuthConfig, ConsoleConfig, DatabaseConfig, Environment, GoogleOAuthConfig, SecurityConfig,
    TokenConfig,
};
use keygate_auth::db::memory::MemoryStore;
use keygate_auth::error::AppError;
use keygate_auth::services::oauth::{OAuthProvider, ProviderTokens, VerifiedIdentity};
use keygate_auth::{build_router, AppState};

const ORG_ID: &str = "11111111-2222-3333-4444-555555555555";

/// The console surface never talks to the identity provider.
struct UnusedProvider;

#[async_trait::async_trait]
impl OAuthProvider for UnusedProvider {
    fn build_auth_url(&self, _: &str, _: &str, _: &str) -> Result<String, AppError> {
        panic!("provider should not be called");
    }

    async fn exchange_code(&self, _: &str, _: &str) -> Result<ProviderTokens, AppError> {
        panic!("provider should not be called");
    }

    async fn verify_id_token(&self, _: &str, _: &str) -> Result<VerifiedIdentity, AppError> {
        panic!("provider should not be called");
    }
}

fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Dev,
        service_name: "keygate-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "info".to_string(),
        port: 8080,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        token: TokenConfig {
            secret: "test-secret".to_string(),
            app_session_ttl_hours: 24,
            console_session_ttl_hours: 12,
        },
        google: GoogleOAuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://example.com/callback".to_string(),
            app_redirect_url: "https://example.com/app".to_string(),
        },
        console: ConsoleConfig {
            organization_id: Uuid::parse_str(ORG_ID).unwrap(),
            organization_key: "org-key".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            cookie_secure: false,
        },
    }
}

fn app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::without_database(test_config(), store, Arc::new(UnusedProvider)).unwrap();
    build_router(state)
}

async fn login(router: &axum::Router, organization_id: &str, key: &str) -> axum::http::Response<Body> {
    let body = serde_json::json!({
        "organization_id": organization_id,
        "organization_key": key,
    });
    router
        .clone()
        .oneshot(
            Request::post("/v1/console/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn logout(router: &axum::Router, token: &str) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(
            Request::post("/v1/console/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_login_returns_token_and_ttl() {
    let router = app();

    let response = login(&router, ORG_ID, "org-key").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let login: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(login["expires_in_seconds"], 12 * 3600);

    let token = login["session_token"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[tokio::test]
async fn test_wrong_key_rejected() {
    let router = app();
    let response = login(&router, ORG_ID, "wrong-key").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_organization_rejected() {
    let router = app();
    let response = login(&router, &Uuid::new_v4().to_string(), "org-key").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_key_fails_validation() {
    let router = app();
    let response = login(&router, ORG_ID, "").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let router = app();

    let response = login(&router, ORG_ID, "org-key").await;
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let login: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let token = login["session_token"].as_str().unwrap().to_string();

    let response = logout(&router, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Second logout fails: the token still carries a valid signature, but
    // the session row behind it is revoked.
    let response = logout(&router, &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_token_rejected() {
    let router = app();

    let response = router
        .oneshot(
            Request::post("/v1/console/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let router = app();
    let response = logout(&router, "not.a.token").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

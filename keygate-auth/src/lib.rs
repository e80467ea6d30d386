//! keygate-auth: multi-tenant authentication service.
//!
//! Two auth surfaces share one binary: a cookie-based end-user surface that
//! logs in through Google (Authorization Code + PKCE), and a bearer-token
//! operator-console surface with pre-shared organization credentials. Both
//! resolve to a typed per-request scope that the database layer stamps onto
//! connections for row-level security.

pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

use crate::config::AuthConfig;
use crate::db::scope::TenantPool;
use crate::db::AuthStore;
use crate::error::AppError;
use crate::middleware::app::app_auth_middleware;
use crate::middleware::console::console_auth_middleware;
use crate::middleware::AuthExemptions;
use crate::services::auth::AuthService;
use crate::services::console::ConsoleAuthService;
use crate::services::jwt::TokenCodec;
use crate::services::oauth::OAuthProvider;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub store: Arc<dyn AuthStore>,
    pub auth: AuthService,
    pub console: ConsoleAuthService,
    /// Tenant-scoped connection checkout. Always present when the state is
    /// built over Postgres via [`AppState::new`]; only
    /// [`AppState::without_database`] leaves it unset.
    pub tenant_pool: Option<TenantPool>,
    pub app_exemptions: AuthExemptions,
    pub console_exemptions: AuthExemptions,
}

impl AppState {
    /// Postgres-backed state. The tenant pool is built from the same pool
    /// as the store, so scoped checkout is always available.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn AuthStore>,
        provider: Arc<dyn OAuthProvider>,
        pool: sqlx::PgPool,
    ) -> Result<Self, AppError> {
        Self::build(config, store, provider, Some(TenantPool::new(pool)))
    }

    /// State over a store with no Postgres behind it (in-memory). No
    /// tenant-scoped checkout exists in this configuration.
    pub fn without_database(
        config: AuthConfig,
        store: Arc<dyn AuthStore>,
        provider: Arc<dyn OAuthProvider>,
    ) -> Result<Self, AppError> {
        Self::build(config, store, provider, None)
    }

    fn build(
        config: AuthConfig,
        store: Arc<dyn AuthStore>,
        provider: Arc<dyn OAuthProvider>,
        tenant_pool: Option<TenantPool>,
    ) -> Result<Self, AppError> {
        let codec = TokenCodec::new(&config.token.secret)
            .map_err(|_| AppError::Config(anyhow::anyhow!("TOKEN_SECRET must not be empty")))?;

        let auth = AuthService::new(
            store.clone(),
            provider,
            config.token.app_session_ttl_hours,
        );
        let console = ConsoleAuthService::new(
            store.clone(),
            codec,
            config.console.clone(),
            config.token.console_session_ttl_hours,
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            console,
            tenant_pool,
            app_exemptions: AuthExemptions::new([
                "/v1/app/auth/google/login",
                "/v1/app/auth/google/callback",
            ]),
            console_exemptions: AuthExemptions::new(["/v1/console/auth/login"]),
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::google_login,
        handlers::auth::google_callback,
        handlers::auth::get_me,
        handlers::auth::logout,
        handlers::console::login,
        handlers::console::logout,
    ),
    components(schemas(
        models::UserResponse,
        dtos::auth::ConsoleLoginRequest,
        dtos::auth::ConsoleLoginResponse,
        dtos::auth::MessageResponse,
    )),
    tags(
        (name = "app-auth", description = "End-user authentication"),
        (name = "console-auth", description = "Operator-console authentication"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Assemble the full router. Each surface carries its own auth middleware;
/// exemptions are matched on the full request path, so routes are declared
/// with full paths rather than nested.
pub fn build_router(state: AppState) -> Router {
    let app_routes = Router::new()
        .route("/v1/app/auth/google/login", get(handlers::auth::google_login))
        .route(
            "/v1/app/auth/google/callback",
            get(handlers::auth::google_callback),
        )
        .route("/v1/app/auth/me", get(handlers::auth::get_me))
        .route("/v1/app/auth/logout", post(handlers::auth::logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_auth_middleware,
        ));

    let console_routes = Router::new()
        .route("/v1/console/auth/login", post(handlers::console::login))
        .route("/v1/console/auth/logout", post(handlers::console::logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            console_auth_middleware,
        ));

    Router::new()
        .merge(app_routes)
        .merge(console_routes)
        .route("/health", get(handlers::health::health))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(cors_layer(&state.config.security.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        // Wildcard cannot be combined with credentials; config validation
        // already rejects it in production.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Structured JSON logging, filtered by `LOG_LEVEL` unless `RUST_LOG`
/// overrides it.
pub fn init_tracing(config: &AuthConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

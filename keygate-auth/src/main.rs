use std::net::SocketAddr;
use std::sync::Arc;

use keygate_auth::config::AuthConfig;
use keygate_auth::db::{create_pool, Database};
use keygate_auth::services::oauth::GoogleOAuthClient;
use keygate_auth::{build_router, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AuthConfig::from_env()?;
    init_tracing(&config);

    let pool = create_pool(&config.database).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(Database::new(pool.clone()));
    let provider = Arc::new(GoogleOAuthClient::new(&config.google)?);

    let port = config.port;
    let service_name = config.service_name.clone();
    let state = AppState::new(config, store, provider, pool)?;
    let router = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(service = %service_name, %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

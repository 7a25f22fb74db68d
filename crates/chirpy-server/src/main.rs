mod config;

use std::sync::Arc;

use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chirpy_api::auth::{AppState, AppStateInner};
use chirpy_api::metrics::{Metrics, count_hits};
use chirpy_api::tokens::TokenKeys;
use chirpy_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirpy=debug,chirpy_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    info!("Store opened at {}", config.db_path.display());
    if config.dev_mode {
        warn!("dev mode: clearing the store");
        db.clear()?;
    }

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenKeys::new(&config.jwt_secret),
        polka_key: config.polka_key,
        metrics: Metrics::new(),
        dev_mode: config.dev_mode,
    });

    let static_files = Router::new()
        .nest_service("/app", ServeDir::new(&config.static_dir))
        .layer(middleware::from_fn_with_state(app_state.clone(), count_hits));

    let app = Router::new()
        .merge(chirpy_api::router(app_state))
        .merge(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Chirpy listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

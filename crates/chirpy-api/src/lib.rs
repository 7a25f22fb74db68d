pub mod auth;
pub mod chirps;
pub mod content;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod tokens;
pub mod webhooks;

use axum::{
    Router, middleware as axum_middleware,
    routing::{any, delete, get, post, put},
};

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Every `/api` and `/admin` route. Static files, CORS and tracing are layered
/// on by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/chirps", get(chirps::list_chirps))
        .route("/api/chirps/{chirp_id}", get(chirps::get_chirp))
        .route("/api/users", post(auth::create_user))
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/revoke", post(auth::revoke))
        .route("/api/polka/webhooks", post(webhooks::polka_webhook))
        .route("/api/reset", any(metrics::reset))
        .route("/admin/metrics", get(metrics::metrics_page));

    let protected_routes = Router::new()
        .route("/api/chirps", post(chirps::create_chirp))
        .route("/api/chirps/{chirp_id}", delete(chirps::delete_chirp))
        .route("/api/users", put(auth::update_user))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "OK"
}

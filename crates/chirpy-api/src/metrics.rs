use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{Html, Response},
};
use tracing::{info, warn};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Hit counter for the static file server.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    hits: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
    }
}

/// Middleware counting every request that reaches the file server.
pub async fn count_hits(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.metrics.record_hit();
    next.run(req).await
}

/// GET /admin/metrics
pub async fn metrics_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<body>\n<h1>Welcome, Chirpy Admin</h1>\n<p>Chirpy has been visited {} times!</p>\n</body>\n</html>\n",
        state.metrics.hits()
    ))
}

/// /api/reset: zero the hit counter. In dev mode the store is cleared too.
pub async fn reset(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.metrics.reset();

    if state.dev_mode {
        let db = state.clone();
        blocking(move || Ok(db.db.clear()?)).await?;
        warn!("dev mode: store cleared");
    }

    info!("metrics reset");
    Ok("Hits reset to 0")
}

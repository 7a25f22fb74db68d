use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::{debug, info};

use chirpy_types::events::WebhookEvent;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::authorization_header;

/// POST /api/polka/webhooks: billing events.
///
/// The key is checked before the body is parsed. Unknown events are
/// acknowledged and ignored.
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    verify_api_key(authorization_header(&headers), &state.polka_key)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook body: {e}")))?;

    let name = event.name().to_string();
    match event {
        WebhookEvent::UserUpgraded { user_id } => {
            let db = state.clone();
            blocking(move || Ok(db.db.upgrade_user(user_id)?)).await?;
            info!(user_id, event = %name, "user upgraded to chirpy red");
        }
        WebhookEvent::Unhandled { .. } => {
            debug!(event = %name, "ignoring webhook event");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Expects `Authorization: ApiKey <base64>`; the decoded bytes must equal
/// the configured key exactly.
fn verify_api_key(header: Option<&str>, expected: &[u8]) -> Result<(), ApiError> {
    let encoded = header
        .and_then(|h| h.strip_prefix("ApiKey "))
        .map(str::trim)
        .ok_or(ApiError::InvalidApiKey)?;
    let key = B64.decode(encoded).map_err(|_| ApiError::InvalidApiKey)?;

    if key.as_slice() != expected {
        return Err(ApiError::InvalidApiKey);
    }
    Ok(())
}

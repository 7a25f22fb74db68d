use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::tokens::{TokenKind, bearer_token};

/// Identity attached to requests that carried a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: u64,
}

pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Validate the access token in the Authorization header and expose the
/// caller as an `AuthUser` extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(authorization_header(req.headers()))?;
    let claims = state.tokens.validate(token, TokenKind::Access)?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
    });
    Ok(next.run(req).await)
}

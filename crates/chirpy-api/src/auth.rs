use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use once_cell::sync::Lazy;
use tracing::{error, info};

use chirpy_db::models::{NewUser, User, UserUpdate};
use chirpy_db::{Database, StoreError};
use chirpy_types::api::{
    CreateUserRequest, LoginRequest, LoginResponse, RefreshResponse, UpdateUserRequest,
    UserResponse,
};

use crate::error::{ApiError, blocking};
use crate::metrics::Metrics;
use crate::middleware::{AuthUser, authorization_header};
use crate::tokens::{TokenKeys, TokenKind, bearer_token};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenKeys,
    /// Decoded pre-shared key expected on the billing webhook.
    pub polka_key: Vec<u8>,
    pub metrics: Metrics,
    /// Allows `/api/reset` to wipe the store.
    pub dev_mode: bool,
}

pub(crate) fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email.clone(),
        is_chirpy_red: user.is_chirpy_red,
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    require_credentials(&req.email, &req.password)?;

    let db = state.clone();
    let user = blocking(move || {
        let password_hash = hash_password(&req.password)?;
        Ok(db.db.create_user(&NewUser {
            email: req.email,
            password_hash,
        })?)
    })
    .await?;

    info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user_response(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let db = state.clone();
    let user = blocking(move || {
        let user = match db.db.get_user_by_email(&req.email) {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                reject_unknown_user(&req.password);
                return Err(ApiError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };
        verify_password(&req.password, &user.password_hash)?;
        Ok(user)
    })
    .await?;

    let token = state.tokens.issue(TokenKind::Access, user.id)?;
    let refresh_token = state.tokens.issue(TokenKind::Refresh, user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        id: user.id,
        email: user.email,
        is_chirpy_red: user.is_chirpy_red,
        token,
        refresh_token,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    require_credentials(&req.email, &req.password)?;

    let db = state.clone();
    let user = blocking(move || {
        let password_hash = hash_password(&req.password)?;
        Ok(db.db.update_user(&UserUpdate {
            id: auth.user_id,
            email: req.email,
            password_hash,
        })?)
    })
    .await?;

    info!(user_id = user.id, "user updated");
    Ok(Json(user_response(&user)))
}

/// POST /api/refresh: trade a refresh token for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(authorization_header(&headers))?.to_string();

    let db = state.clone();
    let claims = blocking(move || Ok(db.tokens.validate_refresh(&db.db, &token)?)).await?;

    let token = state.tokens.issue(TokenKind::Access, claims.user_id)?;
    Ok(Json(RefreshResponse { token }))
}

/// POST /api/revoke: put a refresh token on the revocation list.
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(authorization_header(&headers))?.to_string();

    let db = state.clone();
    let record = blocking(move || Ok(db.tokens.revoke(&db.db, &token)?)).await?;

    info!(revoked_at = %record.revoked_at, "refresh token revoked");
    Ok(StatusCode::NO_CONTENT)
}

fn require_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".into(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            ApiError::Internal
        })
}

/// Hash checked when the email is unknown, so a miss costs as much as a
/// wrong password.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("chirpy-dummy-password").ok());

fn reject_unknown_user(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

fn verify_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!("stored password hash is unreadable: {}", e);
        ApiError::Internal
    })?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized)
}

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use chirpy_db::StoreError;
use chirpy_types::api::ErrorResponse;

use crate::content::ContentError;
use crate::tokens::TokenError;

/// Failures surfaced by request handlers, mapped to HTTP statuses in one place.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{0}")]
    BadRequest(String),
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),
    #[error("invalid email or password")]
    Unauthorized,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(e) => store_status(e),
            Self::Token(TokenError::Store(e)) => store_status(e),
            Self::Token(TokenError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Content(_) | Self::BadRequest(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Empty | StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::NotOwner => StatusCode::FORBIDDEN,
        StoreError::AlreadyExists => StatusCode::CONFLICT,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::InvalidPath(_)
        | StoreError::Io(_)
        | StoreError::Json(_)
        | StoreError::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Run synchronous store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use chirpy_db::StoreError;
use chirpy_db::models::Chirp;
use chirpy_types::api::{ChirpQuery, ChirpResponse, CreateChirpRequest, SortOrder};

use crate::auth::AppState;
use crate::content::clean_chirp;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

fn chirp_response(chirp: Chirp) -> ChirpResponse {
    ChirpResponse {
        id: chirp.id,
        author_id: chirp.author_id,
        body: chirp.body,
    }
}

/// GET /api/chirps: every chirp, optionally for one author. `204` when there
/// is nothing to show.
pub async fn list_chirps(
    State(state): State<AppState>,
    Query(query): Query<ChirpQuery>,
) -> Result<Response, ApiError> {
    let author_id = query.author_id;
    let db = state.clone();
    let result = blocking(move || {
        let chirps = match author_id {
            Some(author_id) => db.db.list_chirps_by_author(author_id),
            None => db.db.list_chirps(),
        };
        Ok(chirps)
    })
    .await?;

    let mut chirps = match result {
        Ok(chirps) => chirps,
        Err(StoreError::Empty) => {
            debug!("no chirps to list");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    chirps.sort_by_key(|c| c.id);
    if query.sort == SortOrder::Desc {
        chirps.reverse();
    }

    let body: Vec<ChirpResponse> = chirps.into_iter().map(chirp_response).collect();
    Ok(Json(body).into_response())
}

pub async fn get_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let chirp = blocking(move || Ok(db.db.get_chirp(chirp_id)?)).await?;
    Ok(Json(chirp_response(chirp)))
}

pub async fn create_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateChirpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let body = clean_chirp(&req.body)?;

    let db = state.clone();
    let chirp = blocking(move || Ok(db.db.create_chirp(&body, auth.user_id)?)).await?;

    info!(chirp_id = chirp.id, author_id = chirp.author_id, "chirp created");
    Ok((StatusCode::CREATED, Json(chirp_response(chirp))))
}

/// DELETE /api/chirps/{chirp_id}: only the author may delete a chirp.
pub async fn delete_chirp(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chirp_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    blocking(move || match db.db.delete_chirp_by_author(chirp_id, auth.user_id) {
        Err(StoreError::NotOwner) => {
            Err(ApiError::Forbidden("only the author can delete a chirp"))
        }
        other => Ok(other?),
    })
    .await?;

    info!(chirp_id, user_id = auth.user_id, "chirp deleted");
    Ok(StatusCode::NO_CONTENT)
}

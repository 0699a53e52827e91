//! Endpoints called by the host application

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use cadabra_core::{Identity, User, UserId};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    /// `null` for an anonymous visitor
    user_id: Option<UserId>,
    experiment: String,
    buckets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub bucket: String,
}

#[derive(Debug, Deserialize)]
pub struct UserBody {
    username: String,
    date_joined: Option<Timestamp>,
}

/// Handle `POST /v1/assignments`
pub async fn assign(
    State(state): State<AppState>,
    body: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<AssignResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let bucket = state
        .experiments
        .assignments()
        .assign(Identity::from(request.user_id), &request.experiment, &request.buckets)
        .await?;

    Ok(Json(AssignResponse { bucket }))
}

/// Handle `PUT /v1/users/{id}`
///
/// Mirrors a host user so reports can filter on join date. An omitted
/// `date_joined` keeps the stored one, or is set to now for a new user.
pub async fn save_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UserBody>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if body.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".to_owned()));
    }

    let id = UserId(id);
    let date_joined = match body.date_joined {
        Some(date_joined) => date_joined,
        None => state
            .store
            .user(id)
            .await?
            .map_or_else(Timestamp::now, |existing| existing.date_joined),
    };

    let user = User {
        id,
        username: body.username,
        date_joined,
    };
    state.store.save_user(&user).await?;
    tracing::debug!(user_id = %user.id, "user mirrored");

    Ok(Json(user))
}

//! User API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{UpsertUserRequest, User};
use crate::AppState;

/// POST /api/users - Upsert a user on sign-in.
pub async fn upsert_user(
    State(state): State<AppState>,
    Json(request): Json<UpsertUserRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.external_id.trim().is_empty() {
        return error(
            AppError::Validation("External id is required".to_string()),
            revision_id,
        );
    }

    match state.repo.upsert_user(&request).await {
        Ok(user) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(user, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/users/:externalId - Look up a user by external auth id.
pub async fn get_user(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_user_by_external_id(&external_id).await {
        Ok(Some(user)) => success(user, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("User {} not found", external_id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

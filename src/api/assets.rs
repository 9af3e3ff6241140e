//! Asset API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Asset, CreateAssetRequest, UpdateAssetRequest};
use crate::AppState;

/// Query parameters identifying the owning user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: String,
}

/// GET /api/assets?userId= - List a user's assets.
pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Vec<Asset>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_assets(&query.user_id).await {
        Ok(assets) => success(assets, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/assets - Create a new asset.
pub async fn create_asset(
    State(state): State<AppState>,
    Json(request): Json<CreateAssetRequest>,
) -> ApiResult<Asset> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    // Validate required fields
    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Asset name is required".to_string()),
            revision_id,
        );
    }
    if request.user_id.trim().is_empty() {
        return error(
            AppError::Validation("User id is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_asset(&request).await {
        Ok(asset) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(asset, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/assets/:id - Update an asset.
pub async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAssetRequest>,
) -> ApiResult<Asset> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Asset name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.update_asset(&id, &request).await {
        Ok(asset) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(asset, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

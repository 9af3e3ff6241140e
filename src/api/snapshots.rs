//! Snapshot and value-record API endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::errors::AppError;
use crate::models::{
    CreateSnapshotRequest, DeleteRecordsRequest, Snapshot, SnapshotPage, UpdateRecordValuesRequest,
};
use crate::AppState;

/// Query parameters for paginated history listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: String,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// POST /api/snapshots - Create a snapshot with all its value records.
pub async fn create_snapshot(
    State(state): State<AppState>,
    Json(request): Json<CreateSnapshotRequest>,
) -> ApiResult<Snapshot> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    // Validate required fields
    if request.user_id.trim().is_empty() {
        return error(
            AppError::Validation("User id is required".to_string()),
            revision_id,
        );
    }
    if request.entries.is_empty() {
        return error(
            AppError::Validation("At least one entry is required".to_string()),
            revision_id,
        );
    }
    for entry in &request.entries {
        if !entry.value.is_finite() {
            return error(
                AppError::Validation(format!(
                    "Value for asset {} must be a finite number",
                    entry.asset_id
                )),
                revision_id,
            );
        }
    }

    match state.repo.create_snapshot(&request).await {
        Ok(snapshot) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(snapshot, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/snapshots - List one page of a user's snapshot history.
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<SnapshotPage> {
    list_snapshots_page(state, query).await
}

/// GET /api/history - Alias of the snapshot listing for the history view.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<SnapshotPage> {
    list_snapshots_page(state, query).await
}

async fn list_snapshots_page(state: AppState, query: HistoryQuery) -> ApiResult<SnapshotPage> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let cursor = match query.cursor.as_deref() {
        Some(raw) => match crate::db::PageCursor::decode(raw) {
            Ok(cursor) => Some(cursor),
            Err(e) => return error(e, revision_id),
        },
        None => None,
    };

    match state
        .repo
        .list_snapshots_page(&query.user_id, cursor.as_ref(), page_size)
        .await
    {
        Ok(page) => success(page, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/records - Delete value records by id.
pub async fn delete_records(
    State(state): State<AppState>,
    Json(request): Json<DeleteRecordsRequest>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.record_ids.is_empty() {
        return error(
            AppError::Validation("No record ids provided".to_string()),
            revision_id,
        );
    }

    match state.repo.delete_records(&request.record_ids).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/records - Patch record values in place.
pub async fn update_record_values(
    State(state): State<AppState>,
    Json(request): Json<UpdateRecordValuesRequest>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.edits.is_empty() {
        return error(
            AppError::Validation("No edits provided".to_string()),
            revision_id,
        );
    }
    for edit in &request.edits {
        if !edit.value.is_finite() {
            return error(
                AppError::Validation(format!(
                    "Value for record {} must be a finite number",
                    edit.id
                )),
                revision_id,
            );
        }
    }

    match state.repo.update_record_values(&request).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

//! Aggregation API endpoints for the chart and the entry form.

use axum::extract::{Query, State};

use super::{error, success, ApiResult};
use crate::api::OwnerQuery;
use crate::models::{DateTotal, LastKnownValues};
use crate::AppState;

/// GET /api/analytics/totals?userId= - All-time per-date totals for charting.
pub async fn get_totals_by_date(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Vec<DateTotal>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_totals_by_date(&query.user_id).await {
        Ok(totals) => success(totals, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/analytics/last-values?userId= - Most recent per-asset values for form pre-fill.
pub async fn get_last_known_values(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<LastKnownValues> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_last_known_values(&query.user_id).await {
        Ok(values) => success(values, revision_id),
        Err(e) => error(e, revision_id),
    }
}

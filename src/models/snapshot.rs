//! Snapshot and value-record models.
//!
//! A snapshot is one wealth entry: the value of every tracked asset for one
//! user at one chosen date. Each per-asset value is an `AssetValueRecord`
//! owned by exactly one snapshot. The asset name is copied into the record at
//! write time so renaming an asset never rewrites history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One asset's value within one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetValueRecord {
    pub id: String,
    pub asset_id: String,
    /// Name of the asset as it was when this record was written.
    pub asset_name: String,
    pub value: f64,
}

/// A single point-in-time wealth entry with its resolved value records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub user_id: String,
    /// Entry date as epoch milliseconds, chosen by the user.
    pub date: i64,
    pub records: Vec<AssetValueRecord>,
    pub created_at: String,
}

/// One (asset, value) pair in a snapshot creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub asset_id: String,
    pub value: f64,
}

/// Request body for creating a new snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub user_id: String,
    pub date: i64,
    pub entries: Vec<SnapshotEntry>,
}

/// One page of snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPage {
    pub items: Vec<Snapshot>,
    /// Opaque continuation token; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub is_exhausted: bool,
}

/// Request body for deleting value records by id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordsRequest {
    pub record_ids: Vec<String>,
}

/// One value edit in an update-records request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValueEdit {
    pub id: String,
    pub value: f64,
}

/// Request body for patching record values in place.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordValuesRequest {
    pub edits: Vec<RecordValueEdit>,
}

/// One charting point: total wealth at an exact date value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTotal {
    pub date: i64,
    pub total: f64,
}

/// The most recent recorded value of one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownValue {
    pub value: f64,
    pub date: i64,
}

/// Mapping from asset id to its most recent value, for form pre-fill.
pub type LastKnownValues = HashMap<String, LastKnownValue>;

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

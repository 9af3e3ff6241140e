//! Database repository for CRUD and aggregation operations.
//!
//! Uses prepared statements and transactions for data integrity. Multi-row
//! mutations (snapshot creation, record deletion, value edits) run inside a
//! single transaction so a caller never observes a partial batch.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Asset, AssetValueRecord, CreateAssetRequest, CreateSnapshotRequest, DateTotal, LastKnownValue,
    LastKnownValues, RevisionInfo, Snapshot, SnapshotPage, UpdateAssetRequest,
    UpdateRecordValuesRequest, UpsertUserRequest, User,
};

/// Keyset cursor into the descending (date, id) snapshot scan.
///
/// Serialized as `{date}:{id}`; treated as opaque by clients. Anchoring on
/// the stable sort key keeps the cursor valid across concurrent inserts and
/// never double-returns a snapshot between pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub date: i64,
    pub id: String,
}

impl PageCursor {
    pub fn encode(&self) -> String {
        format!("{}:{}", self.date, self.id)
    }

    pub fn decode(raw: &str) -> Result<Self, AppError> {
        let (date, id) = raw
            .split_once(':')
            .ok_or_else(|| AppError::BadRequest(format!("Invalid cursor: {}", raw)))?;
        let date = date
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("Invalid cursor: {}", raw)))?;
        if id.is_empty() {
            return Err(AppError::BadRequest(format!("Invalid cursor: {}", raw)));
        }
        Ok(Self {
            date,
            id: id.to_string(),
        })
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info for client change polling.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user by external auth-provider id.
    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, external_id, name, email, image, created_at, updated_at FROM users WHERE external_id = ?"
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Insert a user on first sign-in, or refresh their profile fields afterwards.
    pub async fn upsert_user(&self, request: &UpsertUserRequest) -> Result<User, AppError> {
        let now = Utc::now().to_rfc3339();

        if let Some(existing) = self.get_user_by_external_id(&request.external_id).await? {
            sqlx::query(
                "UPDATE users SET name = ?, email = ?, image = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&request.name)
            .bind(&request.email)
            .bind(&request.image)
            .bind(&now)
            .bind(&existing.id)
            .execute(&self.pool)
            .await?;

            self.increment_revision().await?;

            return Ok(User {
                name: request.name.clone(),
                email: request.email.clone(),
                image: request.image.clone(),
                updated_at: now,
                ..existing
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, external_id, name, email, image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.external_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.image)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(User {
            id,
            external_id: request.external_id.clone(),
            name: request.name.clone(),
            email: request.email.clone(),
            image: request.image.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // ==================== ASSET OPERATIONS ====================

    /// List all assets owned by a user.
    pub async fn list_assets(&self, user_id: &str) -> Result<Vec<Asset>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, user_id, created_at, updated_at FROM assets WHERE user_id = ?"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(asset_from_row).collect())
    }

    /// Get an asset by ID.
    pub async fn get_asset(&self, id: &str) -> Result<Option<Asset>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, user_id, created_at, updated_at FROM assets WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(asset_from_row))
    }

    /// Create a new asset.
    pub async fn create_asset(&self, request: &CreateAssetRequest) -> Result<Asset, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO assets (id, name, description, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Asset {
            id,
            name: request.name.clone(),
            description: request.description.clone(),
            user_id: request.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update an asset, replacing its mutable fields.
    ///
    /// Historical value records keep the asset name they were written with.
    pub async fn update_asset(
        &self,
        id: &str,
        request: &UpdateAssetRequest,
    ) -> Result<Asset, AppError> {
        let existing = self
            .get_asset(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))?;

        let now = Utc::now().to_rfc3339();

        sqlx::query("UPDATE assets SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&request.name)
            .bind(&request.description)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Asset {
            name: request.name.clone(),
            description: request.description.clone(),
            updated_at: now,
            ..existing
        })
    }

    // ==================== SNAPSHOT OPERATIONS ====================

    /// Create a snapshot with all its value records as one atomic batch.
    ///
    /// Each entry's asset is resolved inside the transaction to capture its
    /// current name; an unresolvable asset aborts the whole batch with
    /// NotFound and nothing is persisted.
    pub async fn create_snapshot(
        &self,
        request: &CreateSnapshotRequest,
    ) -> Result<Snapshot, AppError> {
        let snapshot_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(request.entries.len());

        for (position, entry) in request.entries.iter().enumerate() {
            let asset_row = sqlx::query("SELECT name FROM assets WHERE id = ? AND user_id = ?")
                .bind(&entry.asset_id)
                .bind(&request.user_id)
                .fetch_optional(&mut *tx)
                .await?;

            let asset_name: String = asset_row
                .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", entry.asset_id)))?
                .get("name");

            let record_id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO asset_value_records (id, snapshot_id, asset_id, asset_name, value, position) VALUES (?, ?, ?, ?, ?, ?)"
            )
            .bind(&record_id)
            .bind(&snapshot_id)
            .bind(&entry.asset_id)
            .bind(&asset_name)
            .bind(entry.value)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

            records.push(AssetValueRecord {
                id: record_id,
                asset_id: entry.asset_id.clone(),
                asset_name,
                value: entry.value,
            });
        }

        sqlx::query("INSERT INTO snapshots (id, user_id, date, created_at) VALUES (?, ?, ?, ?)")
            .bind(&snapshot_id)
            .bind(&request.user_id)
            .bind(request.date)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Snapshot {
            id: snapshot_id,
            user_id: request.user_id.clone(),
            date: request.date,
            records,
            created_at: now,
        })
    }

    /// List one page of a user's snapshots in descending (date, id) order.
    ///
    /// Snapshots whose records have all been deleted are filtered out here
    /// rather than cascaded away at delete time.
    pub async fn list_snapshots_page(
        &self,
        user_id: &str,
        cursor: Option<&PageCursor>,
        page_size: u32,
    ) -> Result<SnapshotPage, AppError> {
        // Fetch one extra row to detect whether more pages exist.
        let limit = page_size as i64 + 1;

        let rows = match cursor {
            Some(cursor) => {
                sqlx::query(
                    r#"SELECT id, user_id, date, created_at FROM snapshots
                       WHERE user_id = ?
                         AND (date < ? OR (date = ? AND id < ?))
                         AND EXISTS (SELECT 1 FROM asset_value_records r WHERE r.snapshot_id = snapshots.id)
                       ORDER BY date DESC, id DESC
                       LIMIT ?"#,
                )
                .bind(user_id)
                .bind(cursor.date)
                .bind(cursor.date)
                .bind(&cursor.id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, user_id, date, created_at FROM snapshots
                       WHERE user_id = ?
                         AND EXISTS (SELECT 1 FROM asset_value_records r WHERE r.snapshot_id = snapshots.id)
                       ORDER BY date DESC, id DESC
                       LIMIT ?"#,
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let is_exhausted = rows.len() <= page_size as usize;
        let mut items = Vec::with_capacity(rows.len().min(page_size as usize));

        for row in rows.iter().take(page_size as usize) {
            let snapshot_id: String = row.get("id");
            let records = self.list_snapshot_records(&snapshot_id).await?;
            items.push(Snapshot {
                id: snapshot_id,
                user_id: row.get("user_id"),
                date: row.get("date"),
                records,
                created_at: row.get("created_at"),
            });
        }

        let next_cursor = if is_exhausted {
            None
        } else {
            items.last().map(|s| {
                PageCursor {
                    date: s.date,
                    id: s.id.clone(),
                }
                .encode()
            })
        };

        Ok(SnapshotPage {
            items,
            next_cursor,
            is_exhausted,
        })
    }

    /// Resolve a snapshot's value records in insertion order.
    async fn list_snapshot_records(
        &self,
        snapshot_id: &str,
    ) -> Result<Vec<AssetValueRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT id, asset_id, asset_name, value FROM asset_value_records WHERE snapshot_id = ? ORDER BY position"
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Delete value records by id.
    ///
    /// Unknown ids are a silent no-op; the containing snapshot row is left in
    /// place and disappears from reads once its last record is gone.
    pub async fn delete_records(&self, record_ids: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for record_id in record_ids {
            sqlx::query("DELETE FROM asset_value_records WHERE id = ?")
                .bind(record_id)
                .execute(&mut *tx)
                .await?;
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Patch record values in place as one atomic batch.
    ///
    /// Any unknown id fails the whole batch with NotFound; no edit is applied
    /// partially.
    pub async fn update_record_values(
        &self,
        request: &UpdateRecordValuesRequest,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for edit in &request.edits {
            let result = sqlx::query("UPDATE asset_value_records SET value = ? WHERE id = ?")
                .bind(edit.value)
                .bind(&edit.id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Record {} not found", edit.id)));
            }
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // ==================== AGGREGATION OPERATIONS ====================

    /// Compute all-time wealth totals grouped by exact date value, ascending.
    ///
    /// Grouping is by the literal millisecond timestamp, not the calendar
    /// day; snapshots sharing an identical date merge by summing.
    pub async fn get_totals_by_date(&self, user_id: &str) -> Result<Vec<DateTotal>, AppError> {
        let rows = sqlx::query(
            r#"SELECT s.date AS date, r.value AS value
               FROM snapshots s
               JOIN asset_value_records r ON r.snapshot_id = s.id
               WHERE s.user_id = ?"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
        for row in &rows {
            let date: i64 = row.get("date");
            let value: f64 = row.get("value");
            *totals.entry(date).or_insert(0.0) += value;
        }

        Ok(totals
            .into_iter()
            .map(|(date, total)| DateTotal { date, total })
            .collect())
    }

    /// Return each asset's value from the most recent snapshot containing it.
    ///
    /// Assets with no recorded history are absent from the mapping.
    pub async fn get_last_known_values(&self, user_id: &str) -> Result<LastKnownValues, AppError> {
        let rows = sqlx::query(
            r#"SELECT r.asset_id AS asset_id, r.value AS value, s.date AS date
               FROM snapshots s
               JOIN asset_value_records r ON r.snapshot_id = s.id
               WHERE s.user_id = ?
               ORDER BY s.date DESC, s.id DESC, r.position ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut latest: LastKnownValues = HashMap::new();
        for row in &rows {
            let asset_id: String = row.get("asset_id");
            latest.entry(asset_id).or_insert(LastKnownValue {
                value: row.get("value"),
                date: row.get("date"),
            });
        }

        Ok(latest)
    }
}

/// Bump the revision counter inside an open transaction.
async fn bump_revision(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        email: row.get("email"),
        image: row.get("image"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn asset_from_row(row: &sqlx::sqlite::SqliteRow) -> Asset {
    Asset {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> AssetValueRecord {
    AssetValueRecord {
        id: row.get("id"),
        asset_id: row.get("asset_id"),
        asset_name: row.get("asset_name"),
        value: row.get("value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = PageCursor {
            date: 1700000000000,
            id: "abc-123".to_string(),
        };
        assert_eq!(PageCursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(PageCursor::decode("not-a-cursor").is_err());
        assert!(PageCursor::decode("xyz:abc").is_err());
        assert!(PageCursor::decode("1700000000000:").is_err());
    }
}

//! Asset model matching the frontend Asset interface.

use serde::{Deserialize, Serialize};

/// A user-defined category of wealth (a stock, a currency, a bond, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a new asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for updating an existing asset.
///
/// Both mutable fields are replaced wholesale; omitting the description
/// clears it, matching the frontend edit form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

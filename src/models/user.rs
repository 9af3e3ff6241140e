//! User model matching the frontend User interface.
//!
//! Users are identified by an external auth-provider id and upserted on each
//! sign-in, so there is no separate create/update request pair.

use serde::{Deserialize, Serialize};

/// An application user, mirrored from the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Identifier from the external auth provider (stable across sign-ins).
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for upserting a user on sign-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub image: String,
}

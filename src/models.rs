use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The persisted identity record stored in the `users` table. The upload pipeline only
/// reads it to authorize a request and performs one targeted write on `profile_pic`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    // Primary Key. Never changes once issued.
    pub id: Uuid,
    pub username: String,
    pub email: String,
    // Canonical URL of the current profile photo. Overwritten on every upload, no history kept.
    pub profile_pic: Option<String>,
}

/// PendingPhotoUpdate
///
/// A short-lived row written before a photo is published and deleted once the URL has been
/// stored on the user. A row that survives a request marks an update whose remote side may
/// have completed without the profile catching up.
///
/// One row per upload attempt: concurrent uploads by the same user share an `asset_id`, so
/// only `attempt_id` tells their rows apart.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PendingPhotoUpdate {
    // Primary Key. Fresh for every upload attempt.
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    // The remote asset identifier the publish was (or is being) performed under.
    pub asset_id: String,
    pub created_at: DateTime<Utc>,
}

impl PendingPhotoUpdate {
    pub fn new(user_id: Uuid, asset_id: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            user_id,
            asset_id: asset_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// MediaAsset
///
/// The reference handed back by the media-hosting service after a successful publish.
/// The asset itself is owned remotely; only `secure_url` is copied onto the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaAsset {
    /// Stable identifier under which the asset is stored remotely.
    pub asset_id: String,
    pub url: String,
    pub secure_url: String,
    /// Remote revision, bumped by every overwrite of the same `asset_id`.
    pub version: Option<u64>,
}

/// UploadConfirmation
///
/// The body returned by a successful `PATCH /api/uploadPost`.
pub const UPLOAD_CONFIRMATION: &str = "File has been uploaded";

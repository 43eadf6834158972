use std::time::Duration;

use crate::{
    error::ApiError,
    media::MediaService,
    models::{MediaAsset, PendingPhotoUpdate, User},
    repository::Repository,
};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// apply_profile_photo
///
/// Stores `asset.secure_url` on the user named by `pending` and clears that attempt's pending
/// row. The write is idempotent, so a failing write is retried up to `attempts` times before
/// giving up with `PersistenceFailure`. On that path the pending row is left in place for
/// `resume_pending_updates`. Rows of other attempts by the same user are never touched.
pub async fn apply_profile_photo(
    repo: &dyn Repository,
    pending: &PendingPhotoUpdate,
    asset: &MediaAsset,
    attempts: u32,
) -> Result<User, ApiError> {
    let user_id = pending.user_id;
    let attempts = attempts.max(1);
    let mut attempt = 1;

    let user = loop {
        match repo.update_profile_pic(user_id, &asset.secure_url).await {
            Ok(Some(user)) => break user,
            Ok(None) => {
                tracing::warn!(%user_id, asset_id = %asset.asset_id, "user vanished before photo update");
                return Err(ApiError::UnknownIdentity);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(%user_id, attempt, error = %e, "profile update failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    %user_id,
                    asset_id = %asset.asset_id,
                    attempt_id = %pending.attempt_id,
                    error = %e,
                    "photo published but profile update exhausted retries; pending row kept"
                );
                return Err(e.into());
            }
        }
    };

    // The profile already holds the URL; a stale pending row only causes a redundant
    // (idempotent) re-apply on the next startup.
    if let Err(e) = repo.clear_pending_photo(pending.attempt_id).await {
        tracing::warn!(%user_id, error = %e, "could not clear pending photo row");
    }

    tracing::info!(%user_id, asset_id = %asset.asset_id, "profile photo updated");
    Ok(user)
}

/// resume_pending_updates
///
/// Startup sweep over photo updates interrupted between publish and persist. Each pending
/// asset is looked up remotely: if it exists its current URL is applied, otherwise the publish
/// never happened and the row is dropped. Returns how many rows were applied.
pub async fn resume_pending_updates(
    repo: &dyn Repository,
    media: &dyn MediaService,
) -> Result<usize, ApiError> {
    let pending = repo.get_pending_photos().await?;
    let mut applied = 0;

    for row in pending {
        match media.fetch(&row.asset_id).await {
            Ok(Some(asset)) => {
                match apply_profile_photo(repo, &row, &asset, 1).await {
                    Ok(_) => applied += 1,
                    Err(ApiError::UnknownIdentity) => {
                        repo.clear_pending_photo(row.attempt_id).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(None) => {
                tracing::info!(user_id = %row.user_id, asset_id = %row.asset_id, "pending photo never published; discarding");
                repo.clear_pending_photo(row.attempt_id).await?;
            }
            Err(e) => {
                // Leave the row for the next sweep.
                tracing::warn!(user_id = %row.user_id, error = %e, "could not look up pending photo");
            }
        }
    }

    Ok(applied)
}

//! Profile photo upload pipeline.
//!
//! gate → bearer → verify → resolve → record pending → publish → persist. Each stage either
//! hands its output to the next or stops with an `ApiError`; nothing here formats a response.

use std::time::Duration;

use uuid::Uuid;

use crate::{
    AppState, auth,
    error::ApiError,
    media::{self, MediaError, MediaState, Transformation, UploadOptions},
    models::{PendingPhotoUpdate, User},
    profile,
    repository::RepositoryState,
    staging::{self, IncomingFile, StagedFile},
};

/// Settings copied out of `AppConfig` for the detached publish task.
#[derive(Debug, Clone, Copy)]
struct PublishSettings {
    quality: u8,
    timeout: Duration,
    persist_attempts: u32,
}

/// upload_profile_photo
///
/// Runs the full pipeline for one request. The gate runs first, so a non-image is refused
/// before the credential is looked at. Publish and persist run on their own task: a client
/// that disconnects does not abort a publish that is already in flight.
pub async fn upload_profile_photo(
    state: &AppState,
    authorization: Option<&str>,
    file: IncomingFile,
) -> Result<User, ApiError> {
    let staged = staging::stage(file, &state.config.upload_staging_dir).await?;

    let token = auth::extract_bearer(authorization)?;
    let claims = auth::verify_token(token, &state.config.jwt_secret)?;
    let user = auth::resolve_identity(state.repo.as_ref(), claims.sub).await?;

    let settings = PublishSettings {
        quality: state.config.photo_quality,
        timeout: state.config.publish_timeout,
        persist_attempts: state.config.persist_attempts,
    };
    let task = tokio::spawn(publish_and_persist(
        state.repo.clone(),
        state.media.clone(),
        settings,
        user.id,
        staged,
    ));

    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(user_id = %user.id, "publish task failed: {:?}", e);
            Err(ApiError::Internal)
        }
    }
}

async fn publish_and_persist(
    repo: RepositoryState,
    media: MediaState,
    settings: PublishSettings,
    user_id: Uuid,
    staged: StagedFile,
) -> Result<User, ApiError> {
    let asset_id = media::profile_asset_id(user_id);

    // Intent first: if we crash after the publish, the sweep knows which asset to apply.
    let pending = PendingPhotoUpdate::new(user_id, asset_id.clone());
    repo.record_pending_photo(&pending).await?;

    let options = UploadOptions {
        asset_id: asset_id.clone(),
        transformation: Transformation::quality(settings.quality),
    };

    tracing::info!(%user_id, %asset_id, size = staged.size(), "publishing profile photo");
    let published = match tokio::time::timeout(settings.timeout, media.upload(&staged, &options))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout(settings.timeout)),
    };
    // The staged copy is no longer needed whatever the outcome.
    drop(staged);

    let asset = match published {
        Ok(asset) => asset,
        Err(e) => {
            if e.is_definitive() {
                if let Err(clear) = repo.clear_pending_photo(pending.attempt_id).await {
                    tracing::warn!(%user_id, error = %clear, "could not clear pending photo row");
                }
            } else {
                tracing::warn!(
                    %user_id,
                    %asset_id,
                    attempt_id = %pending.attempt_id,
                    error = %e,
                    "publish outcome unknown; pending row kept"
                );
            }
            return Err(e.into());
        }
    };

    profile::apply_profile_photo(repo.as_ref(), &pending, &asset, settings.persist_attempts).await
}

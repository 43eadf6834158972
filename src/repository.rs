use crate::models::{PendingPhotoUpdate, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepoError
///
/// The only thing the storage layer reports upward: the write or read did not happen.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The identity-storage collaborator consumed by the auth extractor and the photo pipeline.
/// Handlers never see the concrete implementation, so tests swap in a stub without touching
/// routing.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- User/Auth ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    // Idempotent: writing the same URL twice leaves the same row. `None` if the user is gone.
    async fn update_profile_pic(&self, id: Uuid, url: &str) -> Result<Option<User>, RepoError>;

    // --- Pending photo updates ---
    // One row per upload attempt; rows of other in-flight attempts are left alone.
    async fn record_pending_photo(&self, pending: &PendingPhotoUpdate) -> Result<(), RepoError>;
    // Deletes exactly the row recorded for `attempt_id`.
    async fn clear_pending_photo(&self, attempt_id: Uuid) -> Result<(), RepoError>;
    async fn get_pending_photos(&self) -> Result<Vec<PendingPhotoUpdate>, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Retrieves the identity named by a verified token's subject.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, profile_pic FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// update_profile_pic
    ///
    /// Targeted single-column write; the rest of the record is untouched.
    async fn update_profile_pic(&self, id: Uuid, url: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET profile_pic = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, email, profile_pic
            "#,
        )
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %id, "update_profile_pic error: {:?}", e);
            e
        })?;

        Ok(user)
    }

    async fn record_pending_photo(&self, pending: &PendingPhotoUpdate) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO pending_photo_updates (attempt_id, user_id, asset_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(pending.attempt_id)
        .bind(pending.user_id)
        .bind(&pending.asset_id)
        .bind(pending.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_pending_photo(&self, attempt_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM pending_photo_updates WHERE attempt_id = $1")
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_pending_photos(&self) -> Result<Vec<PendingPhotoUpdate>, RepoError> {
        let rows = sqlx::query_as::<_, PendingPhotoUpdate>(
            "SELECT attempt_id, user_id, asset_id, created_at FROM pending_photo_updates ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

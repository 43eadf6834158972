//! Shared fixtures for the integration tests: a stub identity store, token minting and
//! multipart request builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, header},
    response::Response,
};
use blog_api::{
    AppConfig, AppState, MockMediaService,
    auth::Claims,
    models::{PendingPhotoUpdate, User},
    repository::{RepoError, Repository, RepositoryState},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const BOUNDARY: &str = "blog-api-test-boundary";

// --- Stub Repository ---

/// In-memory identity store that counts the calls the pipeline makes into it.
#[derive(Default)]
pub struct StubRepository {
    users: Mutex<HashMap<Uuid, User>>,
    // Keyed on attempt id.
    pending: Mutex<HashMap<Uuid, PendingPhotoUpdate>>,
    get_user_calls: AtomicUsize,
    update_calls: AtomicUsize,
    failing_updates: AtomicUsize,
}

impl StubRepository {
    pub fn with_users(users: &[User]) -> Self {
        let repo = Self::default();
        for user in users {
            repo.users.lock().unwrap().insert(user.id, user.clone());
        }
        repo
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    /// Pending rows, oldest first.
    pub fn pending(&self) -> Vec<PendingPhotoUpdate> {
        let mut rows: Vec<_> = self.pending.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|row| row.created_at);
        rows
    }

    pub fn insert_pending(&self, user_id: Uuid, asset_id: &str) -> PendingPhotoUpdate {
        let row = PendingPhotoUpdate::new(user_id, asset_id);
        self.pending
            .lock()
            .unwrap()
            .insert(row.attempt_id, row.clone());
        row
    }

    /// The next `n` profile writes fail with a database error.
    pub fn fail_next_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for StubRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.user(id))
    }

    async fn update_profile_pic(&self, id: Uuid, url: &str) -> Result<Option<User>, RepoError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_updates.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_updates.store(failing - 1, Ordering::SeqCst);
            return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
        }

        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(&id).map(|user| {
            user.profile_pic = Some(url.to_string());
            user.clone()
        }))
    }

    async fn record_pending_photo(&self, pending: &PendingPhotoUpdate) -> Result<(), RepoError> {
        self.pending
            .lock()
            .unwrap()
            .insert(pending.attempt_id, pending.clone());
        Ok(())
    }

    async fn clear_pending_photo(&self, attempt_id: Uuid) -> Result<(), RepoError> {
        self.pending.lock().unwrap().remove(&attempt_id);
        Ok(())
    }

    async fn get_pending_photos(&self) -> Result<Vec<PendingPhotoUpdate>, RepoError> {
        Ok(self.pending())
    }
}

// --- Helper Functions ---

pub fn test_user(id: Uuid) -> User {
    User {
        id,
        username: format!("user-{}", &id.simple().to_string()[..6]),
        email: format!("{}@blog.test", id.simple()),
        profile_pic: None,
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Mints an HS256 token for `user_id` expiring `exp_offset` seconds from now (negative for
/// an already expired token).
pub fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    create_token_with_secret(user_id, exp_offset, TEST_JWT_SECRET)
}

pub fn create_token_with_secret(user_id: Uuid, exp_offset: i64, secret: &str) -> String {
    let now = now();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", create_token(user_id, 3600))
}

pub fn test_config(staging_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config.upload_staging_dir = staging_dir.to_path_buf();
    config
}

pub fn app_state(repo: Arc<StubRepository>, media: MockMediaService, staging_dir: &Path) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        media: Arc::new(media),
        config: test_config(staging_dir),
    }
}

/// A multipart body with a single file field.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(authorization: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri("/api/uploadPost")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn photo_request(authorization: Option<&str>, file_name: &str, content_type: &str) -> Request<Body> {
    upload_request(
        authorization,
        multipart_body("photo", file_name, content_type, b"\x89PNG\r\n\x1a\nfake-image-bytes"),
    )
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

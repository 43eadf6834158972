use async_trait::async_trait;
use reqwest::{StatusCode, multipart};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::{models::MediaAsset, staging::StagedFile};

/// MediaError
///
/// Failures of the remote media-hosting service, as seen from this process.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The request did not complete (DNS, connect, reset, read timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered and refused the upload (auth, quota, validation).
    #[error("rejected by media service ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The service answered 2xx with a body we could not read.
    #[error("unexpected media service response: {0}")]
    InvalidResponse(String),
    /// The staged file could not be read back.
    #[error("staged file unreadable: {0}")]
    Staging(#[from] std::io::Error),
    /// The request could not be built; nothing was sent.
    #[error("invalid upload request: {0}")]
    InvalidRequest(String),
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    /// Produced only by `MockMediaService`.
    #[error("simulated media failure")]
    Simulated,
}

impl MediaError {
    /// True when the remote side definitely did not store the asset. For every other error
    /// the publish may have landed after we stopped waiting. A 5xx may come from a gateway
    /// in front of the service, so only 4xx refusals count as definitive.
    pub fn is_definitive(&self) -> bool {
        match self {
            MediaError::Rejected { status, .. } => *status < 500,
            MediaError::Staging(_) | MediaError::InvalidRequest(_) | MediaError::Simulated => true,
            MediaError::Transport(_) | MediaError::InvalidResponse(_) | MediaError::Timeout(_) => {
                false
            }
        }
    }
}

/// Transformation
///
/// The directive applied by the media service on ingest: a uniform quality, no resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformation {
    pub quality: u8,
}

impl Transformation {
    pub fn quality(quality: u8) -> Self {
        Self { quality }
    }

    /// Cloudinary's compact transformation syntax, e.g. `q_90`.
    pub fn directive(&self) -> String {
        format!("q_{}", self.quality)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub asset_id: String,
    pub transformation: Transformation,
}

/// profile_asset_id
///
/// The remote key of a user's profile photo. Derived from the user id so every user owns
/// exactly one slot and nobody else's upload can overwrite it.
pub fn profile_asset_id(user_id: Uuid) -> String {
    format!("profile_{}", user_id.simple())
}

// 1. MediaService Contract
/// MediaService
///
/// The abstract contract for the media-hosting collaborator. `CloudinaryClient` is used in
/// production and `MockMediaService` in tests; the pipeline only sees the trait.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Pushes the staged bytes to the service under `options.asset_id`, overwriting any
    /// previous asset with that id.
    async fn upload(
        &self,
        file: &StagedFile,
        options: &UploadOptions,
    ) -> Result<MediaAsset, MediaError>;

    /// Looks up the current asset stored under `asset_id`, if any.
    async fn fetch(&self, asset_id: &str) -> Result<Option<MediaAsset>, MediaError>;
}

/// MediaState
///
/// The concrete type used to share the media service across the application state.
pub type MediaState = Arc<dyn MediaService>;

// 2. The Real Implementation (Cloudinary)
/// CloudinaryClient
///
/// Talks to the Cloudinary REST API with signed upload requests. Uploads go to
/// `{api_url}/{cloud_name}/image/upload`; lookups use the admin API with basic auth.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    api_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryResource {
    public_id: String,
    version: Option<u64>,
    url: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorEnvelope {
    error: CloudinaryErrorBody,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    message: String,
}

impl From<CloudinaryResource> for MediaAsset {
    fn from(resource: CloudinaryResource) -> Self {
        MediaAsset {
            asset_id: resource.public_id,
            url: resource.url,
            secure_url: resource.secure_url,
            version: resource.version,
        }
    }
}

impl CloudinaryClient {
    /// new
    ///
    /// Builds the HTTP client. The overall publish deadline is enforced by the pipeline;
    /// only the connect phase is bounded here.
    pub fn new(
        api_url: &str,
        cloud_name: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.api_url, self.cloud_name, path)
    }

    async fn rejection(response: reqwest::Response) -> MediaError {
        let status = response.status().as_u16();
        let message = match response.json::<CloudinaryErrorEnvelope>().await {
            Ok(envelope) => envelope.error.message,
            Err(_) => "no error message".to_string(),
        };
        MediaError::Rejected { status, message }
    }
}

/// sign_params
///
/// Cloudinary request signature: parameters sorted by name, joined as `k=v&k=v`, the API
/// secret appended, then SHA-256 hex encoded. `file`, `api_key` and the signature fields
/// themselves are never signed.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaService for CloudinaryClient {
    async fn upload(
        &self,
        file: &StagedFile,
        options: &UploadOptions,
    ) -> Result<MediaAsset, MediaError> {
        let bytes = tokio::fs::read(file.path()).await?;

        let mut params = BTreeMap::new();
        params.insert("invalidate", "true".to_string());
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", options.asset_id.clone());
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        params.insert("transformation", options.transformation.directive());
        let signature = sign_params(&params, &self.api_secret);

        let part = multipart::Part::bytes(bytes)
            .file_name(file.file_name().to_string())
            .mime_str(file.content_type())
            .map_err(|e| MediaError::InvalidRequest(e.to_string()))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let resource = response
            .json::<CloudinaryResource>()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        Ok(resource.into())
    }

    async fn fetch(&self, asset_id: &str) -> Result<Option<MediaAsset>, MediaError> {
        let response = self
            .client
            .get(self.endpoint(&format!("resources/image/upload/{asset_id}")))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let resource = response
            .json::<CloudinaryResource>()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        Ok(Some(resource.into()))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMediaService
///
/// In-memory stand-in for the media service. Records every published asset id so tests can
/// assert whether (and how often) the publisher was reached.
#[derive(Clone, Default)]
pub struct MockMediaService {
    /// When true, every upload fails with `MediaError::Simulated`.
    pub should_fail: bool,
    /// Time every upload takes before it completes.
    pub delay: Option<Duration>,
    published: Arc<Mutex<Vec<MediaAsset>>>,
}

impl MockMediaService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A mock whose uploads only complete after `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Asset ids of successful uploads, oldest first.
    pub fn published(&self) -> Vec<String> {
        self.assets().into_iter().map(|a| a.asset_id).collect()
    }

    fn assets(&self) -> Vec<MediaAsset> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Places an asset in the mock as if a publish had completed earlier.
    pub fn seed(&self, asset_id: &str) -> MediaAsset {
        let asset = Self::asset_for(asset_id, 1);
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(asset.clone());
        asset
    }

    fn asset_for(asset_id: &str, version: u64) -> MediaAsset {
        MediaAsset {
            asset_id: asset_id.to_string(),
            url: format!("http://res.cloudinary.test/demo/image/upload/v{version}/{asset_id}"),
            secure_url: format!(
                "https://res.cloudinary.test/demo/image/upload/v{version}/{asset_id}"
            ),
            version: Some(version),
        }
    }
}

#[async_trait]
impl MediaService for MockMediaService {
    async fn upload(
        &self,
        _file: &StagedFile,
        options: &UploadOptions,
    ) -> Result<MediaAsset, MediaError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(MediaError::Simulated);
        }

        let mut published = self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let version = published
            .iter()
            .filter(|a| a.asset_id == options.asset_id)
            .count() as u64
            + 1;
        let asset = Self::asset_for(&options.asset_id, version);
        published.push(asset.clone());

        Ok(asset)
    }

    async fn fetch(&self, asset_id: &str) -> Result<Option<MediaAsset>, MediaError> {
        Ok(self
            .assets()
            .into_iter()
            .rev()
            .find(|a| a.asset_id == asset_id))
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{media::MediaError, repository::RepoError};

/// ErrorResponse
///
/// The JSON envelope of every failed request: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// ApiError
///
/// Every way a request can fail. Pipeline stages return one of these and stop; the
/// `IntoResponse` impl below is the single place that turns a failure into a status code
/// and body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or malformed bearer credential")]
    MissingCredential,
    #[error("credential failed verification")]
    InvalidCredential,
    #[error("credential subject has no matching user")]
    UnknownIdentity,
    #[error("request carries no `photo` file")]
    MissingFile,
    #[error("unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },
    #[error("malformed multipart body: {0}")]
    MalformedUpload(String),
    #[error("upload exceeds {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: usize },
    #[error("media publish failed: {0}")]
    MediaPublishFailure(#[from] MediaError),
    #[error("persistence failed: {0}")]
    PersistenceFailure(#[from] RepoError),
    #[error("staging failed: {0}")]
    Staging(#[from] std::io::Error),
    #[error("not found")]
    NotFound,
    #[error("internal server error")]
    Internal,
}

const LOGIN_REQUIRED: &str = "please log in to update your photo";

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential
            | ApiError::InvalidCredential
            | ApiError::UnknownIdentity => StatusCode::UNAUTHORIZED,
            ApiError::MissingFile
            | ApiError::UnsupportedMediaType { .. }
            | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MediaPublishFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PersistenceFailure(_) | ApiError::Staging(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The machine-readable code and the client-facing message. 401 and 5xx responses never
    /// carry internal detail.
    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            ApiError::MissingCredential => ("UNAUTHORIZED", "authentication token missing".into()),
            // Identical bodies: a dead subject must look like a bad token.
            ApiError::InvalidCredential | ApiError::UnknownIdentity => {
                ("UNAUTHORIZED", LOGIN_REQUIRED.into())
            }
            ApiError::MissingFile => ("MISSING_FILE", "a `photo` file field is required".into()),
            ApiError::UnsupportedMediaType { .. } => (
                "UNSUPPORTED_MEDIA_TYPE",
                "not an image, please upload image files only".into(),
            ),
            ApiError::MalformedUpload(detail) => ("MALFORMED_UPLOAD", detail.clone()),
            ApiError::PayloadTooLarge { max_bytes } => (
                "PAYLOAD_TOO_LARGE",
                format!("file exceeds the {max_bytes} byte limit"),
            ),
            ApiError::MediaPublishFailure(_) => (
                "MEDIA_PUBLISH_FAILED",
                "the media service could not store the photo".into(),
            ),
            ApiError::PersistenceFailure(_) => (
                "PERSISTENCE_FAILED",
                "the profile could not be updated".into(),
            ),
            ApiError::NotFound => ("NOT_FOUND", "page not found".into()),
            ApiError::Staging(_) | ApiError::Internal => {
                ("INTERNAL_SERVER_ERROR", "internal server error".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let (code, message) = self.code_and_message();
        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

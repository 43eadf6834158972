use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorResponse},
    models::{UPLOAD_CONFIRMATION, User},
    pipeline, staging,
};
use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::{HeaderMap, header},
};

// --- Handlers ---

/// upload_photo
///
/// [Self-authenticating Route] Replaces the caller's profile photo.
///
/// *Ordering*: the multipart `photo` field is read and type-checked before the bearer token
/// is examined, so this route is not behind the auth middleware. Every failure is an
/// `ApiError` rendered by its `IntoResponse` impl.
#[utoipa::path(
    patch,
    path = "/api/uploadPost",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Photo uploaded", body = String),
        (status = 400, description = "Missing or non-image file", body = ErrorResponse),
        (status = 401, description = "Missing, invalid or unknown credential", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Profile could not be updated", body = ErrorResponse),
        (status = 502, description = "Media service failure", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all, name = "upload_photo")]
pub async fn upload_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<&'static str>, ApiError> {
    let file = staging::read_photo_field(&mut multipart, state.config.max_upload_bytes).await?;

    // A header that is present but not valid UTF-8 is treated as absent.
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    pipeline::upload_profile_photo(&state, authorization, file).await?;

    Ok(Json(UPLOAD_CONFIRMATION))
}

/// get_me
///
/// [Authenticated Route] Returns the identity the auth middleware attached to the request.
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_me(Extension(auth_user): Extension<AuthUser>) -> Json<User> {
    Json(auth_user.user)
}

/// not_found
///
/// Fallback for every unmatched path.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

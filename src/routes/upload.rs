use crate::{AppState, handlers};
use axum::{Router, extract::DefaultBodyLimit, routing::patch};

/// Upload Router Module
///
/// `PATCH /api/uploadPost` is not behind the auth middleware: the upload gate checks the
/// file's media type first and the pipeline authenticates afterwards.
///
/// The body limit leaves headroom above `max_upload_bytes` for multipart framing; the exact
/// per-file limit is enforced while the `photo` field is read.
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        .route("/api/uploadPost", patch(handlers::upload_photo))
        .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024))
}

/// Router Module Index
///
/// Routes are split by how they authenticate, so access control is applied at the module
/// level (via Axum layers) instead of per handler.

/// Routes accessible to anyone (health check).
pub mod public;

/// Routes behind the auth middleware. The resolved `AuthUser` is attached to the request.
pub mod authenticated;

/// The photo upload route. Authenticates inside the pipeline, after the upload gate.
pub mod upload;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// Represents the payload expected inside a JSON Web Token (JWT), signed with the server's
/// shared secret by the login flow and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): The UUID of the user. Tokens minted by the legacy login flow carry
    /// it under `id`.
    #[serde(alias = "id")]
    pub sub: Uuid,
    /// Expiration Time (exp): Timestamp after which the JWT must not be accepted.
    pub exp: usize,
    /// Issued At (iat): Timestamp when the JWT was issued.
    #[serde(default)]
    pub iat: usize,
}

const BEARER_SCHEME: &str = "Bearer";

/// extract_bearer
///
/// Pulls the raw token out of an `Authorization` header value. The value must start with
/// `Bearer`; the token is the segment after the first space. Anything else, including an
/// absent header, is `MissingCredential`.
pub fn extract_bearer(authorization: Option<&str>) -> Result<&str, ApiError> {
    let value = authorization.ok_or(ApiError::MissingCredential)?;

    if !value.starts_with(BEARER_SCHEME) {
        return Err(ApiError::MissingCredential);
    }

    value
        .split(' ')
        .nth(1)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingCredential)
}

/// verify_token
///
/// Checks the HS256 signature and expiry of `token` against `secret` and decodes its claims.
/// Every failure collapses to `InvalidCredential`; the kind is only logged.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    // Ensure expiration time validation is always active.
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("bearer token expired"),
                kind => tracing::debug!(?kind, "bearer token rejected"),
            }
            Err(ApiError::InvalidCredential)
        }
    }
}

/// resolve_identity
///
/// Maps a verified subject id to its persisted user. A missing record is `UnknownIdentity`
/// (a 401, never a 404); a storage failure is surfaced as `PersistenceFailure`.
pub async fn resolve_identity(repo: &dyn Repository, subject: Uuid) -> Result<User, ApiError> {
    match repo.get_user(subject).await? {
        Some(user) => Ok(user),
        None => {
            tracing::warn!(user_id = %subject, "verified token names no existing user");
            Err(ApiError::UnknownIdentity)
        }
    }
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Inserted into the request extensions
/// by the auth middleware so downstream handlers can read it back with `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub user: User,
}

/// AuthUser Extractor Implementation
///
/// Runs the three credential stages in order (header → token → user). Each stage stops the
/// request with its own `ApiError`, so the rejection is rendered by the central responder.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let token = extract_bearer(header_value)?;
        let claims = verify_token(token, &config.jwt_secret)?;
        let user = resolve_identity(repo.as_ref(), claims.sub).await?;

        Ok(AuthUser { id: user.id, user })
    }
}

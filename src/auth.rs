use actix_web::http::header::{self, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use uuid::Uuid;

use crate::error_code::ErrorCode;

#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Couldn't find bearer token")]
    MissingToken,

    #[error("Couldn't validate bearer token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Bearer token subject is not a valid user ID")]
    InvalidSubject(#[source] uuid::Error),
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MISSING_BEARER_TOKEN,
            Self::InvalidToken(_) | Self::InvalidSubject(_) => ErrorCode::INVALID_BEARER_TOKEN,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Resolve the caller's identity from the request's bearer credential.
///
/// Token issuance belongs to the surrounding deployment; this end only verifies the HS256
/// signature and reads the subject.
pub(crate) fn resolve_identity(headers: &HeaderMap, jwt_secret: &str) -> Result<Uuid, AuthError> {
    let token = bearer_token(headers)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(AuthError::InvalidToken)?;

    token_data
        .claims
        .sub
        .parse()
        .map_err(AuthError::InvalidSubject)
}

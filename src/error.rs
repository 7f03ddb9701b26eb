//! Error types shared by the auth layer, storage and the REST handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejections produced while authenticating a request.
///
/// Every variant is terminal for the request that produced it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid auth header")]
    MalformedRequest,
    #[error("unauthorized - no bearer")]
    UnauthorizedScheme,
    #[error("unauthorized")]
    InvalidCredentials,
    #[error("unauthorized - failed hmac check")]
    InvalidSignature,
    #[error("unauthorized - token expired")]
    Expired,
    #[error("unauthorized - token not yet valid")]
    NotYetValid,
    #[error("unauthorized - invalid audience")]
    AudienceMismatch,
    #[error("unauthorized - invalid issuer")]
    IssuerMismatch,
    #[error("unauthorized - invalid subject")]
    UnparsableSubject,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedRequest => StatusCode::BAD_REQUEST,
            AuthError::UnauthorizedScheme | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::NotYetValid
            | AuthError::AudienceMismatch
            | AuthError::IssuerMismatch
            | AuthError::UnparsableSubject => StatusCode::FORBIDDEN,
        }
    }
}

/// Startup configuration problems. Any of these stops the process before it serves traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("jwt signing secret must not be empty")]
    EmptySecret,
    #[error("jwt issuer must not be empty")]
    EmptyIssuer,
    #[error("jwt audience must not be empty")]
    EmptyAudience,
    #[error("token ttl must be greater than zero")]
    ZeroTtl,
    #[error("bcrypt cost {0} is outside the supported range 4..=31")]
    InvalidCost(u32),
    #[error("admin password hash could not be produced: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("configured admin password hash is not a usable bcrypt hash: {0}")]
    InvalidAdminHash(bcrypt::BcryptError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("movie {0} not found")]
    MovieNotFound(i64),
}

/// HTTP-facing error, rendered as `{"error": {"message": ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => err.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::Storage(StorageError::MovieNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Internal(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": { "message": self.to_string() } }));
        (status, body).into_response()
    }
}

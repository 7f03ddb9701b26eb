use axum::http::HeaderValue;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{AuthenticatedUser, Claims};

/// Checks bearer credentials against the shared secret and the configured claims.
///
/// The checks run in a fixed order and stop at the first failure:
/// header shape, scheme, signature, validity window, audience, issuer, subject.
#[derive(Clone)]
pub struct TokenValidator {
    config: Arc<AuthConfig>,
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        let key = DecodingKey::from_secret(config.secret());

        // jsonwebtoken only verifies the signature and decodes; the claim
        // checks below own the ordering and the rejection reasons.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            config,
            key,
            validation,
        }
    }

    /// Full chain for an `Authorization` header value at `now` (unix seconds).
    pub fn authorize(
        &self,
        header: Option<&HeaderValue>,
        now: i64,
    ) -> Result<AuthenticatedUser, AuthError> {
        let token = bearer_token(header)?;
        self.validate(token, now)
    }

    /// Everything after the header checks: signature, window, audience, issuer, subject.
    pub fn validate(&self, token: &str, now: i64) -> Result<AuthenticatedUser, AuthError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token failed hmac check");
                AuthError::InvalidSignature
            })?;

        if now < claims.nbf {
            return Err(AuthError::NotYetValid);
        }
        if now > claims.exp {
            return Err(AuthError::Expired);
        }
        if !claims.accepts_audience(self.config.audience()) {
            return Err(AuthError::AudienceMismatch);
        }
        if claims.iss != self.config.issuer() {
            return Err(AuthError::IssuerMismatch);
        }
        let user_id = claims
            .sub
            .parse::<u64>()
            .map_err(|_| AuthError::UnparsableSubject)?;

        Ok(AuthenticatedUser { user_id })
    }
}

/// Extract the token from `Bearer <token>`.
///
/// A missing header, a non-text value, or anything other than exactly two
/// whitespace-separated parts is malformed; a different scheme is unauthorized.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let value = header
        .ok_or(AuthError::MalformedRequest)?
        .to_str()
        .map_err(|_| AuthError::MalformedRequest)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        (Some(_), Some(_), None) => Err(AuthError::UnauthorizedScheme),
        _ => Err(AuthError::MalformedRequest),
    }
}

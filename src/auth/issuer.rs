use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::models::{Claims, Identity};

/// Mints HS256 tokens for authenticated identities.
#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<AuthConfig>,
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        let key = EncodingKey::from_secret(config.secret());
        Self { config, key }
    }

    /// Claims for `identity`, valid from `now` (unix seconds) for the configured TTL.
    pub fn claims_for(&self, identity: &Identity, now: i64) -> Claims {
        Claims {
            sub: identity.id.to_string(),
            iss: self.config.issuer().to_string(),
            aud: vec![self.config.audience().to_string()],
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.config.ttl_secs()),
        }
    }

    pub fn issue(&self, identity: &Identity, now: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = self.claims_for(identity, now);
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
    }
}

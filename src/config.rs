//! Process configuration: command line flags with environment fallbacks.
//!
//! `ServerArgs` is parsed once in `main`; the auth-relevant part is frozen
//! into an `AuthConfig` that is shared read-only by every request.

use clap::{Parser, ValueEnum};
use std::fmt;
use std::time::Duration;

use crate::auth::{check_hash, hash_password};
use crate::error::ConfigError;
use crate::models::Identity;

/// Password the reference admin account uses when no hash is configured.
const REFERENCE_ADMIN_PASSWORD: &str = "password";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Parser)]
#[command(name = "movies_api")]
#[command(about = "Movie catalog REST API", long_about = None, version)]
pub struct ServerArgs {
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Application environment (development|production)
    #[arg(long = "env", env = "APP_ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "DATA_DIR", default_value = "movies_data")]
    pub data_dir: String,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "JWT_ISSUER", default_value = "mydomain.com")]
    pub jwt_issuer: String,

    #[arg(long, env = "JWT_AUDIENCE", default_value = "mydomain.com")]
    pub jwt_audience: String,

    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = 24 * 60 * 60)]
    pub token_ttl_secs: u64,

    #[arg(long, env = "BCRYPT_COST", default_value_t = 12)]
    pub bcrypt_cost: u32,

    #[arg(long, env = "ADMIN_ID", default_value_t = 10)]
    pub admin_id: u64,

    #[arg(long, env = "ADMIN_EMAIL", default_value = "me@here.com")]
    pub admin_email: String,

    /// bcrypt hash of the admin password
    #[arg(long, env = "ADMIN_PASSWORD_HASH", hide_env_values = true)]
    pub admin_password_hash: Option<String>,

    #[arg(long, env = "THEMOVIEDB_API_KEY", hide_env_values = true)]
    pub themoviedb_api_key: Option<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        AuthConfig::new(
            &self.jwt_secret,
            &self.jwt_issuer,
            &self.jwt_audience,
            Duration::from_secs(self.token_ttl_secs),
        )
    }

    pub fn bcrypt_cost(&self) -> Result<u32, ConfigError> {
        validate_cost(self.bcrypt_cost)
    }

    /// The single admin account this deployment authenticates against.
    pub fn admin_identity(&self) -> Result<Identity, ConfigError> {
        let password_hash = match &self.admin_password_hash {
            Some(hash) if !hash.trim().is_empty() => {
                let hash = hash.trim();
                check_hash(hash).map_err(ConfigError::InvalidAdminHash)?;
                hash.to_string()
            }
            _ => {
                tracing::warn!(
                    email = %self.admin_email,
                    "ADMIN_PASSWORD_HASH not set, hashing the reference admin password"
                );
                hash_password(REFERENCE_ADMIN_PASSWORD, self.bcrypt_cost()?)?
            }
        };
        Ok(Identity {
            id: self.admin_id,
            email: self.admin_email.clone(),
            password_hash,
        })
    }
}

pub fn validate_cost(cost: u32) -> Result<u32, ConfigError> {
    if (4..=31).contains(&cost) {
        Ok(cost)
    } else {
        Err(ConfigError::InvalidCost(cost))
    }
}

/// Signing and validation parameters. Immutable once built.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl AuthConfig {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(
        secret: &str,
        issuer: &str,
        audience: &str,
        ttl: Duration,
    ) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if issuer.trim().is_empty() {
            return Err(ConfigError::EmptyIssuer);
        }
        if audience.trim().is_empty() {
            return Err(ConfigError::EmptyAudience);
        }
        if ttl.as_secs() == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        })
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish()
    }
}

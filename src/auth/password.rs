use bcrypt::{hash, verify, BcryptError, HashParts};

use crate::error::AuthError;

/// Hash a password with bcrypt; salt and cost are embedded in the output.
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

/// Cost factor embedded in a bcrypt hash.
pub fn hash_cost(hash: &str) -> Result<u32, BcryptError> {
    Ok(hash.parse::<HashParts>()?.get_cost())
}

/// Fails unless `hash` is a bcrypt hash that `verify_password` can check against.
pub fn check_hash(hash: &str) -> Result<(), BcryptError> {
    verify("", hash).map(|_| ())
}

/// Check a submitted password against a stored bcrypt hash.
///
/// Only an exact match is accepted. A stored hash bcrypt cannot parse is
/// reported as the same `InvalidCredentials` rejection as a wrong password.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    match verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash could not be checked");
            Err(AuthError::InvalidCredentials)
        }
    }
}

//! Authentication: password verification, token issuance and token validation.
//!
//! Sign-in goes `verify_password -> TokenIssuer::issue`; every protected request
//! goes through `TokenValidator::authorize`. Both token halves share one
//! immutable `AuthConfig`.

mod issuer;
mod password;
mod validator;

pub use issuer::TokenIssuer;
pub use password::{check_hash, hash_cost, hash_password, verify_password};
pub use validator::{bearer_token, TokenValidator};

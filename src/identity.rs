//! Identity lookup used by sign-in.
//!
//! The deployment authenticates against one configured account; a persistent
//! multi-user store only has to implement `IdentityStore`.

use crate::models::Identity;

pub trait IdentityStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<Identity>;
}

/// Store holding exactly one identity.
pub struct StaticIdentityStore {
    identity: Identity,
}

impl StaticIdentityStore {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

impl IdentityStore for StaticIdentityStore {
    fn find_by_email(&self, email: &str) -> Option<Identity> {
        self.identity
            .email
            .eq_ignore_ascii_case(email.trim())
            .then(|| self.identity.clone())
    }
}

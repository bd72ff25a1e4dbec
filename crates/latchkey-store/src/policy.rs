//! Pluggable credential validation.
//!
//! The store itself imposes no rules on usernames or passwords — input
//! policy belongs to the caller. A [`CredentialPolicy`] runs before every
//! registration, so front ends can enforce non-emptiness (or stricter
//! rules) without the store special-casing them.

use crate::error::{StoreError, StoreResult};

/// A validation strategy applied to credentials before registration.
///
/// Implementations must be `Send + Sync` so a store can be shared across
/// threads.
pub trait CredentialPolicy: Send + Sync {
    /// Accept the pair, or reject it with a human-readable reason
    /// ([`StoreError::Validation`]).
    fn validate(&self, username: &str, password: &str) -> StoreResult<()>;
}

/// The default policy: any text is acceptable, empty strings included.
pub struct AcceptAll;

impl CredentialPolicy for AcceptAll {
    fn validate(&self, _username: &str, _password: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// Rejects empty usernames and passwords.
pub struct RequireNonEmpty;

impl CredentialPolicy for RequireNonEmpty {
    fn validate(&self, username: &str, password: &str) -> StoreResult<()> {
        if username.is_empty() {
            return Err(StoreError::Validation(
                "username must not be empty".into(),
            ));
        }
        if password.is_empty() {
            return Err(StoreError::Validation(
                "password must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────

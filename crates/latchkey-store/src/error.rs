//! Error types for the latchkey-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// Registration attempted with a username that is already taken.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// The configured credential policy rejected the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A stored credential could not be decoded or re-hashed.
    #[error("credential error: {0}")]
    Credential(String),

    /// The connection lock was poisoned by a panicking holder.
    #[error("connection lock poisoned: {0}")]
    Lock(String),
}

//! # latchkey-store
//!
//! Credential storage for latchkey.
//!
//! Provides a SQLite-backed registry of username/password pairs: register
//! a user, ask whether a username is taken, and check a login attempt.
//! Passwords are stored as salted PBKDF2 hashes, never as plaintext.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  CredentialStore (register/auth/exists)  │
//! │  CredentialPolicy (caller-supplied)      │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite, WAL)                │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use latchkey_store::{CredentialStore, Database};
//!
//! let db = Database::open_and_migrate("data/latchkey.db")?;
//! let store = CredentialStore::new(db.clone());
//!
//! store.register("alice", "secret")?;
//! assert!(store.authenticate("alice", "secret")?);
//!
//! db.close()?;
//! ```

pub mod credential_store;
pub mod db;
pub mod error;
pub mod migration;
pub mod policy;

// ── re-exports ───────────────────────────────────────────────────────

pub use credential_store::{CredentialStore, UserRecord};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use policy::{AcceptAll, CredentialPolicy, RequireNonEmpty};

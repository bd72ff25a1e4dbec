//! Credential persistence for latchkey.
//!
//! Provides the SQLite-backed registry of username/password pairs with
//! password hashing via PBKDF2-HMAC-SHA256 (ring). Passwords are stored
//! as `base64(salt):base64(hash)` strings, using 600,000 iterations per
//! OWASP 2023 recommendations — the plaintext never reaches disk.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::policy::{AcceptAll, CredentialPolicy};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A registered user.
///
/// The password hash stays inside the store; this type carries only what
/// callers may display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Surrogate key assigned by the store at creation time. Never reused.
    pub id: i64,
    /// Unique login name (case-sensitive).
    pub username: String,
}

// ═══════════════════════════════════════════════════════════════════════
//  Password hashing
// ═══════════════════════════════════════════════════════════════════════

/// PBKDF2-HMAC-SHA256 with 600,000 iterations (OWASP 2023).
const PBKDF2_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// PBKDF2 algorithm.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hash a password into a storable `base64(salt):base64(hash)` string.
fn hash_password(password: &str) -> StoreResult<String> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| StoreError::Credential("failed to generate random salt".into()))?;

    let mut hash = [0u8; KEY_LEN];
    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");
    pbkdf2::derive(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!("{}:{}", BASE64.encode(salt), BASE64.encode(hash)))
}

/// Verify a password against a stored hash string.
///
/// `ring::pbkdf2::verify` compares in constant time.
fn verify_password(password: &str, stored: &str) -> StoreResult<bool> {
    let Some((salt_b64, hash_b64)) = stored.split_once(':') else {
        return Err(StoreError::Credential("malformed password hash".into()));
    };

    let salt = BASE64
        .decode(salt_b64)
        .map_err(|e| StoreError::Credential(format!("invalid salt encoding: {e}")))?;
    let expected_hash = BASE64
        .decode(hash_b64)
        .map_err(|e| StoreError::Credential(format!("invalid hash encoding: {e}")))?;

    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");

    Ok(pbkdf2::verify(
        PBKDF2_ALG,
        iterations,
        &salt,
        password.as_bytes(),
        &expected_hash,
    )
    .is_ok())
}

// ═══════════════════════════════════════════════════════════════════════
//  CredentialStore
// ═══════════════════════════════════════════════════════════════════════

/// Durable, uniqueness-enforcing registry of username/password pairs, and
/// a matcher for login attempts.
pub struct CredentialStore {
    db: Database,
    policy: Box<dyn CredentialPolicy>,
}

impl CredentialStore {
    /// Create a store backed by `db`, with the permissive default policy.
    pub fn new(db: Database) -> Self {
        Self::with_policy(db, Box::new(AcceptAll))
    }

    /// Create a store that runs `policy` before every registration.
    pub fn with_policy(db: Database, policy: Box<dyn CredentialPolicy>) -> Self {
        Self { db, policy }
    }

    /// Register a new user.
    ///
    /// The password is hashed before storage. Insertion is a single atomic
    /// statement: the UNIQUE constraint on `username` is the uniqueness
    /// check, so two racing registrations cannot both commit.
    #[instrument(skip(self, password))]
    pub fn register(&self, username: &str, password: &str) -> StoreResult<UserRecord> {
        self.policy.validate(username, password)?;

        let password_hash = hash_password(password)?;

        let record = self.db.execute(|conn| {
            conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                rusqlite::params![username, password_hash],
            )
            .map_err(|e| {
                if let rusqlite::Error::SqliteFailure(ref err, _) = e
                    && err.code == rusqlite::ErrorCode::ConstraintViolation
                {
                    return StoreError::DuplicateUsername(username.to_string());
                }
                StoreError::Sqlite(e)
            })?;

            Ok(UserRecord {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
            })
        })?;

        debug!(user_id = record.id, username = %record.username, "user registered");
        Ok(record)
    }

    /// Whether any record has exactly this username.
    ///
    /// Pure lookup, no side effects. Empty text is a legal key.
    #[instrument(skip(self))]
    pub fn exists(&self, username: &str) -> StoreResult<bool> {
        self.db.execute(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                rusqlite::params![username],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Check a login attempt.
    ///
    /// Returns `Ok(true)` iff a record matches the username exactly and
    /// the password verifies against its stored hash. Unknown user and
    /// wrong password both return `Ok(false)` — callers cannot tell which
    /// half failed.
    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<bool> {
        let stored = self.db.execute(|conn| {
            let result = conn.query_row(
                "SELECT password FROM users WHERE username = ?1",
                rusqlite::params![username],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(hash) => Ok(Some(hash)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(StoreError::Sqlite(e)),
            }
        })?;

        match stored {
            Some(hash) => verify_password(password, &hash),
            None => Ok(false),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RequireNonEmpty;

    fn setup_store() -> CredentialStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        CredentialStore::new(db)
    }

    #[test]
    fn register_then_exists_then_authenticate() {
        let store = setup_store();

        assert!(!store.exists("alice").unwrap());

        let record = store.register("alice", "secret").unwrap();
        assert!(record.id >= 1);
        assert_eq!(record.username, "alice");

        assert!(store.exists("alice").unwrap());
        assert!(store.authenticate("alice", "secret").unwrap());
        assert!(!store.authenticate("alice", "wrong").unwrap());
    }

    #[test]
    fn duplicate_username_rejected_and_store_unchanged() {
        let store = setup_store();

        store.register("bob", "pw1").unwrap();

        let result = store.register("bob", "pw2");
        match result.unwrap_err() {
            StoreError::DuplicateUsername(name) => assert_eq!(name, "bob"),
            other => panic!("expected DuplicateUsername, got: {other}"),
        }

        // The original record is untouched.
        assert!(store.authenticate("bob", "pw1").unwrap());
        assert!(!store.authenticate("bob", "pw2").unwrap());
    }

    #[test]
    fn unknown_user_fails_closed() {
        let store = setup_store();

        assert!(!store.exists("ghost").unwrap());
        assert!(!store.authenticate("ghost", "anything").unwrap());
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let store = setup_store();

        store.register("Carol", "pw").unwrap();

        assert!(store.exists("Carol").unwrap());
        assert!(!store.exists("carol").unwrap());
        assert!(!store.authenticate("carol", "pw").unwrap());
    }

    #[test]
    fn empty_lookup_key_is_legal() {
        let store = setup_store();
        assert!(!store.exists("").unwrap());
        assert!(!store.authenticate("", "").unwrap());
    }

    #[test]
    fn default_policy_accepts_empty_strings() {
        // Input rules belong to the caller; the bare store takes anything.
        let store = setup_store();

        store.register("", "").unwrap();
        assert!(store.exists("").unwrap());
        assert!(store.authenticate("", "").unwrap());
    }

    #[test]
    fn non_empty_policy_rejects_empty_input() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        let store = CredentialStore::with_policy(db, Box::new(RequireNonEmpty));

        let result = store.register("", "secret");
        match result.unwrap_err() {
            StoreError::Validation(reason) => {
                assert!(reason.contains("username"), "got: {reason}");
            }
            other => panic!("expected Validation, got: {other}"),
        }

        // Nothing was written.
        assert!(!store.exists("").unwrap());
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let store = setup_store();

        let first = store.register("user1", "pw").unwrap();
        let second = store.register("user2", "pw").unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn plaintext_never_reaches_disk() {
        let store = setup_store();
        store.register("dave", "hunter2").unwrap();

        let stored: String = store
            .db
            .execute(|conn| {
                let v: String = conn.query_row(
                    "SELECT password FROM users WHERE username = 'dave'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(v)
            })
            .unwrap();

        assert!(!stored.contains("hunter2"));
        assert!(stored.contains(':'), "expected salt:hash encoding");
    }

    #[test]
    fn password_hash_is_different_for_same_password() {
        // Each hash carries a fresh random salt.
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2, "hashes should differ due to random salt");

        // But both verify correctly.
        assert!(verify_password("same-password", &hash1).unwrap());
        assert!(verify_password("same-password", &hash2).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error_not_a_failed_login() {
        let store = setup_store();
        store
            .db
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO users (username, password) VALUES ('broken', 'no-colon-here')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let result = store.authenticate("broken", "whatever");
        match result.unwrap_err() {
            StoreError::Credential(reason) => {
                assert!(reason.contains("malformed"), "got: {reason}");
            }
            other => panic!("expected Credential, got: {other}"),
        }
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latchkey.db");

        {
            let db = Database::open_and_migrate(&path).unwrap();
            let store = CredentialStore::new(db.clone());
            store.register("erin", "durable-pw").unwrap();
            drop(store);
            db.close().unwrap();
        }

        let db = Database::open_and_migrate(&path).unwrap();
        let store = CredentialStore::new(db);
        assert!(store.exists("erin").unwrap());
        assert!(store.authenticate("erin", "durable-pw").unwrap());
        assert!(!store.authenticate("erin", "wrong").unwrap());
    }
}

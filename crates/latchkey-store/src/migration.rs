//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! Applied versions are tracked in a `_migrations` table so migrations
//! are idempotent and only run once.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
///
/// The `users` table keeps AUTOINCREMENT so row ids are never reused,
/// even after the highest row is deleted out-of-band.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema — users table",
    sql: r#"
        CREATE TABLE users (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL
        );
    "#,
}];

/// Run all pending migrations against `conn`.
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

/// Create the `_migrations` bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    let tx = conn.transaction().map_err(|e| StoreError::Migration {
        version: migration.version,
        message: format!("failed to begin transaction: {e}"),
    })?;

    tx.execute_batch(migration.sql)
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("SQL execution failed: {e}"),
        })?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![migration.version, migration.description, now],
    )
    .map_err(|e| StoreError::Migration {
        version: migration.version,
        message: format!("failed to record migration: {e}"),
    })?;

    tx.commit().map_err(|e| StoreError::Migration {
        version: migration.version,
        message: format!("failed to commit: {e}"),
    })
}

// ── tests ────────────────────────────────────────────────────────────

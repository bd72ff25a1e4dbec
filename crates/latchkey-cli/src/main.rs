//! CLI entry point for latchkey.
//!
//! This binary provides the `latchkey` command with subcommands for
//! registering a user, logging in, and checking whether a username is
//! taken. It is a thin front end: all credential logic lives in
//! `latchkey-store`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use latchkey_store::{CredentialStore, Database, RequireNonEmpty, StoreError};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// latchkey — local username/password registration and login.
#[derive(Parser)]
#[command(
    name = "latchkey",
    version,
    about = "latchkey — local username/password registration and login",
    long_about = "A single-machine authentication utility: register a username and \
                  password, then log in with the same pair to reach the welcome screen."
)]
struct Cli {
    /// Path to the credential database (default: data/latchkey.db,
    /// or the LATCHKEY_DB environment variable).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user.
    Register {
        /// Username to register; prompted for if omitted.
        username: Option<String>,
    },

    /// Log in with an existing user.
    Login {
        /// Username to log in as; prompted for if omitted.
        username: Option<String>,
    },

    /// Check whether a username is taken.
    Exists {
        /// Username to look up.
        username: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("warn");

    let db_path = cli
        .db
        .or_else(|| std::env::var("LATCHKEY_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data/latchkey.db"));

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let db = Database::open_and_migrate(&db_path).context("failed to open database")?;
    info!(path = %db_path.display(), "store initialized");

    let result = match cli.command {
        Commands::Register { username } => cmd_register(&db, username),
        Commands::Login { username } => cmd_login(&db, username),
        Commands::Exists { username } => cmd_exists(&db, &username),
    };

    // Release the store on every exit path, surfacing close-time errors.
    db.close().context("failed to close database")?;
    result
}

// ---------------------------------------------------------------------------
// Subcommand: register
// ---------------------------------------------------------------------------

fn cmd_register(db: &Database, username: Option<String>) -> Result<()> {
    // Input validation is this layer's job; the store stays permissive.
    let store = CredentialStore::with_policy(db.clone(), Box::new(RequireNonEmpty));

    let username = match username {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    let password = prompt("Password: ")?;

    let record = match store.register(&username, &password) {
        Ok(record) => record,
        Err(e @ (StoreError::DuplicateUsername(_) | StoreError::Validation(_))) => bail!("{e}"),
        Err(e) => return Err(e).context("registration failed"),
    };

    println!();
    println!("  User '{}' registered successfully.", record.username);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: login
// ---------------------------------------------------------------------------

fn cmd_login(db: &Database, username: Option<String>) -> Result<()> {
    let store = CredentialStore::new(db.clone());

    let username = match username {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    let password = prompt("Password: ")?;

    if store
        .authenticate(&username, &password)
        .context("login failed")?
    {
        info!(%username, "login succeeded");
        println!();
        println!("  Welcome, {username}!");
        println!();
        Ok(())
    } else {
        // One generic message, whichever half was wrong.
        bail!("invalid username or password");
    }
}

// ---------------------------------------------------------------------------
// Subcommand: exists
// ---------------------------------------------------------------------------

fn cmd_exists(db: &Database, username: &str) -> Result<()> {
    let store = CredentialStore::new(db.clone());

    if store.exists(username).context("lookup failed")? {
        println!("  Username '{username}' is taken.");
    } else {
        println!("  Username '{username}' is available.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read one line from stdin after printing `label`.
///
/// Only the trailing newline is stripped; the rest of the input is passed
/// through verbatim.
fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

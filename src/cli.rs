//! CLI argument parsing, validation, and startup helpers.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::ServerConfig;
use crate::auth::hash_password;
use crate::db::Database;
use crate::seed::{apply_seed, parse_seed};
use crate::storage::FileStoreConfig;

const MIN_INVITE_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "frontdesk",
    about = "Partner portal access, impersonation, and attachment service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "frontdesk.db")]
    pub database: String,

    /// Public origin used in invite claim links (full URL, e.g., "http://localhost:7291")
    #[arg(long, default_value = "http://localhost:7291")]
    pub origin: String,

    /// Redirect target after impersonation transitions
    #[arg(long, default_value = "/web")]
    pub web_root: String,

    /// Path to file containing the invite signing secret. Prefer using INVITE_SECRET env var instead
    #[arg(long)]
    pub invite_secret_file: Option<String>,

    /// Create an admin user on startup and print its one-time password
    #[arg(long)]
    pub create_admin: bool,

    /// Directory holding attachment file content
    #[arg(long, default_value = "filestore")]
    pub filestore: PathBuf,

    /// Serve empty content for attachments whose file is missing from disk
    #[arg(long)]
    pub suppress_missing_files: bool,

    /// Log full filestore paths instead of truncated ones
    #[arg(long)]
    pub show_full_paths: bool,

    /// Path to an XML seed file to import on startup
    #[arg(long)]
    pub seed: Option<String>,

    /// Seed record id to exclude from the import (repeatable)
    #[arg(long = "skip-import-id")]
    pub skip_import_ids: Vec<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the invite secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_invite_secret(invite_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("INVITE_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("INVITE_SECRET") };
        secret
    } else if let Some(path) = invite_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read invite secret file");
                return None;
            }
        }
    } else {
        error!(
            "Invite secret is required. Set INVITE_SECRET environment variable (recommended) or use --invite-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_INVITE_SECRET_LENGTH {
        error!(
            "Invite secret is shorter than {} characters. Use a longer secret",
            MIN_INVITE_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_origin(origin: &str) -> Option<Url> {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Handle the --create-admin flag: create an admin with a one-time password,
/// or do nothing if an active admin already exists.
pub async fn handle_create_admin(db: &Database) {
    match db.users().has_admin().await {
        Ok(true) => {
            info!("An active admin already exists, skipping --create-admin");
        }
        Ok(false) => {
            let password = Uuid::new_v4().simple().to_string();
            let hash = match hash_password(&password) {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };

            match db.users().create_admin("admin", &hash).await {
                Ok(_) => {
                    println!();
                    println!("Admin user created: admin");
                    println!("One-time password: {}", password);
                    println!("Change it after first login.");
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Import a seed file, filtering the ids named by --skip-import-id.
/// Exits on unreadable or malformed input; per-record failures only warn.
pub async fn handle_seed(db: &Database, path: &str, skip_ids: &[String]) {
    let xml = match std::fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read seed file");
            std::process::exit(1);
        }
    };

    let records = match parse_seed(&xml) {
        Ok(records) => records,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to parse seed file");
            std::process::exit(1);
        }
    };

    let blocked: HashSet<String> = skip_ids.iter().cloned().collect();

    match apply_seed(db, &records, &blocked).await {
        Ok(summary) => {
            info!(
                applied = summary.applied,
                skipped = summary.skipped,
                failed = summary.failed,
                "Seed import finished"
            );
            if summary.failed > 0 {
                warn!("Some seed records were not applied; see warnings above");
            }
        }
        Err(e) => {
            error!(error = %e, "Seed import aborted");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, origin: Url, invite_secret: String) -> ServerConfig {
    let secure_cookies = origin.scheme() == "https";

    ServerConfig {
        db,
        invite_secret: invite_secret.into_bytes(),
        origin: origin.as_str().trim_end_matches('/').to_string(),
        web_root: args.web_root.clone(),
        secure_cookies,
        filestore_root: args.filestore.clone(),
        filestore: FileStoreConfig {
            suppress_missing: args.suppress_missing_files,
            show_full_path: args.show_full_paths,
        },
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

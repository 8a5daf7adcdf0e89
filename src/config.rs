use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime settings, read once at startup from the environment (a `.env`
/// file is merged in by `main` before this runs). Everything except the
/// database URL has a default so a bare checkout can boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Directory where per-locale markdown artifacts are written.
    pub upload_dir: PathBuf,
    /// Recipient of moderation alerts and contact-form messages.
    pub admin_email: String,
    /// Sender address stamped on every outgoing message.
    pub mail_from: String,
    /// HTTP mail API endpoint; when unset, mail is logged and dropped.
    pub mail_api_url: Option<String>,
    /// Keyword index base URL; when unset, search returns no hits.
    pub search_url: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        Ok(Config {
            database_url,
            bind_address: var_or("BIND_ADDRESS", "127.0.0.1:3001"),
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "./uploads")),
            admin_email: var_or("ADMIN_EMAIL", "admin@localhost"),
            mail_from: var_or("MAIL_FROM", "blog@localhost"),
            mail_api_url: env::var("MAIL_API_URL").ok(),
            search_url: env::var("SEARCH_URL").ok(),
        })
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Server settings, read from `LOUNGE_*` environment variables (a `.env`
/// file is loaded first if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = get("LOUNGE_PORT", "3000");
        let port = port
            .parse()
            .with_context(|| format!("LOUNGE_PORT must be a port number, got '{}'", port))?;

        let ttl = get("LOUNGE_SESSION_TTL_HOURS", "336");
        let session_ttl_hours: i64 = ttl
            .parse()
            .with_context(|| format!("LOUNGE_SESSION_TTL_HOURS must be an integer, got '{}'", ttl))?;
        if session_ttl_hours <= 0 {
            anyhow::bail!("LOUNGE_SESSION_TTL_HOURS must be positive, got {}", session_ttl_hours);
        }

        let secure = get("LOUNGE_COOKIE_SECURE", "false");
        let cookie_secure = match secure.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => anyhow::bail!("LOUNGE_COOKIE_SECURE must be a boolean, got '{}'", other),
        };

        Ok(Self {
            db_path: PathBuf::from(get("LOUNGE_DB_PATH", "lounge.db")),
            host: get("LOUNGE_HOST", "0.0.0.0"),
            port,
            session_ttl_hours,
            cookie_secure,
        })
    }
}

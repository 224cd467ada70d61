use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub store_timeout: Duration,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("PORT must be a port number")?;
        let db_path = get("PARLOR_DB_PATH")
            .unwrap_or_else(|| "parlor.db".into())
            .into();
        let timeout_ms: u64 = get("PARLOR_STORE_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("PARLOR_STORE_TIMEOUT_MS must be a number of milliseconds")?;
        let secure_cookies = match get("PARLOR_SECURE_COOKIES").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => anyhow::bail!("PARLOR_SECURE_COOKIES must be true or false, got '{}'", other),
        };

        Ok(Self {
            host,
            port,
            db_path,
            store_timeout: Duration::from_millis(timeout_ms),
            secure_cookies,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

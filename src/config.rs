use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://chat.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8084";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 16;
pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub allow_origins: Vec<String>,
    pub push_timeout: Duration,
}

impl Config {
    /// Reads the process environment, with `.env` loaded first when present.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(err) = dotenv::dotenv() {
            warn!(%err, "no .env loaded, using the process environment");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_addr
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR: {bind_addr:?} is not a socket address"))?;

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("DB_MAX_CONNECTIONS: {raw:?} is not a positive integer"))?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let push_timeout_ms = match var("PUSH_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PUSH_TIMEOUT_MS: {raw:?} is not a number of milliseconds"))?,
            None => DEFAULT_PUSH_TIMEOUT_MS,
        };

        let allow_origins = var("ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Config {
            database_url,
            bind_addr,
            db_max_connections,
            allow_origins,
            push_timeout: Duration::from_millis(push_timeout_ms),
        })
    }
}

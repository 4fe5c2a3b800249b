use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use parley_gateway::DeliveryMode;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Allowed `Origin` for gateway upgrades. `*` accepts any origin.
    pub cors_origin: String,
    pub delivery: DeliveryMode,
    /// When set, gateway connections must present a token signed with it.
    pub jwt_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = match var("PARLEY_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid port '{}'", raw))?,
            None => 5001,
        };
        let db_path: PathBuf = var("PARLEY_DB_PATH")
            .unwrap_or_else(|| "parley.db".into())
            .into();
        let cors_origin = var("PARLEY_CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into());
        let delivery = match var("PARLEY_DELIVERY") {
            Some(raw) => raw.parse()?,
            None => DeliveryMode::default(),
        };

        let jwt_secret = var("PARLEY_JWT_SECRET");
        if let Some(secret) = &jwt_secret {
            if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                bail!("PARLEY_JWT_SECRET is still a placeholder value");
            }
        }

        Ok(Self {
            host,
            port,
            db_path,
            cors_origin,
            delivery,
            jwt_secret,
        })
    }

    /// Resolve `host` (IP literal, bare IPv6 or hostname) and `port` to a bind address.
    pub async fn bind_addr(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("cannot resolve bind host '{}'", self.host))?
            .next()
            .with_context(|| format!("bind host '{}' resolved to no address", self.host))
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub refresh_secret: String,
    /// Exact CORS origin; any origin is allowed when unset.
    pub origin_url: Option<String>,
    pub cookie_secure: bool,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = get("FABLE_HOST", "0.0.0.0");
        let port: u16 = get("FABLE_PORT", "3000")
            .parse()
            .context("FABLE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let jwt_secret = required_secret(&lookup, "FABLE_JWT_SECRET")?;
        let refresh_secret = required_secret(&lookup, "FABLE_REFRESH_SECRET")?;
        if jwt_secret == refresh_secret {
            bail!("FABLE_JWT_SECRET and FABLE_REFRESH_SECRET must differ");
        }

        Ok(Self {
            addr,
            db_path: get("FABLE_DB_PATH", "fable.db").into(),
            jwt_secret,
            refresh_secret,
            origin_url: lookup("FABLE_ORIGIN_URL").filter(|v| !v.is_empty()),
            cookie_secure: flag(&lookup, "FABLE_COOKIE_SECURE", true)?,
            seed_demo: flag(&lookup, "FABLE_SEED_DEMO", false)?,
        })
    }
}

fn required_secret<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup(key).unwrap_or_default();
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
        bail!("{} is unset or still a placeholder", key);
    }
    Ok(secret)
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{} must be a boolean, got {:?}", key, other),
    }
}

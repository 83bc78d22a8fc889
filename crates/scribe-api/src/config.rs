use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

use scribe_crypto::HashCost;

/// Placeholder JWT secrets that MUST NOT be used in production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

/// Longest session a token may be issued for (one year).
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub hash_cost: HashCost,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Drives the cookie `Secure` flag.
    pub production: bool,
    /// Origin allowed to send credentialed requests. `None` means permissive CORS.
    pub frontend_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = lookup("SCRIBE_ENV").is_some_and(|env| env == "production");

        let jwt_secret = match lookup("SCRIBE_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret.as_str()) => secret,
            _ if production => {
                bail!("SCRIBE_JWT_SECRET is unset or still a placeholder; refusing to start in production")
            }
            _ => {
                warn!("SCRIBE_JWT_SECRET not set, using the development placeholder");
                DEV_SECRET.to_string()
            }
        };

        let ttl_secs: i64 = parse_or(&lookup, "SCRIBE_TOKEN_TTL_SECS", 3600)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            bail!(
                "SCRIBE_TOKEN_TTL_SECS must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_SECS,
                ttl_secs
            );
        }

        let defaults = HashCost::default();

        Ok(Self {
            host: lookup("SCRIBE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "SCRIBE_PORT", 4000)?,
            db_path: lookup("SCRIBE_DB_PATH").unwrap_or_else(|| "scribe.db".into()).into(),
            jwt_secret,
            token_ttl: chrono::Duration::seconds(ttl_secs),
            hash_cost: HashCost {
                memory_kib: parse_or(&lookup, "SCRIBE_HASH_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse_or(&lookup, "SCRIBE_HASH_ITERATIONS", defaults.iterations)?,
                parallelism: parse_or(&lookup, "SCRIBE_HASH_PARALLELISM", defaults.parallelism)?,
            },
            upload_dir: lookup("SCRIBE_UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            max_upload_bytes: parse_or(&lookup, "SCRIBE_MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            production,
            frontend_url: lookup("SCRIBE_FRONTEND_URL").filter(|s| !s.is_empty()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

use nbbang_notify::NotifyConfig;

/// Where pushes go. Without an endpoint they are only logged.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: Option<Url>,
    pub server_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub push: PushConfig,
    pub notify: NotifyConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults = NotifyConfig::default();

        let endpoint = match lookup("NBBANG_PUSH_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(raw.parse::<Url>().with_context(|| format!("NBBANG_PUSH_ENDPOINT is not a URL: {}", raw))?),
            None => None,
        };
        let server_key = lookup("NBBANG_PUSH_SERVER_KEY").unwrap_or_default();
        if endpoint.is_some() && server_key.is_empty() {
            anyhow::bail!("NBBANG_PUSH_SERVER_KEY must be set when NBBANG_PUSH_ENDPOINT is");
        }

        Ok(Self {
            host: get("NBBANG_HOST", "0.0.0.0"),
            port: parse(&lookup, "NBBANG_PORT", 3000)?,
            db_path: get("NBBANG_DB_PATH", "nbbang.db").into(),
            push: PushConfig {
                endpoint,
                server_key,
                timeout: Duration::from_secs(parse(&lookup, "NBBANG_PUSH_TIMEOUT_SECS", 10)?),
            },
            notify: NotifyConfig {
                max_concurrency: parse(&lookup, "NBBANG_NOTIFY_CONCURRENCY", defaults.max_concurrency)?.max(1),
                deadline: Duration::from_secs(parse(
                    &lookup,
                    "NBBANG_NOTIFY_DEADLINE_SECS",
                    defaults.deadline.as_secs(),
                )?),
                excerpt_chars: parse(&lookup, "NBBANG_NOTIFY_EXCERPT_CHARS", defaults.excerpt_chars)?,
            },
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use url::Url;

use crate::error::ProxyError;
use crate::transport::{DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT};

/// Runtime configuration, loaded from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    /// Fixed WordPress origin. When `None` it is derived from each request's host.
    pub upstream_base: Option<String>,
    /// Path of the WordPress install below the host, e.g. `/blog`.
    pub site_base_path: String,
    /// Scheme used for derived origins when no `X-Forwarded-Proto` is sent.
    pub default_scheme: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Skip upstream certificate verification.
    pub insecure_tls: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            upstream_base: None,
            site_base_path: String::new(),
            default_scheme: "http".to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            insecure_tls: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        let defaults = Config::default();

        let timeout_seconds = match env::var("PROXY_TIMEOUT_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PROXY_TIMEOUT_SECONDS is not a number: {raw}"))?,
            Err(_) => defaults.timeout_seconds,
        };

        Ok(Config {
            bind_addr: get_env_or_default("PROXY_BIND_ADDR", &defaults.bind_addr),
            upstream_base: env::var("PROXY_UPSTREAM_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            site_base_path: get_env_or_default("PROXY_SITE_BASE_PATH", &defaults.site_base_path),
            default_scheme: get_env_or_default("PROXY_DEFAULT_SCHEME", &defaults.default_scheme),
            timeout_seconds,
            user_agent: get_env_or_default("PROXY_USER_AGENT", &defaults.user_agent),
            insecure_tls: env::var("PROXY_INSECURE_TLS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.insecure_tls),
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ProxyError> {
        if self.timeout_seconds == 0 {
            return Err(ProxyError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ProxyError::Config("user_agent must not be empty".into()));
        }
        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(ProxyError::Config(format!(
                "default_scheme must be http or https, got {}",
                self.default_scheme
            )));
        }
        if let Some(base) = &self.upstream_base {
            let url = Url::parse(base)
                .map_err(|e| ProxyError::Config(format!("invalid upstream_base {base}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ProxyError::Config(format!(
                    "upstream_base must be an http(s) URL, got {base}"
                )));
            }
        }
        Ok(())
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

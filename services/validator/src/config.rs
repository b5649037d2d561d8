use std::time::Duration;

use attest::ValidatorKey;
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required env var: {0}")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub content_gateway_url: String,
    pub content_upload_url: String,
    pub content_api_key: String,
    pub ledger_url: String,
    pub ledger_hmac_secret: Option<String>,
    pub signing_key_hex: String,

    pub bind_addr: String,
    pub max_concurrent_runs: usize,
    pub run_retention: Duration,
    pub collaborator_timeout: Duration,
    pub retry: RetryPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let opt = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let content_gateway_url = url(get("CONTENT_GATEWAY_URL")?, "CONTENT_GATEWAY_URL")?;
        let content_upload_url = url(get("CONTENT_UPLOAD_URL")?, "CONTENT_UPLOAD_URL")?;
        let content_api_key = get("CONTENT_API_KEY")?;
        let ledger_url = url(get("LEDGER_URL")?, "LEDGER_URL")?;
        let signing_key_hex = get("VALIDATOR_SIGNING_KEY")?;

        // fail fast on a key that cannot sign
        ValidatorKey::from_seed_hex(&signing_key_hex).map_err(|e| ConfigError::Invalid {
            key: "VALIDATOR_SIGNING_KEY",
            reason: e.to_string(),
        })?;

        let ledger_hmac_secret = opt("LEDGER_HMAC_SECRET");
        let bind_addr = opt("VALIDATOR_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let max_concurrent_runs = number(opt("MAX_CONCURRENT_RUNS"), "MAX_CONCURRENT_RUNS", 4)? as usize;
        let retention_secs = number(opt("RUN_RETENTION_SECS"), "RUN_RETENTION_SECS", 3600)?;
        let timeout_secs = number(opt("COLLABORATOR_TIMEOUT_SECS"), "COLLABORATOR_TIMEOUT_SECS", 30)?;
        let max_attempts = number(opt("RETRY_MAX_ATTEMPTS"), "RETRY_MAX_ATTEMPTS", 3)? as u32;
        let base_delay_ms = number(opt("RETRY_BASE_DELAY_MS"), "RETRY_BASE_DELAY_MS", 500)?;

        Ok(Self {
            content_gateway_url,
            content_upload_url,
            content_api_key,
            ledger_url,
            ledger_hmac_secret,
            signing_key_hex,
            bind_addr,
            max_concurrent_runs,
            run_retention: Duration::from_secs(retention_secs),
            collaborator_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(base_delay_ms),
                ..RetryPolicy::default()
            },
        })
    }
}

fn url(value: String, key: &'static str) -> Result<String, ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Invalid {
            key,
            reason: "must start with http:// or https://".into(),
        });
    }
    Ok(value)
}

/// Positive integer, or `default` when unset.
fn number(value: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(v) = value else { return Ok(default) };
    match v.parse::<u64>() {
        Ok(n) if n > 0 && n <= u32::MAX as u64 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a positive integer, got {v:?}"),
        }),
    }
}

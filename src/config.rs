use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::processors::CompensationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub account_service_url: String,
    pub account_service_timeout_secs: u64,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_reset_secs: u64,
    /// Absent means transactions and dead letters are kept in memory.
    pub database_url: Option<String>,
    /// Absent means idempotency keys are kept in memory.
    pub redis_url: Option<String>,
    pub compensation_max_attempts: u32,
    pub compensation_backoff_ms: u64,
    pub conflict_retry_limit: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Config {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            account_service_url: optional("ACCOUNT_SERVICE_URL")
                .context("ACCOUNT_SERVICE_URL must be set")?,
            account_service_timeout_secs: parse_or(&lookup, "ACCOUNT_SERVICE_TIMEOUT_SECS", 10)?,
            circuit_breaker_failure_threshold: parse_or(
                &lookup,
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                5,
            )?,
            circuit_breaker_reset_secs: parse_or(&lookup, "CIRCUIT_BREAKER_RESET_SECS", 30)?,
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            compensation_max_attempts: parse_or(&lookup, "COMPENSATION_MAX_ATTEMPTS", 3)?,
            compensation_backoff_ms: parse_or(&lookup, "COMPENSATION_BACKOFF_MS", 200)?,
            conflict_retry_limit: parse_or(&lookup, "CONFLICT_RETRY_LIMIT", 0)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    pub fn account_service_timeout(&self) -> Duration {
        Duration::from_secs(self.account_service_timeout_secs)
    }

    pub fn compensation_policy(&self) -> CompensationPolicy {
        CompensationPolicy {
            max_attempts: self.compensation_max_attempts,
            backoff: Duration::from_millis(self.compensation_backoff_ms),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value for {name}: '{raw}'")),
        _ => Ok(default),
    }
}

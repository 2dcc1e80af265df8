//! Environment-driven tuning for retries, caching and stage scheduling

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{SharedError, SharedResult};

/// Numeric knobs shared by the resilience and orchestration layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub cache_ttl_secs: u64,
    pub cache_max_size: usize,
    /// Percentage of a bucket that must be resolved before the bucket counts as complete
    pub stage_threshold: f64,
    pub defer_delay_ms: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            cache_ttl_secs: 300,
            cache_max_size: 100,
            stage_threshold: 80.0,
            defer_delay_ms: 50,
        }
    }
}

impl ResilienceSettings {
    /// Load settings from the environment (after an optional `.env` file).
    ///
    /// Environment variables:
    /// - RESILIENCE_MAX_ATTEMPTS, RESILIENCE_BASE_DELAY_MS, RESILIENCE_MAX_DELAY_MS,
    ///   RESILIENCE_BACKOFF_FACTOR
    /// - RESILIENCE_CACHE_TTL_SECS, RESILIENCE_CACHE_MAX_SIZE
    /// - ORCHESTRATOR_STAGE_THRESHOLD, ORCHESTRATOR_DEFER_DELAY_MS
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> SharedResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(SharedError::EnvFileError { message: e.to_string() });
            }
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            max_attempts: parse_var(&lookup, "RESILIENCE_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay_ms: parse_var(&lookup, "RESILIENCE_BASE_DELAY_MS", defaults.base_delay_ms)?,
            max_delay_ms: parse_var(&lookup, "RESILIENCE_MAX_DELAY_MS", defaults.max_delay_ms)?,
            backoff_factor: parse_var(
                &lookup,
                "RESILIENCE_BACKOFF_FACTOR",
                defaults.backoff_factor,
            )?,
            cache_ttl_secs: parse_var(
                &lookup,
                "RESILIENCE_CACHE_TTL_SECS",
                defaults.cache_ttl_secs,
            )?,
            cache_max_size: parse_var(
                &lookup,
                "RESILIENCE_CACHE_MAX_SIZE",
                defaults.cache_max_size,
            )?,
            stage_threshold: parse_var(
                &lookup,
                "ORCHESTRATOR_STAGE_THRESHOLD",
                defaults.stage_threshold,
            )?,
            defer_delay_ms: parse_var(
                &lookup,
                "ORCHESTRATOR_DEFER_DELAY_MS",
                defaults.defer_delay_ms,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> SharedResult<()> {
        if self.max_attempts < 1 {
            return Err(invalid("max_attempts", self.max_attempts));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(invalid("backoff_factor", self.backoff_factor));
        }
        if self.cache_max_size < 1 {
            return Err(invalid("cache_max_size", self.cache_max_size));
        }
        if !(0.0..=100.0).contains(&self.stage_threshold) {
            return Err(invalid("stage_threshold", self.stage_threshold));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> SharedResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| SharedError::InvalidConfig {
            field: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn invalid(field: &str, value: impl ToString) -> SharedError {
    SharedError::InvalidConfig {
        field: field.to_string(),
        value: value.to_string(),
    }
}

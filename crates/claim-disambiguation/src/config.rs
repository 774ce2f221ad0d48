//! Stage configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Values in a TOML file passed to [`DisambiguationConfig::load`]
//! 2. Environment variables (`DISAMBIGUATION_*`)
//! 3. Built-in defaults
//!
//! ## Recognised keys
//!
//! | Key                    | Env var                          | Default |
//! |------------------------|----------------------------------|---------|
//! | `completions`          | `DISAMBIGUATION_COMPLETIONS`     | 3       |
//! | `min_successes`        | `DISAMBIGUATION_MIN_SUCCESSES`   | 2       |
//! | `max_concurrency`      | `DISAMBIGUATION_MAX_CONCURRENCY` | 8       |
//! | `attempt_timeout_secs` | `DISAMBIGUATION_ATTEMPT_TIMEOUT` | 60      |
//! | `oracle.base_url`      | `DISAMBIGUATION_BASE_URL`        | `http://localhost:8080/v1` |
//! | `oracle.api_key`       | `DISAMBIGUATION_API_KEY`         | `local` |
//! | `oracle.model`         | `DISAMBIGUATION_MODEL`           | `gpt-4o-mini` |

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::errors::ConfigError;

const DEFAULT_COMPLETIONS: usize = 3;
const DEFAULT_MIN_SUCCESSES: usize = 2;
const DEFAULT_MAX_CONCURRENCY: usize = 8;
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Low but non-zero so independent completions can disagree.
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 512;

const ENV_COMPLETIONS: &str = "DISAMBIGUATION_COMPLETIONS";
const ENV_MIN_SUCCESSES: &str = "DISAMBIGUATION_MIN_SUCCESSES";
const ENV_MAX_CONCURRENCY: &str = "DISAMBIGUATION_MAX_CONCURRENCY";
const ENV_ATTEMPT_TIMEOUT: &str = "DISAMBIGUATION_ATTEMPT_TIMEOUT";
const ENV_BASE_URL: &str = "DISAMBIGUATION_BASE_URL";
const ENV_API_KEY: &str = "DISAMBIGUATION_API_KEY";
const ENV_MODEL: &str = "DISAMBIGUATION_MODEL";

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            default
        }),
        Err(_) => default,
    }
}

/// OpenAI-compatible endpoint used by the HTTP oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleEndpoint {
    /// Base URL including the version segment (e.g. `http://host:8080/v1`).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for OracleEndpoint {
    fn default() -> Self {
        Self {
            base_url: env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: env::var(ENV_API_KEY).unwrap_or_else(|_| "local".to_string()),
            model: env::var(ENV_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Top-level configuration consumed by [`crate::DisambiguationStage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Independent oracle attempts per ambiguous sentence.
    pub completions: usize,
    /// Quorum: resolved attempts needed to accept a sentence.
    pub min_successes: usize,
    /// Cap on in-flight oracle calls across the whole batch.
    pub max_concurrency: usize,
    /// Per-attempt timeout; an expired attempt counts as a failed vote.
    pub attempt_timeout_secs: u64,
    pub oracle: OracleEndpoint,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            completions: env_or(ENV_COMPLETIONS, DEFAULT_COMPLETIONS),
            min_successes: env_or(ENV_MIN_SUCCESSES, DEFAULT_MIN_SUCCESSES),
            max_concurrency: env_or(ENV_MAX_CONCURRENCY, DEFAULT_MAX_CONCURRENCY),
            attempt_timeout_secs: env_or(ENV_ATTEMPT_TIMEOUT, DEFAULT_ATTEMPT_TIMEOUT_SECS),
            oracle: OracleEndpoint::default(),
        }
    }
}

impl DisambiguationConfig {
    /// Build from environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Shorthand used by tests and embedders that only care about the quorum.
    pub fn with_quorum(mut self, completions: usize, min_successes: usize) -> Self {
        self.completions = completions;
        self.min_successes = min_successes;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Parse a TOML document. Keys missing from the document keep their
    /// environment/default values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("loading {}", path.display()))
    }

    /// `true` when the quorum can never be met. Valid, but every ambiguous
    /// sentence will be dropped.
    pub fn quorum_unreachable(&self) -> bool {
        self.min_successes > self.completions
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completions == 0 {
            return Err(ConfigError::Invalid("completions must be > 0".to_string()));
        }
        if self.min_successes == 0 {
            return Err(ConfigError::Invalid(
                "min_successes must be > 0".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be > 0".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(format!(
                "max_concurrency must be <= {}, got {}",
                Semaphore::MAX_PERMITS,
                self.max_concurrency
            )));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "attempt_timeout_secs must be > 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(ConfigError::Invalid(format!(
                "oracle.temperature must be in [0, 2], got {}",
                self.oracle.temperature
            )));
        }
        if self.quorum_unreachable() {
            warn!(
                completions = self.completions,
                min_successes = self.min_successes,
                "min_successes exceeds completions; every ambiguous sentence will be dropped"
            );
        }
        Ok(())
    }
}

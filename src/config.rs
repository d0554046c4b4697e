//! genprobe configuration loaded from `genprobe.toml`.
//!
//! [`ProbeConfig`] holds every tunable of a batch run. Values missing from
//! the file fall back to defaults. The `GENPROBE_API_KEY` environment
//! variable takes precedence over the file for the API key.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProbeError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "genprobe.toml";
pub const API_KEY_ENV: &str = "GENPROBE_API_KEY";

/// Top-level configuration loaded from `genprobe.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Key injected into every submission and fetch-result body.
    #[serde(default)]
    pub api_key: String,

    /// Fixed headers sent with every API call.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry bound shared by submission, polling and link verification.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds between polls while a job is still processing.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between attempts to fetch an undelivered image link.
    #[serde(default = "default_link_retry_delay_secs")]
    pub link_retry_delay_secs: u64,

    /// How many times each endpoint row is driven.
    #[serde(default = "default_api_calls")]
    pub api_calls: u32,

    /// Endpoints CSV with `EndPoint` and `Json` columns.
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,

    /// Append-only outcome log.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_link_retry_delay_secs() -> u64 {
    5
}

fn default_api_calls() -> u32 {
    1
}

fn default_input_path() -> PathBuf {
    PathBuf::from("data/endpoints.csv")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data.csv")
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            headers: default_headers(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            poll_interval_secs: default_poll_interval_secs(),
            link_retry_delay_secs: default_link_retry_delay_secs(),
            api_calls: default_api_calls(),
            input_path: default_input_path(),
            output_path: default_output_path(),
        }
    }
}

impl ProbeConfig {
    /// Loads the given file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ProbeConfig>(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.is_empty()
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make every request or the whole run a no-op.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ProbeError::Config("timeout_secs must be at least 1".into()));
        }
        if self.api_calls == 0 {
            return Err(ProbeError::Config("api_calls must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

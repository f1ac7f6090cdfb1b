use std::path::PathBuf;
use std::time::Duration;

use instanexus_contracts::capabilities::ClientCapabilities;
use thiserror::Error;

use crate::poller::PollPolicy;

pub const DEFAULT_TASK_API_BASE: &str = "https://api.goapi.ai";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_CAPTION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OUTPUT_DIR: &str = "static";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not set")]
    Missing { key: &'static str },

    #[error("{key} must be a non-negative integer, got {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub task_api_base: String,
    pub task_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_api_key: Option<String>,
    pub caption_model: String,
    /// Parent of `generated_images/` and `fallback_images/`.
    pub output_dir: PathBuf,
    pub poll: PollPolicy,
    /// Grid files kept on disk; `None` keeps every grid.
    pub grid_retention: Option<usize>,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_api_base: DEFAULT_TASK_API_BASE.to_string(),
            task_api_key: None,
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            openai_api_key: None,
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            poll: PollPolicy::default(),
            grid_retention: None,
            request_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let poll_interval = match parse_u64(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.poll.interval,
        };
        // Polling needs at least one status request.
        let max_attempts = match parse_u64(get("POLL_MAX_ATTEMPTS"), "POLL_MAX_ATTEMPTS")? {
            Some(attempts) => u32::try_from(attempts)
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "POLL_MAX_ATTEMPTS",
                    value: attempts.to_string(),
                })?,
            None => defaults.poll.max_attempts,
        };
        let grid_retention = parse_u64(get("GRID_RETENTION_MAX"), "GRID_RETENTION_MAX")?
            .map(|limit| limit as usize);

        Ok(Self {
            task_api_base: get("MIDJOURNEY_API_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.task_api_base),
            task_api_key: get("MIDJOURNEY_API_KEY"),
            openai_api_base: get("OPENAI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_api_base),
            openai_api_key: get("OPENAI_API_KEY"),
            caption_model: get("CAPTION_MODEL").unwrap_or(defaults.caption_model),
            output_dir: get("INSTANEXUS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            poll: PollPolicy::new(poll_interval, max_attempts),
            grid_retention,
            request_timeout: defaults.request_timeout,
            download_timeout: defaults.download_timeout,
        })
    }

    pub fn require_task_api_key(&self) -> Result<&str, ConfigError> {
        self.task_api_key.as_deref().ok_or(ConfigError::Missing {
            key: "MIDJOURNEY_API_KEY",
        })
    }

    /// Capabilities implied by which keys are configured.
    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::new(self.task_api_key.is_some(), self.openai_api_key.is_some())
    }
}

fn parse_u64(raw: Option<String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid { key, value })
    })
    .transpose()
}

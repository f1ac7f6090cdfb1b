use instanexus_contracts::tasks::TaskKind;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure talking to a remote JSON API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("download of {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Why a remote task did not produce a usable result.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{} submission rejected: {reason}", .kind.as_str())]
    Submission { kind: TaskKind, reason: String },

    #[error("task {task_id} timed out after {attempts} polls")]
    TimedOut { task_id: String, attempts: u32 },

    #[error("task {task_id} failed: {message}")]
    RemoteFailure { task_id: String, message: String },

    #[error("task {task_id} completed without a result url")]
    MissingResultUrl { task_id: String },

    #[error("polling for task {task_id} was cancelled")]
    Cancelled { task_id: String },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("failed to store asset: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    Client(#[from] ApiError),
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

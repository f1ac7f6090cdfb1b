//! Image generation orchestration, grid selection and content batches on top
//! of a remote Midjourney task API.

pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod quality;
pub mod remote;
pub mod storage;

#[cfg(test)]
mod testing;

use serde_json::{Map, Value};

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{ApiError, DownloadError, GenerationError, TaskError};
pub use orchestrator::Orchestrator;
pub use poller::{PollPolicy, TaskPoller};

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

//! JSON payloads exchanged with the remote task API.
//!
//! `POST /api/v1/task` takes a [`TaskRequest`] and answers with a
//! [`SubmitResponse`]; `GET /api/v1/task/{id}` answers with a [`TaskEnvelope`].
//! Response types default every field so partial payloads still decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::TaskKind;

pub const TASK_MODEL: &str = "midjourney";

/// Action the remote lists on a completed imagine task when the output is a 2x2 grid.
pub const UPSCALE_MARKER: &str = "upscale1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub model: String,
    pub task_type: TaskKind,
    pub input: TaskInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskInput {
    Imagine(ImagineInput),
    Upscale(UpscaleInput),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagineInput {
    pub prompt: String,
    pub aspect_ratio: String,
    pub process_mode: String,
    pub skip_prompt_check: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleInput {
    pub origin_task_id: String,
    /// 1-based grid position, sent as a string.
    pub index: String,
}

impl TaskRequest {
    pub fn imagine(prompt: impl Into<String>) -> Self {
        Self {
            model: TASK_MODEL.to_string(),
            task_type: TaskKind::Imagine,
            input: TaskInput::Imagine(ImagineInput {
                prompt: prompt.into(),
                aspect_ratio: "1:1".to_string(),
                process_mode: "fast".to_string(),
                skip_prompt_check: false,
            }),
        }
    }

    /// `candidate` is the 0-based grid index; the wire carries it 1-based.
    pub fn upscale(origin_task_id: impl Into<String>, candidate: usize) -> Self {
        Self {
            model: TASK_MODEL.to_string(),
            task_type: TaskKind::Upscale,
            input: TaskInput::Upscale(UpscaleInput {
                origin_task_id: origin_task_id.into(),
                index: (candidate + 1).to_string(),
            }),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.task_type
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub data: Option<SubmitData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitData {
    #[serde(default)]
    pub task_id: Option<String>,
}

impl SubmitResponse {
    pub fn task_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.task_id.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    pub data: TaskData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Option<TaskOutput>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl TaskData {
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|error| error.message.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub image_url: Option<String>,
    /// Number or numeric string depending on the backend revision.
    #[serde(default)]
    pub progress: Option<Value>,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl TaskOutput {
    pub fn image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn progress_percent(&self) -> Option<u8> {
        let raw = match self.progress.as_ref()? {
            Value::Number(number) => number.as_f64()?,
            Value::String(text) => text.trim().trim_end_matches('%').parse::<f64>().ok()?,
            _ => return None,
        };
        if !raw.is_finite() {
            return None;
        }
        Some(raw.clamp(0.0, 100.0).round() as u8)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

use serde::{Deserialize, Serialize};

use super::wire::TaskData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Imagine,
    Upscale,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagine => "imagine",
            Self::Upscale => "upscale",
        }
    }
}

/// Remote task lifecycle.
///
/// `pending -> staged -> processing -> completed | failed`. Any status string the
/// remote sends that is not one of these parses to `Unknown`, which pollers treat
/// like `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Staged,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "staged" => Self::Staged,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Staged => "staged",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub result_url: Option<String>,
    pub error: Option<String>,
    /// Follow-up actions offered by the remote once the task completed.
    #[serde(default)]
    pub actions: Vec<String>,
}

impl GenerationTask {
    pub fn submitted(task_id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            status: TaskStatus::Pending,
            progress: 0,
            result_url: None,
            error: None,
            actions: Vec::new(),
        }
    }

    /// Folds one poll response into the task. Fields the response omits keep
    /// their previous values.
    pub fn apply(&mut self, data: &TaskData) {
        self.status = TaskStatus::parse(&data.status);
        if let Some(output) = &data.output {
            if let Some(progress) = output.progress_percent() {
                self.progress = progress;
            }
            if let Some(url) = output.image_url() {
                self.result_url = Some(url.to_string());
            }
            if !output.actions.is_empty() {
                self.actions = output.actions.clone();
            }
        }
        if self.status == TaskStatus::Completed {
            self.progress = 100;
        }
        if let Some(message) = data.error_message() {
            self.error = Some(message.to_string());
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|candidate| candidate == action)
    }
}

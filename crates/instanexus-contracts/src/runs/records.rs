use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Final persisted image of one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub local_path: PathBuf,
    pub source_url: String,
    /// Hex SHA-256 of the bytes written to `local_path`.
    pub sha256: String,
}

/// Outcome of one content package (image + caption).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentRecord {
    pub fn succeeded(
        theme: impl Into<String>,
        image_prompt: impl Into<String>,
        image_path: PathBuf,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            theme: Some(theme.into()),
            image_prompt: Some(image_prompt.into()),
            image_path: Some(image_path),
            caption: Some(caption.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            theme: None,
            image_prompt: None,
            image_path: None,
            caption: None,
            error: Some(error.into()),
        }
    }
}

//! Seams to the outside world: the image task API and asset downloads.

mod fetch;
mod goapi;

use async_trait::async_trait;
use instanexus_contracts::tasks::{SubmitResponse, TaskEnvelope, TaskRequest};

use crate::error::{ApiError, DownloadError};

pub use fetch::HttpFetcher;
pub use goapi::GoApiClient;
pub(crate) use goapi::response_json_or_error;

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn submit(&self, request: &TaskRequest) -> Result<SubmitResponse, ApiError>;

    async fn status(&self, task_id: &str) -> Result<TaskEnvelope, ApiError>;
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

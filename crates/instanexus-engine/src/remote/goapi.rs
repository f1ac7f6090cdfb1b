use std::time::Duration;

use async_trait::async_trait;
use instanexus_contracts::tasks::{SubmitResponse, TaskEnvelope, TaskRequest};
use reqwest::{Client as HttpClient, Response as HttpResponse};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::TaskApi;
use crate::error::{truncate_text, ApiError};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for the Midjourney task API (`/api/v1/task`).
pub struct GoApiClient {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GoApiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    fn task_endpoint(&self) -> String {
        format!("{}/api/v1/task", self.api_base)
    }

    fn status_endpoint(&self, task_id: &str) -> String {
        format!("{}/{}", self.task_endpoint(), task_id.trim())
    }
}

#[async_trait]
impl TaskApi for GoApiClient {
    async fn submit(&self, request: &TaskRequest) -> Result<SubmitResponse, ApiError> {
        let endpoint = self.task_endpoint();
        debug!(endpoint = %endpoint, task_type = request.kind().as_str(), "submitting task");
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;
        response_json_or_error(response).await
    }

    async fn status(&self, task_id: &str) -> Result<TaskEnvelope, ApiError> {
        let response = self
            .http
            .get(self.status_endpoint(task_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        response_json_or_error(response).await
    }
}

pub(crate) async fn response_json_or_error<T: DeserializeOwned>(
    response: HttpResponse,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

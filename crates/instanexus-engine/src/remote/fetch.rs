use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use super::AssetFetcher;
use crate::error::{ApiError, DownloadError};

/// Plain GET downloader for generated images.
pub struct HttpFetcher {
    http: HttpClient,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpClient::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let transport = |source| DownloadError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.http.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(transport)?;
        debug!(url, bytes = bytes.len(), "downloaded asset");
        Ok(bytes.to_vec())
    }
}

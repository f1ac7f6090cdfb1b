//! Drives one prompt from imagine submission to a stored image.
//!
//! ```text
//! submit imagine -> poll -> grid? -> download grid -> select -> submit upscale -> poll
//!                                                                     |
//!                                           any failure here falls back to the grid url
//!                   -> download final -> store
//! ```

use std::sync::Arc;

use instanexus_contracts::events::{EventPayload, EventWriter};
use instanexus_contracts::runs::records::GeneratedAsset;
use instanexus_contracts::tasks::{TaskKind, TaskRequest, UPSCALE_MARKER};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{GenerationError, TaskError};
use crate::map_object;
use crate::poller::{CompletedTask, PollPolicy, TaskPoller};
use crate::quality::{select_best_bytes, Selection, GRID_CELLS};
use crate::remote::{AssetFetcher, TaskApi};
use crate::storage::{AssetKind, AssetStore};

#[derive(Clone)]
pub struct Orchestrator {
    api: Arc<dyn TaskApi>,
    fetcher: Arc<dyn AssetFetcher>,
    store: AssetStore,
    poller: TaskPoller,
    events: Option<EventWriter>,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn TaskApi>,
        fetcher: Arc<dyn AssetFetcher>,
        store: AssetStore,
        policy: PollPolicy,
    ) -> Self {
        Self {
            poller: TaskPoller::new(api.clone(), policy),
            api,
            fetcher,
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedAsset, GenerationError> {
        self.generate_image_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    pub async fn generate_image_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GeneratedAsset, GenerationError> {
        let task_id = self.submit(TaskRequest::imagine(prompt)).await?;
        let imagine = self
            .poller
            .poll_until_terminal_with_cancel(&task_id, TaskKind::Imagine, cancel)
            .await?;
        self.emit_completed(&imagine);

        let final_url = if imagine.task.has_action(UPSCALE_MARKER) {
            info!(task_id = %task_id, "grid output, selecting best candidate");
            self.upscale_best(&task_id, &imagine.result_url, cancel)
                .await?
        } else {
            imagine.result_url.clone()
        };

        let bytes = self.fetcher.fetch(&final_url).await?;
        let local_path = self.store.save(AssetKind::Final, &bytes).await?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        self.emit(
            "asset_saved",
            map_object(json!({
                "task_id": task_id,
                "source_url": final_url,
                "local_path": local_path.to_string_lossy(),
                "sha256": sha256,
                "bytes": bytes.len(),
            })),
        );
        info!(task_id = %task_id, path = %local_path.display(), "final image saved");

        Ok(GeneratedAsset {
            local_path,
            source_url: final_url,
            sha256,
        })
    }

    async fn submit(&self, request: TaskRequest) -> Result<String, TaskError> {
        let kind = request.kind();
        let response = self
            .api
            .submit(&request)
            .await
            .map_err(|err| TaskError::Submission {
                kind,
                reason: err.to_string(),
            })?;
        let Some(task_id) = response.task_id() else {
            return Err(TaskError::Submission {
                kind,
                reason: "response carried no task id".to_string(),
            });
        };
        info!(task_id, kind = kind.as_str(), "task submitted");
        self.emit(
            "task_submitted",
            map_object(json!({
                "task_id": task_id,
                "task_type": kind.as_str(),
                "request": request,
            })),
        );
        Ok(task_id.to_string())
    }

    /// Returns the URL to download as the final image: the upscaled cell, or
    /// the grid itself when any step after the grid download fails.
    async fn upscale_best(
        &self,
        task_id: &str,
        grid_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let grid = match self.fetcher.fetch(grid_url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(task_id, error = %err, "grid download failed, using grid url");
                self.emit_fallback(task_id, grid_url, "grid_download", &err.to_string());
                return Ok(grid_url.to_string());
            }
        };
        let grid_path = self.store.save(AssetKind::Grid, &grid).await?;

        let selection = tokio::task::spawn_blocking(move || select_best_bytes(&grid))
            .await
            .unwrap_or_else(|err| {
                warn!(task_id, error = %err, "grid scoring aborted, defaulting to first cell");
                Selection {
                    index: 0,
                    score: 0.0,
                    scores: vec![0.0; GRID_CELLS],
                }
            });
        info!(task_id, index = selection.index, score = selection.score, "best grid cell");
        self.emit(
            "grid_scored",
            map_object(json!({
                "task_id": task_id,
                "grid_path": grid_path.to_string_lossy(),
                "selected_index": selection.index,
                "score": selection.score,
                "scores": selection.scores,
            })),
        );

        let upscale_id = match self
            .submit(TaskRequest::upscale(task_id, selection.index))
            .await
        {
            Ok(upscale_id) => upscale_id,
            Err(err) => {
                warn!(task_id, error = %err, "upscale submission failed, using grid url");
                self.emit_fallback(task_id, grid_url, "upscale_submission", &err.to_string());
                return Ok(grid_url.to_string());
            }
        };
        self.emit(
            "upscale_requested",
            map_object(json!({
                "task_id": task_id,
                "upscale_task_id": upscale_id,
                "index": selection.index + 1,
            })),
        );

        match self
            .poller
            .poll_until_terminal_with_cancel(&upscale_id, TaskKind::Upscale, cancel)
            .await
        {
            Ok(upscaled) => {
                self.emit_completed(&upscaled);
                Ok(upscaled.result_url)
            }
            Err(err @ TaskError::Cancelled { .. }) => Err(err.into()),
            Err(err) => {
                warn!(task_id, upscale_task_id = %upscale_id, error = %err, "upscale failed, using grid url");
                self.emit_fallback(task_id, grid_url, "upscale_task", &err.to_string());
                Ok(grid_url.to_string())
            }
        }
    }

    fn emit_completed(&self, completed: &CompletedTask) {
        self.emit(
            "task_completed",
            map_object(json!({
                "task_id": completed.task.task_id,
                "task_type": completed.task.kind.as_str(),
                "result_url": completed.result_url,
                "attempts": completed.attempts,
                "actions": completed.task.actions,
            })),
        );
    }

    fn emit_fallback(&self, task_id: &str, grid_url: &str, stage: &str, error: &str) {
        self.emit(
            "upscale_fallback",
            map_object(json!({
                "task_id": task_id,
                "grid_url": grid_url,
                "stage": stage,
                "error": error,
            })),
        );
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        if let Some(events) = &self.events {
            if let Err(err) = events.emit(event_type, payload) {
                warn!(event_type, error = %err, "failed to append run event");
            }
        }
    }
}

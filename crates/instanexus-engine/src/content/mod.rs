//! Content packages: prompt, image and caption, singly or in paced batches.

mod captions;
mod prompts;

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use instanexus_contracts::events::{EventPayload, EventWriter};
use instanexus_contracts::runs::records::ContentRecord;
use instanexus_contracts::runs::summary::BatchSummary;
use rand::Rng;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::map_object;
use crate::orchestrator::Orchestrator;

pub use captions::{Captioner, OpenAiCaptioner, TemplateCaptioner};
pub use prompts::{PromptBuilder, DEFAULT_THEME};

pub const DEFAULT_BATCH_SIZE: u32 = 3;

/// Randomized wait between batch items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPacing {
    pub min: Duration,
    pub max: Duration,
}

impl BatchPacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rng.gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for BatchPacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(15))
    }
}

#[derive(Clone)]
pub struct ContentGenerator {
    orchestrator: Orchestrator,
    captioner: Arc<dyn Captioner>,
    prompts: PromptBuilder,
    pacing: BatchPacing,
    events: Option<EventWriter>,
}

impl ContentGenerator {
    pub fn new(orchestrator: Orchestrator, captioner: Arc<dyn Captioner>) -> Self {
        Self {
            orchestrator,
            captioner,
            prompts: PromptBuilder,
            pacing: BatchPacing::default(),
            events: None,
        }
    }

    pub fn with_pacing(mut self, pacing: BatchPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.captioner = captioner;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn generate_content(&self, theme: Option<&str>) -> ContentRecord {
        self.generate_content_with_cancel(theme, &CancellationToken::new())
            .await
    }

    /// One package. Image failures become a failed record; caption failures
    /// fall back to the template caption.
    pub async fn generate_content_with_cancel(
        &self,
        theme: Option<&str>,
        cancel: &CancellationToken,
    ) -> ContentRecord {
        let label = theme
            .map(str::trim)
            .filter(|theme| !theme.is_empty())
            .unwrap_or(DEFAULT_THEME)
            .to_string();
        let prompt = {
            let mut rng = rand::thread_rng();
            self.prompts.build(theme, &mut rng)
        };
        info!(theme = %label, prompt = %prompt, "generating content package");

        let asset = match self
            .orchestrator
            .generate_image_with_cancel(&prompt, cancel)
            .await
        {
            Ok(asset) => asset,
            Err(err) => {
                error!(error = %err, "image generation failed");
                let record = ContentRecord::failed(format!("Failed to generate image: {err}"));
                self.emit(
                    "content_failed",
                    map_object(json!({ "theme": label, "error": record.error })),
                );
                return record;
            }
        };

        let caption = match self.captioner.caption(&prompt, &label).await {
            Ok(caption) => caption,
            Err(err) => {
                warn!(error = %err, "caption request failed, using template caption");
                TemplateCaptioner.render(&prompt, &label)
            }
        };
        self.emit(
            "content_generated",
            map_object(json!({
                "theme": label,
                "image_path": asset.local_path.to_string_lossy(),
                "sha256": asset.sha256,
            })),
        );
        ContentRecord::succeeded(label, prompt, asset.local_path, caption)
    }

    pub async fn generate_batch(&self, count: u32, theme: Option<&str>) -> Vec<ContentRecord> {
        self.generate_batch_with_cancel(count, theme, &CancellationToken::new())
            .await
    }

    /// Generates `count` packages one after another, pausing between items.
    /// A failed item never stops the batch; cancellation does.
    pub async fn generate_batch_with_cancel(
        &self,
        count: u32,
        theme: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<ContentRecord> {
        let mut records = Vec::new();
        for index in 0..count {
            if cancel.is_cancelled() {
                warn!(completed = index, count, "batch cancelled");
                break;
            }
            info!(item = index + 1, count, "generating batch item");
            records.push(self.generate_content_with_cancel(theme, cancel).await);

            if index + 1 < count {
                let delay = {
                    let mut rng = rand::thread_rng();
                    self.pacing.sample(&mut rng)
                };
                info!(delay_secs = delay.as_secs_f64(), "waiting before next item");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!(completed = index + 1, count, "batch cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        records
    }

    /// Runs a batch and wraps the records with run timing.
    pub async fn run_batch(
        &self,
        count: u32,
        theme: Option<&str>,
        cancel: &CancellationToken,
    ) -> BatchSummary {
        let run_id = self
            .events
            .as_ref()
            .map(|events| events.run_id().to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let started_at = now_iso();
        self.emit(
            "batch_started",
            map_object(json!({ "count": count, "theme": theme })),
        );

        let records = self.generate_batch_with_cancel(count, theme, cancel).await;
        let summary = BatchSummary {
            run_id,
            started_at,
            finished_at: now_iso(),
            requested: u64::from(count),
            records,
        };
        self.emit(
            "batch_finished",
            map_object(json!({
                "requested": summary.requested,
                "succeeded": summary.succeeded(),
                "failed": summary.failed(),
            })),
        );
        summary
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        if let Some(events) = &self.events {
            if let Err(err) = events.emit(event_type, payload) {
                warn!(event_type, error = %err, "failed to append run event");
            }
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

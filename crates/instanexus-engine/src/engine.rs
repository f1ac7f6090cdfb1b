use std::sync::Arc;

use instanexus_contracts::capabilities::ClientCapabilities;
use instanexus_contracts::events::EventWriter;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::content::{Captioner, ContentGenerator, OpenAiCaptioner, TemplateCaptioner};
use crate::error::GenerationError;
use crate::orchestrator::Orchestrator;
use crate::remote::{AssetFetcher, GoApiClient, HttpFetcher, TaskApi};
use crate::storage::AssetStore;

/// Everything a run needs, wired from one [`EngineConfig`].
pub struct Engine {
    config: EngineConfig,
    capabilities: ClientCapabilities,
    openai: Option<Arc<OpenAiCaptioner>>,
    orchestrator: Orchestrator,
    content: ContentGenerator,
}

impl Engine {
    /// Builds the HTTP clients and opens the asset store. Fails when no task
    /// API key is configured.
    pub fn from_config(
        config: EngineConfig,
        events: Option<EventWriter>,
    ) -> Result<Self, GenerationError> {
        let api: Arc<dyn TaskApi> = Arc::new(GoApiClient::new(
            config.task_api_base.clone(),
            config.require_task_api_key()?,
            config.request_timeout,
        )?);
        let fetcher: Arc<dyn AssetFetcher> = Arc::new(HttpFetcher::new(config.download_timeout)?);
        let openai = match &config.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiCaptioner::new(
                config.openai_api_base.clone(),
                key.clone(),
                config.caption_model.clone(),
                config.request_timeout,
            )?)),
            None => None,
        };
        Self::assemble(config, api, fetcher, openai, events)
    }

    fn assemble(
        config: EngineConfig,
        api: Arc<dyn TaskApi>,
        fetcher: Arc<dyn AssetFetcher>,
        openai: Option<Arc<OpenAiCaptioner>>,
        events: Option<EventWriter>,
    ) -> Result<Self, GenerationError> {
        let store = AssetStore::open(&config.output_dir, config.grid_retention)?;
        let mut orchestrator = Orchestrator::new(api, fetcher, store, config.poll);
        let captioner: Arc<dyn Captioner> = match &openai {
            Some(openai) => openai.clone(),
            None => Arc::new(TemplateCaptioner),
        };
        if let Some(events) = &events {
            orchestrator = orchestrator.with_events(events.clone());
        }
        let mut content = ContentGenerator::new(orchestrator.clone(), captioner);
        if let Some(events) = events {
            content = content.with_events(events);
        }
        let capabilities = config.capabilities();
        info!(
            task_api = capabilities.task_api,
            captions = capabilities.captions,
            output_dir = %config.output_dir.display(),
            "engine ready"
        );
        Ok(Self {
            config,
            capabilities,
            openai,
            orchestrator,
            content,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> ClientCapabilities {
        self.capabilities
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn content(&self) -> &ContentGenerator {
        &self.content
    }

    /// Verifies the caption key. On failure captions switch to the template
    /// writer for the rest of this engine's life.
    pub async fn probe_captions(&mut self) -> ClientCapabilities {
        let Some(openai) = self.openai.clone() else {
            return self.capabilities;
        };
        match openai.probe().await {
            Ok(()) => info!("caption api key verified"),
            Err(err) => {
                warn!(error = %err, "caption api probe failed, using template captions");
                self.capabilities = self.capabilities.without_captions();
                self.openai = None;
                self.content = self
                    .content
                    .clone()
                    .with_captioner(Arc::new(TemplateCaptioner));
            }
        }
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Engine;
    use crate::config::{ConfigError, EngineConfig};
    use crate::error::GenerationError;
    use crate::testing::{MemoryFetcher, ScriptedTaskApi};

    #[test]
    fn missing_task_key_is_a_config_error() {
        let err = Engine::from_config(EngineConfig::default(), None).err();
        assert!(matches!(
            err,
            Some(GenerationError::Config(ConfigError::Missing {
                key: "MIDJOURNEY_API_KEY"
            }))
        ));
    }

    #[test]
    fn from_config_opens_store_and_reports_capabilities() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = EngineConfig {
            task_api_key: Some("mj-key".to_string()),
            output_dir: temp.path().join("static"),
            ..EngineConfig::default()
        };

        let engine = Engine::from_config(config, None)?;
        let caps = engine.capabilities();
        assert!(caps.task_api);
        assert!(!caps.captions);
        assert!(engine.orchestrator().store().generated_dir().is_dir());
        assert!(engine.orchestrator().store().fallback_dir().is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn probe_without_caption_key_is_a_no_op() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = EngineConfig {
            task_api_key: Some("mj-key".to_string()),
            output_dir: temp.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let mut engine = Engine::assemble(
            config,
            Arc::new(ScriptedTaskApi::new()),
            Arc::new(MemoryFetcher::new()),
            None,
            None,
        )?;

        let caps = engine.probe_captions().await;
        assert!(caps.task_api);
        assert!(!caps.captions);
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::remote::response_json_or_error;

const MAX_CAPTION_TOKENS: u32 = 300;
const HASHTAGS: &str = "#history #historicalart #aiart #onthisday #instahistory";

#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image_prompt: &str, theme: &str) -> Result<String, ApiError>;
}

/// Chat-completions caption writer.
pub struct OpenAiCaptioner {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatResponse {
    fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

impl OpenAiCaptioner {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            http: HttpClient::builder().timeout(timeout).build()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Checks the key against `GET /models`, which costs nothing.
    pub async fn probe(&self) -> Result<(), ApiError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let _: serde_json::Value = response_json_or_error(response).await?;
        Ok(())
    }

    fn messages(image_prompt: &str, theme: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(
                    "You write engaging Instagram captions for historical artwork. \
                     Keep it under 120 words, add one surprising fact and end with 3-5 hashtags."
                        .to_string(),
                ),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(format!(
                    "Theme: {theme}\nImage description: {image_prompt}\nWrite the caption."
                )),
            },
        ]
    }
}

#[async_trait]
impl Captioner for OpenAiCaptioner {
    async fn caption(&self, image_prompt: &str, theme: &str) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::messages(image_prompt, theme),
            max_tokens: MAX_CAPTION_TOKENS,
        };
        debug!(model = %self.model, "requesting caption");
        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let payload: ChatResponse = response_json_or_error(response).await?;
        payload
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Decode("completion carried no message content".to_string()))
    }
}

/// Offline caption built from the theme and prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCaptioner;

impl TemplateCaptioner {
    pub fn render(&self, image_prompt: &str, theme: &str) -> String {
        let scene = image_prompt
            .split(',')
            .next()
            .map(str::trim)
            .filter(|scene| !scene.is_empty())
            .unwrap_or("a moment from the past");
        let theme_tag: String = theme
            .chars()
            .filter(|ch| ch.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let mut caption = format!(
            "{theme}: {}.\n\nStep back in time and imagine being there.\n\n{HASHTAGS}",
            capitalize(scene)
        );
        if !theme_tag.is_empty() && !HASHTAGS.contains(&format!("#{theme_tag} ")) {
            caption.push_str(&format!(" #{theme_tag}"));
        }
        caption
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Captioner for TemplateCaptioner {
    async fn caption(&self, image_prompt: &str, theme: &str) -> Result<String, ApiError> {
        Ok(self.render(image_prompt, theme))
    }
}

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use mf_core::layout::parse_assistant_reply;
use mf_core::LayoutInstructions;
use crate::generator::config::AssistantConfig;

#[derive(Error, Debug)]
enum AssistantError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(String),

    #[error("reply had no content")]
    EmptyReply,

    #[error("unusable reply: {0}")]
    Reply(#[from] mf_core::error::Error),
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Asks an OpenAI-compatible chat endpoint for layout instructions.
///
/// Every failure path yields `LayoutInstructions::default()`.
pub struct LayoutSynthesizer {
    client: Client,
    config: AssistantConfig,
}

impl LayoutSynthesizer {
    pub fn new(config: AssistantConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub async fn synthesize(
        &self,
        prompt: &str,
        text_content: &str,
        image_count: usize,
    ) -> LayoutInstructions {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("No assistant key configured, using the default layout");
            return LayoutInstructions::default();
        };

        match self.ask(api_key, prompt, text_content, image_count).await {
            Ok(layout) => {
                info!("Layout instructions generated by {}", self.config.model);
                layout
            }
            Err(e) => {
                warn!("Layout assistant failed, using the default layout: {e}");
                LayoutInstructions::default()
            }
        }
    }

    async fn ask(
        &self,
        api_key: &str,
        prompt: &str,
        text_content: &str,
        image_count: usize,
    ) -> Result<LayoutInstructions, AssistantError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(prompt, text_content, image_count, self.config.preview_chars),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AssistantError::Status(format!("{status}: {text}")));
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AssistantError::EmptyReply)?;

        Ok(parse_assistant_reply(&content)?)
    }
}

fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&LayoutInstructions::default()).unwrap_or_default();
    format!(
        "You are an expert magazine layout designer. Read the user's request and produce \
         precise instructions for filling an InDesign template.\n\n\
         Return only valid JSON with exactly this structure:\n{schema}"
    )
}

fn user_prompt(prompt: &str, text_content: &str, image_count: usize, preview_chars: usize) -> String {
    let preview: String = text_content.chars().take(preview_chars).collect();
    format!(
        "User prompt: \"{prompt}\"\n\
         Text content: \"{preview}...\"\n\
         Number of images: {image_count}\n\n\
         Produce layout instructions suited to this content."
    )
}

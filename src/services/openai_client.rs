use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);
const MODEL: &str = "gpt-4o";

/// Structured-extraction seam: given a prompt (and optional system prompt),
/// return a JSON value the caller deserializes into its expected schema.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_json(&self, prompt: &str, system: Option<&str>)
        -> Result<serde_json::Value>;
}

/// Typed wrapper over [`Extractor::extract_json`]. Fails when the model's
/// output does not match the expected schema.
pub async fn extract<T: DeserializeOwned>(
    extractor: &dyn Extractor,
    prompt: &str,
    system: Option<&str>,
) -> Result<T> {
    let value = extractor.extract_json(prompt, system).await?;
    serde_json::from_value(value).context("model output did not match the expected schema")
}

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
}

impl Default for OpenaiClient {
    fn default() -> Self {
        OpenaiClient {
            client: Client::new(),
        }
    }
}

impl OpenaiClient {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl Extractor for OpenaiClient {
    async fn extract_json(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<serde_json::Value> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![];
        if let Some(system) = system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(MODEL)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .max_tokens(2000_u32)
            .build()?;

        let response = tokio::time::timeout(EXTRACTION_TIMEOUT, self.client.chat().create(request))
            .await
            .context("extraction call timed out")?
            .context("extraction call failed")?;

        let content = response
            .choices
            .first()
            .context("no choices in completion")?
            .message
            .content
            .clone()
            .context("no content in completion")?;

        serde_json::from_str(&content).context("completion was not valid JSON")
    }
}

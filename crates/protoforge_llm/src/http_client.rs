use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, LlmClient, LlmError};

/// Adapter for any HTTP endpoint implementing the OpenAI-compatible
/// `/v1/chat/completions` API (OpenAI itself, Ollama, LM Studio, ...).
/// Constructed once per host process and shared across sessions; cheap to
/// clone because `reqwest::Client` is `Arc`-backed internally.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(
        api_base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LlmError::RequestFailed(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, api_base_url: api_base_url.into(), model: model.into(), api_key })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_response(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 2);
        wire_messages.push(WireMessage { role: "system", content: system_prompt });
        for message in messages {
            wire_messages.push(WireMessage { role: &message.role, content: &message.content });
        }
        wire_messages.push(WireMessage { role: "user", content: user_prompt });

        let request = ChatCompletionRequest { model: &self.model, messages: wire_messages };
        let mut builder =
            self.client.post(format!("{}/v1/chat/completions", self.api_base_url)).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| LlmError::RequestFailed(err.to_string()))?
            .error_for_status()
            .map_err(|err| LlmError::RequestFailed(err.to_string()))?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| LlmError::RequestFailed(format!("bad response body: {err}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

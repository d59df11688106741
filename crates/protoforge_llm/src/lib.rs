//! The LLM client contract (spec.md §6) and a default chat-completion
//! implementation. The core negotiation engine depends only on the [`LlmClient`]
//! trait; everything else in this crate is a concrete adapter the host wires in.

pub mod http_client;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http_client::HttpLlmClient;
pub use mock::ScriptedLlmClient;

/// One turn of chat history passed alongside the system/user prompt, per the
/// `asyncGenerateResponse(systemPrompt, userPrompt, messages)` contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("LLM response was empty")]
    EmptyResponse,
}

/// No streaming is assumed: a single call returns the full completion text.
/// Implementations MUST tolerate being called concurrently across sessions
/// (spec.md §5: "the LLM client is shared across sessions").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_response(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;
}

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChatMessage, LlmClient, LlmError};

/// A deterministic stand-in for a real LLM client, returning a pre-scripted
/// sequence of responses (one per call, in order). Used by the session/negotiator
/// test suites to drive the exact scenarios in spec.md §8 (S1-S6) without a
/// network dependency, the same non-production role `NoopComponentClient` plays
/// in the teacher's component-client family.
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<Vec<Result<String, LlmError>>>,
}

impl ScriptedLlmClient {
    /// `responses` is consumed front-to-back: the first call gets `responses[0]`,
    /// the second gets `responses[1]`, and so on.
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        Self { responses: Mutex::new(reversed) }
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("mock client mutex poisoned").len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate_response(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        self.responses
            .lock()
            .expect("mock client mutex poisoned")
            .pop()
            .unwrap_or_else(|| Err(LlmError::EmptyResponse))
    }
}

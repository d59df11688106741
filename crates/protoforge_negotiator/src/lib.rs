//! The Negotiator (spec.md §4.2, component C2): a (mostly) stateless evaluator
//! that prompts an LLM to produce or judge a protocol proposal. All history and
//! retry bookkeeping lives in the [`protoforge_session`](../protoforge_session/index.html)
//! driver, not here.

pub mod context;
pub mod prompts;

use std::sync::Arc;

use protoforge_extractor::{extract_fenced_block, extract_json_block};
use protoforge_llm::{ChatMessage, LlmClient};
use protoforge_types::{HistoryEntry, NegotiationError, NegotiationResult, ProtocolDocument, Role};
use serde::Deserialize;
use tracing::{instrument, warn};

pub use context::{CapabilityInfoCallback, EvaluationContext};

pub struct Negotiator {
    llm: Arc<dyn LlmClient>,
}

impl Negotiator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Drafts the first protocol proposal. Only ever called by the requester
    /// (spec.md §4.2).
    #[instrument(skip(self))]
    pub async fn generate_initial_protocol(
        &self,
        requirement: &str,
        input_description: &str,
        output_description: &str,
    ) -> Result<ProtocolDocument, NegotiationError> {
        let user_prompt = format!(
            "Requirement:\n{requirement}\n\nInput description:\n{input_description}\n\nOutput \
             description:\n{output_description}"
        );
        let text = self
            .llm
            .generate_response(prompts::PROTOCOL_DESIGNER_SYSTEM_PROMPT, &user_prompt, &[])
            .await
            .map_err(|err| NegotiationError::LlmError(err.to_string()))?;
        let protocol = text.trim();
        if protocol.is_empty() {
            return Err(NegotiationError::LlmError("protocol designer returned an empty document".into()));
        }
        Ok(ProtocolDocument::new(protocol))
    }

    /// Judges the peer's latest proposal and returns the agent's response plus
    /// the next outbound sequence id (`peer_round + 1`, spec.md §4.2).
    #[instrument(skip(self, context, previous_self_proposal, capability_info_callback))]
    pub async fn evaluate_protocol_proposal(
        &self,
        role: Role,
        mut context: EvaluationContext<'_>,
        previous_self_proposal: Option<&HistoryEntry>,
        peer_round: u32,
        peer_candidate: &ProtocolDocument,
        peer_modification_summary: &str,
        capability_info_callback: Option<&dyn CapabilityInfoCallback>,
    ) -> Result<(NegotiationResult, u32), NegotiationError> {
        let system_prompt = match role {
            Role::Requester => prompts::REQUESTER_NEGOTIATION_EXPERT_SYSTEM_PROMPT,
            Role::Provider => prompts::PROVIDER_NEGOTIATION_EXPERT_SYSTEM_PROMPT,
        };

        let mut user_prompt =
            render_user_prompt(&context, previous_self_proposal, peer_candidate, peer_modification_summary);
        let mut text = self
            .llm
            .generate_response(system_prompt, &user_prompt, &[])
            .await
            .map_err(|err| NegotiationError::LlmError(err.to_string()))?;

        if let (Role::Provider, Some(callback)) = (role, capability_info_callback) {
            if let Some(tool_call_json) = extract_fenced_block(&text, Some("tool_call")) {
                let request: ToolCallRequest = serde_json::from_str(&tool_call_json)
                    .map_err(|err| NegotiationError::LlmError(format!("bad tool_call block: {err}")))?;
                let answer = callback
                    .get_capability_info(
                        &request.requirement,
                        &request.input_description,
                        &request.output_description,
                    )
                    .await;
                if let EvaluationContext::Provider { capability_info_history } = &mut context {
                    capability_info_history.push(answer);
                }
                user_prompt = render_user_prompt(
                    &context,
                    previous_self_proposal,
                    peer_candidate,
                    peer_modification_summary,
                );
                text = self
                    .llm
                    .generate_response(system_prompt, &user_prompt, &[ChatMessage::new("assistant", text)])
                    .await
                    .map_err(|err| NegotiationError::LlmError(err.to_string()))?;
            }
        }

        let json_block = extract_json_block(&text)
            .ok_or_else(|| NegotiationError::LlmError("no fenced json block in LLM response".into()))?;
        let result: NegotiationResult = serde_json::from_str(&json_block)
            .map_err(|err| NegotiationError::LlmError(format!("malformed negotiation result: {err}")))?;
        result.validate().map_err(NegotiationError::LlmError)?;

        Ok((result, peer_round + 1))
    }
}

#[derive(Deserialize)]
struct ToolCallRequest {
    requirement: String,
    input_description: String,
    output_description: String,
}

fn render_user_prompt(
    context: &EvaluationContext<'_>,
    previous_self_proposal: Option<&HistoryEntry>,
    peer_candidate: &ProtocolDocument,
    peer_modification_summary: &str,
) -> String {
    let mut sections = Vec::new();
    match context {
        EvaluationContext::Requester { requirement, input_description, output_description } => {
            sections.push(format!(
                "Original requirement:\n{requirement}\n\nInput description:\n{input_description}\n\n\
                 Output description:\n{output_description}"
            ));
        }
        EvaluationContext::Provider { capability_info_history } => {
            if capability_info_history.is_empty() {
                sections.push("Capability info history: (none yet)".to_owned());
            } else {
                let joined = capability_info_history
                    .iter()
                    .enumerate()
                    .map(|(i, info)| format!("{}. {info}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n");
                sections.push(format!("Capability info history:\n{joined}"));
            }
        }
    }
    if let Some(entry) = previous_self_proposal {
        sections.push(format!(
            "Your previous proposal (round {}):\n{}",
            entry.round,
            entry.candidate_protocol.as_str()
        ));
    } else {
        warn!("evaluating a proposal with no prior self-authored proposal in history");
        sections.push("Your previous proposal: (none yet)".to_owned());
    }
    sections.push(format!(
        "Peer's latest proposal:\n{}\n\nPeer's modification summary:\n{peer_modification_summary}",
        peer_candidate.as_str()
    ));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use protoforge_llm::ScriptedLlmClient;
    use protoforge_types::{Author, NegotiationStatus};

    use super::*;

    #[tokio::test]
    async fn generates_initial_protocol_from_raw_text() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("# Protocol\n\nbody".to_owned())]));
        let negotiator = Negotiator::new(llm);
        let protocol =
            negotiator.generate_initial_protocol("echo", "{text:string}", "{text:string}").await.unwrap();
        assert_eq!(protocol.as_str(), "# Protocol\n\nbody");
    }

    #[tokio::test]
    async fn empty_initial_protocol_is_an_llm_error() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("   ".to_owned())]));
        let negotiator = Negotiator::new(llm);
        let result = negotiator.generate_initial_protocol("echo", "{}", "{}").await;
        assert!(matches!(result, Err(NegotiationError::LlmError(_))));
    }

    #[tokio::test]
    async fn evaluates_requester_acceptance() {
        let response = "```json\n{\"status\":\"accepted\",\"candidate_protocol\":\"\",\
                         \"modification_summary\":\"lgtm\"}\n```";
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(response.to_owned())]));
        let negotiator = Negotiator::new(llm);
        let previous = HistoryEntry::new(1, ProtocolDocument::new("P0"), "", Author::SelfAuthored);
        let (result, next_round) = negotiator
            .evaluate_protocol_proposal(
                Role::Requester,
                EvaluationContext::Requester {
                    requirement: "echo",
                    input_description: "{}",
                    output_description: "{}",
                },
                Some(&previous),
                2,
                &ProtocolDocument::new("P1"),
                "added userId",
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.status, NegotiationStatus::Accepted);
        assert_eq!(next_round, 3);
    }

    #[tokio::test]
    async fn malformed_json_is_an_llm_error() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("not json at all".to_owned())]));
        let negotiator = Negotiator::new(llm);
        let result = negotiator
            .evaluate_protocol_proposal(
                Role::Requester,
                EvaluationContext::Requester { requirement: "x", input_description: "x", output_description: "x" },
                None,
                2,
                &ProtocolDocument::new("P1"),
                "",
                None,
            )
            .await;
        assert!(matches!(result, Err(NegotiationError::LlmError(_))));
    }

    struct StaticCapabilityInfo;

    #[async_trait::async_trait]
    impl CapabilityInfoCallback for StaticCapabilityInfo {
        async fn get_capability_info(&self, _req: &str, _input: &str, _output: &str) -> String {
            "can handle echo requests up to 4KB".to_owned()
        }
    }

    #[tokio::test]
    async fn provider_resolves_tool_call_then_answers() {
        let tool_call = "```tool_call\n{\"tool\":\"get_capability_info\",\"requirement\":\"echo\",\
                          \"input_description\":\"{}\",\"output_description\":\"{}\"}\n```";
        let answer = "```json\n{\"status\":\"negotiating\",\"candidate_protocol\":\"P2\",\
                       \"modification_summary\":\"added size limit\"}\n```";
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(tool_call.to_owned()), Ok(answer.to_owned())]));
        let negotiator = Negotiator::new(llm);
        let mut history = Vec::new();
        let (result, next_round) = negotiator
            .evaluate_protocol_proposal(
                Role::Provider,
                EvaluationContext::Provider { capability_info_history: &mut history },
                None,
                1,
                &ProtocolDocument::new("P1"),
                "",
                Some(&StaticCapabilityInfo),
            )
            .await
            .unwrap();
        assert_eq!(result.status, NegotiationStatus::Negotiating);
        assert_eq!(next_round, 2);
        assert_eq!(history, vec!["can handle echo requests up to 4KB".to_owned()]);
    }
}

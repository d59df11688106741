use async_trait::async_trait;

/// Host-supplied capability lookup (spec.md §6, provider only). The Negotiator
/// resolves the LLM's `get_capability_info` tool call by invoking this and
/// appending the answer to the session's `capability_info_history`.
#[async_trait]
pub trait CapabilityInfoCallback: Send + Sync {
    async fn get_capability_info(
        &self,
        requirement: &str,
        input_description: &str,
        output_description: &str,
    ) -> String;
}

/// The role-specific context `evaluate_protocol_proposal` needs, kept by the
/// Session and passed in by reference every round so the Negotiator itself stays
/// stateless over explicit inputs (spec.md §4.2 design rationale).
pub enum EvaluationContext<'a> {
    Requester { requirement: &'a str, input_description: &'a str, output_description: &'a str },
    Provider { capability_info_history: &'a mut Vec<String> },
}

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolDocument;
use crate::status::NegotiationStatus;

/// The strictly validated output of one LLM evaluation round (spec.md §3).
///
/// Invariant: `candidate_protocol` is non-empty iff `status == Negotiating`. This
/// is enforced by [`NegotiationResult::validate`], which the Negotiator calls on
/// every parsed LLM response before handing it back to the session; a violation
/// is treated the same as an unparseable response (`NegotiationError::LlmError`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NegotiationResult {
    pub status: NegotiationStatus,
    pub candidate_protocol: ProtocolDocument,
    pub modification_summary: String,
}

impl NegotiationResult {
    pub fn validate(&self) -> Result<(), String> {
        let is_negotiating = self.status == NegotiationStatus::Negotiating;
        let has_candidate = !self.candidate_protocol.is_empty();
        if is_negotiating != has_candidate {
            return Err(format!(
                "candidate_protocol must be non-empty iff status==negotiating (status={:?}, \
                 candidate_protocol.is_empty()={})",
                self.status,
                self.candidate_protocol.is_empty()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiating_requires_candidate() {
        let result = NegotiationResult {
            status: NegotiationStatus::Negotiating,
            candidate_protocol: ProtocolDocument::empty(),
            modification_summary: String::new(),
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn accepted_forbids_candidate() {
        let result = NegotiationResult {
            status: NegotiationStatus::Accepted,
            candidate_protocol: ProtocolDocument::new("leftover"),
            modification_summary: "ok".to_owned(),
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn accepted_with_empty_candidate_is_valid() {
        let result = NegotiationResult {
            status: NegotiationStatus::Accepted,
            candidate_protocol: ProtocolDocument::empty(),
            modification_summary: "lgtm".to_owned(),
        };
        assert!(result.validate().is_ok());
    }
}

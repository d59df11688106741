use serde::{Deserialize, Serialize};

/// The three states a negotiation can be in. `Accepted` and `Rejected` are terminal:
/// once a session reaches either, it never emits or accepts another
/// [`crate::ProtocolNegotiationFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Negotiating,
    Accepted,
    Rejected,
}

impl NegotiationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationStatus::Accepted | NegotiationStatus::Rejected)
    }
}

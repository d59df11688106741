use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolDocument;

/// Who authored a [`HistoryEntry`]: the local session driver, or the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    #[serde(rename = "self")]
    SelfAuthored,
    Peer,
}

/// One entry in a session's append-only negotiation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round: u32,
    pub candidate_protocol: ProtocolDocument,
    pub modification_summary: String,
    pub authored_by: Author,
}

impl HistoryEntry {
    pub fn new(
        round: u32,
        candidate_protocol: ProtocolDocument,
        modification_summary: impl Into<String>,
        authored_by: Author,
    ) -> Self {
        Self { round, candidate_protocol, modification_summary: modification_summary.into(), authored_by }
    }
}

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolDocument;
use crate::status::NegotiationStatus;

/// A `PROTOCOL_NEGOTIATION` wire frame.
///
/// Field names are preserved case-sensitively (`camelCase`) across the wire so
/// that peers built independently from this specification can interoperate
/// (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolNegotiationFrame {
    pub sequence_id: u32,
    pub candidate_protocols: ProtocolDocument,
    pub status: NegotiationStatus,
    pub modification_summary: String,
}

/// A `CODE_GENERATION` wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGenerationFrame {
    pub success: bool,
}

/// Every frame kind the wire format can carry, tagged by `messageType`. The three
/// reserved kinds are acknowledged on receipt (logged) but never driven by the
/// core state machine — see spec.md §9 "Reserved frame kinds".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum NegotiationFrame {
    #[serde(rename = "PROTOCOL_NEGOTIATION")]
    ProtocolNegotiation(ProtocolNegotiationFrame),
    #[serde(rename = "CODE_GENERATION")]
    CodeGeneration(CodeGenerationFrame),
    #[serde(rename = "TEST_CASES_NEGOTIATION")]
    TestCasesNegotiation(serde_json::Value),
    #[serde(rename = "FIX_ERROR_NEGOTIATION")]
    FixErrorNegotiation(serde_json::Value),
    #[serde(rename = "NATURAL_LANGUAGE_NEGOTIATION")]
    NaturalLanguageNegotiation(serde_json::Value),
}

impl NegotiationFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            NegotiationFrame::ProtocolNegotiation(_) => "PROTOCOL_NEGOTIATION",
            NegotiationFrame::CodeGeneration(_) => "CODE_GENERATION",
            NegotiationFrame::TestCasesNegotiation(_) => "TEST_CASES_NEGOTIATION",
            NegotiationFrame::FixErrorNegotiation(_) => "FIX_ERROR_NEGOTIATION",
            NegotiationFrame::NaturalLanguageNegotiation(_) => "NATURAL_LANGUAGE_NEGOTIATION",
        }
    }
}

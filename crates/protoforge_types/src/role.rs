use serde::{Deserialize, Serialize};

/// Which side of the negotiation a session plays. The requester drives the
/// requirement and I/O descriptions; the provider drives capability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Provider,
}

impl Role {
    /// The sequence id of this role's first outbound `PROTOCOL_NEGOTIATION` frame.
    /// Requester starts at 1, provider's first reply is 2 (spec.md §9, open question b).
    pub fn first_sequence_id(self) -> u32 {
        match self {
            Role::Requester => 1,
            Role::Provider => 2,
        }
    }

    pub fn other(self) -> Role {
        match self {
            Role::Requester => Role::Provider,
            Role::Provider => Role::Requester,
        }
    }
}

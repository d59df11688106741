use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque string authenticating a peer (Decentralized Identifier). The engine
/// never inspects its structure; it is the multiplexer's session-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Did {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Did {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

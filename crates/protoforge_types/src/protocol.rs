use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// An opaque UTF-8 Markdown protocol document: a Requirements section, a Protocol
/// Flow, JSON-Schema-described request/response messages, and an Error table.
///
/// The engine never parses this; only the Negotiator's LLM prompts inspect its
/// semantics. It is wrapped in a newtype (rather than passed around as bare
/// `String`) so it can't be silently confused with a modification summary or a
/// capability-info string, both of which are also free-form `String`s in this
/// domain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolDocument(String);

impl ProtocolDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ProtocolDocument {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProtocolDocument {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ProtocolDocument {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

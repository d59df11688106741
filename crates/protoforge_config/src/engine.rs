use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dumping::{ser_param, ParamPath, ParamPrivacy, SerializeConfig, SerializedParam};

const DEFAULT_MAX_ROUNDS: u32 = 10;
const DEFAULT_LLM_RETRIES: usize = 2;
const DEFAULT_ROUND_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CODE_GEN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INBOX_CAPACITY: usize = 16;

/// Threaded into every [`protoforge_session`](../protoforge_session/index.html) `Session`
/// instead of the module-level constants the original kept (spec.md §9: "the
/// systems rewrite... becomes an explicit `EngineConfig`").
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EngineConfig {
    /// Hard cap on `selfRound` before a session gives up and sends `REJECTED`
    /// (spec.md §4.3 step 3).
    #[validate(range(min = 1))]
    pub max_rounds: u32,
    /// How many times a malformed/unparseable LLM response is retried before the
    /// session fails (spec.md §7 `LLM_ERROR`).
    pub llm_retries: usize,
    /// How long the driver waits on its inbox for the next frame before failing
    /// with `TIMEOUT` (spec.md §5).
    #[serde(with = "duration_secs")]
    pub round_timeout: Duration,
    /// Wall-clock bound on a single LLM call (spec.md §5).
    #[serde(with = "duration_secs")]
    pub llm_timeout: Duration,
    /// Wall-clock bound on waiting for the peer's `CODE_GENERATION` ack
    /// (spec.md §4.3).
    #[serde(with = "duration_secs")]
    pub code_gen_timeout: Duration,
    /// Bounded channel capacity for a session's inbox and code-gen inbox
    /// (spec.md §5: "capacity >= 1, 16 recommended").
    #[validate(range(min = 1))]
    pub inbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            llm_retries: DEFAULT_LLM_RETRIES,
            round_timeout: Duration::from_secs(DEFAULT_ROUND_TIMEOUT_SECS),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            code_gen_timeout: Duration::from_secs(DEFAULT_CODE_GEN_TIMEOUT_SECS),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl SerializeConfig for EngineConfig {
    fn dump(&self) -> BTreeMap<ParamPath, SerializedParam> {
        BTreeMap::from_iter([
            ser_param(
                "max_rounds",
                &self.max_rounds,
                "Hard cap on outbound negotiation rounds before a session is treated as a \
                 convergence failure.",
                ParamPrivacy::Public,
            ),
            ser_param(
                "llm_retries",
                &self.llm_retries,
                "Retries allowed for a malformed/unparseable LLM response before the session \
                 fails.",
                ParamPrivacy::Public,
            ),
            ser_param(
                "round_timeout_secs",
                &self.round_timeout.as_secs(),
                "Seconds to wait for the next inbound frame before timing out.",
                ParamPrivacy::Public,
            ),
            ser_param(
                "llm_timeout_secs",
                &self.llm_timeout.as_secs(),
                "Seconds to wait for a single LLM call before counting it as a retry.",
                ParamPrivacy::Public,
            ),
            ser_param(
                "code_gen_timeout_secs",
                &self.code_gen_timeout.as_secs(),
                "Seconds to wait for the peer's code-generation acknowledgement.",
                ParamPrivacy::Public,
            ),
            ser_param(
                "inbox_capacity",
                &self.inbox_capacity,
                "Bounded channel capacity for a session's inbound frame queues.",
                ParamPrivacy::Public,
            ),
        ])
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_rounds_is_rejected() {
        let mut config = EngineConfig::default();
        config.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn dump_includes_every_field() {
        let dump = EngineConfig::default().dump();
        assert!(dump.contains_key("max_rounds"));
        assert!(dump.contains_key("llm_retries"));
        assert!(dump.contains_key("round_timeout_secs"));
        assert!(dump.contains_key("llm_timeout_secs"));
        assert!(dump.contains_key("code_gen_timeout_secs"));
        assert!(dump.contains_key("inbox_capacity"));
    }
}

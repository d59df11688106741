//! A trimmed re-derivation of the teacher's configuration-dumping format
//! (`apollo_config::dumping`): every config struct can describe itself as a flat
//! map of `path -> {description, value}`, suitable for emitting a documented
//! default-config JSON file alongside the binary.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

pub type ParamPath = String;

/// Whether a config value may be safely echoed into a dumped config file (e.g. in
/// logs or support bundles) or must be treated as a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPrivacy {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerializedParam {
    pub description: String,
    pub privacy: ParamPrivacy,
    pub value: Value,
}

/// Implemented by every config struct so it can be flattened into a documented
/// parameter map, mirroring `apollo_config::dumping::SerializeConfig`.
pub trait SerializeConfig {
    fn dump(&self) -> BTreeMap<ParamPath, SerializedParam>;
}

/// Builds one entry of a dumped config map. Mirrors `apollo_config::dumping::ser_param`.
pub fn ser_param<T: Serialize>(
    name: &str,
    value: &T,
    description: &str,
    privacy: ParamPrivacy,
) -> (ParamPath, SerializedParam) {
    (name.to_owned(), SerializedParam { description: description.to_owned(), privacy, value: json!(value) })
}

/// Prefixes every key in a sub-config's dump with `prefix.`, for composing nested
/// configs the way `apollo_config::dumping::prepend_sub_config_name` does.
pub fn prepend_sub_config_name(
    dump: BTreeMap<ParamPath, SerializedParam>,
    prefix: &str,
) -> BTreeMap<ParamPath, SerializedParam> {
    dump.into_iter().map(|(path, param)| (format!("{prefix}.{path}"), param)).collect()
}

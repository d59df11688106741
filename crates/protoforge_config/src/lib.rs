//! Engine configuration for the meta-protocol negotiator, following the teacher's
//! `apollo_config` dumping conventions (see [`dumping`]).

pub mod dumping;
pub mod engine;

pub use engine::EngineConfig;

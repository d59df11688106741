//! Domain and wire types for the meta-protocol negotiator.
//!
//! This crate is intentionally free of I/O: it describes the shapes that flow
//! between the session driver and its peer, and the errors the engine can raise.
//! Nothing here calls an LLM, touches a socket, or spawns a task.

pub mod did;
pub mod errors;
pub mod frame;
pub mod history;
pub mod protocol;
pub mod result;
pub mod role;
pub mod status;

pub use did::Did;
pub use errors::NegotiationError;
pub use frame::{CodeGenerationFrame, NegotiationFrame, ProtocolNegotiationFrame};
pub use history::{Author, HistoryEntry};
pub use protocol::ProtocolDocument;
pub use result::NegotiationResult;
pub use role::Role;
pub use status::NegotiationStatus;

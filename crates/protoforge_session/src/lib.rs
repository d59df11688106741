//! The meta-protocol session (spec.md §3, §4.3, component C3): the hard part.
//! Owns the per-peer state machine — proposing, evaluating, converging or
//! failing, then the code-generation handshake — driven by a single task for
//! the session's entire lifetime.

mod session;

pub use session::{Session, SessionHandle, SessionOutcome};

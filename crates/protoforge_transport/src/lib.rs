//! The transport contract (spec.md §6, component C6). The real DID-based
//! identity handshake and WebSocket byte-plumbing are explicit non-goals
//! (spec.md §1); this crate pins the trait boundary the core calls through,
//! an in-memory stand-in for tests ([`mock::InMemoryTransport`]), and a
//! length-delimited TCP adapter for the demo binaries ([`tcp::TcpTransport`])
//! that fakes just enough peer identification to drive the demos end to end.

pub mod mock;
pub mod tcp;

use async_trait::async_trait;
use protoforge_types::Did;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("transport closed")]
    Closed,
}

/// A duplex, ordered, framed byte channel to one authenticated peer. Each
/// `send` call is one logical frame; the transport is responsible for framing on
/// the wire (spec.md §6).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// The peer this transport is connected to, for logging and as the
    /// multiplexer's session-map key.
    fn peer(&self) -> &Did;
}

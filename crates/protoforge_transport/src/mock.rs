use async_trait::async_trait;
use protoforge_types::Did;
use tokio::sync::mpsc;

use crate::{Transport, TransportError};

/// An in-memory transport pair for tests: sending on one half enqueues onto the
/// other half's channel. Plays the same non-production stand-in role the
/// teacher's `NoopComponentClient` plays for its component-client family.
pub struct InMemoryTransport {
    peer: Did,
    tx: mpsc::Sender<Vec<u8>>,
}

impl InMemoryTransport {
    /// Builds a connected pair: `(a, a_inbound)` and `(b, b_inbound)`, where
    /// sending on `a` delivers to `b_inbound` and vice versa.
    pub fn pair(
        self_did: Did,
        peer_did: Did,
        capacity: usize,
    ) -> ((Self, mpsc::Receiver<Vec<u8>>), (Self, mpsc::Receiver<Vec<u8>>)) {
        let (tx_a_to_b, rx_b) = mpsc::channel(capacity);
        let (tx_b_to_a, rx_a) = mpsc::channel(capacity);
        let a = Self { peer: peer_did.clone(), tx: tx_a_to_b };
        let b = Self { peer: self_did, tx: tx_b_to_a };
        ((a, rx_a), (b, rx_b))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    fn peer(&self) -> &Did {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_frames_to_the_other_half() {
        let ((a, _a_rx), (b, mut b_rx)) =
            InMemoryTransport::pair(Did::new("alice"), Did::new("bob"), 4);
        a.send(b"hello".to_vec()).await.unwrap();
        assert_eq!(b_rx.recv().await.unwrap(), b"hello".to_vec());
        assert_eq!(b.peer().as_str(), "alice");
    }
}

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use protoforge_types::Did;
use tokio::net::TcpStream;
use tokio::net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{info, warn};

use crate::{Transport, TransportError};

/// A TCP-backed [`Transport`] for the demo binaries (§6 "CLI surface... not
/// core"). Frames are length-delimited (`tokio_util::codec::LengthDelimitedCodec`)
/// so the multiplexer on the far end sees exactly one logical frame per `send`.
///
/// The DID-based identity handshake that would authenticate this channel is an
/// explicit non-goal of the core (spec.md §1); this adapter performs only the
/// bare minimum a demo needs to know *which* peer it is talking to — each side
/// sends its own DID as the first frame before negotiation traffic starts. It
/// is not a substitute for real peer authentication.
pub struct TcpTransport {
    peer: Did,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>,
}

impl TcpTransport {
    /// Connects to `addr`, exchanges DIDs, and spawns the background task that
    /// forwards inbound frames to the returned receiver. Mirrors
    /// [`crate::mock::InMemoryTransport::pair`]'s shape: a transport handle plus
    /// a channel the caller drains to learn of inbound bytes.
    pub async fn connect(
        addr: &str,
        self_did: &Did,
    ) -> Result<(Self, mpsc::Receiver<Vec<u8>>), TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| TransportError::SendFailed(format!("connect to {addr}: {err}")))?;
        Self::handshake(stream, self_did).await
    }

    /// Accepts one connection on an already-bound listener and performs the
    /// same DID exchange as [`Self::connect`].
    pub async fn accept(
        listener: &tokio::net::TcpListener,
        self_did: &Did,
    ) -> Result<(Self, mpsc::Receiver<Vec<u8>>), TransportError> {
        let (stream, peer_addr) = listener
            .accept()
            .await
            .map_err(|err| TransportError::SendFailed(format!("accept: {err}")))?;
        info!(%peer_addr, "accepted inbound connection");
        Self::handshake(stream, self_did).await
    }

    async fn handshake(
        stream: TcpStream,
        self_did: &Did,
    ) -> Result<(Self, mpsc::Receiver<Vec<u8>>), TransportError> {
        let (read_half, write_half) = stream.into_split();
        let mut writer = FramedWrite::new(write_half, LengthDelimitedCodec::new());
        let mut reader = FramedRead::new(read_half, LengthDelimitedCodec::new());

        writer
            .send(Bytes::copy_from_slice(self_did.as_str().as_bytes()))
            .await
            .map_err(|err| TransportError::SendFailed(format!("DID handshake send: {err}")))?;
        let peer_frame = reader
            .next()
            .await
            .ok_or(TransportError::Closed)?
            .map_err(|err| TransportError::SendFailed(format!("DID handshake recv: {err}")))?;
        let peer = Did::new(String::from_utf8_lossy(&peer_frame).into_owned());

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(forward_inbound_frames(reader, tx));

        Ok((Self { peer, writer: Mutex::new(writer) }, rx))
    }
}

async fn forward_inbound_frames(
    mut reader: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    tx: mpsc::Sender<Vec<u8>>,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(bytes) => {
                if tx.send(bytes.to_vec()).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "tcp transport read error; closing inbound forwarding");
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .send(Bytes::from(frame))
            .await
            .map_err(|err| TransportError::SendFailed(err.to_string()))
    }

    fn peer(&self) -> &Did {
        &self.peer
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn handshake_exchanges_dids_and_frames_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            TcpTransport::accept(&listener, &Did::new("provider")).await.unwrap()
        });
        let (client, mut client_rx) =
            TcpTransport::connect(&addr.to_string(), &Did::new("requester")).await.unwrap();
        let (server_transport, mut server_rx) = server.await.unwrap();

        assert_eq!(client.peer().as_str(), "provider");
        assert_eq!(server_transport.peer().as_str(), "requester");

        client.send(b"hello".to_vec()).await.unwrap();
        assert_eq!(server_rx.recv().await.unwrap(), b"hello".to_vec());

        server_transport.send(b"world".to_vec()).await.unwrap();
        assert_eq!(client_rx.recv().await.unwrap(), b"world".to_vec());
    }
}

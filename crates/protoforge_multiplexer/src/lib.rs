//! The Session Multiplexer (spec.md §4.4, component C4): routes inbound wire
//! frames from one transport onto the correct per-peer [`protoforge_session::Session`],
//! and removes a peer's entry once its session tears down.
//!
//! Mirrors the teacher's `ComponentCommunication<T>` tx/rx-pair ownership idiom
//! (`apollo_infra::component_definitions`): the multiplexer hands each session a
//! pair of bounded `mpsc::Sender`s at construction and never touches the
//! session's internals again, only its handle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use protoforge_session::SessionHandle;
use protoforge_types::{Did, NegotiationFrame};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Host hook invoked the first time a frame arrives from a DID with no
/// registered session (spec.md §4.4). Returns the [`SessionHandle`] for a
/// freshly constructed, already-spawned provider-role `Session`.
#[async_trait]
pub trait NewProviderSessionCallback: Send + Sync {
    async fn new_provider_session(&self, peer: &Did) -> SessionHandle;
}

/// Routes decoded frames from one transport's receive loop to the session
/// registered for their originating peer (spec.md §4.4). The registry is the
/// only state shared across sessions, and it is mutated solely under its mutex
/// on registration and reaping (spec.md §5).
pub struct SessionMultiplexer {
    sessions: Mutex<HashMap<Did, SessionHandle>>,
    new_provider_session: Arc<dyn NewProviderSessionCallback>,
}

impl SessionMultiplexer {
    pub fn new(new_provider_session: Arc<dyn NewProviderSessionCallback>) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), new_provider_session }
    }

    /// Registers a session this process initiated itself (the requester side,
    /// which creates its session before the peer has sent anything rather than
    /// waiting for [`NewProviderSessionCallback`]).
    pub async fn register(&self, peer: Did, handle: SessionHandle) {
        self.sessions.lock().await.insert(peer, handle);
    }

    /// Decodes one inbound frame and dispatches it by `messageType` (spec.md
    /// §4.4, §6). Unknown/undecodable bytes and the three reserved negotiation
    /// kinds are logged and dropped; they are never delivered to a session.
    #[instrument(skip(self, raw), fields(peer = %peer))]
    pub async fn dispatch(&self, peer: Did, raw: &[u8]) {
        let frame: NegotiationFrame = match serde_json::from_slice(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping frame with unknown or undecodable messageType");
                return;
            }
        };

        match frame {
            NegotiationFrame::ProtocolNegotiation(inner) => {
                if let Some(negotiation_tx) = self.negotiation_sender_for(&peer).await {
                    if negotiation_tx.send(inner).await.is_err() {
                        debug!("session's negotiation inbox already closed; dropping frame");
                    }
                }
            }
            NegotiationFrame::CodeGeneration(inner) => {
                let codegen_tx = {
                    let sessions = self.sessions.lock().await;
                    sessions.get(&peer).map(|handle| handle.codegen_tx.clone())
                };
                match codegen_tx {
                    Some(codegen_tx) => {
                        if codegen_tx.send(inner).await.is_err() {
                            debug!("session's code-gen inbox already closed; dropping frame");
                        }
                    }
                    None => warn!("code-generation frame for a peer with no registered session"),
                }
            }
            NegotiationFrame::TestCasesNegotiation(_)
            | NegotiationFrame::FixErrorNegotiation(_)
            | NegotiationFrame::NaturalLanguageNegotiation(_) => {
                info!(kind = frame.kind(), "acknowledging reserved frame kind; no handler yet");
            }
        }
    }

    /// Looks up the session registered for `peer`, invoking the provider-session
    /// callback and registering its handle on first contact (spec.md §4.4).
    /// Returns a cloned sender rather than a borrow so the registry mutex is
    /// released before the caller awaits the send (no `await_holding_lock`).
    async fn negotiation_sender_for(
        &self,
        peer: &Did,
    ) -> Option<tokio::sync::mpsc::Sender<protoforge_types::ProtocolNegotiationFrame>> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(peer) {
            let handle = self.new_provider_session.new_provider_session(peer).await;
            sessions.insert(peer.clone(), handle);
        }
        sessions.get(peer).map(|handle| handle.negotiation_tx.clone())
    }

    /// Removes `peer`'s entry once its session has torn down. Callers should
    /// await the session's `disposed_rx` and then call this; the multiplexer
    /// itself does not poll for termination.
    pub async fn reap(&self, peer: &Did) {
        if self.sessions.lock().await.remove(peer).is_some() {
            debug!(peer = %peer, "reaped terminated session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use protoforge_codegen::StubCodeGenerator;
    use protoforge_config::EngineConfig;
    use protoforge_llm::ScriptedLlmClient;
    use protoforge_negotiator::Negotiator;
    use protoforge_session::Session;
    use protoforge_transport::mock::InMemoryTransport;
    use protoforge_types::{NegotiationStatus, ProtocolDocument, ProtocolNegotiationFrame, Role};

    use super::*;

    struct SpawningCallback {
        code_path: PathBuf,
    }

    #[async_trait]
    impl NewProviderSessionCallback for SpawningCallback {
        async fn new_provider_session(&self, peer: &Did) -> SessionHandle {
            let (transport, _rx) = InMemoryTransport::pair(Did::new("self"), peer.clone(), 16).0;
            let negotiator = Arc::new(Negotiator::new(Arc::new(ScriptedLlmClient::new(vec![Ok(
                "```json\n{\"status\":\"accepted\",\"candidate_protocol\":\"\",\"modification_summary\":\"ok\"}\n```".to_owned(),
            )]))));
            let config = EngineConfig { round_timeout: Duration::from_millis(200), ..EngineConfig::default() };
            let (session, handle) = Session::new(
                Role::Provider,
                Arc::new(transport),
                negotiator,
                Arc::new(StubCodeGenerator),
                None,
                config,
                self.code_path.clone(),
            );
            tokio::spawn(session.wait_remote_negotiation());
            handle
        }
    }

    #[tokio::test]
    async fn routes_protocol_negotiation_frame_to_a_freshly_registered_session() {
        let dir = tempfile::tempdir().unwrap();
        let multiplexer =
            SessionMultiplexer::new(Arc::new(SpawningCallback { code_path: dir.path().to_path_buf() }));
        let peer = Did::new("alice");

        let frame = NegotiationFrame::ProtocolNegotiation(ProtocolNegotiationFrame {
            sequence_id: 1,
            candidate_protocols: ProtocolDocument::new("# Protocol\n"),
            status: NegotiationStatus::Negotiating,
            modification_summary: String::new(),
        });
        let raw = serde_json::to_vec(&frame).unwrap();

        multiplexer.dispatch(peer.clone(), &raw).await;
        // Second dispatch reuses the already-registered session rather than
        // invoking the callback again.
        multiplexer.dispatch(peer, &raw).await;
    }

    #[tokio::test]
    async fn unknown_message_type_is_dropped_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let multiplexer =
            SessionMultiplexer::new(Arc::new(SpawningCallback { code_path: dir.path().to_path_buf() }));
        multiplexer.dispatch(Did::new("bob"), b"{\"messageType\":\"SOMETHING_ELSE\"}").await;
    }

    #[tokio::test]
    async fn reaps_unregistered_peer_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let multiplexer =
            SessionMultiplexer::new(Arc::new(SpawningCallback { code_path: dir.path().to_path_buf() }));
        multiplexer.reap(&Did::new("nobody")).await;
    }
}

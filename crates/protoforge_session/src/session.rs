use std::path::PathBuf;
use std::sync::Arc;

use protoforge_codegen::CodeGenerator;
use protoforge_config::EngineConfig;
use protoforge_negotiator::{CapabilityInfoCallback, EvaluationContext, Negotiator};
use protoforge_transport::Transport;
use protoforge_types::{
    Author, CodeGenerationFrame, HistoryEntry, NegotiationError, NegotiationFrame, NegotiationStatus,
    ProtocolDocument, ProtocolNegotiationFrame, Role,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// The result every session run terminates with (spec.md §4.3, §7): the engine
/// never surfaces a typed error to its caller, only this tuple plus whatever it
/// logged along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub success: bool,
    pub module_path: Option<PathBuf>,
}

impl SessionOutcome {
    fn failure() -> Self {
        Self { success: false, module_path: None }
    }
}

/// The channel endpoints a [`crate::multiplexer`]-like router holds to feed a
/// running session, plus a signal the router polls to reap it once terminated.
/// Mirrors the teacher's `ComponentCommunication<T>` tx/rx-pair split between the
/// component and whoever drives its transport.
pub struct SessionHandle {
    pub negotiation_tx: mpsc::Sender<ProtocolNegotiationFrame>,
    pub codegen_tx: mpsc::Sender<CodeGenerationFrame>,
    pub disposed_rx: oneshot::Receiver<()>,
}

/// Per-peer negotiation session (spec.md §3, component C3). Owned and driven by
/// exactly one task for its entire lifetime; `negotiate_protocol` and
/// `wait_remote_negotiation` both consume `self` because a session is single-use,
/// torn down once it reaches a terminal status and completes (or fails) the
/// code-generation handshake.
pub struct Session {
    role: Role,
    transport: Arc<dyn Transport>,
    negotiator: Arc<Negotiator>,
    codegen: Arc<dyn CodeGenerator>,
    capability_info_callback: Option<Arc<dyn CapabilityInfoCallback>>,
    config: EngineConfig,
    code_path: PathBuf,
    negotiation_inbox: mpsc::Receiver<ProtocolNegotiationFrame>,
    codegen_inbox: mpsc::Receiver<CodeGenerationFrame>,
    disposed_tx: oneshot::Sender<()>,

    history: Vec<HistoryEntry>,
    /// `sequenceId` of the last `PROTOCOL_NEGOTIATION` frame this side sent.
    self_round: u32,
    /// `sequenceId` of the last `PROTOCOL_NEGOTIATION` frame accepted from the peer.
    peer_round: u32,
    status: NegotiationStatus,
    agreed_protocol: Option<ProtocolDocument>,
    capability_info_history: Vec<String>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: Role,
        transport: Arc<dyn Transport>,
        negotiator: Arc<Negotiator>,
        codegen: Arc<dyn CodeGenerator>,
        capability_info_callback: Option<Arc<dyn CapabilityInfoCallback>>,
        config: EngineConfig,
        code_path: PathBuf,
    ) -> (Self, SessionHandle) {
        let (negotiation_tx, negotiation_inbox) = mpsc::channel(config.inbox_capacity);
        // Capacity 1: exactly one CODE_GENERATION frame is ever sent per session,
        // after negotiation is terminal (spec.md §9 "event-based code-generation ack").
        let (codegen_tx, codegen_inbox) = mpsc::channel(1);
        let (disposed_tx, disposed_rx) = oneshot::channel();
        let session = Self {
            role,
            transport,
            negotiator,
            codegen,
            capability_info_callback,
            config,
            code_path,
            negotiation_inbox,
            codegen_inbox,
            disposed_tx,
            history: Vec::new(),
            self_round: 0,
            peer_round: 0,
            status: NegotiationStatus::Negotiating,
            agreed_protocol: None,
            capability_info_history: Vec::new(),
        };
        let handle = SessionHandle { negotiation_tx, codegen_tx, disposed_rx };
        (session, handle)
    }

    /// Requester entry point (spec.md §4.3). Drafts and sends the first proposal,
    /// then drives the round loop to a terminal status before handing off to the
    /// code-generation handshake.
    #[instrument(skip(self), fields(role = ?self.role))]
    pub async fn negotiate_protocol(
        mut self,
        requirement: &str,
        input_description: &str,
        output_description: &str,
    ) -> SessionOutcome {
        assert!(matches!(self.role, Role::Requester), "negotiate_protocol is the requester entry point");

        let protocol = match self.call_generate_initial_protocol(requirement, input_description, output_description).await {
            Some(protocol) => protocol,
            None => {
                warn!("requester failed to produce an initial protocol; no peer to notify yet");
                self.status = NegotiationStatus::Rejected;
                self.finish_disposed();
                return SessionOutcome::failure();
            }
        };

        self.history.push(HistoryEntry::new(1, protocol.clone(), "", Author::SelfAuthored));
        if let Err(err) = self.send_negotiation(1, protocol, NegotiationStatus::Negotiating, String::new()).await {
            warn!(error = %err, "failed to send initial proposal");
            self.status = NegotiationStatus::Rejected;
            self.finish_disposed();
            return SessionOutcome::failure();
        }

        let context_seed = RequesterSeed { requirement, input_description, output_description };
        if let Err(err) = self.run_round_loop(DriverContext::Requester(context_seed)).await {
            self.handle_round_loop_error(err).await;
        }
        let outcome = self.run_codegen_handshake().await;
        self.finish_disposed();
        outcome
    }

    /// Provider entry point (spec.md §4.3). Waits for the requester's first
    /// proposal before making any LLM call.
    #[instrument(skip(self), fields(role = ?self.role))]
    pub async fn wait_remote_negotiation(mut self) -> SessionOutcome {
        assert!(matches!(self.role, Role::Provider), "wait_remote_negotiation is the provider entry point");

        if let Err(err) = self.run_round_loop(DriverContext::Provider).await {
            self.handle_round_loop_error(err).await;
        }
        let outcome = self.run_codegen_handshake().await;
        self.finish_disposed();
        outcome
    }

    fn finish_disposed(self) {
        let _ = self.disposed_tx.send(());
    }

    async fn call_generate_initial_protocol(
        &self,
        requirement: &str,
        input_description: &str,
        output_description: &str,
    ) -> Option<ProtocolDocument> {
        for attempt in 0..=self.config.llm_retries {
            let call = self.negotiator.generate_initial_protocol(requirement, input_description, output_description);
            match timeout(self.config.llm_timeout, call).await {
                Ok(Ok(protocol)) => return Some(protocol),
                Ok(Err(err)) => warn!(attempt, error = %err, "initial protocol generation failed"),
                Err(_) => warn!(attempt, "initial protocol generation timed out"),
            }
        }
        None
    }

    /// Drives the session from its current state to a terminal [`NegotiationStatus`].
    /// `Ok(())` covers every path that reached a terminal status on its own terms
    /// (peer acceptance, peer rejection, or this side's own evaluator rejecting).
    /// `Err` carries the taxonomy from spec.md §7 for everything else — protocol
    /// error, round/LLM timeout, LLM-retry exhaustion, or convergence failure — and
    /// the caller, not this function, decides whether the peer gets notified
    /// (via [`NegotiationError::notifies_peer`]).
    async fn run_round_loop(&mut self, mut context: DriverContext<'_>) -> Result<(), NegotiationError> {
        loop {
            let frame = match timeout(self.config.round_timeout, self.negotiation_inbox.recv()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.status = NegotiationStatus::Rejected;
                    return Err(NegotiationError::TransportError("peer transport closed mid-negotiation".to_owned()));
                }
                Err(_) => {
                    self.status = NegotiationStatus::Rejected;
                    return Err(NegotiationError::Timeout("inbound negotiation frame"));
                }
            };

            // Strict ping-pong: the peer's reply to our last frame is expected at
            // exactly `self_round + 1` (the shared, alternating wire counter), not
            // `peer_round + 1` — the latter would reject every legitimate reply,
            // since the two sides' sequenceIds interleave (spec.md §8 invariant 2).
            if frame.sequence_id <= self.peer_round {
                info!(sequence_id = frame.sequence_id, peer_round = self.peer_round, "dropping duplicate frame");
                continue;
            }
            if frame.sequence_id > self.self_round + 1 {
                self.status = NegotiationStatus::Rejected;
                return Err(NegotiationError::ProtocolError(format!(
                    "out-of-sequence frame: sequence_id={} self_round={}",
                    frame.sequence_id, self.self_round
                )));
            }
            self.peer_round = frame.sequence_id;

            match frame.status {
                NegotiationStatus::Accepted => {
                    self.history.push(HistoryEntry::new(
                        frame.sequence_id,
                        ProtocolDocument::empty(),
                        frame.modification_summary,
                        Author::Peer,
                    ));
                    self.agreed_protocol = self.last_self_authored_candidate();
                    self.status = NegotiationStatus::Accepted;
                    return Ok(());
                }
                NegotiationStatus::Rejected => {
                    self.history.push(HistoryEntry::new(
                        frame.sequence_id,
                        ProtocolDocument::empty(),
                        frame.modification_summary,
                        Author::Peer,
                    ));
                    self.status = NegotiationStatus::Rejected;
                    return Ok(());
                }
                NegotiationStatus::Negotiating => {
                    self.history.push(HistoryEntry::new(
                        frame.sequence_id,
                        frame.candidate_protocols.clone(),
                        frame.modification_summary.clone(),
                        Author::Peer,
                    ));

                    let next_seq = self.peer_round + 1;
                    if next_seq > self.config.max_rounds {
                        self.status = NegotiationStatus::Rejected;
                        return Err(NegotiationError::ConvergenceFailure);
                    }

                    let evaluation = self
                        .call_evaluate_protocol_proposal(&mut context, frame.sequence_id, &frame.candidate_protocols, &frame.modification_summary)
                        .await;
                    let (result, next_seq) = match evaluation {
                        Some(pair) => pair,
                        None => {
                            self.status = NegotiationStatus::Rejected;
                            return Err(NegotiationError::LlmError("evaluation exhausted llm retries".to_owned()));
                        }
                    };

                    match result.status {
                        NegotiationStatus::Accepted => {
                            self.history.push(HistoryEntry::new(
                                next_seq,
                                ProtocolDocument::empty(),
                                result.modification_summary.clone(),
                                Author::SelfAuthored,
                            ));
                            self.agreed_protocol = Some(frame.candidate_protocols.clone());
                            self.status = NegotiationStatus::Accepted;
                            let _ = self
                                .send_negotiation(next_seq, ProtocolDocument::empty(), NegotiationStatus::Accepted, result.modification_summary)
                                .await;
                            return Ok(());
                        }
                        NegotiationStatus::Rejected => {
                            self.history.push(HistoryEntry::new(
                                next_seq,
                                ProtocolDocument::empty(),
                                result.modification_summary.clone(),
                                Author::SelfAuthored,
                            ));
                            self.status = NegotiationStatus::Rejected;
                            let _ = self
                                .send_negotiation(next_seq, ProtocolDocument::empty(), NegotiationStatus::Rejected, result.modification_summary)
                                .await;
                            return Ok(());
                        }
                        NegotiationStatus::Negotiating => {
                            self.history.push(HistoryEntry::new(
                                next_seq,
                                result.candidate_protocol.clone(),
                                result.modification_summary.clone(),
                                Author::SelfAuthored,
                            ));
                            if let Err(err) = self
                                .send_negotiation(
                                    next_seq,
                                    result.candidate_protocol,
                                    NegotiationStatus::Negotiating,
                                    result.modification_summary,
                                )
                                .await
                            {
                                self.status = NegotiationStatus::Rejected;
                                return Err(err);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Logs and, where the taxonomy calls for it, notifies the peer of a
    /// [`run_round_loop`] failure with a final `REJECTED` frame (spec.md §7:
    /// protocol error, convergence failure, and LLM-retry exhaustion all notify;
    /// timeouts and transport errors don't, since the peer may already be gone).
    async fn handle_round_loop_error(&mut self, err: NegotiationError) {
        warn!(error = %err, notifies_peer = err.notifies_peer(), "round loop terminated with an error");
        if err.notifies_peer() {
            let next_seq = self.peer_round + 1;
            let _ = self.send_negotiation(next_seq, ProtocolDocument::empty(), NegotiationStatus::Rejected, err.to_string()).await;
        }
    }

    async fn call_evaluate_protocol_proposal(
        &mut self,
        context: &mut DriverContext<'_>,
        peer_round: u32,
        peer_candidate: &ProtocolDocument,
        peer_modification_summary: &str,
    ) -> Option<(protoforge_types::NegotiationResult, u32)> {
        let previous_self_proposal = self.last_self_authored_entry().cloned();
        let role = self.role;
        let negotiator = Arc::clone(&self.negotiator);
        let capability_info_callback = self.capability_info_callback.clone();
        for attempt in 0..=self.config.llm_retries {
            let evaluation_context = context.as_evaluation_context(&mut self.capability_info_history);
            let call = negotiator.evaluate_protocol_proposal(
                role,
                evaluation_context,
                previous_self_proposal.as_ref(),
                peer_round,
                peer_candidate,
                peer_modification_summary,
                capability_info_callback.as_deref(),
            );
            match timeout(self.config.llm_timeout, call).await {
                Ok(Ok(pair)) => return Some(pair),
                Ok(Err(err)) => warn!(attempt, error = %err, "proposal evaluation failed"),
                Err(_) => warn!(attempt, "proposal evaluation timed out"),
            }
        }
        None
    }

    async fn run_codegen_handshake(&mut self) -> SessionOutcome {
        if self.status != NegotiationStatus::Accepted {
            return SessionOutcome::failure();
        }
        match self.try_codegen_handshake().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "code-generation handshake failed");
                SessionOutcome::failure()
            }
        }
    }

    async fn try_codegen_handshake(&mut self) -> Result<SessionOutcome, NegotiationError> {
        let agreed = self.agreed_protocol.clone().ok_or_else(|| {
            NegotiationError::ProtocolError("reached AGREED without an agreed protocol recorded".to_owned())
        })?;

        let local_outcome = self.codegen.generate(&agreed, self.role, &self.code_path).await;
        if !local_outcome.success {
            warn!(
                error = %NegotiationError::CodegenError("local code generator reported failure".to_owned()),
                "proceeding to send a failing code-generation ack"
            );
        }
        let frame = NegotiationFrame::CodeGeneration(CodeGenerationFrame { success: local_outcome.success });
        self.send_frame(frame).await?;

        let peer_ack = match timeout(self.config.code_gen_timeout, self.codegen_inbox.recv()).await {
            Ok(Some(ack)) => ack,
            Ok(None) => {
                return Err(NegotiationError::TransportError(
                    "peer transport closed awaiting code-generation ack".to_owned(),
                ))
            }
            Err(_) => return Err(NegotiationError::Timeout("peer code-generation acknowledgement")),
        };

        let success = local_outcome.success && peer_ack.success;
        Ok(SessionOutcome { success, module_path: if success { local_outcome.module_path } else { None } })
    }

    async fn send_negotiation(
        &mut self,
        sequence_id: u32,
        candidate_protocols: ProtocolDocument,
        status: NegotiationStatus,
        modification_summary: String,
    ) -> Result<(), NegotiationError> {
        let frame = NegotiationFrame::ProtocolNegotiation(ProtocolNegotiationFrame {
            sequence_id,
            candidate_protocols,
            status,
            modification_summary,
        });
        self.self_round = sequence_id;
        self.send_frame(frame).await
    }

    async fn send_frame(&self, frame: NegotiationFrame) -> Result<(), NegotiationError> {
        let bytes = serde_json::to_vec(&frame)
            .map_err(|err| NegotiationError::ProtocolError(format!("failed to encode frame: {err}")))?;
        self.transport.send(bytes).await.map_err(|err| NegotiationError::TransportError(err.to_string()))
    }

    fn last_self_authored_entry(&self) -> Option<&HistoryEntry> {
        self.history.iter().rev().find(|entry| entry.authored_by == Author::SelfAuthored)
    }

    fn last_self_authored_candidate(&self) -> Option<ProtocolDocument> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.authored_by == Author::SelfAuthored && !entry.candidate_protocol.is_empty())
            .map(|entry| entry.candidate_protocol.clone())
    }
}

struct RequesterSeed<'a> {
    requirement: &'a str,
    input_description: &'a str,
    output_description: &'a str,
}

enum DriverContext<'a> {
    Requester(RequesterSeed<'a>),
    Provider,
}

impl<'a> DriverContext<'a> {
    fn as_evaluation_context<'b>(&'b self, capability_info_history: &'b mut Vec<String>) -> EvaluationContext<'b> {
        match self {
            DriverContext::Requester(seed) => EvaluationContext::Requester {
                requirement: seed.requirement,
                input_description: seed.input_description,
                output_description: seed.output_description,
            },
            DriverContext::Provider => EvaluationContext::Provider { capability_info_history },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use protoforge_codegen::StubCodeGenerator;
    use protoforge_llm::ScriptedLlmClient;
    use protoforge_transport::mock::InMemoryTransport;
    use protoforge_types::Did;

    use super::*;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            max_rounds: 10,
            llm_retries: 2,
            round_timeout: Duration::from_millis(200),
            llm_timeout: Duration::from_millis(200),
            code_gen_timeout: Duration::from_millis(200),
            inbox_capacity: 16,
        }
    }

    /// The returned receiver is the peer half's inbound channel: it's what
    /// collects every frame the session under test actually sends. It must be
    /// kept alive for the test's duration — dropping it closes the mock
    /// transport's send side and turns every outbound frame into a
    /// `TransportError`.
    fn test_session(
        role: Role,
        llm_responses: Vec<Result<String, protoforge_llm::LlmError>>,
        config: EngineConfig,
    ) -> (Session, SessionHandle, tempfile::TempDir, tokio::sync::mpsc::Receiver<Vec<u8>>) {
        let ((transport, _inbound_rx), (_peer_half, outbound_rx)) =
            InMemoryTransport::pair(Did::new("self"), Did::new("peer"), 16);
        let negotiator = Arc::new(Negotiator::new(Arc::new(ScriptedLlmClient::new(llm_responses))));
        let dir = tempfile::tempdir().unwrap();
        let (session, handle) = Session::new(
            role,
            Arc::new(transport),
            negotiator,
            Arc::new(StubCodeGenerator),
            None,
            config,
            dir.path().to_path_buf(),
        );
        (session, handle, dir, outbound_rx)
    }

    #[tokio::test]
    async fn duplicate_inbound_frame_yields_exactly_one_transition() {
        // A replayed REJECTED at the already-consumed sequence id must be dropped,
        // not processed a second time; the loop should terminate on the *first*
        // copy and never touch the second.
        let (session, handle, _dir, _outbound_rx) = test_session(Role::Provider, vec![], fast_config());
        let tx = handle.negotiation_tx;

        let reject = ProtocolNegotiationFrame {
            sequence_id: 1,
            candidate_protocols: ProtocolDocument::empty(),
            status: NegotiationStatus::Rejected,
            modification_summary: "no thanks".to_owned(),
        };
        tx.send(reject.clone()).await.unwrap();
        tx.send(reject).await.unwrap();
        drop(tx);

        let outcome = session.wait_remote_negotiation().await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn out_of_sequence_first_frame_is_a_protocol_error() {
        let (session, handle, _dir, mut outbound_rx) = test_session(Role::Provider, vec![], fast_config());
        let tx = handle.negotiation_tx;
        tx.send(ProtocolNegotiationFrame {
            sequence_id: 3,
            candidate_protocols: ProtocolDocument::new("P0"),
            status: NegotiationStatus::Negotiating,
            modification_summary: String::new(),
        })
        .await
        .unwrap();

        let outcome = session.wait_remote_negotiation().await;
        assert!(!outcome.success);
        assert!(outcome.module_path.is_none());

        // ProtocolError notifies the peer (NegotiationError::notifies_peer): the
        // engine must still emit a final REJECTED frame carrying the error text,
        // not silently drop the connection.
        let sent = outbound_rx.try_recv().expect("a rejected frame should have been sent");
        let decoded: NegotiationFrame = serde_json::from_slice(&sent).unwrap();
        assert_matches!(
            decoded,
            NegotiationFrame::ProtocolNegotiation(ProtocolNegotiationFrame {
                status: NegotiationStatus::Rejected,
                ref modification_summary,
                ..
            }) if modification_summary.contains("out-of-sequence")
        );
    }

    #[tokio::test]
    async fn round_timeout_fails_without_reply() {
        let config = EngineConfig { round_timeout: Duration::from_millis(20), ..fast_config() };
        let (session, _handle, _dir, _outbound_rx) = test_session(Role::Provider, vec![], config);
        let outcome = session.wait_remote_negotiation().await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn llm_retry_exhaustion_sends_rejected() {
        let responses = vec![Err(protoforge_llm::LlmError::EmptyResponse); 3];
        let (session, handle, _dir, _outbound_rx) = test_session(Role::Provider, responses, fast_config());
        let tx = handle.negotiation_tx;
        tx.send(ProtocolNegotiationFrame {
            sequence_id: 1,
            candidate_protocols: ProtocolDocument::new("P0"),
            status: NegotiationStatus::Negotiating,
            modification_summary: String::new(),
        })
        .await
        .unwrap();

        let outcome = session.wait_remote_negotiation().await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn deterministic_immediate_acceptance_converges_in_two_rounds() {
        let requester_responses = vec![Ok("# Protocol P0\n".to_owned())];
        let (session, handle, _dir, _outbound_rx) =
            test_session(Role::Requester, requester_responses, fast_config());
        let negotiation_tx = handle.negotiation_tx.clone();
        let codegen_tx = handle.codegen_tx;

        let driver = tokio::spawn(async move { session.negotiate_protocol("echo", "{}", "{}").await });

        negotiation_tx
            .send(ProtocolNegotiationFrame {
                sequence_id: 2,
                candidate_protocols: ProtocolDocument::empty(),
                status: NegotiationStatus::Accepted,
                modification_summary: "ok".to_owned(),
            })
            .await
            .unwrap();
        codegen_tx.send(CodeGenerationFrame { success: true }).await.unwrap();

        let outcome = driver.await.unwrap();
        assert!(outcome.success);
        assert!(outcome.module_path.is_some());
    }
}

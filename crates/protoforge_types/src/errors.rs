use thiserror::Error;

/// The error taxonomy from spec.md §7. Every session driver terminates with a
/// single `(success, module_path)` tuple (propagation policy, §7); this type is
/// what the driver reasons about internally and logs, not what it returns.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("LLM returned an unparseable or schema-invalid response: {0}")]
    LlmError(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("code generator reported failure: {0}")]
    CodegenError(String),
    #[error("negotiation did not converge within the round cap")]
    ConvergenceFailure,
}

impl NegotiationError {
    /// Whether this error should be reported to the peer as a final `REJECTED`
    /// frame before the session tears down (spec.md §7 propagation policy).
    pub fn notifies_peer(&self) -> bool {
        !matches!(self, NegotiationError::TransportError(_) | NegotiationError::Timeout(_))
    }
}

//! Demo CLI (spec.md §6 "CLI surface, not core"): drives the requester side of
//! one meta-protocol negotiation against a peer reachable over TCP, then exits
//! 0 on overall success or non-zero otherwise. Exercises the real engine
//! (`protoforge_session`) end to end; the only stand-ins are the transport's
//! DID handshake (see [`protoforge_transport::tcp`]) and the default
//! [`protoforge_codegen::StubCodeGenerator`].

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use protoforge_codegen::StubCodeGenerator;
use protoforge_config::EngineConfig;
use protoforge_llm::HttpLlmClient;
use protoforge_multiplexer::{NewProviderSessionCallback, SessionMultiplexer};
use protoforge_negotiator::Negotiator;
use protoforge_session::{Session, SessionHandle};
use protoforge_transport::tcp::TcpTransport;
use protoforge_types::{Did, Role};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// The requester always talks to exactly one peer it already knows (the one it
/// just connected to), so it never needs the multiplexer's provider-session
/// hook. Wired in only to satisfy [`SessionMultiplexer::new`]'s contract.
struct NoInboundSessions;

#[async_trait]
impl NewProviderSessionCallback for NoInboundSessions {
    async fn new_provider_session(&self, peer: &Did) -> SessionHandle {
        unreachable!("requester demo never accepts inbound sessions (peer: {peer})");
    }
}

#[derive(Parser)]
#[command(name = "requester", about = "Negotiate a protocol as the requester")]
struct Cli {
    /// Path to a JSON file containing this agent's DID, e.g. `{"did": "did:example:alice"}`.
    #[arg(long)]
    did_path: PathBuf,

    /// `host:port` of the provider to connect to.
    #[arg(long)]
    peer_addr: String,

    /// Natural-language description of what the negotiated protocol must do.
    #[arg(long)]
    requirement: String,

    /// Description of the request payload shape.
    #[arg(long)]
    input_description: String,

    /// Description of the response payload shape.
    #[arg(long)]
    output_description: String,

    /// Directory the code generator writes the agreed handler module into.
    #[arg(long, default_value = "./generated")]
    code_path: PathBuf,

    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    #[arg(long, default_value = "http://localhost:11434")]
    llm_api_base: String,

    #[arg(long, default_value = "llama3")]
    llm_model: String,

    #[arg(long)]
    llm_api_key: Option<String>,
}

#[derive(Deserialize)]
struct DidFile {
    did: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("negotiation did not succeed");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = %err, "requester demo failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let did_file: DidFile = serde_json::from_str(&std::fs::read_to_string(&cli.did_path)?)?;
    let self_did = Did::new(did_file.did);

    let (transport, mut inbound) = TcpTransport::connect(&cli.peer_addr, &self_did).await?;
    let peer_did = transport.peer().clone();
    tracing::info!(peer = %peer_did, "connected to provider");

    let llm = HttpLlmClient::new(
        cli.llm_api_base,
        cli.llm_model,
        cli.llm_api_key,
        EngineConfig::default().llm_timeout,
    )?;
    let negotiator = Arc::new(Negotiator::new(Arc::new(llm)));

    let (session, handle) = Session::new(
        Role::Requester,
        Arc::new(transport),
        negotiator,
        Arc::new(StubCodeGenerator),
        None,
        EngineConfig::default(),
        cli.code_path,
    );

    let multiplexer = Arc::new(SessionMultiplexer::new(Arc::new(NoInboundSessions)));
    multiplexer.register(peer_did.clone(), handle).await;
    let pump = {
        let multiplexer = Arc::clone(&multiplexer);
        tokio::spawn(async move {
            while let Some(bytes) = inbound.recv().await {
                multiplexer.dispatch(peer_did.clone(), &bytes).await;
            }
        })
    };

    let outcome = session
        .negotiate_protocol(&cli.requirement, &cli.input_description, &cli.output_description)
        .await;
    pump.abort();
    if let Some(module_path) = &outcome.module_path {
        tracing::info!(path = %module_path.display(), "generated handler module");
    }
    Ok(outcome.success)
}

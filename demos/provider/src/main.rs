//! Demo CLI (spec.md §6 "CLI surface, not core"): drives the provider side of
//! one meta-protocol negotiation, listening on a TCP address for the
//! requester's connection. Exits 0 on overall success, non-zero otherwise.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use protoforge_codegen::StubCodeGenerator;
use protoforge_config::EngineConfig;
use protoforge_llm::HttpLlmClient;
use protoforge_multiplexer::{NewProviderSessionCallback, SessionMultiplexer};
use protoforge_negotiator::{CapabilityInfoCallback, Negotiator};
use protoforge_session::{Session, SessionHandle};
use protoforge_transport::tcp::TcpTransport;
use protoforge_types::{Did, Role};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "provider", about = "Negotiate a protocol as the capability provider")]
struct Cli {
    /// Path to a JSON file containing this agent's DID, e.g. `{"did": "did:example:bob"}`.
    #[arg(long)]
    did_path: PathBuf,

    /// `host:port` to listen on for the requester's connection.
    #[arg(long, default_value = "0.0.0.0:7878")]
    listen_addr: String,

    /// Fixed capability description returned for every `get_capability_info` tool call.
    #[arg(long, default_value = "general-purpose JSON request/response handler")]
    capability_info: String,

    /// Directory the code generator writes the agreed handler module into.
    #[arg(long, default_value = "./generated")]
    code_path: PathBuf,

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

/// Returns the same fixed capability description for every lookup
/// (spec.md §6 `getCapabilityInfoCallback`). A real deployment would consult
/// a capability registry instead.
struct StaticCapabilityInfo(String);

#[async_trait]
impl CapabilityInfoCallback for StaticCapabilityInfo {
    async fn get_capability_info(&self, _requirement: &str, _input: &str, _output: &str) -> String {
        self.0.clone()
    }
}

/// The demo accepts exactly one connection and already knows which peer it is
/// by the time any negotiation frame arrives, so this hook is never invoked in
/// practice; wired in only to satisfy [`SessionMultiplexer::new`]'s contract.
struct NoLateSessions;

#[async_trait]
impl NewProviderSessionCallback for NoLateSessions {
    async fn new_provider_session(&self, peer: &Did) -> SessionHandle {
        unreachable!("provider demo registers its session before listening for frames (peer: {peer})");
    }
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
            tracing::error!(error = %err, "provider demo failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let did_file: DidFile = serde_json::from_str(&std::fs::read_to_string(&cli.did_path)?)?;
    let self_did = Did::new(did_file.did);

    let listener = TcpListener::bind(&cli.listen_addr).await?;
    tracing::info!(addr = %cli.listen_addr, "listening for the requester");
    let (transport, mut inbound) = TcpTransport::accept(&listener, &self_did).await?;
    let peer_did = transport.peer().clone();
    tracing::info!(peer = %peer_did, "requester connected");

    let llm = HttpLlmClient::new(
        cli.llm_api_base,
        cli.llm_model,
        cli.llm_api_key,
        EngineConfig::default().llm_timeout,
    )?;
    let negotiator = Arc::new(Negotiator::new(Arc::new(llm)));
    let capability_info = Arc::new(StaticCapabilityInfo(cli.capability_info));

    let (session, handle) = Session::new(
        Role::Provider,
        Arc::new(transport),
        negotiator,
        Arc::new(StubCodeGenerator),
        Some(capability_info),
        EngineConfig::default(),
        cli.code_path,
    );

    let multiplexer = Arc::new(SessionMultiplexer::new(Arc::new(NoLateSessions)));
    multiplexer.register(peer_did.clone(), handle).await;
    let pump = {
        let multiplexer = Arc::clone(&multiplexer);
        tokio::spawn(async move {
            while let Some(bytes) = inbound.recv().await {
                multiplexer.dispatch(peer_did.clone(), &bytes).await;
            }
        })
    };

    let outcome = session.wait_remote_negotiation().await;
    pump.abort();
    if let Some(module_path) = &outcome.module_path {
        tracing::info!(path = %module_path.display(), "generated handler module");
    }
    Ok(outcome.success)
}

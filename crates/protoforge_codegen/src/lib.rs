//! The Code-Generator facade (spec.md §4.5, component C5). Turning a protocol
//! document into semantically-correct handler code is explicitly out of scope
//! (spec.md §1 Non-goals); this crate pins the trait boundary the session calls
//! through and provides a default implementation that writes a stub handler file,
//! for hosts that don't wire in a real generator.

use std::path::PathBuf;

use async_trait::async_trait;
use protoforge_types::{ProtocolDocument, Role};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to write generated module to {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

/// The outcome of one code-generation attempt (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct CodegenOutcome {
    pub success: bool,
    pub module_path: Option<PathBuf>,
}

impl CodegenOutcome {
    pub fn success(module_path: PathBuf) -> Self {
        Self { success: true, module_path: Some(module_path) }
    }

    pub fn failure() -> Self {
        Self { success: false, module_path: None }
    }
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Invoked only after a session reaches `AGREED` (spec.md §4.3). The core
    /// treats any error this returns as `success=false` with a captured reason,
    /// never propagating a panic (spec.md §4.5).
    async fn generate(&self, protocol: &ProtocolDocument, role: Role, code_path: &std::path::Path) -> CodegenOutcome;
}

/// Computes the stable, protocol-content-addressed file name a generator should
/// write to: `<code_path>/<protocol_hash>.rs` (SPEC_FULL.md §9).
pub fn module_path_for(code_path: &std::path::Path, protocol: &ProtocolDocument) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(protocol.as_str().as_bytes());
    let digest = hasher.finalize();
    let short_hash = hex::encode(&digest[..8]);
    code_path.join(format!("{short_hash}.rs"))
}

/// Writes a minimal stub handler module. Real deployments wire in an
/// LLM-or-template-backed generator implementing [`CodeGenerator`] instead; this
/// one exists so the handshake has something real to exercise in tests and
/// demos without depending on an actual code generator.
pub struct StubCodeGenerator;

#[async_trait]
impl CodeGenerator for StubCodeGenerator {
    async fn generate(&self, protocol: &ProtocolDocument, role: Role, code_path: &std::path::Path) -> CodegenOutcome {
        let module_path = module_path_for(code_path, protocol);
        let source = render_stub_module(protocol, role);
        if let Some(parent) = module_path.parent() {
            if let Err(source_err) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %source_err, "failed to create code-gen output directory");
                return CodegenOutcome::failure();
            }
        }
        match tokio::fs::write(&module_path, source).await {
            Ok(()) => {
                info!(path = %module_path.display(), "wrote generated handler module");
                CodegenOutcome::success(module_path)
            }
            Err(source_err) => {
                warn!(error = %CodegenError::Io { path: module_path, source: source_err }, "code generation failed");
                CodegenOutcome::failure()
            }
        }
    }
}

fn render_stub_module(protocol: &ProtocolDocument, role: Role) -> String {
    let role_name = match role {
        Role::Requester => "requester",
        Role::Provider => "provider",
    };
    let protocol_len = protocol.as_str().len();
    format!(
        "// Generated {role_name} handler stub.\n// Agreed protocol document is {protocol_len} bytes; \
         see the negotiation log for its full text.\n\npub fn handle() {{\n    unimplemented!(\"wire in a \
         real code generator\")\n}}\n"
    )
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn writes_a_stable_content_addressed_module() {
        let dir = tempdir().unwrap();
        let generator = StubCodeGenerator;
        let protocol = ProtocolDocument::new("# Protocol\n");

        let outcome = generator.generate(&protocol, Role::Requester, dir.path()).await;
        assert!(outcome.success);
        let module_path = outcome.module_path.unwrap();
        assert!(module_path.exists());
        assert_eq!(module_path, module_path_for(dir.path(), &protocol));

        let again = generator.generate(&protocol, Role::Requester, dir.path()).await;
        assert_eq!(again.module_path.unwrap(), module_path);
    }

    #[tokio::test]
    async fn different_protocols_hash_to_different_paths() {
        let dir = tempdir().unwrap();
        let a = module_path_for(dir.path(), &ProtocolDocument::new("A"));
        let b = module_path_for(dir.path(), &ProtocolDocument::new("B"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unwritable_directory_reports_failure_not_panic() {
        let generator = StubCodeGenerator;
        let protocol = ProtocolDocument::new("# Protocol\n");
        let bogus_path = std::path::Path::new("/dev/null/not-a-real-dir");
        let outcome = generator.generate(&protocol, Role::Provider, bogus_path).await;
        assert!(!outcome.success);
        assert!(outcome.module_path.is_none());
    }
}

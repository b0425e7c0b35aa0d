//! Per-vendor transport: spawn a coding-agent CLI, drive its stream-json
//! output, and return a [`QueryResult`] (spec.md §4.H).

pub mod aider;
pub mod amp;
pub mod claude;
pub mod codex;
pub mod gemini;
mod generic;
mod resolve;

pub use generic::GenericTransport;

pub use aider::AiderTransport;
pub use amp::AmpTransport;
pub use claude::ClaudeTransport;
pub use codex::CodexTransport;
pub use gemini::GeminiTransport;

use async_trait::async_trait;

use crate::model::{AgentOptions, Goal, QueryResult};
use crate::resilience::CircuitOpenError;
use crate::sandbox::SandboxError;
use crate::stream::StreamFormat;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{vendor} executable not found (checked PATH, env override, well-known locations)")]
    ExecutableNotFound { vendor: String },
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    #[error("{vendor} transport error: {message}")]
    Sdk { vendor: String, message: String },
}

/// Per-vendor argv construction and output-format policy (spec.md §4.H).
/// A `GenericTransport<A>` supplies the shared execution machinery
/// (resolve → circuit-breaker → retry → sandbox → streaming processor);
/// each vendor only describes its own CLI dialect.
pub trait VendorAdapter: Send + Sync {
    fn vendor_name(&self) -> &'static str;
    fn default_executable(&self) -> &str;
    fn executable_env_override(&self) -> &'static str;
    fn secret_env_vars(&self) -> &'static [&'static str];
    fn stream_format(&self) -> StreamFormat;
    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String>;
    fn resume_args(&self, session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String>;
}

/// Uniform per-vendor contract (spec.md §4.H).
#[async_trait]
pub trait AgentTransport: Send + Sync {
    fn vendor_name(&self) -> &str;
    async fn is_available(&self) -> bool;
    fn build_command(&self, prompt: &str, options: &AgentOptions) -> Vec<String>;
    fn parse_result(&self, raw_output: &str, options: &AgentOptions) -> QueryResult;
    async fn execute(&self, goal: &Goal) -> Result<QueryResult, TransportError>;
    async fn resume(
        &self,
        session_id: &str,
        prompt: &str,
        options: &AgentOptions,
    ) -> Result<QueryResult, TransportError>;
}

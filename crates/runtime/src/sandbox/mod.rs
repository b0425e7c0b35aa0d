//! Sandbox abstraction — isolated command execution.
//!
//! A `Sandbox` executes an [`ExecSpec`] in a working directory it owns,
//! enforcing a timeout and returning the command's exit code, merged
//! stdout+stderr log, and elapsed time (spec.md §4.A). Two providers are
//! implemented: [`local::LocalSandbox`] (direct host exec) and
//! [`container::ContainerSandbox`] (exec inside a pre-built image with a
//! `/work` mount).

pub mod container;
pub mod local;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use container::ContainerSandbox;
pub use local::LocalSandbox;

/// A command to run in a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSpec {
    /// Ordered argv: `command[0]` is the executable.
    pub command: Vec<String>,
    /// Environment additions, applied on top of the inherited environment
    /// (spec wins on key collision).
    pub env: HashMap<String, String>,
    /// Wall-clock deadline for the whole invocation.
    pub timeout: Duration,
    /// Working directory. The sandbox owns this directory; it is the
    /// default `cwd` for the process unless a provider overrides it.
    pub working_directory: PathBuf,
}

impl ExecSpec {
    pub fn new(
        command: Vec<String>,
        working_directory: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            command,
            env: HashMap::new(),
            timeout,
            working_directory: working_directory.into(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Result of a sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i32,
    /// stdout and stderr, interleaved in emission order.
    pub merged_log: String,
    pub duration: Duration,
    /// Set when `merged_log` was cut short at the provider's byte cap.
    pub truncated: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Error taxonomy for sandbox execution (spec.md §7).
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("process failed to spawn or I/O broke: {0}")]
    Io(String),
    #[error("execution exceeded timeout of {0:?}")]
    Timeout(Duration),
    #[error("sandbox is closed")]
    Closed,
}

/// Execute a command specification in an isolated working directory.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `spec`, blocking until the process exits or the timeout fires.
    async fn exec(&self, spec: ExecSpec) -> Result<ExecResult, SandboxError>;

    /// Run `spec`, forwarding output chunks to `chunks` as they are
    /// produced so a [`crate::stream::processor::StreamingProcessor`] can
    /// parse messages while the subprocess is still running. `stdin` is
    /// drained and written to the child's standard input as bytes arrive,
    /// carrying `control_response` frames back to a subprocess that issued
    /// a `can_use_tool` request (spec.md §4.C). Providers that cannot
    /// stream (e.g. ones that shell out to a blocking helper) may fall
    /// back to emitting the whole merged log as one chunk once `exec`
    /// returns, in which case `stdin` is simply dropped.
    async fn exec_streaming(
        &self,
        spec: ExecSpec,
        chunks: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
        stdin: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<ExecResult, SandboxError> {
        drop(stdin);
        let result = self.exec(spec).await?;
        let _ = chunks.send(result.merged_log.clone().into_bytes());
        Ok(result)
    }

    /// Whether `close()` has already been called.
    fn is_closed(&self) -> bool;

    /// Release any resources held by the sandbox. Idempotent.
    async fn close(&self) -> Result<(), SandboxError>;
}
//! Local sandbox — executes directly on the host.
//!
//! Grounded in the teacher's `cli_executor::executor::CliExecutor`: a
//! process group per child for clean kill, and a hard output cap. stderr
//! is duplicated onto the stdout fd before exec so the merged log
//! preserves true interleaving order rather than concatenating two
//! independently-buffered streams. Stdin is piped rather than closed so a
//! streaming caller can write `control_response` frames back to the
//! child while it is still running (spec.md §4.C).

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{ExecResult, ExecSpec, Sandbox, SandboxError};

/// Hard cap on the merged output log, matching `StreamParser`'s 1 MiB
/// accumulation discipline (spec.md §4.B) for consistency across the
/// transport stack.
const MAX_LOG_BYTES: usize = 1024 * 1024;

/// Sandbox that execs commands directly on the host.
pub struct LocalSandbox {
    closed: AtomicBool,
}

impl Default for LocalSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSandbox {
    pub fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }
}

impl LocalSandbox {
    async fn run(
        &self,
        spec: ExecSpec,
        chunk_sink: Option<tokio::sync::mpsc::UnboundedSender<Vec<u8>>>,
        stdin_rx: Option<UnboundedReceiver<Vec<u8>>>,
    ) -> Result<ExecResult, SandboxError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SandboxError::Closed);
        }

        let [program, rest @ ..] = spec.command.as_slice() else {
            return Err(SandboxError::ExecutableNotFound(String::new()));
        };

        let mut command = Command::new(program);
        command.args(rest);
        command.current_dir(&spec.working_directory);
        command.envs(std::env::vars());
        command.envs(&spec.env);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        // Unix: own process group for clean kill, and merge stderr into
        // stdout at the fd level so interleaving order is exact.
        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                libc::setpgid(0, 0);
                libc::dup2(1, 2);
                Ok(())
            });
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SandboxError::ExecutableNotFound(program.clone())
            } else {
                SandboxError::Io(e.to_string())
            }
        })?;

        let mut stdout = child.stdout.take();
        let mut stdin_pipe = child.stdin.take();

        let stdin_forwarder = stdin_rx.map(|mut rx| {
            tokio::spawn(async move {
                while let Some(bytes) = rx.recv().await {
                    if let Some(pipe) = stdin_pipe.as_mut() {
                        if pipe.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                }
            })
        });

        let run = async {
            let mut read_buf = [0u8; 8192];
            let mut buf = Vec::with_capacity(MAX_LOG_BYTES.min(65536));
            let mut total = 0usize;
            if let Some(out) = stdout.as_mut() {
                loop {
                    match out.read(&mut read_buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let take = n.min(MAX_LOG_BYTES - total.min(MAX_LOG_BYTES));
                            if take > 0 {
                                buf.extend_from_slice(&read_buf[..take]);
                                if let Some(tx) = &chunk_sink {
                                    let _ = tx.send(read_buf[..take].to_vec());
                                }
                            }
                            total += n;
                            if total > MAX_LOG_BYTES {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
            let status = child.wait().await;
            (buf, total, status)
        };

        let outcome = tokio::time::timeout(spec.timeout, run).await;
        if let Some(forwarder) = stdin_forwarder {
            forwarder.abort();
        }

        match outcome {
            Ok((buf, total, status)) => {
                let truncated = total > MAX_LOG_BYTES;
                let mut merged_log = String::from_utf8_lossy(&buf).into_owned();
                if truncated {
                    merged_log.push_str("\n... [output truncated at 1 MiB]");
                }
                let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                Ok(ExecResult {
                    exit_code,
                    merged_log,
                    duration: start.elapsed(),
                    truncated,
                })
            }
            Err(_) => {
                kill_process_group(&mut child).await;
                Err(SandboxError::Timeout(spec.timeout))
            }
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn exec(&self, spec: ExecSpec) -> Result<ExecResult, SandboxError> {
        self.run(spec, None, None).await
    }

    async fn exec_streaming(
        &self,
        spec: ExecSpec,
        chunks: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
        stdin: UnboundedReceiver<Vec<u8>>,
    ) -> Result<ExecResult, SandboxError> {
        self.run(spec, Some(chunks), Some(stdin)).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), SandboxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn kill_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(id) = child.id() {
            unsafe {
                libc::killpg(id as i32, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn exec_merges_stdout_and_stderr_in_order() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(
            vec![
                "bash".into(),
                "-c".into(),
                "echo out1; echo err1 1>&2; echo out2".into(),
            ],
            dir.path(),
            Duration::from_secs(5),
        );
        let result = sandbox.exec(spec).await.unwrap();
        assert!(result.success());
        assert_eq!(result.merged_log.trim(), "out1\nerr1\nout2");
    }

    #[tokio::test]
    async fn exec_respects_spec_env_override() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert("SYMBI_TEST_VAR".to_string(), "hello".to_string());
        let spec =
            ExecSpec::new(vec!["env".into()], dir.path(), Duration::from_secs(5)).with_env(env);
        let result = sandbox.exec(spec).await.unwrap();
        assert!(result.merged_log.contains("SYMBI_TEST_VAR=hello"));
    }

    /// S6 (sandbox half): a hung command started under a 200ms spec times
    /// out with `SandboxError::Timeout` rather than hanging the caller.
    #[tokio::test]
    async fn exec_times_out_on_hang() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(
            vec!["sleep".into(), "10".into()],
            dir.path(),
            Duration::from_millis(200),
        );
        let result = sandbox.exec(spec).await;
        assert!(matches!(result, Err(SandboxError::Timeout(_))));
    }

    #[tokio::test]
    async fn exec_fails_for_missing_executable() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(
            vec!["symbi-does-not-exist".into()],
            dir.path(),
            Duration::from_secs(5),
        );
        let result = sandbox.exec(spec).await;
        assert!(matches!(result, Err(SandboxError::ExecutableNotFound(_))));
    }

    #[tokio::test]
    async fn exec_streaming_forwards_chunks_before_completion() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(
            vec!["bash".into(), "-c".into(), "echo chunk1".into()],
            dir.path(),
            Duration::from_secs(5),
        );
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (_stdin_tx, stdin_rx) = tokio::sync::mpsc::unbounded_channel();
        let result = sandbox.exec_streaming(spec, tx, stdin_rx).await.unwrap();
        assert!(result.success());
        let mut seen = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            seen.extend(chunk);
        }
        assert!(String::from_utf8_lossy(&seen).contains("chunk1"));
    }

    /// The stdin pipe is writable while the child is still running, not
    /// nulled — a `cat` echoes back whatever is written to it.
    #[tokio::test]
    async fn exec_streaming_writes_stdin_back_to_the_child() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(vec!["cat".into()], dir.path(), Duration::from_secs(5));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (stdin_tx, stdin_rx) = tokio::sync::mpsc::unbounded_channel();
        stdin_tx.send(b"hello from the controller\n".to_vec()).unwrap();
        drop(stdin_tx);
        let result = sandbox.exec_streaming(spec, tx, stdin_rx).await.unwrap();
        assert!(result.success());
        let mut seen = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            seen.extend(chunk);
        }
        assert!(String::from_utf8_lossy(&seen).contains("hello from the controller"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_further_exec() {
        let sandbox = LocalSandbox::new();
        sandbox.close().await.unwrap();
        sandbox.close().await.unwrap();
        assert!(sandbox.is_closed());
        let dir = tempfile::tempdir().unwrap();
        let spec = ExecSpec::new(vec!["true".into()], dir.path(), Duration::from_secs(1));
        assert!(matches!(sandbox.exec(spec).await, Err(SandboxError::Closed)));
    }
}

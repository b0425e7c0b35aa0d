//! Containerized sandbox — execs a command inside a pre-built image with
//! the working directory bind-mounted at `/work`.
//!
//! Delegates the actual spawn/timeout/merge machinery to
//! [`super::local::LocalSandbox`] by shelling out to `docker run`; this
//! mirrors the teacher's layering where `native.rs` and the Docker-tier
//! runner share one execution discipline and differ only in argv
//! construction.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::local::LocalSandbox;
use super::{ExecResult, ExecSpec, Sandbox, SandboxError};

/// Sandbox that runs commands inside a Docker container.
pub struct ContainerSandbox {
    image: String,
    inner: LocalSandbox,
    closed: AtomicBool,
}

impl ContainerSandbox {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            inner: LocalSandbox::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn wrap(&self, spec: &ExecSpec) -> ExecSpec {
        let mount = format!("{}:/work", spec.working_directory.display());
        let mut docker_args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            mount,
            "-w".to_string(),
            "/work".to_string(),
        ];
        for (k, v) in &spec.env {
            docker_args.push("-e".to_string());
            docker_args.push(format!("{k}={v}"));
        }
        docker_args.push(self.image.clone());
        docker_args.extend(spec.command.iter().cloned());

        ExecSpec::new(
            std::iter::once("docker".to_string())
                .chain(docker_args)
                .collect(),
            std::env::current_dir().unwrap_or_default(),
            spec.timeout,
        )
    }
}

#[async_trait]
impl Sandbox for ContainerSandbox {
    async fn exec(&self, spec: ExecSpec) -> Result<ExecResult, SandboxError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SandboxError::Closed);
        }
        let wrapped = self.wrap(&spec);
        self.inner.exec(wrapped).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), SandboxError> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn wrap_mounts_working_directory_at_work() {
        let sandbox = ContainerSandbox::new("alpine:latest");
        let spec = ExecSpec::new(
            vec!["echo".into(), "hi".into()],
            PathBuf::from("/home/user/project"),
            Duration::from_secs(5),
        );
        let wrapped = sandbox.wrap(&spec);
        assert_eq!(wrapped.command[0], "docker");
        assert!(wrapped.command.contains(&"/home/user/project:/work".to_string()));
        assert!(wrapped.command.contains(&"alpine:latest".to_string()));
        assert_eq!(wrapped.command.last().unwrap(), "hi");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let sandbox = ContainerSandbox::new("alpine:latest");
        sandbox.close().await.unwrap();
        sandbox.close().await.unwrap();
        assert!(sandbox.is_closed());
    }
}

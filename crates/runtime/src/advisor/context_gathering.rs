//! Pre-processing advisor that materializes external context references
//! into the workspace before the agent runs (spec.md §4.L).

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use crate::model::AgentClientRequest;

use super::{AgentCallAdvisor, Next};

const CONTEXT_SUBDIR: &str = ".agents/context";

/// A piece of external context to pull into the workspace before the call:
/// either a file already on disk, or inline text to write out under a name.
#[derive(Debug, Clone)]
pub enum ContextReference {
    File { path: PathBuf },
    Inline { name: String, content: String },
}

/// Materializes [`ContextReference`]s into `<workspace>/.agents/context/`
/// before the call, and optionally cleans the directory up afterward.
/// Gather failures are recorded in `request.context` rather than aborting
/// the call — a missing reference shouldn't block the agent from running.
pub struct ContextGatheringAdvisor {
    order: i32,
    references: Vec<ContextReference>,
    cleanup_after: bool,
}

impl ContextGatheringAdvisor {
    pub fn new(order: i32, references: Vec<ContextReference>, cleanup_after: bool) -> Self {
        Self { order, references, cleanup_after }
    }

    fn gather(&self, workspace: &std::path::Path) -> (PathBuf, Vec<String>) {
        let dir = workspace.join(CONTEXT_SUBDIR);
        let mut errors = Vec::new();

        if let Err(e) = std::fs::create_dir_all(&dir) {
            errors.push(format!("failed to create context directory: {e}"));
            return (dir, errors);
        }

        for reference in &self.references {
            let result = match reference {
                ContextReference::File { path } => {
                    let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("context"));
                    std::fs::copy(path, dir.join(&name)).map(|_| ())
                }
                ContextReference::Inline { name, content } => std::fs::write(dir.join(name), content),
            };
            if let Err(e) = result {
                let label = match reference {
                    ContextReference::File { path } => path.display().to_string(),
                    ContextReference::Inline { name, .. } => name.clone(),
                };
                warn!(reference = %label, error = %e, "failed to gather context reference");
                errors.push(format!("{label}: {e}"));
            }
        }

        (dir, errors)
    }
}

#[async_trait]
impl AgentCallAdvisor for ContextGatheringAdvisor {
    fn order(&self) -> i32 {
        self.order
    }

    async fn around(&self, mut request: AgentClientRequest, next: Next) -> crate::model::AgentClientResponse {
        let workspace = request
            .goal
            .working_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let (context_dir, errors) = self.gather(&workspace);
        request
            .context
            .insert("context_gather_dir".to_string(), serde_json::json!(context_dir.display().to_string()));
        if !errors.is_empty() {
            request.context.insert("context_gather_errors".to_string(), serde_json::json!(errors));
        }

        let cleanup_after = self.cleanup_after;
        let response = next.call(request).await;

        if cleanup_after {
            if let Err(e) = std::fs::remove_dir_all(&context_dir) {
                warn!(dir = %context_dir.display(), error = %e, "failed to clean up gathered context");
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use crate::model::{AgentClientResponse, AgentResponse, Goal};

    use super::*;

    fn echo_terminal() -> super::super::Terminal {
        Arc::new(|req: AgentClientRequest| -> BoxFuture<'static, AgentClientResponse> {
            Box::pin(async move { AgentClientResponse { response: AgentResponse::error("ok"), context: req.context } })
        })
    }

    #[tokio::test]
    async fn writes_inline_references_into_context_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let advisor = Arc::new(ContextGatheringAdvisor::new(
            0,
            vec![ContextReference::Inline { name: "notes.md".to_string(), content: "hello".to_string() }],
            false,
        ));
        let chain = super::super::AdvisorChain::new(vec![advisor]);

        let mut goal = Goal::new("goal");
        goal.working_directory = Some(dir.path().to_path_buf());
        let request = AgentClientRequest::new(goal);

        let response = chain.run(request, echo_terminal()).await;
        assert!(!response.context.contains_key("context_gather_errors"));
        assert!(dir.path().join(".agents/context/notes.md").exists());
    }

    #[tokio::test]
    async fn missing_file_reference_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let advisor = Arc::new(ContextGatheringAdvisor::new(
            0,
            vec![ContextReference::File { path: PathBuf::from("/nonexistent/path.txt") }],
            false,
        ));
        let chain = super::super::AdvisorChain::new(vec![advisor]);

        let mut goal = Goal::new("goal");
        goal.working_directory = Some(dir.path().to_path_buf());
        let request = AgentClientRequest::new(goal);

        let response = chain.run(request, echo_terminal()).await;
        assert!(response.context.contains_key("context_gather_errors"));
    }
}

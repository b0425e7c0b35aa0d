//! Pure, side-effect-free judges (spec.md §4.J).

use std::time::Instant;

use async_trait::async_trait;

use crate::model::{Check, Judgment, JudgmentContext, JudgmentStatus, Score};

use super::{Judge, JudgeKind, JudgeMetadata};

/// A judge built from a plain closure over the workspace and agent output.
/// Must be pure and idempotent: no network calls, no mutation.
pub struct DeterministicJudge<F> {
    name: String,
    description: String,
    check: F,
}

impl<F> DeterministicJudge<F>
where
    F: Fn(&JudgmentContext) -> (bool, String) + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            check,
        }
    }
}

#[async_trait]
impl<F> Judge for DeterministicJudge<F>
where
    F: Fn(&JudgmentContext) -> (bool, String) + Send + Sync,
{
    fn metadata(&self) -> JudgeMetadata {
        JudgeMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: JudgeKind::Deterministic,
        }
    }

    async fn judge(&self, context: &JudgmentContext) -> Judgment {
        let started = Instant::now();
        let (passed, reasoning) = (self.check)(context);
        Judgment {
            score: Score::bool(passed),
            status: if passed { JudgmentStatus::Pass } else { JudgmentStatus::Fail },
            reasoning: reasoning.clone(),
            checks: vec![Check { name: self.name.clone(), passed, message: reasoning }],
            metadata: Default::default(),
            error: None,
        }
        .with_elapsed(started.elapsed())
    }
}

/// Checks that a relative path exists under the workspace after the run.
pub struct FileExistsJudge {
    name: String,
    relative_path: String,
}

impl FileExistsJudge {
    pub fn new(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            name: format!("file-exists:{relative_path}"),
            relative_path,
        }
    }
}

#[async_trait]
impl Judge for FileExistsJudge {
    fn metadata(&self) -> JudgeMetadata {
        JudgeMetadata {
            name: self.name.clone(),
            description: "Checks a relative path exists under the workspace".to_string(),
            kind: JudgeKind::Deterministic,
        }
    }

    async fn judge(&self, context: &JudgmentContext) -> Judgment {
        let started = Instant::now();
        let path = context.workspace.join(&self.relative_path);
        let exists = path.exists();
        let reasoning = if exists {
            format!("{} exists", self.relative_path)
        } else {
            format!("{} does not exist", self.relative_path)
        };
        Judgment {
            score: Score::bool(exists),
            status: if exists { JudgmentStatus::Pass } else { JudgmentStatus::Fail },
            reasoning: reasoning.clone(),
            checks: vec![Check { name: self.name.clone(), passed: exists, message: reasoning }],
            metadata: Default::default(),
            error: None,
        }
        .with_elapsed(started.elapsed())
    }
}

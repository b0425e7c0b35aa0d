//! Delegates grading to another coding agent, asked to critique the first
//! agent's work rather than perform it.

use std::time::Instant;

use async_trait::async_trait;

use crate::client::AgentClient;
use crate::model::{Judgment, JudgmentContext};

use super::parse::parse_verdict;
use super::{Judge, JudgeKind, JudgeMetadata};

pub struct AgentJudge {
    name: String,
    rubric: String,
    client: AgentClient,
}

impl AgentJudge {
    pub fn new(name: impl Into<String>, rubric: impl Into<String>, client: AgentClient) -> Self {
        Self { name: name.into(), rubric: rubric.into(), client }
    }

    fn templated_goal(&self, context: &JudgmentContext) -> String {
        format!(
            "Review the work done for this goal and judge whether it succeeded.\n\n\
             Original goal: {}\n\n\
             Grading rubric: {}\n\n\
             Agent output:\n{}\n\n\
             Respond in exactly this format:\n\
             PASS: true|false\n\
             SCORE: <number between 0 and 1>\n\
             REASONING: <one paragraph>",
            context.goal,
            self.rubric,
            context.agent_output.as_deref().unwrap_or("<no output captured>"),
        )
    }
}

#[async_trait]
impl Judge for AgentJudge {
    fn metadata(&self) -> JudgeMetadata {
        JudgeMetadata {
            name: self.name.clone(),
            description: "Delegates grading to another coding agent".to_string(),
            kind: JudgeKind::Agent,
        }
    }

    async fn judge(&self, context: &JudgmentContext) -> Judgment {
        let started = Instant::now();
        let response = self
            .client
            .clone()
            .goal(self.templated_goal(context))
            .working_directory(context.workspace.clone())
            .run()
            .await;

        match response {
            Ok(client_response) => {
                let text = client_response.response.result().to_string();
                let verdict = parse_verdict(&text);
                Judgment {
                    score: verdict.score,
                    status: verdict.status(),
                    reasoning: verdict.reasoning,
                    checks: Vec::new(),
                    metadata: Default::default(),
                    error: None,
                }
                .with_elapsed(started.elapsed())
            }
            Err(message) => Judgment::error(message.to_string()).with_elapsed(started.elapsed()),
        }
    }
}

//! Post-processing advisor that runs a full [`Jury`] vote over the
//! terminal response and attaches the verdict to `response.context`
//! (spec.md §4.L — the multi-judge analogue of [`super::JudgeAdvisor`]).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::jury::Jury;
use crate::model::{AgentClientRequest, AgentClientResponse, ExecutionStatus, JudgmentContext};

use super::{AgentCallAdvisor, Next};

pub struct JuryAdvisor {
    order: i32,
    jury: Arc<Jury>,
}

impl JuryAdvisor {
    pub fn new(order: i32, jury: Arc<Jury>) -> Self {
        Self { order, jury }
    }
}

#[async_trait]
impl AgentCallAdvisor for JuryAdvisor {
    fn order(&self) -> i32 {
        self.order
    }

    async fn around(&self, request: AgentClientRequest, next: Next) -> AgentClientResponse {
        let goal = request.goal.content.clone();
        let workspace = request
            .goal
            .working_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let started_at = Instant::now();

        let mut response = next.call(request).await;

        let status = if response.is_successful() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        let context = JudgmentContext {
            goal,
            workspace,
            agent_output: Some(response.response.result().to_string()),
            execution_time: started_at.elapsed().max(Duration::from_millis(0)),
            started_at,
            status,
        };

        let verdict = self.jury.vote(&context).await;
        response.context.insert("verdict".to_string(), serde_json::to_value(&verdict).unwrap_or_default());
        response.context.insert("verdict.aggregated".to_string(), serde_json::to_value(&verdict.aggregated).unwrap_or_default());
        response.context.insert("verdict.pass".to_string(), serde_json::json!(verdict.aggregated.pass()));
        response.context.insert("verdict.status".to_string(), serde_json::json!(format!("{:?}", verdict.aggregated.status)));

        response
    }
}

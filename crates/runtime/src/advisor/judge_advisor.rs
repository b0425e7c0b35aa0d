//! Post-processing advisor that grades the terminal response with a single
//! [`Judge`] and attaches the result to `response.context` (spec.md §4.L).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::judge::Judge;
use crate::model::{AgentClientRequest, AgentClientResponse, ExecutionStatus, JudgmentContext};

use super::{AgentCallAdvisor, Next};

pub struct JudgeAdvisor {
    order: i32,
    judge: Arc<dyn Judge>,
}

impl JudgeAdvisor {
    pub fn new(order: i32, judge: Arc<dyn Judge>) -> Self {
        Self { order, judge }
    }
}

#[async_trait]
impl AgentCallAdvisor for JudgeAdvisor {
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

        let judgment = self.judge.judge(&context).await;
        response.context.insert("judgment".to_string(), serde_json::to_value(&judgment).unwrap_or_default());
        response.context.insert("judgment.pass".to_string(), serde_json::json!(judgment.pass()));
        response.context.insert("judgment.score".to_string(), serde_json::json!(judgment.score.normalized()));

        response
    }
}

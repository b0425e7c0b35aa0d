//! Fluent entry point for running a goal through the advisor chain and an
//! [`AgentModel`] (spec.md §4.M).

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::advisor::AdvisorChain;
use crate::agent_model::AgentModel;
use crate::model::{
    AgentClientRequest, AgentClientResponse, AgentOptions, AgentTaskRequest, Goal, Message,
};

/// Builder that assembles a [`Goal`], runs it through the configured
/// [`AdvisorChain`], and terminates at an [`AgentModel::call`].
#[derive(Clone)]
pub struct AgentClient {
    model: Arc<AgentModel>,
    chain: Arc<AdvisorChain>,
    goal: String,
    working_directory: PathBuf,
    options: AgentOptions,
}

impl AgentClient {
    pub fn new(model: Arc<AgentModel>, chain: Arc<AdvisorChain>) -> Self {
        Self {
            model,
            chain,
            goal: String::new(),
            working_directory: std::env::temp_dir(),
            options: AgentOptions::default(),
        }
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn working_directory(mut self, working_directory: impl Into<PathBuf>) -> Self {
        self.working_directory = working_directory.into();
        self
    }

    pub fn options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    fn build_request(&self) -> AgentClientRequest {
        let goal = Goal {
            content: self.goal.clone(),
            working_directory: Some(self.working_directory.clone()),
            options: self.options.clone(),
        };
        AgentClientRequest::new(goal)
    }

    /// Run the goal through the advisor chain to completion.
    pub async fn run(self) -> Result<AgentClientResponse, ClientError> {
        if self.goal.is_empty() {
            return Err(ClientError::EmptyGoal);
        }

        let request = self.build_request();
        let model = self.model.clone();
        let terminal: Arc<
            dyn Fn(AgentClientRequest) -> BoxFuture<'static, AgentClientResponse> + Send + Sync,
        > = Arc::new(move |req: AgentClientRequest| {
            let model = model.clone();
            Box::pin(async move {
                let task = AgentTaskRequest {
                    goal: req.goal.content.clone(),
                    working_directory: req.goal.working_directory.clone().unwrap_or_else(std::env::temp_dir),
                    options: req.goal.options.clone(),
                };
                let outcome = model.call_raw(task).await;
                let mut context = req.context;
                context.insert(
                    "messages".to_string(),
                    serde_json::to_value(&outcome.messages).unwrap_or_default(),
                );
                AgentClientResponse { response: outcome.response, context }
            })
        });

        Ok(self.chain.run(request, terminal).await)
    }

    /// Run the goal and yield each assistant/result message as it arrives,
    /// rather than waiting for the whole call to finish (spec.md §9 design
    /// notes: a pull-style iterator over the underlying message stream).
    pub async fn run_streaming(self) -> Result<MessageStream, ClientError> {
        let response = self.run().await?;
        let messages = response
            .context
            .get("messages")
            .and_then(|v| serde_json::from_value::<Vec<Message>>(v.clone()).ok())
            .unwrap_or_default();
        Ok(MessageStream { messages, position: 0, response })
    }
}

/// A pull-style iterator over the messages of a completed call, plus the
/// final response once exhausted.
pub struct MessageStream {
    messages: Vec<Message>,
    position: usize,
    response: AgentClientResponse,
}

impl MessageStream {
    pub fn next_message(&mut self) -> Option<&Message> {
        let message = self.messages.get(self.position);
        if message.is_some() {
            self.position += 1;
        }
        message
    }

    pub fn into_response(self) -> AgentClientResponse {
        self.response
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("goal must not be empty")]
    EmptyGoal,
}

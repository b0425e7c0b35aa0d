//! Vendor-agnostic facade over an [`AgentTransport`] (spec.md §4.I).

use crate::model::{
    AgentGeneration, AgentOptions, AgentResponse, AgentResponseMetadata, AgentTaskRequest, FinishReason,
    QueryStatus,
};
use crate::transport::{AgentTransport, TransportError};
use crate::model::Goal;

pub struct AgentModel {
    transport: Box<dyn AgentTransport>,
    default_options: AgentOptions,
}

impl AgentModel {
    pub fn new(transport: Box<dyn AgentTransport>, default_options: AgentOptions) -> Self {
        Self { transport, default_options }
    }

    pub async fn is_available(&self) -> bool {
        self.transport.is_available().await
    }

    /// Resolve effective options (per-request overrides layered over the
    /// model's defaults), call the transport, and translate the
    /// `QueryResult` into an `AgentResponse`.
    pub async fn call(&self, request: AgentTaskRequest) -> AgentResponse {
        self.call_raw(request).await.response
    }

    /// Like [`Self::call`] but also returns the raw message sequence, for
    /// callers (e.g. the streaming client) that need per-message access
    /// rather than just the concatenated result.
    pub async fn call_raw(&self, request: AgentTaskRequest) -> AgentCallOutcome {
        let options = merge_options(self.default_options.clone(), request.options);
        let goal = Goal {
            content: request.goal,
            working_directory: Some(request.working_directory),
            options,
        };

        match self.transport.execute(&goal).await {
            Ok(query_result) => {
                let messages = query_result.messages.clone();
                AgentCallOutcome { response: translate(query_result), messages }
            }
            Err(TransportError::CircuitOpen(e)) => {
                AgentCallOutcome { response: AgentResponse::error(e.to_string()), messages: Vec::new() }
            }
            Err(e) => AgentCallOutcome { response: AgentResponse::error(e.to_string()), messages: Vec::new() },
        }
    }
}

pub struct AgentCallOutcome {
    pub response: AgentResponse,
    pub messages: Vec<crate::model::Message>,
}

fn merge_options(defaults: AgentOptions, overrides: AgentOptions) -> AgentOptions {
    AgentOptions {
        model: overrides.model.or(defaults.model),
        timeout: overrides.timeout.or(defaults.timeout),
        working_directory: overrides.working_directory.or(defaults.working_directory),
        env: {
            let mut merged = defaults.env;
            merged.extend(overrides.env);
            merged
        },
        executable_path: overrides.executable_path.or(defaults.executable_path),
        yolo: overrides.yolo || defaults.yolo,
        max_thinking_tokens: overrides.max_thinking_tokens.or(defaults.max_thinking_tokens),
        max_tokens: overrides.max_tokens.or(defaults.max_tokens),
        max_turns: overrides.max_turns.or(defaults.max_turns),
        max_budget_usd: overrides.max_budget_usd.or(defaults.max_budget_usd),
        permission_mode: overrides.permission_mode.or(defaults.permission_mode),
        allowed_tools: if overrides.allowed_tools.is_empty() {
            defaults.allowed_tools
        } else {
            overrides.allowed_tools
        },
        disallowed_tools: if overrides.disallowed_tools.is_empty() {
            defaults.disallowed_tools
        } else {
            overrides.disallowed_tools
        },
        system_prompt: overrides.system_prompt.or(defaults.system_prompt),
        append_system_prompt: overrides.append_system_prompt.or(defaults.append_system_prompt),
        fallback_model: overrides.fallback_model.or(defaults.fallback_model),
        json_schema: overrides.json_schema.or(defaults.json_schema),
        extras: {
            let mut merged = defaults.extras;
            merged.extend(overrides.extras);
            merged
        },
    }
}

fn translate(query_result: crate::model::QueryResult) -> AgentResponse {
    let finish_reason = match query_result.status {
        QueryStatus::Success => FinishReason::Success,
        QueryStatus::Partial => FinishReason::Partial,
        QueryStatus::Error => FinishReason::Error,
        QueryStatus::Timeout => FinishReason::Timeout,
        QueryStatus::Cancelled => FinishReason::Cancelled,
    };

    let text = query_result.assistant_text();
    let generation = AgentGeneration {
        output: text,
        finish_reason,
        extras: Default::default(),
    };

    AgentResponse {
        generations: vec![generation],
        metadata: AgentResponseMetadata {
            model: query_result.metadata.model.clone(),
            duration: Some(std::time::Duration::from_millis(query_result.metadata.duration_ms)),
            session_id: query_result.metadata.session_id.clone(),
            provider_fields: Default::default(),
        },
    }
}

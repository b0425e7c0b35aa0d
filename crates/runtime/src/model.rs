//! Core data model (spec.md §3) shared across the transport, judge, jury,
//! and advisor layers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A goal submitted to an [`crate::client::AgentClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub content: String,
    pub working_directory: Option<PathBuf>,
    pub options: AgentOptions,
}

impl Goal {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            working_directory: None,
            options: AgentOptions::default(),
        }
    }
}

/// Vendor-agnostic options, with an open-ended bag for vendor-specific
/// extras. Vendor transports read the fields relevant to them and ignore
/// the rest (spec.md §3 "polymorphic by vendor").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOptions {
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    pub working_directory: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub executable_path: Option<String>,
    /// Auto-approve all tool use, if the vendor exposes such a mode.
    pub yolo: bool,
    pub max_thinking_tokens: Option<u32>,
    pub max_tokens: Option<u32>,
    pub max_turns: Option<u32>,
    pub max_budget_usd: Option<f64>,
    pub permission_mode: Option<PermissionMode>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub system_prompt: Option<String>,
    pub append_system_prompt: Option<String>,
    pub fallback_model: Option<String>,
    pub json_schema: Option<serde_json::Value>,
    /// Open-ended vendor bag for flags with no common representation.
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

/// Request accepted by an [`crate::agent_model::AgentModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskRequest {
    pub goal: String,
    pub working_directory: PathBuf,
    pub options: AgentOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinishReason {
    Success,
    Partial,
    Error,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGeneration {
    pub output: String,
    pub finish_reason: FinishReason,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponseMetadata {
    pub model: Option<String>,
    pub duration: Option<Duration>,
    pub session_id: Option<String>,
    pub provider_fields: HashMap<String, String>,
}

/// Vendor-agnostic response returned by an `AgentModel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub generations: Vec<AgentGeneration>,
    pub metadata: AgentResponseMetadata,
}

impl AgentResponse {
    /// Concatenated output of the first generation, or empty if none.
    pub fn result(&self) -> &str {
        self.generations
            .first()
            .map(|g| g.output.as_str())
            .unwrap_or("")
    }

    pub fn is_successful(&self) -> bool {
        self.generations
            .first()
            .map(|g| g.finish_reason == FinishReason::Success)
            .unwrap_or(false)
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.generations.first().map(|g| g.finish_reason)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            generations: vec![AgentGeneration {
                output: message.into(),
                finish_reason: FinishReason::Error,
                extras: HashMap::new(),
            }],
            metadata: AgentResponseMetadata::default(),
        }
    }
}

/// A block within an `Assistant` message's content sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        text: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A message emitted by a [`crate::stream::processor::StreamingProcessor`]
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System {
        subtype: String,
        data: serde_json::Value,
    },
    Assistant {
        content: Vec<ContentBlock>,
    },
    User {
        content: String,
    },
    Result {
        subtype: ResultSubtype,
        session_id: String,
        is_error: bool,
        num_turns: u32,
        duration_ms: u64,
        duration_api_ms: u64,
        result: String,
        total_cost_usd: Option<f64>,
        usage: Option<Usage>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubtype {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
}

impl Message {
    /// The `session_id` carried by `System{init}` or `Result`, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Message::System { subtype, data } if subtype == "init" => {
                data.get("session_id").and_then(|v| v.as_str())
            }
            Message::Result { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// Bidirectional control frame layered on stream-json (spec.md §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    #[serde(rename = "control_request")]
    Request {
        request_id: String,
        request: ControlPayload,
    },
    #[serde(rename = "control_response")]
    Response {
        response: ControlResponseBody,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlPayload {
    Initialize {
        #[serde(default)]
        hooks: Vec<String>,
    },
    CanUseTool {
        tool_name: String,
        input: serde_json::Value,
    },
    HookCallback {
        hook: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Interrupt,
    SetPermissionMode {
        mode: PermissionMode,
    },
    SetModel {
        model: String,
    },
    McpMessage {
        payload: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponseBody {
    pub request_id: String,
    pub subtype: ControlOutcome,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    Success,
    Error,
}

/// Outcome of a tool-permission callback (spec.md §4.C).
#[derive(Debug, Clone)]
pub enum PermissionResult {
    Allow { updated_input: Option<serde_json::Value> },
    Deny { message: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryStatus {
    Success,
    Partial,
    Error,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cost {
    pub input_token_cost: f64,
    pub output_token_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub model: Option<String>,
    pub cost: Cost,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
    pub api_duration_ms: u64,
    pub session_id: Option<String>,
    pub num_turns: u32,
}

/// Result of driving one vendor transport call to completion (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub messages: Vec<Message>,
    pub metadata: QueryMetadata,
    pub status: QueryStatus,
}

impl QueryResult {
    pub fn has_assistant_message(&self) -> bool {
        self.messages.iter().any(|m| matches!(m, Message::Assistant { .. }))
    }

    /// Concatenation of every `Text` block across `Assistant` messages.
    pub fn assistant_text(&self) -> String {
        let mut out = String::new();
        for m in &self.messages {
            if let Message::Assistant { content } = m {
                for block in content {
                    if let ContentBlock::Text { text } = block {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }
}

/// A score produced by a judge (spec.md §3). Projects to `[0,1]` via
/// [`Score::normalized`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Score {
    Boolean {
        v: bool,
    },
    Numerical {
        value: f64,
        min: f64,
        max: f64,
    },
    Categorical {
        value: String,
        allowed: HashMap<String, f64>,
    },
}

impl Score {
    pub fn normalized(&self) -> f64 {
        match self {
            Score::Boolean { v } => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Score::Numerical { value, min, max } => (value - min) / (max - min),
            Score::Categorical { value, allowed } => {
                allowed.get(value).copied().unwrap_or(0.0)
            }
        }
    }

    pub fn bool(v: bool) -> Self {
        Score::Boolean { v }
    }

    pub fn unit(value: f64) -> Self {
        Score::Numerical {
            value,
            min: 0.0,
            max: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgmentStatus {
    Pass,
    Fail,
    Abstain,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// The outcome of a single judge evaluating a [`JudgmentContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub score: Score,
    pub status: JudgmentStatus,
    pub reasoning: String,
    pub checks: Vec<Check>,
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(skip)]
    pub error: Option<String>,
}

impl Judgment {
    pub fn pass(&self) -> bool {
        self.status == JudgmentStatus::Pass
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            score: Score::bool(false),
            status: JudgmentStatus::Error,
            reasoning: message.into(),
            checks: Vec::new(),
            metadata: HashMap::new(),
            error: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.metadata.insert(
            "elapsed".to_string(),
            serde_json::json!(elapsed.as_secs_f64()),
        );
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Context a judge evaluates (spec.md §3).
#[derive(Debug, Clone)]
pub struct JudgmentContext {
    pub goal: String,
    pub workspace: PathBuf,
    pub agent_output: Option<String>,
    pub execution_time: Duration,
    pub started_at: Instant,
    pub status: ExecutionStatus,
}

/// The aggregated outcome of a jury vote (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub aggregated: Judgment,
    pub individual: Vec<Judgment>,
    pub individual_by_name: Vec<(String, Judgment)>,
    pub weights: HashMap<String, f64>,
    pub strategy_name: String,
}

impl Verdict {
    pub fn by_name(&self, name: &str) -> Option<&Judgment> {
        self.individual_by_name
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, j)| j)
    }
}

/// Request handed from [`crate::client::AgentClient`] into the advisor
/// chain. Mutated in place by advisors during one call.
#[derive(Debug, Clone)]
pub struct AgentClientRequest {
    pub goal: Goal,
    pub context: HashMap<String, serde_json::Value>,
}

impl AgentClientRequest {
    pub fn new(goal: Goal) -> Self {
        Self {
            goal,
            context: HashMap::new(),
        }
    }
}

/// Response produced by the terminal advisor, mutated by post-processing
/// advisors on the way out.
#[derive(Debug, Clone)]
pub struct AgentClientResponse {
    pub response: AgentResponse,
    pub context: HashMap<String, serde_json::Value>,
}

impl AgentClientResponse {
    pub fn is_successful(&self) -> bool {
        self.response.is_successful()
    }

    pub fn judgment(&self) -> Option<Judgment> {
        self.context
            .get("judgment")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.context
            .get("verdict")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

//! Classification of parsed JSON frames into regular messages versus
//! bidirectional control frames, and request/response correlation
//! (spec.md §4.C).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::model::{ControlFrame, ControlOutcome, ControlPayload, ControlResponseBody, Message, PermissionResult};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame missing required field {0:?}")]
    MissingField(&'static str),
    #[error("unrecognized frame type {0:?}")]
    UnknownType(String),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A classified frame, ready for routing to the state machine or to a
/// pending control-request waiter.
#[derive(Debug)]
pub enum Frame {
    Regular(Message),
    Control(ControlFrame),
}

/// Dispatches parsed JSON values by `type` and correlates outbound control
/// requests with their responses.
#[derive(Default)]
pub struct ControlProtocol {
    pending: HashMap<String, oneshot::Sender<ControlResponseBody>>,
}

impl ControlProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one parsed JSON value. `control_response` frames are
    /// consumed to complete any matching outstanding request.
    pub fn dispatch(&mut self, value: Value) -> Result<Frame, ProtocolError> {
        let type_field = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("type"))?
            .to_string();

        match type_field.as_str() {
            "system" | "assistant" | "user" | "result" => {
                let message: Message = serde_json::from_value(value)?;
                Ok(Frame::Regular(message))
            }
            "control_request" => {
                let frame: ControlFrame = serde_json::from_value(value)?;
                Ok(Frame::Control(frame))
            }
            "control_response" => {
                let frame: ControlFrame = serde_json::from_value(value)?;
                if let ControlFrame::Response { response } = &frame {
                    if let Some(tx) = self.pending.remove(&response.request_id) {
                        let _ = tx.send(response.clone());
                    }
                }
                Ok(Frame::Control(frame))
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    /// Register a fresh outbound control request and return its id plus a
    /// receiver that completes when the correlated `control_response`
    /// arrives via [`ControlProtocol::dispatch`].
    pub fn issue_request(&mut self, _payload: &ControlPayload) -> (String, oneshot::Receiver<ControlResponseBody>) {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        (request_id, rx)
    }

    /// Number of outbound requests still awaiting a correlated response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Invoked when a `can_use_tool` control request arrives for a running
/// session.
#[async_trait]
pub trait ToolPermissionCallback: Send + Sync {
    async fn check(
        &self,
        tool_name: &str,
        input: &Value,
        context: &HashMap<String, Value>,
    ) -> PermissionResult;
}

/// Falls back to denying every `can_use_tool` request when a transport is
/// driven without a caller-supplied [`ToolPermissionCallback`] registered —
/// silently allowing tool use by default would be the wrong failure mode.
pub struct DenyByDefault;

#[async_trait]
impl ToolPermissionCallback for DenyByDefault {
    async fn check(&self, _tool_name: &str, _input: &Value, _context: &HashMap<String, Value>) -> PermissionResult {
        PermissionResult::Deny {
            message: Some("no permission callback registered".to_string()),
        }
    }
}

/// Run `callback` against a `can_use_tool` request under `deadline`,
/// producing the `control_response` frame to write back to the subprocess.
/// A callback that errors out is not possible in this signature; a
/// callback that exceeds the deadline is treated as `Deny{"callback failed"}`
/// per spec.md §4.C.
pub async fn answer_can_use_tool(
    callback: &dyn ToolPermissionCallback,
    request_id: &str,
    tool_name: &str,
    input: Value,
    context: &HashMap<String, Value>,
    deadline: Duration,
) -> ControlFrame {
    let outcome = tokio::time::timeout(deadline, callback.check(tool_name, &input, context)).await;

    let response = match outcome {
        Ok(PermissionResult::Allow { updated_input }) => ControlResponseBody {
            request_id: request_id.to_string(),
            subtype: ControlOutcome::Success,
            response: Some(serde_json::json!({
                "behavior": "allow",
                "updatedInput": updated_input,
            })),
            error: None,
        },
        Ok(PermissionResult::Deny { message }) => ControlResponseBody {
            request_id: request_id.to_string(),
            subtype: ControlOutcome::Success,
            response: Some(serde_json::json!({
                "behavior": "deny",
                "message": message,
            })),
            error: None,
        },
        Err(_) => ControlResponseBody {
            request_id: request_id.to_string(),
            subtype: ControlOutcome::Success,
            response: Some(serde_json::json!({
                "behavior": "deny",
                "message": "callback failed",
            })),
            error: None,
        },
    };

    ControlFrame::Response { response }
}

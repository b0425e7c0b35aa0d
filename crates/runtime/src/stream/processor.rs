//! Wires [`StreamParser`] + [`ControlProtocol`] + [`StreamStateMachine`] to
//! a subprocess's output channel (spec.md §4.E).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{ControlFrame, ControlPayload, Message, QueryStatus, ResultSubtype};

use super::control::{answer_can_use_tool, ControlProtocol, Frame, ToolPermissionCallback};
use super::parser::StreamParser;
use super::state_machine::{StateError, StreamStateMachine};

/// Default deadline for a `can_use_tool` callback to answer before the
/// processor responds with `Deny{"callback failed"}` (spec.md §4.C).
pub const DEFAULT_CONTROL_RESPONSE_DEADLINE: Duration = Duration::from_secs(30);

/// Wiring needed to answer inbound `can_use_tool` control requests: a
/// callback to consult and a channel that writes the resulting
/// `control_response` frame back to the subprocess's stdin.
struct ControlChannel {
    stdin: mpsc::UnboundedSender<Vec<u8>>,
    callback: Arc<dyn ToolPermissionCallback>,
    deadline: Duration,
}

/// Wire format the vendor CLI emits on its stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Unstructured text; accumulated whole and wrapped in a synthetic
    /// `Result` at close.
    Text,
    /// A single JSON value is expected, behaves like `StreamJson` capped
    /// at one message.
    Json,
    /// Line/byte-accumulated stream-json, the common case.
    StreamJson,
}

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);
const SOFT_CLOSE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of driving a processor to completion.
#[derive(Debug, Clone)]
pub struct ProcessorOutcome {
    pub messages: Vec<Message>,
    pub status: QueryStatus,
    pub session_id: Option<String>,
    pub hang_warned: bool,
}

/// Consumes chunks from a [`crate::sandbox::Sandbox::exec_streaming`] call,
/// feeding them through the parser/protocol/state-machine stack and
/// invoking `consumer` for every regular message.
pub struct StreamingProcessor {
    parser: StreamParser,
    protocol: ControlProtocol,
    state_machine: StreamStateMachine,
    format: StreamFormat,
    message_idle_timeout: Duration,
    total_timeout: Duration,
    closed: AtomicBool,
    control: Option<ControlChannel>,
}

impl StreamingProcessor {
    pub fn new(format: StreamFormat, message_idle_timeout: Duration, total_timeout: Duration) -> Self {
        Self {
            parser: StreamParser::new(),
            protocol: ControlProtocol::new(),
            state_machine: StreamStateMachine::new(Instant::now()),
            format,
            message_idle_timeout,
            total_timeout,
            closed: AtomicBool::new(false),
            control: None,
        }
    }

    /// Register the wiring needed to answer inbound `can_use_tool` control
    /// requests: `stdin` carries the serialized `control_response` frame
    /// back to the subprocess, `callback` decides allow/deny, and
    /// `deadline` bounds how long the callback may take before the
    /// processor answers `Deny{"callback failed"}` on its behalf.
    pub fn with_control_channel(
        mut self,
        stdin: mpsc::UnboundedSender<Vec<u8>>,
        callback: Arc<dyn ToolPermissionCallback>,
        deadline: Duration,
    ) -> Self {
        self.control = Some(ControlChannel { stdin, callback, deadline });
        self
    }

    /// Drain `chunks` until the sender side is dropped (the subprocess's
    /// output ended) or `total_timeout` elapses, invoking `consumer` for
    /// every message recognized along the way.
    pub async fn run(
        &mut self,
        mut chunks: mpsc::UnboundedReceiver<Vec<u8>>,
        mut consumer: impl FnMut(&Message),
    ) -> ProcessorOutcome {
        let stream_started_at = Instant::now();
        let mut last_message_at = stream_started_at;
        let mut emitted = 0u32;
        let mut messages = Vec::new();
        let mut hang_warned = false;
        let mut text_accum = String::new();
        let mut timed_out = false;

        let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);
        watchdog.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                biased;
                maybe_chunk = chunks.recv() => {
                    match maybe_chunk {
                        Some(bytes) => {
                            if self.format == StreamFormat::Text {
                                text_accum.push_str(&String::from_utf8_lossy(&bytes));
                                continue;
                            }
                            match self.feed_and_route(&bytes, &mut consumer).await {
                                Some(msg) => {
                                    last_message_at = Instant::now();
                                    emitted += 1;
                                    let is_result = matches!(msg, Message::Result { .. });
                                    messages.push(msg);
                                    if is_result && self.state_machine.is_complete() {
                                        tokio::time::sleep(SOFT_CLOSE_DELAY).await;
                                        break;
                                    }
                                    if self.format == StreamFormat::Json {
                                        break;
                                    }
                                }
                                None => {}
                            }
                        }
                        None => break,
                    }
                }
                _ = watchdog.tick() => {
                    let now = Instant::now();
                    if now.duration_since(last_message_at) > self.message_idle_timeout && emitted > 0 {
                        warn!(
                            idle_for = ?now.duration_since(last_message_at),
                            "stream has not emitted a message in longer than the idle timeout"
                        );
                        hang_warned = true;
                    }
                    if now.duration_since(stream_started_at) > self.total_timeout {
                        warn!("stream exceeded its total timeout, ending processor loop");
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        if self.format == StreamFormat::Text {
            let synthetic = Message::Result {
                subtype: ResultSubtype::Success,
                session_id: String::new(),
                is_error: false,
                num_turns: 1,
                duration_ms: stream_started_at.elapsed().as_millis() as u64,
                duration_api_ms: 0,
                result: text_accum,
                total_cost_usd: None,
                usage: None,
            };
            consumer(&synthetic);
            messages.push(synthetic);
        }

        let status = if timed_out {
            QueryStatus::Timeout
        } else {
            derive_status(&messages)
        };

        let session_id = self.state_machine.validate_completion().ok().and_then(|s| s.session_id);

        ProcessorOutcome {
            messages,
            status,
            session_id,
            hang_warned,
        }
    }

    async fn feed_and_route(&mut self, bytes: &[u8], consumer: &mut impl FnMut(&Message)) -> Option<Message> {
        let value = match self.parser.feed(bytes) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "stream parser buffer overflow, frame discarded");
                return None;
            }
        };

        match self.protocol.dispatch(value) {
            Ok(Frame::Regular(message)) => {
                match self.state_machine.process_message(&message) {
                    Ok(()) => {}
                    Err(StateError::AlreadyFailed) => {
                        debug!("ignoring message on an already-failed stream");
                    }
                    Err(e) => {
                        warn!(error = %e, "stream protocol violation");
                    }
                }
                consumer(&message);
                Some(message)
            }
            Ok(Frame::Control(ControlFrame::Request {
                request_id,
                request: ControlPayload::CanUseTool { tool_name, input },
            })) => {
                self.answer_can_use_tool(&request_id, &tool_name, input).await;
                None
            }
            Ok(Frame::Control(_other)) => None,
            Err(e) => {
                warn!(error = %e, "malformed control/stream frame");
                None
            }
        }
    }

    /// Invoke the registered [`ToolPermissionCallback`] and write the
    /// resulting `control_response` frame back to the subprocess's stdin.
    /// A `can_use_tool` request with no registered callback is logged and
    /// left unanswered — the vendor CLI is responsible for its own
    /// fallback behavior on a request that never gets a response.
    async fn answer_can_use_tool(&self, request_id: &str, tool_name: &str, input: serde_json::Value) {
        let Some(control) = &self.control else {
            warn!(request_id, tool_name, "can_use_tool request arrived with no permission callback registered");
            return;
        };

        let response = answer_can_use_tool(
            control.callback.as_ref(),
            request_id,
            tool_name,
            input,
            &HashMap::new(),
            control.deadline,
        )
        .await;

        match serde_json::to_vec(&response) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                if control.stdin.send(bytes).is_err() {
                    warn!(request_id, "failed to write control_response, subprocess stdin closed");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize control_response"),
        }
    }

    /// Flush the parser, validate completion, and mark the processor
    /// closed. Idempotent.
    pub fn close(&mut self) -> Option<CloseSummary> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return None;
        }
        let _ = self.parser.flush();
        let stats = self.parser.stats();
        let completion = self.state_machine.validate_completion().ok();
        Some(CloseSummary { stats, completion })
    }
}

#[derive(Debug, Clone)]
pub struct CloseSummary {
    pub stats: super::parser::ParserStats,
    pub completion: Option<super::state_machine::CompletionSummary>,
}

fn derive_status(messages: &[Message]) -> QueryStatus {
    let terminal_result = messages.iter().rev().find_map(|m| match m {
        Message::Result { subtype, .. } => Some(*subtype),
        _ => None,
    });
    let has_assistant = messages.iter().any(|m| matches!(m, Message::Assistant { .. }));

    match terminal_result {
        Some(ResultSubtype::Success) => QueryStatus::Success,
        Some(ResultSubtype::Error) if has_assistant => QueryStatus::Error,
        Some(ResultSubtype::Error) => QueryStatus::Error,
        None if has_assistant => QueryStatus::Partial,
        None => QueryStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(json: &str) -> Vec<u8> {
        json.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn happy_path_yields_success_with_session_id() {
        let mut processor = StreamingProcessor::new(
            StreamFormat::StreamJson,
            Duration::from_secs(30),
            Duration::from_secs(600),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(frame(r#"{"type":"system","subtype":"init","data":{"session_id":"s1"}}"#)).unwrap();
        tx.send(frame(r#"{"type":"assistant","content":[{"type":"text","text":"4"}]}"#)).unwrap();
        tx.send(frame(r#"{"type":"result","subtype":"success","session_id":"s1","is_error":false,"num_turns":1,"duration_ms":5,"duration_api_ms":5,"result":"4"}"#)).unwrap();
        drop(tx);

        let mut seen = Vec::new();
        let outcome = processor.run(rx, |m| seen.push(format!("{m:?}"))).await;

        assert_eq!(outcome.status, QueryStatus::Success);
        assert_eq!(outcome.session_id.as_deref(), Some("s1"));
        assert_eq!(outcome.messages.len(), 3);
        assert!(!seen.is_empty());
    }

    #[tokio::test]
    async fn text_format_wraps_accumulated_output_in_synthetic_result() {
        let mut processor = StreamingProcessor::new(
            StreamFormat::Text,
            Duration::from_secs(30),
            Duration::from_secs(600),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(b"hello ".to_vec()).unwrap();
        tx.send(b"world".to_vec()).unwrap();
        drop(tx);

        let outcome = processor.run(rx, |_| {}).await;
        assert_eq!(outcome.messages.len(), 1);
        match &outcome.messages[0] {
            Message::Result { result, .. } => assert_eq!(result, "hello world"),
            other => panic!("expected synthetic Result, got {other:?}"),
        }
    }

    struct AlwaysAllow;
    #[async_trait::async_trait]
    impl super::super::control::ToolPermissionCallback for AlwaysAllow {
        async fn check(
            &self,
            _tool_name: &str,
            _input: &serde_json::Value,
            _context: &std::collections::HashMap<String, serde_json::Value>,
        ) -> crate::model::PermissionResult {
            crate::model::PermissionResult::Allow { updated_input: None }
        }
    }

    /// A `can_use_tool` control request is answered via the registered
    /// callback and the `control_response` frame is written back to the
    /// subprocess's stdin, rather than silently dropped.
    #[tokio::test]
    async fn can_use_tool_request_is_answered_and_written_to_stdin() {
        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel();
        let mut processor = StreamingProcessor::new(
            StreamFormat::StreamJson,
            Duration::from_secs(30),
            Duration::from_secs(600),
        )
        .with_control_channel(stdin_tx, std::sync::Arc::new(AlwaysAllow), Duration::from_secs(1));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(frame(
            r#"{"type":"control_request","request_id":"r1","request":{"subtype":"can_use_tool","tool_name":"bash","input":{}}}"#,
        ))
        .unwrap();
        tx.send(frame(r#"{"type":"result","subtype":"success","session_id":"s1","is_error":false,"num_turns":1,"duration_ms":5,"duration_api_ms":5,"result":"done"}"#)).unwrap();
        drop(tx);

        processor.run(rx, |_| {}).await;

        let written = stdin_rx.try_recv().expect("expected a control_response to be written");
        let value: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(value["type"], "control_response");
        assert_eq!(value["response"]["request_id"], "r1");
        assert_eq!(value["response"]["response"]["behavior"], "allow");
    }

    #[test]
    fn close_is_idempotent() {
        let mut processor = StreamingProcessor::new(
            StreamFormat::StreamJson,
            Duration::from_secs(30),
            Duration::from_secs(600),
        );
        assert!(processor.close().is_some());
        assert!(processor.close().is_none());
    }
}

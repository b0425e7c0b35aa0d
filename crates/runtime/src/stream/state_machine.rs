//! Validates message ordering against the expected session flow
//! `init → (assistant | user | system)* → result` (spec.md §4.D).

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::model::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    AwaitingInit,
    AwaitingContent,
    Completed,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("expected System{{init}} as the first message, got something else")]
    ExpectedInit,
    #[error("result session_id {got:?} does not match init session_id {expected:?}")]
    SessionMismatch { expected: Option<String>, got: String },
    #[error("message received after the stream already failed")]
    AlreadyFailed,
    #[error("validate_completion called before the stream reached Completed")]
    NotComplete,
}

/// Summary returned by [`StreamStateMachine::validate_completion`].
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub total_messages: u32,
    pub duration: Duration,
    pub session_id: Option<String>,
    pub has_assistant_response: bool,
}

pub struct StreamStateMachine {
    state: StreamState,
    session_id: Option<String>,
    started_at: Instant,
    total_messages: u32,
    has_assistant: bool,
}

impl StreamStateMachine {
    pub fn new(started_at: Instant) -> Self {
        Self {
            state: StreamState::AwaitingInit,
            session_id: None,
            started_at,
            total_messages: 0,
            has_assistant: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == StreamState::Completed
    }

    pub fn process_message(&mut self, message: &Message) -> Result<(), StateError> {
        match self.state {
            StreamState::AwaitingInit => match message {
                Message::System { subtype, .. } if subtype == "init" => {
                    self.session_id = message.session_id().map(String::from);
                    self.total_messages += 1;
                    self.state = StreamState::AwaitingContent;
                    Ok(())
                }
                _ => {
                    self.state = StreamState::Error;
                    Err(StateError::ExpectedInit)
                }
            },
            StreamState::AwaitingContent => match message {
                Message::Assistant { .. } => {
                    self.has_assistant = true;
                    self.total_messages += 1;
                    Ok(())
                }
                Message::User { .. } | Message::System { .. } => {
                    self.total_messages += 1;
                    Ok(())
                }
                Message::Result { session_id, .. } => {
                    self.total_messages += 1;
                    if self.session_id.as_deref() != Some(session_id.as_str()) {
                        self.state = StreamState::Error;
                        return Err(StateError::SessionMismatch {
                            expected: self.session_id.clone(),
                            got: session_id.clone(),
                        });
                    }
                    if !self.has_assistant {
                        warn!("result received with no prior assistant message");
                    }
                    self.state = StreamState::Completed;
                    Ok(())
                }
            },
            StreamState::Completed => {
                debug!("dropping message received after stream completion");
                Ok(())
            }
            StreamState::Error => Err(StateError::AlreadyFailed),
        }
    }

    pub fn validate_completion(&self) -> Result<CompletionSummary, StateError> {
        if self.state != StreamState::Completed {
            return Err(StateError::NotComplete);
        }
        Ok(CompletionSummary {
            total_messages: self.total_messages,
            duration: self.started_at.elapsed(),
            session_id: self.session_id.clone(),
            has_assistant_response: self.has_assistant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentBlock, ResultSubtype};

    fn init(session_id: &str) -> Message {
        Message::System {
            subtype: "init".to_string(),
            data: serde_json::json!({ "session_id": session_id }),
        }
    }

    fn assistant(text: &str) -> Message {
        Message::Assistant {
            content: vec![ContentBlock::Text { text: text.to_string() }],
        }
    }

    fn result(session_id: &str) -> Message {
        Message::Result {
            subtype: ResultSubtype::Success,
            session_id: session_id.to_string(),
            is_error: false,
            num_turns: 1,
            duration_ms: 10,
            duration_api_ms: 10,
            result: "done".to_string(),
            total_cost_usd: None,
            usage: None,
        }
    }

    #[test]
    fn happy_path_reaches_completed_with_matching_session() {
        let mut sm = StreamStateMachine::new(Instant::now());
        sm.process_message(&init("s1")).unwrap();
        sm.process_message(&assistant("4")).unwrap();
        sm.process_message(&result("s1")).unwrap();
        assert!(sm.is_complete());
        let summary = sm.validate_completion().unwrap();
        assert_eq!(summary.session_id.as_deref(), Some("s1"));
        assert!(summary.has_assistant_response);
        assert_eq!(summary.total_messages, 3);
    }

    #[test]
    fn message_before_init_is_an_error() {
        let mut sm = StreamStateMachine::new(Instant::now());
        let err = sm.process_message(&assistant("oops")).unwrap_err();
        assert!(matches!(err, StateError::ExpectedInit));
        assert!(matches!(sm.state(), StreamState::Error));
    }

    #[test]
    fn mismatched_session_id_fails() {
        let mut sm = StreamStateMachine::new(Instant::now());
        sm.process_message(&init("s1")).unwrap();
        let err = sm.process_message(&result("s2")).unwrap_err();
        assert!(matches!(err, StateError::SessionMismatch { .. }));
    }

    #[test]
    fn messages_after_completion_are_dropped_not_errors() {
        let mut sm = StreamStateMachine::new(Instant::now());
        sm.process_message(&init("s1")).unwrap();
        sm.process_message(&result("s1")).unwrap();
        assert!(sm.process_message(&assistant("late")).is_ok());
    }

    #[test]
    fn validate_completion_before_done_errors() {
        let sm = StreamStateMachine::new(Instant::now());
        assert!(matches!(sm.validate_completion(), Err(StateError::NotComplete)));
    }
}

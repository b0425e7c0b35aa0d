//! Incremental stream-json parsing, control-protocol dispatch, session
//! state tracking, and the processor that wires them to a subprocess's
//! output (spec.md §4.B–E).

pub mod control;
pub mod parser;
pub mod processor;
pub mod state_machine;

pub use control::{answer_can_use_tool, ControlProtocol, DenyByDefault, Frame, ProtocolError, ToolPermissionCallback};
pub use parser::{ParseError, ParserStats, StreamParser};
pub use processor::{CloseSummary, ProcessorOutcome, StreamFormat, StreamingProcessor, DEFAULT_CONTROL_RESPONSE_DEADLINE};
pub use state_machine::{CompletionSummary, StateError, StreamState, StreamStateMachine};

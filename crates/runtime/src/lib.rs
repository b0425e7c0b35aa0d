//! Agent orchestration runtime.
//!
//! Drives vendor coding-agent CLIs (`claude`, `codex`, `aider`, `gemini`,
//! `amp`) behind a uniform [`transport::AgentTransport`], streams and
//! parses their stream-json output, and grades the result with a
//! configurable panel of judges. Layers, outside in:
//!
//! [`client::AgentClient`] -> [`advisor::AdvisorChain`] -> [`agent_model::AgentModel`]
//! -> [`transport::AgentTransport`] -> [`sandbox::Sandbox`]

pub mod advisor;
pub mod agent_model;
pub mod client;
pub mod judge;
pub mod jury;
pub mod model;
pub mod prelude;
pub mod resilience;
pub mod sandbox;
pub mod stream;
pub mod transport;

pub use agent_model::{AgentCallOutcome, AgentModel};
pub use client::{AgentClient, ClientError, MessageStream};

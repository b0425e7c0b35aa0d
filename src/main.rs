//! Thin CLI launcher: `symbi <agent-id> key=value …`.
//!
//! Parses the positional `agent-id` and `key=value` pairs, builds a
//! `Goal`, hand-wires an `AgentClient` for the matching vendor transport,
//! and prints the response. No config-file loading or DI container —
//! that is explicitly out of scope (see spec.md §1 / SPEC_FULL.md §D).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use symbi_runtime::advisor::AdvisorChain;
use symbi_runtime::agent_model::AgentModel;
use symbi_runtime::client::AgentClient;
use symbi_runtime::model::AgentOptions;
use symbi_runtime::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use symbi_runtime::sandbox::LocalSandbox;
use symbi_runtime::transport::{
    AgentTransport, AiderTransport, AmpTransport, ClaudeTransport, CodexTransport, GeminiTransport,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("symbi {VERSION}");
        return Ok(());
    }

    let Some((agent_id, rest)) = args.split_first() else {
        eprintln!("usage: symbi <agent-id> key=value …");
        std::process::exit(2);
    };

    if !is_valid_agent_id(agent_id) {
        eprintln!("invalid agent-id {agent_id:?}: must match [a-z0-9][a-z0-9-]{{0,63}}");
        std::process::exit(2);
    }

    let fields = parse_key_values(rest);

    let goal_text = match fields.get("goal") {
        Some(g) => g.clone(),
        None => {
            eprintln!("missing required input: goal=<text>");
            std::process::exit(2);
        }
    };

    let working_directory = fields
        .get("working_directory")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

    let mut options = AgentOptions::default();
    if let Some(model) = fields.get("model") {
        options.model = Some(model.clone());
    }
    if let Some(yolo) = fields.get("yolo") {
        options.yolo = yolo == "true" || yolo == "1";
    }

    let transport = build_transport(agent_id).with_context(|| format!("unknown agent-id: {agent_id}"))?;
    let model = Arc::new(AgentModel::new(transport, AgentOptions::default()));
    let chain = Arc::new(AdvisorChain::new(Vec::new()));
    let client = AgentClient::new(model, chain)
        .goal(goal_text)
        .working_directory(working_directory)
        .options(options);

    let response = client.run().await.context("agent call failed")?;

    println!("{}", response.response.result());

    if !response.is_successful() {
        std::process::exit(1);
    }

    Ok(())
}

fn is_valid_agent_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    id.len() <= 64 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Split each `key=value` on the first `=`; duplicate keys take last-wins;
/// a bare `key` with no `=` produces an empty value.
fn parse_key_values(pairs: &[String]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) => {
                fields.insert(key.to_string(), value.to_string());
            }
            None => {
                fields.insert(pair.clone(), String::new());
            }
        }
    }
    fields
}

fn build_transport(agent_id: &str) -> Result<Box<dyn AgentTransport>> {
    let sandbox = Arc::new(LocalSandbox::new());
    let breaker = CircuitBreaker::shared(CircuitBreakerConfig::default_preset(agent_id));
    let retry = RetryPolicy::default();
    match agent_id {
        "claude" => Ok(Box::new(ClaudeTransport::new(
            symbi_runtime::transport::claude::ClaudeAdapter,
            sandbox,
            breaker,
            retry,
        ))),
        "codex" => Ok(Box::new(CodexTransport::new(
            symbi_runtime::transport::codex::CodexAdapter,
            sandbox,
            breaker,
            retry,
        ))),
        "aider" => Ok(Box::new(AiderTransport::new(
            symbi_runtime::transport::aider::AiderAdapter,
            sandbox,
            breaker,
            retry,
        ))),
        "gemini" => Ok(Box::new(GeminiTransport::new(
            symbi_runtime::transport::gemini::GeminiAdapter,
            sandbox,
            breaker,
            retry,
        ))),
        "amp" => Ok(Box::new(AmpTransport::new(
            symbi_runtime::transport::amp::AmpAdapter,
            sandbox,
            breaker,
            retry,
        ))),
        other => bail!("no vendor transport registered for agent-id {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_agent_ids_match_spec_pattern() {
        assert!(is_valid_agent_id("claude"));
        assert!(is_valid_agent_id("my-agent-1"));
        assert!(!is_valid_agent_id("Claude"));
        assert!(!is_valid_agent_id("-leading-dash"));
        assert!(!is_valid_agent_id(""));
    }

    #[test]
    fn key_values_split_on_first_equals_and_last_wins_on_duplicates() {
        let pairs = vec!["goal=fix bug=now".to_string(), "model=claude-3".to_string(), "model=claude-4".to_string()];
        let fields = parse_key_values(&pairs);
        assert_eq!(fields.get("goal").unwrap(), "fix bug=now");
        assert_eq!(fields.get("model").unwrap(), "claude-4");
    }

    #[test]
    fn bare_key_without_equals_produces_empty_value() {
        let pairs = vec!["yolo".to_string()];
        let fields = parse_key_values(&pairs);
        assert_eq!(fields.get("yolo").unwrap(), "");
    }
}

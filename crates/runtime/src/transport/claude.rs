//! Claude Code vendor transport.
//!
//! Argv construction is grounded in the teacher's `ClaudeCodeAdapter`
//! (`--print`/`--output-format`, `--max-turns`, tool allow/deny lists,
//! system prompt flags), generalized to emit `stream-json` so the output
//! flows through the shared [`StreamingProcessor`] rather than being
//! parsed as one blob at exit.

use crate::model::AgentOptions;
use crate::stream::StreamFormat;

use super::generic::GenericTransport;
use super::VendorAdapter;

pub type ClaudeTransport = GenericTransport<ClaudeAdapter>;

pub struct ClaudeAdapter;

impl VendorAdapter for ClaudeAdapter {
    fn vendor_name(&self) -> &'static str {
        "claude"
    }

    fn default_executable(&self) -> &str {
        "claude"
    }

    fn executable_env_override(&self) -> &'static str {
        "CLAUDE_CLI_PATH"
    }

    fn secret_env_vars(&self) -> &'static [&'static str] {
        &["ANTHROPIC_API_KEY"]
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::StreamJson
    }

    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];

        if options.yolo {
            args.push("--dangerously-skip-permissions".to_string());
        } else if let Some(mode) = options.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(permission_mode_flag(mode).to_string());
        }

        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(fallback) = &options.fallback_model {
            args.push("--fallback-model".to_string());
            args.push(fallback.clone());
        }
        if let Some(max_turns) = options.max_turns {
            args.push("--max-turns".to_string());
            args.push(max_turns.to_string());
        }
        if let Some(thinking) = options.max_thinking_tokens {
            args.push("--max-thinking-tokens".to_string());
            args.push(thinking.to_string());
        }
        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        if !options.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(options.disallowed_tools.join(","));
        }
        if let Some(prompt) = &options.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(prompt.clone());
        }
        if let Some(append) = &options.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(append.clone());
        }
        args
    }

    fn resume_args(&self, session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = self.build_args(prompt, options);
        args.push("--resume".to_string());
        args.push(session_id.to_string());
        args
    }
}

fn permission_mode_flag(mode: crate::model::PermissionMode) -> &'static str {
    use crate::model::PermissionMode::*;
    match mode {
        Default => "default",
        AcceptEdits => "acceptEdits",
        BypassPermissions => "bypassPermissions",
        Plan => "plan",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_includes_stream_json_output_format() {
        let adapter = ClaudeAdapter;
        let args = adapter.build_args("hi", &AgentOptions::default());
        assert!(args.contains(&"stream-json".to_string()));
    }

    #[test]
    fn yolo_maps_to_dangerously_skip_permissions() {
        let adapter = ClaudeAdapter;
        let options = AgentOptions { yolo: true, ..Default::default() };
        let args = adapter.build_args("hi", &options);
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn resume_appends_session_flag() {
        let adapter = ClaudeAdapter;
        let args = adapter.resume_args("s1", "continue", &AgentOptions::default());
        let idx = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[idx + 1], "s1");
    }
}

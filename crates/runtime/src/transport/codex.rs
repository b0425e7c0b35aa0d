//! Codex vendor transport, grounded in the teacher's `CodexAdapter`
//! (`exec --full-auto|--suggest --json`).

use crate::model::AgentOptions;
use crate::stream::StreamFormat;

use super::generic::GenericTransport;
use super::VendorAdapter;

pub type CodexTransport = GenericTransport<CodexAdapter>;

pub struct CodexAdapter;

impl VendorAdapter for CodexAdapter {
    fn vendor_name(&self) -> &'static str {
        "codex"
    }

    fn default_executable(&self) -> &str {
        "codex"
    }

    fn executable_env_override(&self) -> &'static str {
        "CODEX_CLI_PATH"
    }

    fn secret_env_vars(&self) -> &'static [&'static str] {
        &["OPENAI_API_KEY"]
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::StreamJson
    }

    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if options.yolo {
            args.push("--full-auto".to_string());
        } else {
            args.push("--suggest".to_string());
        }
        args.push("--json".to_string());
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(prompt.to_string());
        args
    }

    fn resume_args(&self, _session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String> {
        // Codex `exec` has no native resume; re-issue the prompt fresh.
        self.build_args(prompt, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolo_selects_full_auto() {
        let adapter = CodexAdapter;
        let options = AgentOptions { yolo: true, ..Default::default() };
        let args = adapter.build_args("fix it", &options);
        assert!(args.contains(&"--full-auto".to_string()));
    }

    #[test]
    fn default_is_suggest_mode() {
        let adapter = CodexAdapter;
        let args = adapter.build_args("fix it", &AgentOptions::default());
        assert!(args.contains(&"--suggest".to_string()));
    }
}

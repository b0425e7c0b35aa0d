//! Aider vendor transport, grounded in the teacher's `AiderAdapter`
//! (`--yes-always --no-auto-commits --message`). Aider's output is
//! unstructured text, so this vendor drives the `Text` stream format
//! rather than `StreamJson`.

use crate::model::AgentOptions;
use crate::stream::StreamFormat;

use super::generic::GenericTransport;
use super::VendorAdapter;

pub type AiderTransport = GenericTransport<AiderAdapter>;

pub struct AiderAdapter;

impl VendorAdapter for AiderAdapter {
    fn vendor_name(&self) -> &'static str {
        "aider"
    }

    fn default_executable(&self) -> &str {
        "aider"
    }

    fn executable_env_override(&self) -> &'static str {
        "AIDER_CLI_PATH"
    }

    fn secret_env_vars(&self) -> &'static [&'static str] {
        &["OPENAI_API_KEY", "ANTHROPIC_API_KEY"]
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Text
    }

    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = vec!["--yes-always".to_string(), "--no-auto-commits".to_string()];
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push("--message".to_string());
        args.push(prompt.to_string());
        args
    }

    fn resume_args(&self, _session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String> {
        self.build_args(prompt, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_passes_prompt_as_message() {
        let adapter = AiderAdapter;
        let args = adapter.build_args("fix the bug", &AgentOptions::default());
        let idx = args.iter().position(|a| a == "--message").unwrap();
        assert_eq!(args[idx + 1], "fix the bug");
    }
}

//! Gemini CLI vendor transport. New adapter (the teacher has no Gemini
//! integration) written in the same idiom as [`super::claude`] and
//! [`super::codex`]: non-interactive flags, explicit model flag, and
//! `stream-json`-shaped output for the shared streaming processor.

use crate::model::AgentOptions;
use crate::stream::StreamFormat;

use super::generic::GenericTransport;
use super::VendorAdapter;

pub type GeminiTransport = GenericTransport<GeminiAdapter>;

pub struct GeminiAdapter;

impl VendorAdapter for GeminiAdapter {
    fn vendor_name(&self) -> &'static str {
        "gemini"
    }

    fn default_executable(&self) -> &str {
        "gemini"
    }

    fn executable_env_override(&self) -> &'static str {
        "GEMINI_CLI_PATH"
    }

    fn secret_env_vars(&self) -> &'static [&'static str] {
        &["GEMINI_API_KEY", "GOOGLE_API_KEY"]
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::StreamJson
    }

    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = vec!["--output-format".to_string(), "stream-json".to_string()];
        if options.yolo {
            args.push("--yolo".to_string());
        } else {
            args.push("--approval-mode".to_string());
            args.push("default".to_string());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if !options.allowed_tools.is_empty() {
            args.push("--allowed-tools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        args.push("--prompt".to_string());
        args.push(prompt.to_string());
        args
    }

    fn resume_args(&self, session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = self.build_args(prompt, options);
        args.push("--session-id".to_string());
        args.push(session_id.to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolo_maps_to_yolo_flag() {
        let adapter = GeminiAdapter;
        let options = AgentOptions { yolo: true, ..Default::default() };
        let args = adapter.build_args("hi", &options);
        assert!(args.contains(&"--yolo".to_string()));
    }
}

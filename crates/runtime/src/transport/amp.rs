//! Amp CLI vendor transport. New adapter, same idiom as [`super::gemini`].

use crate::model::AgentOptions;
use crate::stream::StreamFormat;

use super::generic::GenericTransport;
use super::VendorAdapter;

pub type AmpTransport = GenericTransport<AmpAdapter>;

pub struct AmpAdapter;

impl VendorAdapter for AmpAdapter {
    fn vendor_name(&self) -> &'static str {
        "amp"
    }

    fn default_executable(&self) -> &str {
        "amp"
    }

    fn executable_env_override(&self) -> &'static str {
        "AMP_CLI_PATH"
    }

    fn secret_env_vars(&self) -> &'static [&'static str] {
        &["ANTHROPIC_API_KEY"]
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::StreamJson
    }

    fn build_args(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = vec!["--stream-json".to_string()];
        if options.yolo {
            args.push("--dangerously-allow-all".to_string());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(prompt.to_string());
        args
    }

    fn resume_args(&self, session_id: &str, prompt: &str, options: &AgentOptions) -> Vec<String> {
        let mut args = self.build_args(prompt, options);
        args.push("--thread".to_string());
        args.push(session_id.to_string());
        args
    }
}

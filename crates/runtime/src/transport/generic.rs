//! Shared execution machinery for every vendor transport: resolve the
//! executable, wrap the call in a circuit breaker + retry policy, drive
//! the sandboxed subprocess through a [`StreamingProcessor`], and project
//! the result into a [`QueryResult`] (spec.md §4.H).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{AgentOptions, Goal, QueryMetadata, QueryResult, QueryStatus};
use crate::resilience::{CircuitBreaker, CircuitError, RetryPolicy};
use crate::sandbox::{ExecResult, ExecSpec, Sandbox, SandboxError};
use crate::stream::{
    DenyByDefault, ProcessorOutcome, StreamingProcessor, ToolPermissionCallback, DEFAULT_CONTROL_RESPONSE_DEADLINE,
};

use super::resolve::resolve_executable;
use super::{AgentTransport, TransportError, VendorAdapter};

const MESSAGE_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(600);

pub struct GenericTransport<A: VendorAdapter> {
    adapter: A,
    sandbox: Arc<dyn Sandbox>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    permission_callback: Arc<dyn ToolPermissionCallback>,
}

impl<A: VendorAdapter> GenericTransport<A> {
    pub fn new(
        adapter: A,
        sandbox: Arc<dyn Sandbox>,
        circuit_breaker: Arc<CircuitBreaker>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            adapter,
            sandbox,
            circuit_breaker,
            retry_policy,
            permission_callback: Arc::new(DenyByDefault),
        }
    }

    /// Register the callback invoked for inbound `can_use_tool` control
    /// requests (spec.md §4.C). Without one, every such request is denied
    /// with `"no permission callback registered"`.
    pub fn with_permission_callback(mut self, callback: Arc<dyn ToolPermissionCallback>) -> Self {
        self.permission_callback = callback;
        self
    }

    fn resolve(&self, options: &AgentOptions) -> Result<String, TransportError> {
        if let Some(explicit) = &options.executable_path {
            return Ok(explicit.clone());
        }
        resolve_executable(self.adapter.default_executable(), self.adapter.executable_env_override())
            .map(|p| p.display().to_string())
            .ok_or_else(|| TransportError::ExecutableNotFound {
                vendor: self.adapter.vendor_name().to_string(),
            })
    }

    fn build_spec(
        &self,
        executable: &str,
        argv: Vec<String>,
        working_directory: Option<&std::path::Path>,
        options: &AgentOptions,
    ) -> ExecSpec {
        let mut full = vec![executable.to_string()];
        full.extend(argv);

        let mut env: HashMap<String, String> = HashMap::new();
        for key in self.adapter.secret_env_vars() {
            if let Ok(v) = std::env::var(key) {
                env.insert(key.to_string(), v);
            }
        }
        env.extend(options.env.clone());

        let cwd: PathBuf = working_directory
            .map(PathBuf::from)
            .or_else(|| options.working_directory.clone())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

        let timeout = options.timeout.unwrap_or(DEFAULT_TOTAL_TIMEOUT);
        ExecSpec::new(full, cwd, timeout).with_env(env)
    }

    async fn run_once(&self, spec: ExecSpec) -> Result<(ExecResult, ProcessorOutcome), SandboxError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let exec_fut = self.sandbox.exec_streaming(spec, tx, stdin_rx);

        let mut processor =
            StreamingProcessor::new(self.adapter.stream_format(), MESSAGE_IDLE_TIMEOUT, DEFAULT_TOTAL_TIMEOUT)
                .with_control_channel(stdin_tx, self.permission_callback.clone(), DEFAULT_CONTROL_RESPONSE_DEADLINE);
        let processor_fut = processor.run(rx, |_msg| {});

        let (exec_result, outcome) = tokio::join!(exec_fut, processor_fut);
        Ok((exec_result?, outcome))
    }

    fn to_query_result(&self, exec_result: &ExecResult, outcome: ProcessorOutcome) -> QueryResult {
        let status = if !exec_result.success() {
            QueryStatus::Error
        } else if outcome.messages.is_empty() {
            QueryStatus::Partial
        } else {
            outcome.status
        };

        let (num_turns, total_cost_usd, usage) = outcome
            .messages
            .iter()
            .rev()
            .find_map(|m| match m {
                crate::model::Message::Result {
                    num_turns,
                    total_cost_usd,
                    usage,
                    ..
                } => Some((*num_turns, *total_cost_usd, usage.clone())),
                _ => None,
            })
            .unwrap_or((0, None, None));

        let metadata = QueryMetadata {
            model: None,
            cost: crate::model::Cost {
                input_token_cost: 0.0,
                output_token_cost: 0.0,
                input_tokens: usage.as_ref().map(|u| u.input_tokens).unwrap_or_default(),
                output_tokens: usage.as_ref().map(|u| u.output_tokens).unwrap_or_default(),
                model: None,
            },
            usage,
            duration_ms: exec_result.duration.as_millis() as u64,
            api_duration_ms: 0,
            session_id: outcome.session_id.clone(),
            num_turns,
        };
        let _ = total_cost_usd;

        QueryResult {
            messages: outcome.messages,
            metadata,
            status,
        }
    }

    async fn drive(&self, spec: ExecSpec) -> Result<QueryResult, TransportError> {
        match self
            .circuit_breaker
            .execute(|| self.retry_policy.retry(|| self.run_once(spec.clone())))
            .await
        {
            Ok((exec_result, outcome)) => Ok(self.to_query_result(&exec_result, outcome)),
            Err(CircuitError::Open(e)) => Err(TransportError::CircuitOpen(e)),
            Err(CircuitError::Inner(SandboxError::Timeout(_))) => Ok(QueryResult {
                messages: Vec::new(),
                metadata: QueryMetadata::default(),
                status: QueryStatus::Timeout,
            }),
            Err(CircuitError::Inner(e)) => Err(TransportError::Sdk {
                vendor: self.adapter.vendor_name().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl<A: VendorAdapter> AgentTransport for GenericTransport<A> {
    fn vendor_name(&self) -> &str {
        self.adapter.vendor_name()
    }

    async fn is_available(&self) -> bool {
        let Some(path) = resolve_executable(self.adapter.default_executable(), self.adapter.executable_env_override())
        else {
            return false;
        };
        tokio::process::Command::new(path)
            .arg("--version")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn build_command(&self, prompt: &str, options: &AgentOptions) -> Vec<String> {
        self.adapter.build_args(prompt, options)
    }

    fn parse_result(&self, raw_output: &str, _options: &AgentOptions) -> QueryResult {
        let mut parser = crate::stream::StreamParser::new();
        let mut protocol = crate::stream::ControlProtocol::new();
        let mut state_machine = crate::stream::StreamStateMachine::new(std::time::Instant::now());
        let mut messages = Vec::new();

        for line in raw_output.lines() {
            if let Ok(Some(value)) = parser.feed(line.as_bytes()) {
                if let Ok(crate::stream::Frame::Regular(message)) = protocol.dispatch(value) {
                    let _ = state_machine.process_message(&message);
                    messages.push(message);
                }
            }
        }

        let status = if messages.is_empty() {
            QueryStatus::Error
        } else if messages.iter().any(|m| matches!(m, crate::model::Message::Assistant { .. })) {
            QueryStatus::Success
        } else {
            QueryStatus::Partial
        };

        QueryResult {
            messages,
            metadata: QueryMetadata::default(),
            status,
        }
    }

    async fn execute(&self, goal: &Goal) -> Result<QueryResult, TransportError> {
        let executable = self.resolve(&goal.options)?;
        let argv = self.adapter.build_args(&goal.content, &goal.options);
        let spec = self.build_spec(
            &executable,
            argv,
            goal.working_directory.as_deref(),
            &goal.options,
        );
        self.drive(spec).await
    }

    async fn resume(
        &self,
        session_id: &str,
        prompt: &str,
        options: &AgentOptions,
    ) -> Result<QueryResult, TransportError> {
        let executable = self.resolve(options)?;
        let argv = self.adapter.resume_args(session_id, prompt, options);
        let spec = self.build_spec(&executable, argv, None, options);
        self.drive(spec).await
    }
}

#[cfg(test)]
mod tests {
    use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
    use crate::sandbox::LocalSandbox;
    use crate::stream::StreamFormat;

    use super::*;

    struct OnlyOpenAiAdapter;

    impl VendorAdapter for OnlyOpenAiAdapter {
        fn vendor_name(&self) -> &'static str {
            "only-openai"
        }
        fn default_executable(&self) -> &str {
            "only-openai-cli"
        }
        fn executable_env_override(&self) -> &'static str {
            "ONLY_OPENAI_CLI_PATH"
        }
        fn secret_env_vars(&self) -> &'static [&'static str] {
            &["OPENAI_API_KEY"]
        }
        fn stream_format(&self) -> StreamFormat {
            StreamFormat::StreamJson
        }
        fn build_args(&self, prompt: &str, _options: &AgentOptions) -> Vec<String> {
            vec![prompt.to_string()]
        }
        fn resume_args(&self, _session_id: &str, prompt: &str, _options: &AgentOptions) -> Vec<String> {
            vec![prompt.to_string()]
        }
    }

    fn transport() -> GenericTransport<OnlyOpenAiAdapter> {
        GenericTransport::new(
            OnlyOpenAiAdapter,
            Arc::new(LocalSandbox::new()),
            CircuitBreaker::shared(CircuitBreakerConfig::default_preset("t")),
            RetryPolicy::default(),
        )
    }

    /// `secret_env_vars` scopes which ambient secrets are forwarded: an
    /// adapter that only names `OPENAI_API_KEY` must not leak an unrelated
    /// vendor's key that happens to be set in the ambient environment.
    #[test]
    fn build_spec_only_forwards_the_adapters_own_secrets() {
        std::env::set_var("OPENAI_API_KEY", "sk-openai-test");
        std::env::set_var("GEMINI_API_KEY", "gem-test");

        let spec = transport().build_spec("only-openai-cli", vec!["hi".into()], None, &AgentOptions::default());

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("GEMINI_API_KEY");

        assert_eq!(spec.env.get("OPENAI_API_KEY").map(String::as_str), Some("sk-openai-test"));
        assert!(!spec.env.contains_key("GEMINI_API_KEY"));
    }

    struct ScriptAdapter {
        script: String,
    }

    impl VendorAdapter for ScriptAdapter {
        fn vendor_name(&self) -> &'static str {
            "script"
        }
        fn default_executable(&self) -> &str {
            "bash"
        }
        fn executable_env_override(&self) -> &'static str {
            "SYMBI_TEST_SCRIPT_ADAPTER_OVERRIDE"
        }
        fn secret_env_vars(&self) -> &'static [&'static str] {
            &[]
        }
        fn stream_format(&self) -> StreamFormat {
            StreamFormat::StreamJson
        }
        fn build_args(&self, _prompt: &str, _options: &AgentOptions) -> Vec<String> {
            vec!["-c".to_string(), self.script.clone()]
        }
        fn resume_args(&self, _session_id: &str, _prompt: &str, _options: &AgentOptions) -> Vec<String> {
            vec!["-c".to_string(), self.script.clone()]
        }
    }

    struct AlwaysAllow;
    #[async_trait::async_trait]
    impl ToolPermissionCallback for AlwaysAllow {
        async fn check(
            &self,
            _tool_name: &str,
            _input: &serde_json::Value,
            _context: &HashMap<String, serde_json::Value>,
        ) -> crate::model::PermissionResult {
            crate::model::PermissionResult::Allow { updated_input: None }
        }
    }

    /// End-to-end: a subprocess that emits a `can_use_tool` control request
    /// and then blocks reading its own stdin gets answered through the
    /// registered callback, and the serialized `control_response` actually
    /// reaches the child over a piped (not nulled) stdin.
    #[tokio::test]
    async fn execute_answers_can_use_tool_over_the_real_subprocess_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let capture_path = dir.path().join("stdin_capture.txt");
        let control_request = serde_json::json!({
            "type": "control_request",
            "request_id": "r1",
            "request": {"subtype": "can_use_tool", "tool_name": "bash", "input": {}},
        })
        .to_string();
        let result_frame = serde_json::json!({
            "type": "result",
            "subtype": "success",
            "session_id": "s1",
            "is_error": false,
            "num_turns": 1,
            "duration_ms": 1,
            "duration_api_ms": 1,
            "result": "done",
        })
        .to_string();
        let script = format!(
            "echo '{}'; read -r line; printf '%s' \"$line\" > {}; echo '{}'",
            control_request,
            capture_path.display(),
            result_frame,
        );

        let transport = GenericTransport::new(
            ScriptAdapter { script },
            Arc::new(LocalSandbox::new()),
            CircuitBreaker::shared(CircuitBreakerConfig::default_preset("script-adapter")),
            RetryPolicy::default(),
        )
        .with_permission_callback(Arc::new(AlwaysAllow));

        let goal = Goal::new("irrelevant");
        let result = transport.execute(&goal).await.unwrap();
        assert_eq!(result.status, QueryStatus::Success);

        let captured = std::fs::read_to_string(&capture_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&captured).unwrap();
        assert_eq!(value["type"], "control_response");
        assert_eq!(value["response"]["request_id"], "r1");
        assert_eq!(value["response"]["response"]["behavior"], "allow");
    }
}

//! LLM-powered judge: builds a grading prompt from the [`JudgmentContext`]
//! and calls an OpenAI-compatible chat-completions endpoint, grounded in
//! the same `reqwest`-based request/response shape used elsewhere in the
//! example pack for agent-to-LLM calls.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Judgment, JudgmentContext};

use super::parse::parse_verdict;
use super::{Judge, JudgeKind, JudgeMetadata};

#[derive(Debug, Clone)]
pub struct LlmJudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for LlmJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            temperature: 0.0,
        }
    }
}

pub struct LlmJudge {
    name: String,
    description: String,
    rubric: String,
    http: reqwest::Client,
    config: LlmJudgeConfig,
}

impl LlmJudge {
    pub fn new(name: impl Into<String>, rubric: impl Into<String>, config: LlmJudgeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            name: name.into(),
            description: "Grades agent output against a rubric using a language model".to_string(),
            rubric: rubric.into(),
            http,
            config,
        }
    }

    fn prompt(&self, context: &JudgmentContext) -> String {
        format!(
            "You are grading whether an autonomous coding agent accomplished its goal.\n\n\
             Goal: {}\n\n\
             Rubric: {}\n\n\
             Agent output:\n{}\n\n\
             Respond in exactly this format:\n\
             PASS: true|false\n\
             SCORE: <number between 0 and 1>\n\
             REASONING: <one paragraph>",
            context.goal,
            self.rubric,
            context.agent_output.as_deref().unwrap_or("<no output captured>"),
        )
    }

    async fn call(&self, prompt: &str) -> Result<String, String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            temperature: self.config.temperature,
        };

        let mut req = self.http.post(url).json(&request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| format!("llm request failed: {e}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("llm request returned {status}: {body}"));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid llm response payload: {e}"))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "llm response had no choices".to_string())
    }
}

#[async_trait]
impl Judge for LlmJudge {
    fn metadata(&self) -> JudgeMetadata {
        JudgeMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: JudgeKind::LlmPowered,
        }
    }

    async fn judge(&self, context: &JudgmentContext) -> Judgment {
        let started = Instant::now();
        let prompt = self.prompt(context);

        match self.call(&prompt).await {
            Ok(text) => {
                let verdict = parse_verdict(&text);
                Judgment {
                    score: verdict.score,
                    status: verdict.status(),
                    reasoning: verdict.reasoning,
                    checks: Vec::new(),
                    metadata: Default::default(),
                    error: None,
                }
                .with_elapsed(started.elapsed())
            }
            Err(message) => {
                warn!(judge = %self.name, error = %message, "llm judge call failed");
                Judgment::error(message).with_elapsed(started.elapsed())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_goal_rubric_and_output() {
        let judge = LlmJudge::new("rubric-judge", "Did it compile?", LlmJudgeConfig::default());
        let context = JudgmentContext {
            goal: "add a function".to_string(),
            workspace: std::env::temp_dir(),
            agent_output: Some("added fn foo()".to_string()),
            execution_time: Duration::from_secs(1),
            started_at: Instant::now(),
            status: crate::model::ExecutionStatus::Success,
        };
        let prompt = judge.prompt(&context);
        assert!(prompt.contains("add a function"));
        assert!(prompt.contains("Did it compile?"));
        assert!(prompt.contains("added fn foo()"));
    }
}

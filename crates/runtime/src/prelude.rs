//! Prelude for running a goal end to end with a single import:
//!
//! ```ignore
//! use symbi_runtime::prelude::*;
//! ```

pub use crate::advisor::{
    AdvisorChain, AgentCallAdvisor, ContextGatheringAdvisor, JudgeAdvisor, JuryAdvisor, Next,
};
pub use crate::agent_model::{AgentCallOutcome, AgentModel};
pub use crate::client::{AgentClient, ClientError, MessageStream};
pub use crate::judge::{AgentJudge, DeterministicJudge, FileExistsJudge, Judge, LlmJudge, LlmJudgeConfig};
pub use crate::jury::{ConsensusStrategy, Jury, MajorityVotingStrategy, VotingStrategy, WeightedAverageStrategy};
pub use crate::model::{
    AgentClientRequest, AgentClientResponse, AgentOptions, AgentResponse, AgentTaskRequest,
    FinishReason, Goal, JudgmentContext, JudgmentStatus, PermissionMode, QueryResult, QueryStatus,
    Score, Verdict,
};
pub use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, RetryPolicy};
pub use crate::sandbox::{LocalSandbox, Sandbox};
pub use crate::transport::{
    AgentTransport, AiderTransport, AmpTransport, ClaudeTransport, CodexTransport, GeminiTransport,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_imports_compile() {
        let _goal = Goal::new("do something");
        let _options = AgentOptions::default();
        let _config = CircuitBreakerConfig::default_preset("test");
        let _retry = RetryPolicy::default();
    }
}

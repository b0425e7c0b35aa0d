//! Around-interceptor chain wrapping an [`crate::agent_model::AgentModel`]
//! call (spec.md §4.L).

mod context_gathering;
mod judge_advisor;
mod jury_advisor;

pub use context_gathering::ContextGatheringAdvisor;
pub use judge_advisor::JudgeAdvisor;
pub use jury_advisor::JuryAdvisor;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::model::{AgentClientRequest, AgentClientResponse};

/// One link in an [`AdvisorChain`]. `order` controls position (ascending);
/// lower runs first on the way in and last on the way out.
#[async_trait]
pub trait AgentCallAdvisor: Send + Sync {
    fn order(&self) -> i32;

    async fn around(&self, request: AgentClientRequest, next: Next) -> AgentClientResponse;
}

type Terminal = Arc<dyn Fn(AgentClientRequest) -> BoxFuture<'static, AgentClientResponse> + Send + Sync>;

/// The remaining chain, callable exactly once by an advisor's `around`.
#[derive(Clone)]
pub struct Next {
    remaining: Arc<[Arc<dyn AgentCallAdvisor>]>,
    position: usize,
    terminal: Terminal,
}

impl Next {
    pub fn call(self, request: AgentClientRequest) -> BoxFuture<'static, AgentClientResponse> {
        Box::pin(async move {
            match self.remaining.get(self.position) {
                Some(advisor) => {
                    let advisor = advisor.clone();
                    let next = Next {
                        remaining: self.remaining.clone(),
                        position: self.position + 1,
                        terminal: self.terminal.clone(),
                    };
                    advisor.around(request, next).await
                }
                None => (self.terminal)(request).await,
            }
        })
    }
}

/// An ordered set of advisors wrapping a terminal call (typically
/// `AgentModel::call`).
#[derive(Clone)]
pub struct AdvisorChain {
    advisors: Arc<[Arc<dyn AgentCallAdvisor>]>,
}

impl AdvisorChain {
    pub fn new(mut advisors: Vec<Arc<dyn AgentCallAdvisor>>) -> Self {
        advisors.sort_by_key(|a| a.order());
        Self { advisors: advisors.into() }
    }

    pub async fn run(&self, request: AgentClientRequest, terminal: Terminal) -> AgentClientResponse {
        let next = Next { remaining: self.advisors.clone(), position: 0, terminal };
        next.call(request).await
    }
}

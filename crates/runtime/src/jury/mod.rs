//! Weighted panel of judges that aggregates into a single [`Verdict`]
//! (spec.md §4.K).

mod strategy;

pub use strategy::{ConsensusStrategy, MajorityVotingStrategy, VotingStrategy, WeightedAverageStrategy};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::judge::Judge;
use crate::model::{Judgment, JudgmentContext, Verdict};

struct WeightedJudge {
    judge: Arc<dyn Judge>,
    weight: f64,
}

/// A panel of judges, each with a non-negative weight, aggregated by a
/// [`VotingStrategy`].
pub struct Jury {
    judges: Vec<WeightedJudge>,
    strategy: Box<dyn VotingStrategy>,
}

impl Jury {
    pub fn new(strategy: Box<dyn VotingStrategy>) -> Self {
        Self { judges: Vec::new(), strategy }
    }

    /// Add a judge with the given weight. `weight` must be `>= 0`.
    pub fn add_judge(mut self, judge: Arc<dyn Judge>, weight: f64) -> Self {
        debug_assert!(weight >= 0.0, "judge weight must be non-negative");
        self.judges.push(WeightedJudge { judge, weight });
        self
    }

    /// Run every judge concurrently, isolating per-judge failures into an
    /// error `Judgment` rather than letting one judge abort the vote, then
    /// aggregate with the configured strategy.
    pub async fn vote(&self, context: &JudgmentContext) -> Verdict {
        let started = Instant::now();

        let futures = self.judges.iter().map(|wj| {
            let judge = wj.judge.clone();
            async move { judge.judge(context).await }
        });
        let raw_judgments = join_all(futures).await;

        let mut seen_names: HashMap<String, usize> = HashMap::new();
        let mut individual = Vec::with_capacity(raw_judgments.len());
        let mut individual_by_name = Vec::with_capacity(raw_judgments.len());
        let mut weights = HashMap::new();

        for (index, (wj, judgment)) in self.judges.iter().zip(raw_judgments.into_iter()).enumerate() {
            let candidate = wj.judge.metadata().name;
            let canonical = if candidate.is_empty() {
                format!("Judge#{index}")
            } else {
                match seen_names.get(&candidate) {
                    None => candidate.clone(),
                    Some(_) => format!("Judge#{index}"),
                }
            };
            *seen_names.entry(candidate).or_insert(0) += 1;

            weights.insert(canonical.clone(), wj.weight);
            individual.push(judgment.clone());
            individual_by_name.push((canonical, judgment));
        }

        let aggregated = self.strategy.aggregate(&individual_by_name, &weights);

        Verdict {
            aggregated: aggregated.with_elapsed(started.elapsed()),
            individual,
            individual_by_name,
            weights,
            strategy_name: self.strategy.name().to_string(),
        }
    }
}

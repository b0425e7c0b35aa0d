//! Aggregation strategies over a jury's individual judgments (spec.md §4.K).

use std::collections::HashMap;

use crate::model::{Judgment, JudgmentStatus, Score};

/// Reduces a jury's individual, per-judge judgments into one aggregated
/// [`Judgment`]. `judgments` preserves insertion order and `weights` is
/// keyed by the same canonical names.
pub trait VotingStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn aggregate(&self, judgments: &[(String, Judgment)], weights: &HashMap<String, f64>) -> Judgment;
}

/// PASS iff a strict majority of non-`ABSTAIN` judgments are `PASS`.
pub struct MajorityVotingStrategy;

impl VotingStrategy for MajorityVotingStrategy {
    fn name(&self) -> &'static str {
        "majority"
    }

    fn aggregate(&self, judgments: &[(String, Judgment)], _weights: &HashMap<String, f64>) -> Judgment {
        let counted: Vec<&Judgment> = judgments
            .iter()
            .map(|(_, j)| j)
            .filter(|j| j.status != JudgmentStatus::Abstain)
            .collect();

        if counted.is_empty() {
            return Judgment {
                score: Score::unit(0.0),
                status: JudgmentStatus::Fail,
                reasoning: "no non-abstaining judgments to aggregate".to_string(),
                checks: Vec::new(),
                metadata: Default::default(),
                error: None,
            };
        }

        let passed = counted.iter().filter(|j| j.status == JudgmentStatus::Pass).count();
        let fraction = passed as f64 / counted.len() as f64;
        let is_pass = passed * 2 > counted.len();
        let checks = counted.iter().flat_map(|j| j.checks.clone()).collect();

        Judgment {
            score: Score::unit(fraction),
            status: if is_pass { JudgmentStatus::Pass } else { JudgmentStatus::Fail },
            reasoning: format!("{passed}/{} judges passed", counted.len()),
            checks,
            metadata: Default::default(),
            error: None,
        }
    }
}

/// Weighted mean of normalized scores over `[0,1]`; `PASS` iff the mean is
/// `>= 0.5`. A missing weight defaults to `1.0`. An empty weight map falls
/// back to a simple average. An all-zero-weight panel can't be averaged —
/// it aggregates to `NaN` and `FAIL` rather than panicking on div-by-zero.
pub struct WeightedAverageStrategy;

impl VotingStrategy for WeightedAverageStrategy {
    fn name(&self) -> &'static str {
        "weighted_average"
    }

    fn aggregate(&self, judgments: &[(String, Judgment)], weights: &HashMap<String, f64>) -> Judgment {
        if judgments.is_empty() {
            return Judgment::error("no judgments to aggregate");
        }

        let use_equal_weights = weights.is_empty();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for (name, judgment) in judgments {
            let weight = if use_equal_weights {
                1.0
            } else {
                weights.get(name).copied().unwrap_or(1.0)
            };
            weighted_sum += weight * judgment.score.normalized();
            weight_total += weight;
        }

        let mean = weighted_sum / weight_total;
        let is_pass = mean >= 0.5;
        let checks = judgments.iter().flat_map(|(_, j)| j.checks.clone()).collect();

        Judgment {
            score: Score::unit(mean),
            status: if mean.is_nan() {
                JudgmentStatus::Fail
            } else if is_pass {
                JudgmentStatus::Pass
            } else {
                JudgmentStatus::Fail
            },
            reasoning: format!("weighted average score {mean:.3} across {} judges", judgments.len()),
            checks,
            metadata: Default::default(),
            error: None,
        }
    }
}

/// PASS iff every non-`ABSTAIN` judgment is `PASS`; score is the minimum of
/// normalized scores.
pub struct ConsensusStrategy;

impl VotingStrategy for ConsensusStrategy {
    fn name(&self) -> &'static str {
        "consensus"
    }

    fn aggregate(&self, judgments: &[(String, Judgment)], _weights: &HashMap<String, f64>) -> Judgment {
        let counted: Vec<&Judgment> = judgments
            .iter()
            .map(|(_, j)| j)
            .filter(|j| j.status != JudgmentStatus::Abstain)
            .collect();

        if counted.is_empty() {
            return Judgment::error("no non-abstaining judgments to aggregate");
        }

        let all_pass = counted.iter().all(|j| j.status == JudgmentStatus::Pass);
        let min_score = counted
            .iter()
            .map(|j| j.score.normalized())
            .fold(f64::INFINITY, f64::min);
        let checks = counted.iter().flat_map(|j| j.checks.clone()).collect();

        Judgment {
            score: Score::unit(min_score),
            status: if all_pass { JudgmentStatus::Pass } else { JudgmentStatus::Fail },
            reasoning: if all_pass {
                "all judges agreed".to_string()
            } else {
                "at least one judge disagreed".to_string()
            },
            checks,
            metadata: Default::default(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(status: JudgmentStatus, score: f64) -> Judgment {
        Judgment {
            score: Score::unit(score),
            status,
            reasoning: String::new(),
            checks: Vec::new(),
            metadata: Default::default(),
            error: None,
        }
    }

    #[test]
    fn majority_requires_strict_majority() {
        let strategy = MajorityVotingStrategy;
        let judgments = vec![
            ("a".to_string(), judgment(JudgmentStatus::Pass, 1.0)),
            ("b".to_string(), judgment(JudgmentStatus::Fail, 0.0)),
        ];
        let result = strategy.aggregate(&judgments, &HashMap::new());
        assert_eq!(result.status, JudgmentStatus::Fail, "2-judge tie is not a strict majority");
    }

    #[test]
    fn weighted_average_below_half_fails() {
        let strategy = WeightedAverageStrategy;
        let judgments = vec![
            ("a".to_string(), judgment(JudgmentStatus::Pass, 0.9)),
            ("b".to_string(), judgment(JudgmentStatus::Fail, 0.1)),
        ];
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        weights.insert("b".to_string(), 3.0);
        let result = strategy.aggregate(&judgments, &weights);
        assert!(result.score.normalized() < 0.5);
        assert_eq!(result.status, JudgmentStatus::Fail);
    }

    /// S4 — weighted average below threshold: scores 0.8 (weight 0.2) and
    /// 0.2 (weight 0.8) aggregate to 0.32, FAIL.
    #[test]
    fn s4_weighted_average_below_threshold() {
        let strategy = WeightedAverageStrategy;
        let judgments = vec![
            ("a".to_string(), judgment(JudgmentStatus::Pass, 0.8)),
            ("b".to_string(), judgment(JudgmentStatus::Fail, 0.2)),
        ];
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.2);
        weights.insert("b".to_string(), 0.8);
        let result = strategy.aggregate(&judgments, &weights);
        assert!((result.score.normalized() - 0.32).abs() < 1e-9);
        assert_eq!(result.status, JudgmentStatus::Fail);
    }

    #[test]
    fn weighted_average_all_zero_weights_yields_nan_fail() {
        let strategy = WeightedAverageStrategy;
        let judgments = vec![("a".to_string(), judgment(JudgmentStatus::Pass, 1.0))];
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.0);
        let result = strategy.aggregate(&judgments, &weights);
        assert!(result.score.normalized().is_nan());
        assert_eq!(result.status, JudgmentStatus::Fail);
    }

    #[test]
    fn consensus_requires_unanimous_pass() {
        let strategy = ConsensusStrategy;
        let judgments = vec![
            ("a".to_string(), judgment(JudgmentStatus::Pass, 1.0)),
            ("b".to_string(), judgment(JudgmentStatus::Pass, 0.6)),
        ];
        let result = strategy.aggregate(&judgments, &HashMap::new());
        assert_eq!(result.status, JudgmentStatus::Pass);
        assert_eq!(result.score.normalized(), 0.6);
    }
}

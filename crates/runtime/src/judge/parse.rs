//! Shared `PASS: .. / SCORE: .. / REASONING: ..` response parsing, used by
//! both [`super::llm::LlmJudge`] and [`super::agent_judge::AgentJudge`]
//! since both ask a language model to grade in the same free-text shape.

use regex::Regex;

use crate::model::{JudgmentStatus, Score};

pub struct ParsedVerdict {
    pub pass: bool,
    pub score: Score,
    pub reasoning: String,
}

/// Parse a free-text judge response. Missing `PASS:` defaults to `false`;
/// an unparseable `SCORE:` falls back to the boolean verdict (0.0/1.0).
pub fn parse_verdict(text: &str) -> ParsedVerdict {
    let pass_re = Regex::new(r"(?i)PASS:\s*(true|false)").unwrap();
    let score_re = Regex::new(r"(?i)SCORE:\s*([0-9]*\.?[0-9]+)").unwrap();
    let reasoning_re = Regex::new(r"(?is)REASONING:\s*(.+?)\s*(?:\n\n|$)").unwrap();

    let pass = pass_re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let score = score_re
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(Score::unit)
        .unwrap_or_else(|| Score::bool(pass));

    let reasoning = reasoning_re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());

    ParsedVerdict { pass, score, reasoning }
}

impl ParsedVerdict {
    pub fn status(&self) -> JudgmentStatus {
        if self.pass {
            JudgmentStatus::Pass
        } else {
            JudgmentStatus::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_response() {
        let text = "PASS: true\nSCORE: 0.9\nREASONING: the tests pass and the diff is minimal";
        let v = parse_verdict(text);
        assert!(v.pass);
        assert_eq!(v.score.normalized(), 0.9);
        assert_eq!(v.reasoning, "the tests pass and the diff is minimal");
    }

    #[test]
    fn missing_pass_defaults_false() {
        let v = parse_verdict("the agent did something");
        assert!(!v.pass);
    }

    #[test]
    fn unparseable_score_falls_back_to_boolean() {
        let v = parse_verdict("PASS: true\nSCORE: not-a-number");
        assert_eq!(v.score.normalized(), 1.0);
    }
}

//! Results of replaying a scenario.

use serde::Serialize;

use symdec_core::Clause;
use symdec_dec::DecisionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    /// 1-based step number.
    pub step: usize,
    pub fact: String,
    /// `None` when the query could not be answered.
    pub verdict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn new(
        step: usize,
        clause: &Clause,
        answer: Result<bool, DecisionError>,
        expected: Option<bool>,
    ) -> Self {
        let (verdict, error) = match answer {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            step,
            fact: clause.to_string(),
            verdict,
            expected,
            error,
        }
    }

    pub fn mismatched(&self) -> bool {
        matches!((self.verdict, self.expected), (Some(v), Some(e)) if v != e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub scenario: String,
    pub backend: String,
    pub queries: Vec<QueryOutcome>,
    /// Time spent in the decision chain, when timing is enabled.
    pub elapsed_ms: Option<u64>,
}

impl Report {
    pub fn unanswered(&self) -> bool {
        self.queries.iter().any(|q| q.error.is_some())
    }

    pub fn mismatches(&self) -> usize {
        self.queries.iter().filter(|q| q.mismatched()).count()
    }

    /// 2 if a query went unanswered, 1 if a verdict contradicted its
    /// expectation, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.unanswered() {
            2
        } else if self.mismatches() > 0 {
            1
        } else {
            0
        }
    }
}

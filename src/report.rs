use crate::interpret::Status;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub target: String,
    pub status: Status,
    pub raw_text: String,
    pub at: String,
}

impl Outcome {
    /// Stage-failure outcome. Failed targets still appear in the report with
    /// the error description where the model answer would be.
    pub fn error(target: &str, detail: String) -> Self {
        Self {
            target: target.to_string(),
            status: Status::Error,
            raw_text: detail,
            at: crate::util::now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub overall: Status,
    pub outcomes: Vec<Outcome>,
    pub generated_at: String,
}

impl JobReport {
    /// One outcome per configured target, in configured order. Overall is OK
    /// only when every outcome is OK; a confirmed PROBLEM outranks an
    /// inconclusive ERROR.
    pub fn from_outcomes(outcomes: Vec<Outcome>) -> Self {
        let overall = if outcomes.iter().any(|o| o.status == Status::Problem) {
            Status::Problem
        } else if outcomes.iter().any(|o| o.status == Status::Error) {
            Status::Error
        } else {
            Status::Ok
        };
        Self {
            overall,
            outcomes,
            generated_at: crate::util::now_rfc3339(),
        }
    }
}

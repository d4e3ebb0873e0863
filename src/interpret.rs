use crate::config::TargetSpec;
use anyhow::{Context, Result, anyhow};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Problem,
    Error,
}

/// A target with its marker patterns compiled. Built once at startup so a bad
/// pattern fails the run before the camera moves.
#[derive(Debug, Clone)]
pub struct Target {
    pub spec: TargetSpec,
    ok_re: Regex,
    problem_re: Regex,
}

impl Target {
    pub fn compile(spec: &TargetSpec) -> Result<Self> {
        Ok(Self {
            spec: spec.clone(),
            ok_re: marker_regex(&spec.ok_marker)
                .with_context(|| format!("ok_marker for target {:?}", spec.name))?,
            problem_re: marker_regex(&spec.problem_marker)
                .with_context(|| format!("problem_marker for target {:?}", spec.name))?,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

pub fn compile_all(specs: &[TargetSpec]) -> Result<Vec<Target>> {
    if specs.is_empty() {
        return Err(anyhow!("no targets configured"));
    }
    specs.iter().map(Target::compile).collect()
}

fn marker_regex(pattern: &str) -> Result<Regex> {
    if pattern.trim().is_empty() {
        return Err(anyhow!("marker pattern is empty"));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(Into::into)
}

/// Map the raw model answer to a status. PROBLEM takes precedence over OK on
/// conflicting matches, and anything matching neither marker is ERROR, so
/// ambiguous text never reads as healthy.
pub fn interpret(raw: &str, target: &Target) -> Status {
    if target.problem_re.is_match(raw) {
        return Status::Problem;
    }
    if target.ok_re.is_match(raw) {
        return Status::Ok;
    }
    Status::Error
}

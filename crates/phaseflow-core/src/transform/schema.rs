//! Boundary check for transformer output.
//!
//! Structural problems (missing or null required fields, wrong shapes) and
//! semantic ones (wrong pair, missing phase section, blank entries) are all
//! collected before failing, so one error lists every issue.

use super::{TransformationOutput, TransitionPair};
use crate::error::{PhaseflowError, Result};
use crate::types::Phase;
use serde_json::Value;

pub const SUBJECT: &str = "transformation output";

pub const REQUIRED_FIELDS: &[&str] = &[
    "type",
    "fromPhase",
    "toPhase",
    "insights",
    "techStack",
    "decisions",
    "recommendations",
    "transformedAt",
];

/// Phase-specific sections the target phase must carry.
fn required_sections(target: Phase) -> &'static [&'static str] {
    match target {
        Phase::Requirements => &["requirements"],
        Phase::Design => &["wireframes", "userFlows", "componentSpecs"],
        Phase::Architecture => &["systemDesign"],
        Phase::Implementation => &["implementationPlan"],
        Phase::Deployment => &["deploymentPlan"],
        Phase::Concept | Phase::Complete => &[],
    }
}

fn violation(issues: Vec<String>) -> PhaseflowError {
    PhaseflowError::Schema {
        subject: SUBJECT,
        issues,
    }
}

/// Parse `value` as the output for `expected`, failing with every issue found.
pub fn parse_transformation(value: Value, expected: TransitionPair) -> Result<TransformationOutput> {
    let Value::Object(map) = value else {
        return Err(violation(vec!["expected a JSON object".to_string()]));
    };

    let mut issues = Vec::new();
    for field in REQUIRED_FIELDS {
        match map.get(*field) {
            None => issues.push(format!("missing required field `{field}`")),
            Some(Value::Null) => issues.push(format!("required field `{field}` is null")),
            Some(_) => {}
        }
    }
    for section in required_sections(expected.to) {
        if !matches!(map.get(*section), Some(v) if !v.is_null()) {
            issues.push(format!(
                "missing `{section}` section required for target phase '{}'",
                expected.to
            ));
        }
    }
    if !issues.is_empty() {
        return Err(violation(issues));
    }

    let output: TransformationOutput = serde_json::from_value(Value::Object(map))
        .map_err(|e| violation(vec![format!("malformed document: {e}")]))?;

    let issues = check(&output, expected);
    if issues.is_empty() {
        Ok(output)
    } else {
        Err(violation(issues))
    }
}

/// Semantic checks on an already-typed output.
pub fn check(output: &TransformationOutput, expected: TransitionPair) -> Vec<String> {
    let mut issues = Vec::new();

    if output.pair() != expected {
        issues.push(format!(
            "output is for {} but {} was requested",
            output.pair(),
            expected
        ));
    }
    if output.kind != expected.label() {
        issues.push(format!(
            "`type` is '{}', expected '{}'",
            output.kind,
            expected.label()
        ));
    }
    for (category, technology) in &output.tech_stack {
        if category.trim().is_empty() || technology.trim().is_empty() {
            issues.push(format!("techStack entry '{category}' is blank"));
        }
    }
    if output.decisions.iter().any(|d| d.trim().is_empty()) {
        issues.push("decisions contains a blank entry".to_string());
    }
    if output.recommendations.iter().any(|r| r.trim().is_empty()) {
        issues.push("recommendations contains a blank entry".to_string());
    }
    if output
        .insights
        .key_findings
        .iter()
        .any(|f| f.trim().is_empty())
    {
        issues.push("insights.keyFindings contains a blank entry".to_string());
    }
    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

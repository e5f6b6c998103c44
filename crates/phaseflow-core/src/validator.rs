//! Transition legality: phase existence, successor rules and deliverable
//! completeness. Pure over a [`QualityGates`] snapshot.

use crate::catalog;
use crate::error::PhaseflowError;
use crate::gate::QualityGates;
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationError {
    UnknownPhase {
        phase: String,
    },
    IllegalTransition {
        from: String,
        to: String,
        reason: String,
    },
    IncompleteDeliverables {
        phase: String,
        missing: Vec<String>,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownPhase { phase } => write!(f, "UnknownPhase: '{phase}'"),
            ValidationError::IllegalTransition { from, to, reason } => {
                write!(f, "IllegalTransition: {from} -> {to}: {reason}")
            }
            ValidationError::IncompleteDeliverables { phase, missing } => write!(
                f,
                "IncompleteDeliverables: phase '{phase}' is missing {}",
                missing.join(", ")
            ),
        }
    }
}

impl From<ValidationError> for PhaseflowError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::UnknownPhase { phase } => PhaseflowError::UnknownPhase(phase),
            ValidationError::IllegalTransition { from, to, reason } => {
                PhaseflowError::IllegalTransition { from, to, reason }
            }
            ValidationError::IncompleteDeliverables { phase, missing } => {
                PhaseflowError::IncompleteDeliverables { phase, missing }
            }
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
}

fn parse_phase(s: &str) -> Result<Phase, ValidationError> {
    Phase::from_str(s).map_err(|_| ValidationError::UnknownPhase {
        phase: s.to_string(),
    })
}

/// Check a transition given by phase names, returning the parsed pair.
pub fn check(from: &str, to: &str, gates: &QualityGates) -> Result<(Phase, Phase), ValidationError> {
    let from_phase = parse_phase(from)?;
    let to_phase = parse_phase(to)?;
    check_phases(from_phase, to_phase, gates)?;
    Ok((from_phase, to_phase))
}

pub fn check_phases(from: Phase, to: Phase, gates: &QualityGates) -> Result<(), ValidationError> {
    let def = catalog::definition(from);

    let Some(next) = def.next else {
        return Err(ValidationError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
            reason: format!("'{from}' is terminal"),
        });
    };

    if to != next && to != Phase::Complete {
        return Err(ValidationError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
            reason: format!("'{from}' may only advance to '{next}' or 'complete'"),
        });
    }

    let completed = gates.completed(from);
    let missing: Vec<String> = def
        .required_deliverables
        .iter()
        .filter(|d| !completed.contains(**d))
        .map(|d| d.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::IncompleteDeliverables {
            phase: from.to_string(),
            missing,
        });
    }

    Ok(())
}

pub fn validate(from: &str, to: &str, gates: &QualityGates) -> Validation {
    match check(from, to, gates) {
        Ok(_) => Validation {
            is_valid: true,
            error: None,
        },
        Err(e) => Validation {
            is_valid: false,
            error: Some(e),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn gates_with_all_completed() -> QualityGates {
        let mut gates = QualityGates::seeded();
        for def in catalog::definitions() {
            for d in def.required_deliverables {
                gates.complete(def.phase, d).unwrap();
            }
        }
        gates
    }

    #[test]
    fn successor_is_legal_when_deliverables_done() {
        let gates = gates_with_all_completed();
        let v = validate("concept", "requirements", &gates);
        assert!(v.is_valid);
        assert!(v.error.is_none());
    }

    #[test]
    fn every_non_successor_pair_is_illegal() {
        let gates = gates_with_all_completed();
        for from in Phase::all() {
            for to in Phase::all() {
                let legal_target = catalog::next_phase(*from) == Some(*to) || *to == Phase::Complete;
                if legal_target && !from.is_terminal() {
                    continue;
                }
                let v = validate(from.as_str(), to.as_str(), &gates);
                assert!(!v.is_valid, "{from} -> {to} should be illegal");
                assert!(
                    matches!(v.error, Some(ValidationError::IllegalTransition { .. })),
                    "{from} -> {to}: {:?}",
                    v.error
                );
            }
        }
    }

    #[test]
    fn skipping_a_phase_is_illegal_regardless_of_deliverables() {
        let v = validate("requirements", "architecture", &QualityGates::seeded());
        assert!(matches!(
            v.error,
            Some(ValidationError::IllegalTransition { .. })
        ));
        let v = validate("requirements", "architecture", &gates_with_all_completed());
        assert!(matches!(
            v.error,
            Some(ValidationError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn any_phase_may_jump_to_complete_once_done() {
        let gates = gates_with_all_completed();
        assert!(validate("design", "complete", &gates).is_valid);
    }

    #[test]
    fn unknown_phases_are_reported() {
        let gates = QualityGates::seeded();
        assert_eq!(
            validate("ideation", "requirements", &gates).error,
            Some(ValidationError::UnknownPhase {
                phase: "ideation".to_string()
            })
        );
        assert_eq!(
            validate("concept", "launch", &gates).error,
            Some(ValidationError::UnknownPhase {
                phase: "launch".to_string()
            })
        );
    }

    #[test]
    fn missing_deliverables_listed_exactly() {
        for def in catalog::definitions().iter().filter(|d| !d.phase.is_terminal()) {
            let required = def.required_deliverables;
            // Complete every other deliverable, leaving a shifting subset missing.
            for skip_mask in 1u32..(1 << required.len()) {
                let mut gates = QualityGates::seeded();
                let mut expected = BTreeSet::new();
                for (i, d) in required.iter().enumerate() {
                    if skip_mask & (1 << i) != 0 {
                        expected.insert(d.to_string());
                    } else {
                        gates.complete(def.phase, d).unwrap();
                    }
                }
                let next = def.next.unwrap();
                match validate(def.phase.as_str(), next.as_str(), &gates).error {
                    Some(ValidationError::IncompleteDeliverables { phase, missing }) => {
                        assert_eq!(phase, def.phase.as_str());
                        let got: BTreeSet<String> = missing.into_iter().collect();
                        assert_eq!(got, expected);
                    }
                    other => panic!("expected IncompleteDeliverables, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn absent_gate_counts_as_nothing_completed() {
        let gates = QualityGates::default();
        let err = check("concept", "requirements", &gates).unwrap_err();
        assert!(err.to_string().contains("market_analysis"));
        assert!(err.to_string().contains("user_personas"));
    }

    #[test]
    fn converts_into_crate_error() {
        let err: PhaseflowError = ValidationError::IncompleteDeliverables {
            phase: "concept".to_string(),
            missing: vec!["user_personas".to_string()],
        }
        .into();
        assert!(err.to_string().contains("user_personas"));
    }
}

use crate::catalog;
use crate::error::{PhaseflowError, Result};
use crate::paths::QUALITY_GATES_KEY;
use crate::store::{self, StateStore};
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// GateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    #[default]
    Pending,
    InProgress,
    Passed,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateStatus::Pending => "pending",
            GateStatus::InProgress => "in_progress",
            GateStatus::Passed => "passed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// QualityGateState
// ---------------------------------------------------------------------------

/// Required vs. completed deliverables for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QualityGateState {
    #[serde(default)]
    pub required: BTreeSet<String>,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    #[serde(default)]
    pub status: GateStatus,
}

impl QualityGateState {
    pub fn for_phase(phase: Phase) -> Self {
        Self {
            required: catalog::required_deliverables(phase)
                .iter()
                .map(|d| d.to_string())
                .collect(),
            completed: BTreeSet::new(),
            status: GateStatus::Pending,
        }
    }

    pub fn is_completed(&self, deliverable: &str) -> bool {
        self.completed.contains(deliverable)
    }

    /// Deliverables in `required` (in the given order) not yet completed.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|d| !self.completed.contains(*d))
            .collect()
    }

    fn refresh_status(&mut self) {
        self.status = if !self.required.is_empty()
            && self.required.iter().all(|r| self.completed.contains(r))
        {
            GateStatus::Passed
        } else if self.completed.is_empty() {
            GateStatus::Pending
        } else {
            GateStatus::InProgress
        };
    }
}

// ---------------------------------------------------------------------------
// QualityGates (the `quality-gates` document)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct QualityGates {
    pub phases: BTreeMap<Phase, QualityGateState>,
}

impl QualityGates {
    /// Gates for every non-terminal phase with required sets taken from the
    /// catalog and nothing completed.
    pub fn seeded() -> Self {
        let phases = catalog::definitions()
            .iter()
            .filter(|d| !d.phase.is_terminal())
            .map(|d| (d.phase, QualityGateState::for_phase(d.phase)))
            .collect();
        Self { phases }
    }

    pub fn load(store: &dyn StateStore) -> Result<Option<Self>> {
        store::read_typed(store, QUALITY_GATES_KEY)
    }

    pub fn load_or_seeded(store: &dyn StateStore) -> Result<Self> {
        Ok(Self::load(store)?.unwrap_or_else(Self::seeded))
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<()> {
        store::write_typed(store, QUALITY_GATES_KEY, self)
    }

    pub fn get(&self, phase: Phase) -> Option<&QualityGateState> {
        self.phases.get(&phase)
    }

    /// Completed deliverables for `phase`; an absent gate counts as nothing done.
    pub fn completed(&self, phase: Phase) -> BTreeSet<String> {
        self.phases
            .get(&phase)
            .map(|g| g.completed.clone())
            .unwrap_or_default()
    }

    /// Mark `deliverable` done. Names the catalog does not require for the
    /// phase are rejected. Returns `false` if it was already completed.
    pub fn complete(&mut self, phase: Phase, deliverable: &str) -> Result<bool> {
        if !catalog::definition(phase).requires(deliverable) {
            return Err(PhaseflowError::UnknownDeliverable {
                phase: phase.to_string(),
                deliverable: deliverable.to_string(),
            });
        }
        let gate = self
            .phases
            .entry(phase)
            .or_insert_with(|| QualityGateState::for_phase(phase));
        let inserted = gate.completed.insert(deliverable.to_string());
        gate.refresh_status();
        Ok(inserted)
    }

    pub fn reopen(&mut self, phase: Phase, deliverable: &str) -> bool {
        match self.phases.get_mut(&phase) {
            Some(gate) => {
                let removed = gate.completed.remove(deliverable);
                gate.refresh_status();
                removed
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

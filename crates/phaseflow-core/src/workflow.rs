//! Project-level phase progression on top of the transition engine.
//!
//! `advance` prefers an engine transition. A failure at the engine's
//! validating stage leaves the project where it is and returns the typed
//! error. Any later failure (including a pair with no transformer, such as
//! `deployment -> complete`) still moves the phase forward without an
//! enhanced context.

use crate::catalog;
use crate::engine::{PhaseTransitionEngine, StageError, TransitionResult, TransitionStage};
use crate::error::{PhaseflowError, Result};
use crate::gate::{GateStatus, QualityGates};
use crate::state::{progress_percent, CurrentPhase, ProjectPhases};
use crate::types::{Phase, PhaseStatus};
use crate::validator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMode {
    /// Engine transition succeeded; the new phase carries an enhanced context.
    Enhanced,
    /// Engine failed; the phase moved without one.
    Basic,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advance {
    pub from: Phase,
    pub to: Phase,
    pub mode: AdvanceMode,
    pub result: TransitionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub current_phase: Phase,
    pub role: String,
    pub current_task: String,
    pub gate_status: GateStatus,
    pub completed_deliverables: Vec<String>,
    pub missing_deliverables: Vec<String>,
    /// Share of the current phase's deliverables done.
    pub phase_progress: u8,
    /// Share of non-terminal phases completed.
    pub overall_progress: u8,
    pub phases: BTreeMap<Phase, PhaseStatus>,
}

#[derive(Debug)]
pub struct PhaseWorkflow {
    engine: PhaseTransitionEngine,
}

impl PhaseWorkflow {
    pub fn new(engine: PhaseTransitionEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &PhaseTransitionEngine {
        &self.engine
    }

    /// Seed `project-phases`, `quality-gates` and `current-phase`. Documents
    /// that already exist are left alone; returns whether anything was written.
    pub fn initialize(&self, now: DateTime<Utc>) -> Result<bool> {
        let store = self.engine.store().as_ref();
        let mut wrote = false;
        if ProjectPhases::load(store)?.is_none() {
            ProjectPhases::seeded(now).save(store)?;
            wrote = true;
        }
        if QualityGates::load(store)?.is_none() {
            QualityGates::seeded().save(store)?;
            wrote = true;
        }
        if CurrentPhase::load(store)?.is_none() {
            CurrentPhase::start(Phase::Concept, now).save(store)?;
            wrote = true;
        }
        if wrote {
            tracing::info!("workflow state initialized");
        }
        Ok(wrote)
    }

    /// Mark a deliverable done. Returns `false` if it already was.
    pub fn complete_deliverable(&self, phase: Phase, deliverable: &str) -> Result<bool> {
        let store = self.engine.store().as_ref();
        let mut gates = QualityGates::load_or_seeded(store)?;
        let inserted = gates.complete(phase, deliverable)?;
        if !inserted {
            return Ok(false);
        }
        gates.save(store)?;
        tracing::info!(phase = %phase, deliverable, "deliverable completed");

        if let Some(mut current) = CurrentPhase::load(store)?.filter(|c| c.phase == phase) {
            let done = gates.completed(phase);
            let done: Vec<&str> = done.iter().map(String::as_str).collect();
            current.refresh(&done);
            current.save(store)?;
        }
        Ok(true)
    }

    /// Move from the current phase to its successor.
    pub async fn advance(&self) -> Result<Advance> {
        let store = self.engine.store().as_ref();
        let mut phases = ProjectPhases::require(store)?;
        let from = phases.current;
        let to = catalog::next_phase(from).ok_or_else(|| PhaseflowError::IllegalTransition {
            from: from.to_string(),
            to: from.to_string(),
            reason: format!("'{from}' is terminal"),
        })?;

        let gates = QualityGates::load_or_seeded(store)?;
        validator::check_phases(from, to, &gates)?;

        let attempt = self
            .engine
            .try_transition(from.as_str(), to.as_str())
            .await;
        let now = Utc::now();
        let mut current = CurrentPhase::start(to, now);

        let (mode, result) = match attempt {
            Ok(result) => {
                current.enhanced_context = result.enhanced_context.clone();
                (AdvanceMode::Enhanced, result)
            }
            Err(StageError {
                stage: TransitionStage::Validating,
                error,
            }) => return Err(error),
            Err(failure) => {
                tracing::warn!(
                    from = %from,
                    to = %to,
                    stage = %failure.stage,
                    error = %failure.error,
                    "engine transition failed; falling back to basic advance"
                );
                (
                    AdvanceMode::Basic,
                    failure.into_result(from.as_str(), to.as_str()),
                )
            }
        };

        phases.advance_to(to, now);
        phases.save(store)?;
        current.save(store)?;
        tracing::info!(from = %from, to = %to, mode = ?mode, "phase advanced");
        Ok(Advance {
            from,
            to,
            mode,
            result,
        })
    }

    pub fn status(&self) -> Result<WorkflowStatus> {
        let store = self.engine.store().as_ref();
        let phases = ProjectPhases::require(store)?;
        let gates = QualityGates::load_or_seeded(store)?;
        let phase = phases.current;
        let current = match CurrentPhase::load(store)? {
            Some(c) if c.phase == phase => c,
            _ => CurrentPhase::start(phase, Utc::now()),
        };

        let required = catalog::required_deliverables(phase);
        let done = gates.completed(phase);
        let done_refs: Vec<&str> = done.iter().map(String::as_str).collect();
        let missing = gates
            .get(phase)
            .map(|g| g.missing(required))
            .unwrap_or_else(|| required.to_vec());

        let steps = Phase::all().iter().filter(|p| !p.is_terminal()).count();
        let finished = Phase::all()
            .iter()
            .filter(|p| !p.is_terminal() && phases.status(**p) == PhaseStatus::Completed)
            .count();

        Ok(WorkflowStatus {
            current_phase: phase,
            role: current.role,
            current_task: current.current_task,
            gate_status: gates.get(phase).map(|g| g.status).unwrap_or_default(),
            completed_deliverables: required
                .iter()
                .filter(|d| done.contains(**d))
                .map(|d| d.to_string())
                .collect(),
            missing_deliverables: missing.into_iter().map(str::to_string).collect(),
            phase_progress: progress_percent(required, &done_refs),
            overall_progress: ((finished * 100) / steps) as u8,
            phases: Phase::all().iter().map(|p| (*p, phases.status(*p))).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

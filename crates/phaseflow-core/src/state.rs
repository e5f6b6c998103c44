//! Typed wrappers over the persisted state documents: `project-phases`,
//! `current-phase` and `transformations`.

use crate::catalog;
use crate::context::EnhancedContext;
use crate::error::{PhaseflowError, Result};
use crate::paths::{CURRENT_PHASE_KEY, PROJECT_PHASES_KEY, TRANSFORMATIONS_KEY};
use crate::store::{self, StateStore};
use crate::transform::{TransformationOutput, TransitionPair};
use crate::types::{Phase, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ProjectPhases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPhases {
    pub current: Phase,
    #[serde(default)]
    pub phases: BTreeMap<Phase, PhaseRecord>,
}

impl ProjectPhases {
    /// Every phase pending except concept, which is in progress.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let mut phases: BTreeMap<Phase, PhaseRecord> = Phase::all()
            .iter()
            .map(|p| (*p, PhaseRecord::default()))
            .collect();
        phases.insert(
            Phase::Concept,
            PhaseRecord {
                status: PhaseStatus::InProgress,
                started_at: Some(now),
                completed_at: None,
            },
        );
        Self {
            current: Phase::Concept,
            phases,
        }
    }

    pub fn load(store: &dyn StateStore) -> Result<Option<Self>> {
        store::read_typed(store, PROJECT_PHASES_KEY)
    }

    /// Like [`load`](Self::load) but a missing document is `NotInitialized`.
    pub fn require(store: &dyn StateStore) -> Result<Self> {
        Self::load(store)?.ok_or(PhaseflowError::NotInitialized)
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<()> {
        store::write_typed(store, PROJECT_PHASES_KEY, self)
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        self.phases.get(&phase).map(|r| r.status).unwrap_or_default()
    }

    /// Close the current phase and open `to`. Skipped phases stay pending.
    pub fn advance_to(&mut self, to: Phase, now: DateTime<Utc>) {
        let from = self.current;
        let record = self.phases.entry(from).or_default();
        record.status = PhaseStatus::Completed;
        record.completed_at = Some(now);

        let next = self.phases.entry(to).or_default();
        if to.is_terminal() {
            next.status = PhaseStatus::Completed;
            next.completed_at = Some(now);
        } else {
            next.status = PhaseStatus::InProgress;
        }
        next.started_at.get_or_insert(now);
        self.current = to;
    }
}

// ---------------------------------------------------------------------------
// CurrentPhase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPhase {
    pub phase: Phase,
    pub role: String,
    pub current_task: String,
    /// Percentage of the phase's required deliverables completed.
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_context: Option<EnhancedContext>,
}

impl CurrentPhase {
    pub fn start(phase: Phase, now: DateTime<Utc>) -> Self {
        let def = catalog::definition(phase);
        Self {
            phase,
            role: def.role.to_string(),
            current_task: task_for(phase, &[]),
            progress: if phase.is_terminal() { 100 } else { 0 },
            started_at: now,
            enhanced_context: None,
        }
    }

    pub fn load(store: &dyn StateStore) -> Result<Option<Self>> {
        store::read_typed(store, CURRENT_PHASE_KEY)
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<()> {
        store::write_typed(store, CURRENT_PHASE_KEY, self)
    }

    /// Recompute `progress` and `current_task` from completed deliverables.
    pub fn refresh(&mut self, completed: &[&str]) {
        let required = catalog::required_deliverables(self.phase);
        self.progress = progress_percent(required, completed);
        self.current_task = task_for(self.phase, completed);
    }
}

pub(crate) fn progress_percent(required: &[&str], completed: &[&str]) -> u8 {
    if required.is_empty() {
        return 100;
    }
    let done = required.iter().filter(|d| completed.contains(*d)).count();
    ((done * 100) / required.len()) as u8
}

fn task_for(phase: Phase, completed: &[&str]) -> String {
    catalog::required_deliverables(phase)
        .iter()
        .find(|d| !completed.contains(*d))
        .map(|d| format!("Complete {d}"))
        .unwrap_or_else(|| format!("Review {phase} deliverables"))
}

// ---------------------------------------------------------------------------
// TransformationLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedTransformation {
    #[serde(flatten)]
    pub transformation: TransformationOutput,
    pub saved_at: DateTime<Utc>,
}

/// The `transformations` document, keyed by `{from}_to_{to}`. A newer save
/// for the same pair replaces the older one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationLog {
    pub entries: BTreeMap<String, LoggedTransformation>,
}

impl TransformationLog {
    pub fn load(store: &dyn StateStore) -> Result<Self> {
        Ok(store::read_typed(store, TRANSFORMATIONS_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<()> {
        store::write_typed(store, TRANSFORMATIONS_KEY, self)
    }

    pub fn insert(&mut self, transformation: TransformationOutput, saved_at: DateTime<Utc>) {
        self.entries.insert(
            transformation.pair().label(),
            LoggedTransformation {
                transformation,
                saved_at,
            },
        );
    }

    /// Read-merge-write of one transformation into the stored log.
    pub fn append(
        store: &dyn StateStore,
        transformation: &TransformationOutput,
        saved_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut log = Self::load(store)?;
        log.insert(transformation.clone(), saved_at);
        log.save(store)?;
        tracing::debug!(
            pair = %transformation.pair(),
            entries = log.entries.len(),
            "transformation log updated"
        );
        Ok(())
    }

    pub fn entry(&self, from: Phase, to: Phase) -> Option<&LoggedTransformation> {
        self.entries.get(&TransitionPair::new(from, to).label())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn seeded_phases_start_at_concept() {
        let now = Utc::now();
        let phases = ProjectPhases::seeded(now);
        assert_eq!(phases.current, Phase::Concept);
        assert_eq!(phases.status(Phase::Concept), PhaseStatus::InProgress);
        assert_eq!(phases.status(Phase::Design), PhaseStatus::Pending);
        assert_eq!(phases.phases.len(), 7);
    }

    #[test]
    fn advance_closes_and_opens() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let mut phases = ProjectPhases::seeded(t0);
        phases.advance_to(Phase::Requirements, t1);
        assert_eq!(phases.current, Phase::Requirements);
        assert_eq!(phases.status(Phase::Concept), PhaseStatus::Completed);
        assert_eq!(phases.phases[&Phase::Concept].completed_at, Some(t1));
        assert_eq!(phases.status(Phase::Requirements), PhaseStatus::InProgress);

        phases.advance_to(Phase::Complete, t1);
        assert_eq!(phases.status(Phase::Complete), PhaseStatus::Completed);
        assert_eq!(phases.status(Phase::Design), PhaseStatus::Pending);
    }

    #[test]
    fn project_phases_roundtrip_through_files() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::for_project(dir.path());
        assert!(matches!(
            ProjectPhases::require(&store),
            Err(PhaseflowError::NotInitialized)
        ));
        let phases = ProjectPhases::seeded(Utc::now());
        phases.save(&store).unwrap();
        assert_eq!(ProjectPhases::require(&store).unwrap(), phases);

        let raw = store.read_state(PROJECT_PHASES_KEY).unwrap().unwrap();
        assert_eq!(raw["current"], "concept");
        assert!(raw["phases"]["concept"]["startedAt"].is_string());
    }

    #[test]
    fn current_phase_progress() {
        let mut current = CurrentPhase::start(Phase::Concept, Utc::now());
        assert_eq!(current.role, "Product Strategist");
        assert_eq!(current.current_task, "Complete market_analysis");
        current.refresh(&["market_analysis"]);
        assert_eq!(current.progress, 33);
        assert_eq!(current.current_task, "Complete user_personas");
        current.refresh(&["market_analysis", "user_personas", "competitor_research"]);
        assert_eq!(current.progress, 100);
        assert_eq!(current.current_task, "Review concept deliverables");
    }

    #[test]
    fn log_merges_and_stamps_saved_at() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let first = TransformationOutput::base(TransitionPair::new(Phase::Concept, Phase::Requirements), t0);
        let second = TransformationOutput::base(TransitionPair::new(Phase::Requirements, Phase::Design), t0);
        TransformationLog::append(&store, &first, t0).unwrap();
        TransformationLog::append(&store, &second, t0 + Duration::seconds(1)).unwrap();

        let log = TransformationLog::load(&store).unwrap();
        assert_eq!(log.len(), 2);
        let entry = log.entry(Phase::Concept, Phase::Requirements).unwrap();
        assert_eq!(entry.saved_at, t0);
        assert_eq!(entry.transformation, first);

        let raw = store.read_state(TRANSFORMATIONS_KEY).unwrap().unwrap();
        assert!(raw["requirements_to_design"]["savedAt"].is_string());
        assert_eq!(raw["requirements_to_design"]["type"], "requirements_to_design");
    }

    #[test]
    fn later_save_for_same_pair_wins() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let mut out = TransformationOutput::base(TransitionPair::new(Phase::Concept, Phase::Requirements), t0);
        TransformationLog::append(&store, &out, t0).unwrap();
        out.decisions.push("Ship a web MVP".to_string());
        TransformationLog::append(&store, &out, t0 + Duration::seconds(2)).unwrap();

        let log = TransformationLog::load(&store).unwrap();
        assert_eq!(log.len(), 1);
        let entry = log.entry(Phase::Concept, Phase::Requirements).unwrap();
        assert_eq!(entry.transformation.decisions, vec!["Ship a web MVP"]);
        assert!(log.entry(Phase::Design, Phase::Architecture).is_none());
    }
}

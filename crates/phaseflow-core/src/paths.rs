use crate::error::{PhaseflowError, Result};
use crate::types::Phase;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PHASEFLOW_DIR: &str = ".phaseflow";
pub const STATE_DIR: &str = ".phaseflow/state";
pub const CONFIG_FILE: &str = ".phaseflow/config.yaml";
pub const DEFAULT_DELIVERABLES_DIR: &str = "deliverables";

// ---------------------------------------------------------------------------
// State document keys
// ---------------------------------------------------------------------------

pub const PROJECT_PHASES_KEY: &str = "project-phases";
pub const QUALITY_GATES_KEY: &str = "quality-gates";
pub const CURRENT_PHASE_KEY: &str = "current-phase";
pub const TRANSFORMATIONS_KEY: &str = "transformations";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn phaseflow_dir(root: &Path) -> PathBuf {
    root.join(PHASEFLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn state_doc_path(state_dir: &Path, key: &str) -> PathBuf {
    state_dir.join(format!("{key}.json"))
}

/// Directory holding the artifacts of one phase, e.g. `deliverables/concept`.
pub fn phase_deliverables_dir(root: &Path, deliverables_dir: &str, phase: Phase) -> PathBuf {
    root.join(deliverables_dir).join(phase.as_str())
}

/// Candidate artifact paths for a deliverable, in extension priority order.
pub fn deliverable_candidates(
    root: &Path,
    deliverables_dir: &str,
    phase: Phase,
    deliverable: &str,
    extensions: &[String],
) -> Vec<PathBuf> {
    let dir = phase_deliverables_dir(root, deliverables_dir, phase);
    extensions
        .iter()
        .map(|ext| dir.join(format!("{deliverable}.{}", ext.trim_start_matches('.'))))
        .collect()
}

// ---------------------------------------------------------------------------
// Key validation
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").expect("static key regex")
    })
}

/// State keys become file names, so they are restricted to a safe charset.
pub fn validate_state_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 64 || !key_re().is_match(key) {
        return Err(PhaseflowError::MalformedState {
            key: key.to_string(),
            reason: "state keys must be lowercase alphanumeric with '-' or '_'".to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

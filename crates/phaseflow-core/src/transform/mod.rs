//! Phase-to-phase transformers.
//!
//! A transformer reads the analysis bundle of the phase being left and
//! proposes artifacts for the phase being entered. Output crosses into the
//! engine as JSON and is checked by [`schema::parse_transformation`].

pub mod architecture;
pub mod concept;
pub mod design;
pub mod heuristics;
pub mod implementation;
pub mod requirements;
pub mod schema;

pub use heuristics::{Metrics, TechStack};

use crate::analysis::PhaseAnalysisBundle;
use crate::error::{PhaseflowError, Result};
use crate::types::{Phase, Priority, ProjectType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// TransitionPair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionPair {
    pub from: Phase,
    pub to: Phase,
}

impl TransitionPair {
    pub fn new(from: Phase, to: Phase) -> Self {
        Self { from, to }
    }

    /// `concept_to_requirements`; used as the output `type` and the
    /// transformation log key.
    pub fn label(&self) -> String {
        format!("{}_to_{}", self.from, self.to)
    }
}

impl fmt::Display for TransitionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

// ---------------------------------------------------------------------------
// TransformContext
// ---------------------------------------------------------------------------

/// Static inputs a transformer may read besides the bundle.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub project_type: ProjectType,
    /// Configured stack; overrides rule choices category by category.
    pub tech_stack: TechStack,
    pub now: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(project_type: ProjectType, tech_stack: TechStack, now: DateTime<Utc>) -> Self {
        Self {
            project_type,
            tech_stack,
            now,
        }
    }
}

// ---------------------------------------------------------------------------
// TransformationOutput
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationInsights {
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub from_phase: Phase,
    pub to_phase: Phase,
    pub insights: TransformationInsights,
    pub tech_stack: TechStack,
    pub decisions: Vec<String>,
    pub recommendations: Vec<String>,
    pub transformed_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wireframes: Option<Vec<Wireframe>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_flows: Option<Vec<UserFlow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_specs: Option<Vec<ComponentSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_design: Option<SystemDesign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_plan: Option<ImplementationPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_plan: Option<DeploymentPlan>,
}

impl TransformationOutput {
    /// Common fields filled in; phase-specific sections left empty.
    pub fn base(pair: TransitionPair, now: DateTime<Utc>) -> Self {
        Self {
            kind: pair.label(),
            from_phase: pair.from,
            to_phase: pair.to,
            insights: TransformationInsights::default(),
            tech_stack: TechStack::new(),
            decisions: Vec::new(),
            recommendations: Vec::new(),
            transformed_at: now,
            requirements: None,
            wireframes: None,
            user_flows: None,
            component_specs: None,
            system_design: None,
            implementation_plan: None,
            deployment_plan: None,
        }
    }

    pub fn pair(&self) -> TransitionPair {
        TransitionPair::new(self.from_phase, self.to_phase)
    }

    pub fn metric(&self, name: &str) -> Option<u64> {
        self.insights.metrics.get(name).copied()
    }
}

// --- requirements ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementItem {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    /// Insight key the item was derived from.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStory {
    pub id: String,
    pub persona: String,
    pub want: String,
    pub benefit: String,
    pub acceptance_criteria: Vec<String>,
}

impl UserStory {
    pub fn sentence(&self) -> String {
        format!(
            "As a {}, I want to {}, so that {}",
            self.persona, self.want, self.benefit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsDraft {
    pub functional: Vec<RequirementItem>,
    pub non_functional: Vec<RequirementItem>,
    pub user_stories: Vec<UserStory>,
}

// --- design ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wireframe {
    pub id: String,
    pub screen: String,
    pub purpose: String,
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlow {
    pub id: String,
    pub name: String,
    pub persona: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Layout,
    Page,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,
    pub kind: ComponentKind,
    pub responsibility: String,
    #[serde(default)]
    pub used_by: Vec<String>,
}

// --- architecture ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub method: String,
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemDesign {
    pub architecture_style: String,
    pub database_schema: Vec<TableSpec>,
    pub api_endpoints: Vec<ApiEndpoint>,
    pub services: Vec<String>,
}

// --- implementation ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePlan {
    pub name: String,
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub deliverables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationPlan {
    pub modules: Vec<ModulePlan>,
    pub milestones: Vec<Milestone>,
    pub test_strategy: Vec<String>,
}

// --- deployment ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    pub name: String,
    pub purpose: String,
    pub approval_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPlan {
    pub environments: Vec<EnvironmentSpec>,
    pub pipeline: Vec<String>,
    pub monitoring: Vec<String>,
    pub rollback_strategy: String,
    #[serde(default)]
    pub required_secrets: Vec<String>,
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Transformer: Send + Sync {
    fn source(&self) -> Phase;
    fn target(&self) -> Phase;

    fn pair(&self) -> TransitionPair {
        TransitionPair::new(self.source(), self.target())
    }

    /// Produce the output document for `bundle`. The engine parses and
    /// validates the returned JSON before accepting it.
    async fn transform(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> Result<Value>;
}

/// Synchronous, pure derivation used by the built-in transformers.
pub trait PhaseTransform: Send + Sync {
    const SOURCE: Phase;
    const TARGET: Phase;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput;
}

#[async_trait]
impl<T: PhaseTransform> Transformer for T {
    fn source(&self) -> Phase {
        T::SOURCE
    }

    fn target(&self) -> Phase {
        T::TARGET
    }

    async fn transform(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> Result<Value> {
        Ok(serde_json::to_value(self.derive(bundle, ctx))?)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

fn builtin(source: Phase) -> Option<Arc<dyn Transformer>> {
    match source {
        Phase::Concept => Some(Arc::new(concept::ConceptToRequirements)),
        Phase::Requirements => Some(Arc::new(requirements::RequirementsToDesign)),
        Phase::Design => Some(Arc::new(design::DesignToArchitecture)),
        Phase::Architecture => Some(Arc::new(architecture::ArchitectureToImplementation)),
        Phase::Implementation => Some(Arc::new(implementation::ImplementationToDeployment)),
        Phase::Deployment | Phase::Complete => None,
    }
}

/// Transformers keyed by the phase they leave.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    by_source: BTreeMap<Phase, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for phase in Phase::all() {
            if let Some(t) = builtin(*phase) {
                registry.register(t);
            }
        }
        registry
    }

    /// Install `transformer` for its source phase, returning any it replaced.
    pub fn register(&mut self, transformer: Arc<dyn Transformer>) -> Option<Arc<dyn Transformer>> {
        self.by_source.insert(transformer.source(), transformer)
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Transformer for exactly `from -> to`.
    pub fn resolve(&self, from: Phase, to: Phase) -> Result<Arc<dyn Transformer>> {
        match self.by_source.get(&from) {
            Some(t) if t.target() == to => Ok(Arc::clone(t)),
            _ => Err(PhaseflowError::NoTransformer {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.by_source.values().map(|t| t.pair().label()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared derivation helpers
// ---------------------------------------------------------------------------

/// `PREFIX-001` style identifiers.
pub(crate) fn seq_id(prefix: &str, index: usize, width: usize) -> String {
    format!("{prefix}-{:0width$}", index + 1)
}

/// Order-preserving dedupe, case-insensitive.
pub(crate) fn dedupe(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

/// Lowercase the first character, for embedding a title mid-sentence.
pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn metric(metrics: &mut Metrics, name: &str, value: usize) {
    metrics.insert(name.to_string(), value as u64);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

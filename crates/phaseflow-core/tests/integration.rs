use async_trait::async_trait;
use phaseflow_core::analysis::{AnalyzerReport, InsightMap, PhaseAnalysisBundle};
use phaseflow_core::config::Config;
use phaseflow_core::gate::QualityGates;
use phaseflow_core::state::{CurrentPhase, TransformationLog};
use phaseflow_core::store::JsonFileStore;
use phaseflow_core::transform::{TransformContext, Transformer, TransformerRegistry};
use phaseflow_core::workflow::AdvanceMode;
use phaseflow_core::{
    DeliverableAnalyzer, FailureKind, Phase, PhaseTransitionEngine, PhaseWorkflow, PhaseflowError,
    Result, TransitionStage,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Treats each artifact as a JSON object of insights.
#[derive(Default)]
struct JsonAnalyzer {
    calls: AtomicU32,
}

#[async_trait]
impl DeliverableAnalyzer for JsonAnalyzer {
    async fn analyze(&self, path: &Path, _deliverable: &str) -> Result<AnalyzerReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&data)?;
        let mut insights = InsightMap::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                insights.insert(k, v);
            }
        }
        Ok(AnalyzerReport {
            insights,
            ..Default::default()
        })
    }
}

/// Bootstrap a project with fast retry settings and the concept artifacts.
fn init_project(dir: &TempDir) {
    let mut config = Config::new("test-project");
    config.engine.transform_timeout_ms = 2_000;
    config.engine.backoff_base_ms = 10;
    config.engine.backoff_cap_ms = 20;
    assert!(config.init(dir.path()).unwrap());

    write(dir, "deliverables/concept/market_analysis.json", json!({
        "market_opportunities": ["Freelancers invoice by hand"],
    }));
    write(dir, "deliverables/concept/user_personas.json", json!({
        "target_users": ["Freelance designers"],
        "pain_points": ["chasing late payments"],
    }));
    write(dir, "deliverables/concept/competitor_research.json", json!({
        "competitors": ["FreshBooks", "Wave"],
        "key_features": ["Recurring invoices", "Payment reminders", "Expense tracking"],
    }));
}

fn write(dir: &TempDir, rel: &str, body: Value) {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
}

fn complete(dir: &TempDir, phase: Phase, deliverables: &[&str]) {
    let store = JsonFileStore::for_project(dir.path());
    let mut gates = QualityGates::load_or_seeded(&store).unwrap();
    for d in deliverables {
        gates.complete(phase, d).unwrap();
    }
    gates.save(&store).unwrap();
}

const CONCEPT: &[&str] = &["market_analysis", "user_personas", "competitor_research"];

fn engine(dir: &TempDir) -> (PhaseTransitionEngine, Arc<JsonAnalyzer>) {
    init_tracing();
    let analyzer = Arc::new(JsonAnalyzer::default());
    let engine = PhaseTransitionEngine::for_project(dir.path(), analyzer.clone()).unwrap();
    (engine, analyzer)
}

/// Fails its first `failures` calls, then delegates to the built-in.
struct Flaky {
    failures: u32,
    calls: AtomicU32,
    inner: Arc<dyn Transformer>,
}

#[async_trait]
impl Transformer for Flaky {
    fn source(&self) -> Phase {
        self.inner.source()
    }

    fn target(&self) -> Phase {
        self.inner.target()
    }

    async fn transform(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            return Err(PhaseflowError::Transform(format!("upstream unavailable (call {n})")));
        }
        self.inner.transform(bundle, ctx).await
    }
}

fn flaky(failures: u32) -> Arc<Flaky> {
    let inner = TransformerRegistry::with_builtins()
        .resolve(Phase::Concept, Phase::Requirements)
        .unwrap();
    Arc::new(Flaky {
        failures,
        calls: AtomicU32::new(0),
        inner,
    })
}

/// Drops `transformedAt` from an otherwise valid document.
struct Undated;

#[async_trait]
impl Transformer for Undated {
    fn source(&self) -> Phase {
        Phase::Concept
    }

    fn target(&self) -> Phase {
        Phase::Requirements
    }

    async fn transform(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> Result<Value> {
        let builtin = TransformerRegistry::with_builtins().resolve(Phase::Concept, Phase::Requirements)?;
        let mut value = builtin.transform(bundle, ctx).await?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("transformedAt");
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Engine scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concept_to_requirements_succeeds_with_all_deliverables() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(&dir, Phase::Concept, CONCEPT);
    let (engine, analyzer) = engine(&dir);

    let result = engine.execute_transition("concept", "requirements").await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.to_phase, "requirements");
    assert!(result.error.is_none());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 3);

    let ctx = result.enhanced_context.as_ref().unwrap();
    assert_eq!(ctx.phase, Phase::Requirements);
    assert!(!ctx.focus_areas.is_empty());

    let out = result.transformation.as_ref().unwrap();
    let draft = out.requirements.as_ref().unwrap();
    assert_eq!(draft.functional[0].title, "Recurring invoices");
    assert!(draft.user_stories[0]
        .sentence()
        .starts_with("As a Freelance designers"));

    let summary = result.deliverable_analysis.as_ref().unwrap();
    assert_eq!(summary.successful_analyses, 3);

    // persisted with savedAt under the pair key
    let raw: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".phaseflow/state/transformations.json")).unwrap(),
    )
    .unwrap();
    assert!(raw["concept_to_requirements"]["savedAt"].is_string());
    assert_eq!(raw["concept_to_requirements"]["toPhase"], "requirements");
}

#[tokio::test]
async fn missing_personas_are_named_in_the_error() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(&dir, Phase::Concept, &["market_analysis", "competitor_research"]);
    let (engine, analyzer) = engine(&dir);

    let result = engine.execute_transition("concept", "requirements").await;
    assert!(!result.success);
    assert!(result.transformation.is_none());
    let err = result.error.unwrap();
    assert!(err.message.contains("user_personas"), "{}", err.message);
    assert_eq!(err.kind, FailureKind::Validation);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skipping_design_is_illegal_even_when_complete() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(
        &dir,
        Phase::Requirements,
        &["functional_requirements", "non_functional_requirements", "user_stories"],
    );
    let (engine, _) = engine(&dir);

    let result = engine.execute_transition("requirements", "architecture").await;
    assert!(!result.success);
    let err = result.error.unwrap();
    assert_eq!(err.code, "IllegalTransition");
    assert_eq!(err.stage, TransitionStage::Validating);
}

#[tokio::test]
async fn repeat_call_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(&dir, Phase::Concept, CONCEPT);
    let (engine, analyzer) = engine(&dir);

    let first = engine.execute_transition("concept", "requirements").await;
    let calls = analyzer.calls.load(Ordering::SeqCst);
    let second = engine.execute_transition("concept", "requirements").await;

    assert_eq!(first, second);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), calls);
    assert_eq!(engine.metrics().cache_hits, 1);
}

#[tokio::test]
async fn flaky_transformer_is_retried() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(&dir, Phase::Concept, CONCEPT);
    let flaky = flaky(2);
    let mut registry = TransformerRegistry::with_builtins();
    registry.register(flaky.clone());
    let (engine, _) = engine(&dir);
    let engine = engine.with_registry(registry);

    let result = engine.execute_transition("concept", "requirements").await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert_eq!(engine.metrics().transform_attempts, 3);
}

#[tokio::test]
async fn missing_transformed_at_fails_after_every_attempt_and_persists_nothing() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    complete(&dir, Phase::Concept, CONCEPT);
    let mut registry = TransformerRegistry::with_builtins();
    registry.register(Arc::new(Undated));
    let (engine, _) = engine(&dir);
    let engine = engine.with_registry(registry);

    let result = engine.execute_transition("concept", "requirements").await;
    assert!(!result.success);
    let err = result.error.unwrap();
    assert_eq!(err.kind, FailureKind::Schema);
    assert!(err.message.contains("transformedAt"));
    assert_eq!(engine.metrics().transform_attempts, 3);

    let store = JsonFileStore::for_project(dir.path());
    assert!(TransformationLog::load(&store).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workflow_falls_back_to_basic_advance() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let mut registry = TransformerRegistry::with_builtins();
    registry.register(flaky(u32::MAX));
    let (engine, _) = engine(&dir);
    let workflow = PhaseWorkflow::new(engine.with_registry(registry));

    workflow.initialize(chrono::Utc::now()).unwrap();
    for d in CONCEPT {
        workflow.complete_deliverable(Phase::Concept, d).unwrap();
    }

    let advance = workflow.advance().await.unwrap();
    assert_eq!(advance.mode, AdvanceMode::Basic);
    assert_eq!(advance.result.failure_kind(), Some(FailureKind::Transform));

    let status = workflow.status().unwrap();
    assert_eq!(status.current_phase, Phase::Requirements);
    let store = JsonFileStore::for_project(dir.path());
    let current = CurrentPhase::load(&store).unwrap().unwrap();
    assert_eq!(current.phase, Phase::Requirements);
    assert!(current.enhanced_context.is_none());
}

#[tokio::test]
async fn workflow_walks_concept_to_design() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    write(&dir, "deliverables/requirements/user_stories.json", json!({
        "user_stories": ["As a freelancer, I want to send an invoice so that I get paid"],
    }));
    let (engine, _) = engine(&dir);
    let workflow = PhaseWorkflow::new(engine);
    workflow.initialize(chrono::Utc::now()).unwrap();

    for d in CONCEPT {
        workflow.complete_deliverable(Phase::Concept, d).unwrap();
    }
    assert_eq!(workflow.advance().await.unwrap().mode, AdvanceMode::Enhanced);

    for d in ["functional_requirements", "non_functional_requirements", "user_stories"] {
        workflow.complete_deliverable(Phase::Requirements, d).unwrap();
    }
    let advance = workflow.advance().await.unwrap();
    assert_eq!(advance.mode, AdvanceMode::Enhanced);
    assert_eq!(advance.to, Phase::Design);

    let store = JsonFileStore::for_project(dir.path());
    let log = TransformationLog::load(&store).unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.entry(Phase::Requirements, Phase::Design).is_some());
}

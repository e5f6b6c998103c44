//! Orchestrates one phase transition: validate, analyze, transform, build
//! context, persist, cache.
//!
//! Concurrent `execute_transition` calls are not coordinated. Two callers
//! may both miss the cache and both persist; the last write wins.

use crate::analysis::{AnalysisGateway, AnalysisSummary, DeliverableAnalyzer};
use crate::cache::{CacheKey, CacheStats, TransformationCache};
use crate::config::Config;
use crate::context::{EnhancedContext, EnhancedContextBuilder};
use crate::error::{FailureKind, PhaseflowError, Result};
use crate::gate::QualityGates;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::state::TransformationLog;
use crate::store::{JsonFileStore, StateStore};
use crate::transform::{
    schema, TechStack, TransformContext, TransformationOutput, TransformerRegistry, TransitionPair,
};
use crate::types::{Phase, ProjectType};
use crate::validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// TransitionStage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStage {
    Validating,
    Analyzing,
    Transforming,
    ContextBuilding,
    Persisting,
    Done,
    Failed,
}

impl TransitionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionStage::Validating => "validating",
            TransitionStage::Analyzing => "analyzing",
            TransitionStage::Transforming => "transforming",
            TransitionStage::ContextBuilding => "context_building",
            TransitionStage::Persisting => "persisting",
            TransitionStage::Done => "done",
            TransitionStage::Failed => "failed",
        }
    }
}

impl fmt::Display for TransitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransitionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionFailure {
    pub kind: FailureKind,
    /// Stage that was running when the transition failed.
    pub stage: TransitionStage,
    pub code: String,
    /// `<code>: <detail>`.
    pub message: String,
}

impl TransitionFailure {
    pub fn new(stage: TransitionStage, err: &PhaseflowError) -> Self {
        Self {
            kind: err.kind(),
            stage,
            code: err.code().to_string(),
            message: format!("{}: {err}", err.code()),
        }
    }
}

/// Either `success` with `transformation` set, or not `success` with
/// `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub success: bool,
    pub from_phase: String,
    pub to_phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_context: Option<EnhancedContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_analysis: Option<AnalysisSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransitionFailure>,
    pub transformed_at: DateTime<Utc>,
}

impl TransitionResult {
    pub fn succeeded(
        transformation: TransformationOutput,
        enhanced_context: EnhancedContext,
        deliverable_analysis: AnalysisSummary,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            from_phase: transformation.from_phase.to_string(),
            to_phase: transformation.to_phase.to_string(),
            transformation: Some(transformation),
            enhanced_context: Some(enhanced_context),
            deliverable_analysis: Some(deliverable_analysis),
            error: None,
            transformed_at: now,
        }
    }

    pub fn failed(
        from: &str,
        to: &str,
        stage: TransitionStage,
        err: &PhaseflowError,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            success: false,
            from_phase: from.to_string(),
            to_phase: to.to_string(),
            transformation: None,
            enhanced_context: None,
            deliverable_analysis: None,
            error: Some(TransitionFailure::new(stage, err)),
            transformed_at: now,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetrics {
    pub transitions_attempted: u64,
    pub transitions_succeeded: u64,
    pub transitions_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub transform_attempts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    transform_attempts: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// A failed transition with the typed error, before it is flattened onto a
/// [`TransitionResult`].
#[derive(Debug)]
pub(crate) struct StageError {
    pub(crate) stage: TransitionStage,
    pub(crate) error: PhaseflowError,
}

impl StageError {
    pub(crate) fn into_result(self, from: &str, to: &str) -> TransitionResult {
        TransitionResult::failed(from, to, self.stage, &self.error, Utc::now())
    }
}

fn at(stage: TransitionStage) -> impl FnOnce(PhaseflowError) -> StageError {
    move |error| StageError { stage, error }
}

// ---------------------------------------------------------------------------
// PhaseTransitionEngine
// ---------------------------------------------------------------------------

pub struct PhaseTransitionEngine {
    store: Arc<dyn StateStore>,
    gateway: AnalysisGateway,
    registry: TransformerRegistry,
    retry: RetryExecutor,
    contexts: EnhancedContextBuilder,
    /// `None` when caching is disabled.
    cache: Option<Mutex<TransformationCache<TransitionResult>>>,
    project_type: ProjectType,
    tech_stack: TechStack,
    counters: Counters,
}

impl PhaseTransitionEngine {
    /// Engine with the built-in transformers and settings from `config`.
    pub fn new(store: Arc<dyn StateStore>, gateway: AnalysisGateway, config: &Config) -> Self {
        let engine = &config.engine;
        let cache = engine.cache_enabled.then(|| {
            Mutex::new(TransformationCache::new(
                engine.cache_ttl(),
                engine.cache_max_entries,
            ))
        });
        Self {
            store,
            gateway,
            registry: TransformerRegistry::with_builtins(),
            retry: RetryExecutor::new(RetryPolicy::from_config(engine)),
            contexts: EnhancedContextBuilder::new(),
            cache,
            project_type: config.project.project_type,
            tech_stack: config.tech_stack.clone(),
            counters: Counters::default(),
        }
    }

    /// Engine for a project on disk: loads `.phaseflow/config.yaml` and
    /// persists under `.phaseflow/state`.
    pub fn for_project(root: &Path, analyzer: Arc<dyn DeliverableAnalyzer>) -> Result<Self> {
        let config = Config::load(root)?;
        config.ensure_valid()?;
        for w in config.validate() {
            tracing::warn!(message = %w.message, "config warning");
        }
        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::for_project(root));
        let gateway = AnalysisGateway::with_config(root, config.deliverables.clone(), analyzer);
        Ok(Self::new(store, gateway, &config))
    }

    pub fn with_registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn project_type(&self) -> ProjectType {
        self.project_type
    }

    pub fn metrics(&self) -> EngineMetrics {
        let c = &self.counters;
        EngineMetrics {
            transitions_attempted: c.attempted.load(Ordering::Relaxed),
            transitions_succeeded: c.succeeded.load(Ordering::Relaxed),
            transitions_failed: c.failed.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            transform_attempts: c.transform_attempts.load(Ordering::Relaxed),
        }
    }

    /// `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        let cache = self.cache.as_ref()?.lock().ok()?;
        Some(cache.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(Ok(mut cache)) = self.cache.as_ref().map(|c| c.lock()) {
            cache.clear();
        }
    }

    /// Run the transition `from -> to`. Never panics and never returns
    /// `Err`: every failure is reported on the result with its stage.
    pub async fn execute_transition(&self, from: &str, to: &str) -> TransitionResult {
        self.try_transition(from, to)
            .await
            .unwrap_or_else(|failure| failure.into_result(from, to))
    }

    /// Like [`execute_transition`](Self::execute_transition) but keeps the
    /// typed error of a failure.
    pub(crate) async fn try_transition(
        &self,
        from: &str,
        to: &str,
    ) -> std::result::Result<TransitionResult, StageError> {
        bump(&self.counters.attempted);
        let key = match (Phase::from_str(from), Phase::from_str(to)) {
            (Ok(f), Ok(t)) => Some(CacheKey::new(f, t, self.project_type)),
            _ => None,
        };

        if let Some(hit) = key.and_then(|k| self.cache_lookup(&k)) {
            bump(&self.counters.succeeded);
            tracing::info!(from, to, "transition served from cache");
            return Ok(hit);
        }

        let started = std::time::Instant::now();
        match self.run_stages(from, to).await {
            Ok(result) => {
                bump(&self.counters.succeeded);
                tracing::info!(
                    from,
                    to,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transition completed"
                );
                if let Some(k) = key {
                    self.cache_store(k, &result);
                }
                Ok(result)
            }
            Err(failure) => {
                bump(&self.counters.failed);
                let (stage, error) = (failure.stage, &failure.error);
                if error.kind() == FailureKind::Validation {
                    tracing::warn!(from, to, stage = %stage, error = %error, "transition rejected");
                } else {
                    tracing::error!(from, to, stage = %stage, error = %error, "transition failed");
                }
                Err(failure)
            }
        }
    }

    async fn run_stages(&self, from: &str, to: &str) -> std::result::Result<TransitionResult, StageError> {
        let now = Utc::now();

        tracing::debug!(stage = %TransitionStage::Validating, from, to);
        let gates = QualityGates::load_or_seeded(self.store.as_ref())
            .map_err(at(TransitionStage::Validating))?;
        let (from_phase, to_phase) = validator::check(from, to, &gates)
            .map_err(|e| at(TransitionStage::Validating)(e.into()))?;
        let pair = TransitionPair::new(from_phase, to_phase);

        tracing::debug!(stage = %TransitionStage::Analyzing, pair = %pair);
        let bundle = self.gateway.analyze_phase(from_phase).await;

        tracing::debug!(stage = %TransitionStage::Transforming, pair = %pair);
        let transformer = self
            .registry
            .resolve(from_phase, to_phase)
            .map_err(at(TransitionStage::Transforming))?;
        let ctx = TransformContext::new(self.project_type, self.tech_stack.clone(), now);
        let transformer = transformer.as_ref();
        let (bundle_ref, ctx_ref) = (&bundle, &ctx);
        let transformation = self
            .retry
            .run_observed(
                &pair.label(),
                |_attempt| async move {
                    let value = transformer.transform(bundle_ref, ctx_ref).await?;
                    schema::parse_transformation(value, pair)
                },
                |_, _| bump(&self.counters.transform_attempts),
            )
            .await
            .map_err(at(TransitionStage::Transforming))?;

        tracing::debug!(stage = %TransitionStage::ContextBuilding, pair = %pair);
        let context = self
            .contexts
            .build_at(&transformation, to_phase, now)
            .map_err(at(TransitionStage::ContextBuilding))?;

        tracing::debug!(stage = %TransitionStage::Persisting, pair = %pair);
        TransformationLog::append(self.store.as_ref(), &transformation, Utc::now())
            .map_err(at(TransitionStage::Persisting))?;

        tracing::debug!(stage = %TransitionStage::Done, pair = %pair);
        Ok(TransitionResult::succeeded(
            transformation,
            context,
            bundle.metadata,
            now,
        ))
    }

    fn cache_lookup(&self, key: &CacheKey) -> Option<TransitionResult> {
        let cache = self.cache.as_ref()?;
        let Ok(mut cache) = cache.lock() else {
            tracing::warn!(key = %key, "cache lock poisoned; bypassing");
            return None;
        };
        let hit = cache.get(key);
        if hit.is_some() {
            bump(&self.counters.cache_hits);
            tracing::debug!(key = %key, "cache hit");
        } else {
            bump(&self.counters.cache_misses);
            tracing::debug!(key = %key, "cache miss");
        }
        hit
    }

    fn cache_store(&self, key: CacheKey, result: &TransitionResult) {
        if let Some(Ok(mut cache)) = self.cache.as_ref().map(|c| c.lock()) {
            cache.set(key, result.clone());
        }
    }
}

impl fmt::Debug for PhaseTransitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseTransitionEngine")
            .field("project_type", &self.project_type)
            .field("registry", &self.registry)
            .field("retry", self.retry.policy())
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! architecture → implementation: module plan, milestones and test strategy.

use super::heuristics::{self, GuidanceRule, RuleSet, Signals, Trigger, STACK_RULES};
use super::{
    dedupe, metric, seq_id, ImplementationPlan, Metrics, Milestone, ModulePlan, PhaseTransform,
    TransformContext, TransformationOutput, TransitionPair,
};
use crate::analysis::{InsightMap, PhaseAnalysisBundle};
use crate::types::{Phase, ProjectType};

const SERVICES: &[&str] = &["services", "system_components", "modules"];
const ENDPOINTS: &[&str] = &["api_endpoints", "endpoints", "api_specification"];
const TABLES: &[&str] = &["database_tables", "tables", "entities", "database_schema"];
const PATTERNS: &[&str] = &["architecture_patterns", "patterns"];

const PERSISTENCE: &str = "persistence";
const SHARED: &str = "shared";

/// Endpoints shown per milestone before the list is summarised.
const MILESTONE_ENDPOINTS: usize = 5;

const TEST_STRATEGY: &[GuidanceRule] = &[
    GuidanceRule {
        text: "Unit tests for every module's public functions",
        when: Trigger::Always,
    },
    GuidanceRule {
        text: "Contract tests for the {endpoint_count} API endpoints",
        when: Trigger::MetricAbove("endpoint_count", 0),
    },
    GuidanceRule {
        text: "Migration tests for {table_count} tables against a disposable database",
        when: Trigger::MetricAbove("table_count", 0),
    },
    GuidanceRule {
        text: "Load test WebSocket fan-out",
        when: Trigger::Mentions(&["websocket", "websockets", "real-time", "realtime", "ws"]),
    },
    GuidanceRule {
        text: "Consumer-driven contract tests between services",
        when: Trigger::MetricAbove("service_count", 2),
    },
    GuidanceRule {
        text: "End-to-end browser tests for critical user flows",
        when: Trigger::ProjectIs(&[ProjectType::WebApplication]),
    },
    GuidanceRule {
        text: "Device tests on the two most common screen sizes",
        when: Trigger::ProjectIs(&[ProjectType::MobileApp]),
    },
];

pub const RULES: RuleSet = RuleSet {
    categories: &["frontend", "backend", "database", "cache", "messaging", "testing", "ci_cd"],
    decisions: &[
        GuidanceRule {
            text: "Organise code into {module_count} modules with one owner each",
            when: Trigger::MetricAbove("module_count", 0),
        },
        GuidanceRule {
            text: "Deliver in {milestone_count} milestones, foundation first",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Keep database access behind the persistence module",
            when: Trigger::MetricAbove("table_count", 0),
        },
        GuidanceRule {
            text: "Start with a monorepo; split repositories only if teams diverge",
            when: Trigger::MetricAbove("service_count", 2),
        },
    ],
    recommendations: &[
        GuidanceRule {
            text: "Set up CI before the first feature merge",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Generate API clients from the specification to avoid drift",
            when: Trigger::MetricAbove("endpoint_count", 10),
        },
        GuidanceRule {
            text: "Feature-flag unfinished work so main stays releasable",
            when: Trigger::MetricAbove("milestone_count", 2),
        },
        GuidanceRule {
            text: "Document the {pattern_count} architecture patterns in the README",
            when: Trigger::MetricAbove("pattern_count", 0),
        },
    ],
};

#[derive(Debug, Default)]
struct ArchitectureInsights {
    services: Vec<String>,
    endpoints: Vec<String>,
    tables: Vec<String>,
    patterns: Vec<String>,
}

impl ArchitectureInsights {
    fn extract(insights: &InsightMap) -> Self {
        let get = |keys: &[&str]| dedupe(insights.first_strings(keys));
        Self {
            services: get(SERVICES),
            endpoints: get(ENDPOINTS),
            tables: get(TABLES),
            patterns: get(PATTERNS),
        }
    }
}

/// `"order-service"` or `"Order Service"` → `"order"`.
fn module_name(service: &str) -> String {
    let lower = service.trim().to_lowercase();
    let trimmed = lower
        .trim_end_matches("-service")
        .trim_end_matches(" service")
        .trim_end_matches("_service");
    trimmed
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Whether `endpoint` (e.g. "GET /api/orders/{id}") belongs to `module`.
fn endpoint_belongs(endpoint: &str, module: &str) -> bool {
    let stem = module.trim_end_matches('s');
    !stem.is_empty() && endpoint.to_lowercase().contains(stem)
}

pub struct ArchitectureToImplementation;

impl ArchitectureToImplementation {
    fn modules(&self, a: &ArchitectureInsights) -> Vec<ModulePlan> {
        let mut services: Vec<String> = a
            .services
            .iter()
            .map(|s| module_name(s))
            .filter(|m| !m.is_empty() && m != PERSISTENCE && m != SHARED)
            .collect();
        if services.is_empty() {
            services.push("api".to_string());
        }
        let single = services.len() == 1;

        let mut plans: Vec<ModulePlan> = services
            .iter()
            .map(|name| {
                let responsibilities: Vec<String> = if single {
                    a.endpoints.clone()
                } else {
                    a.endpoints
                        .iter()
                        .filter(|e| endpoint_belongs(e, name))
                        .cloned()
                        .collect()
                };
                let mut depends_on = vec![SHARED.to_string()];
                if !a.tables.is_empty() {
                    depends_on.insert(0, PERSISTENCE.to_string());
                }
                ModulePlan {
                    name: name.clone(),
                    responsibilities: if responsibilities.is_empty() {
                        vec![format!("Business logic for {name}")]
                    } else {
                        responsibilities
                    },
                    depends_on,
                }
            })
            .collect();

        if !a.tables.is_empty() {
            plans.push(ModulePlan {
                name: PERSISTENCE.to_string(),
                responsibilities: a.tables.iter().map(|t| format!("Schema and queries for {t}")).collect(),
                depends_on: vec![SHARED.to_string()],
            });
        }
        plans.push(ModulePlan {
            name: SHARED.to_string(),
            responsibilities: vec![
                "Configuration loading".to_string(),
                "Structured logging".to_string(),
                "Error types".to_string(),
            ],
            depends_on: Vec::new(),
        });
        plans
    }

    fn milestones(&self, a: &ArchitectureInsights, modules: &[ModulePlan]) -> Vec<Milestone> {
        let mut foundation = vec!["Repository, CI and shared module".to_string()];
        if !a.tables.is_empty() {
            foundation.push(format!("Migrations for {} tables", a.tables.len()));
        }

        let mut core: Vec<String> = a.endpoints.iter().take(MILESTONE_ENDPOINTS).cloned().collect();
        if a.endpoints.len() > MILESTONE_ENDPOINTS {
            core.push(format!("{} further endpoints", a.endpoints.len() - MILESTONE_ENDPOINTS));
        }
        if core.is_empty() {
            core = modules
                .iter()
                .filter(|m| m.name != SHARED && m.name != PERSISTENCE)
                .map(|m| format!("{} module", m.name))
                .collect();
        }

        let phases: [(&str, Vec<String>); 4] = [
            ("Foundation", foundation),
            ("Core features", core),
            (
                "Integration",
                vec![
                    "Authentication and authorisation".to_string(),
                    "Integration test suite".to_string(),
                ],
            ),
            (
                "Hardening",
                vec![
                    "Performance profiling".to_string(),
                    "Security review".to_string(),
                ],
            ),
        ];
        phases
            .into_iter()
            .enumerate()
            .map(|(i, (title, deliverables))| Milestone {
                id: seq_id("M", i, 1),
                title: title.to_string(),
                deliverables,
            })
            .collect()
    }
}

impl PhaseTransform for ArchitectureToImplementation {
    const SOURCE: Phase = Phase::Architecture;
    const TARGET: Phase = Phase::Implementation;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput {
        let a = ArchitectureInsights::extract(&bundle.insights);
        let modules = self.modules(&a);
        let milestones = self.milestones(&a, &modules);

        let mut metrics = Metrics::new();
        metric(&mut metrics, "service_count", a.services.len());
        metric(&mut metrics, "endpoint_count", a.endpoints.len());
        metric(&mut metrics, "table_count", a.tables.len());
        metric(&mut metrics, "module_count", modules.len());
        metric(&mut metrics, "milestone_count", milestones.len());
        metric(&mut metrics, "pattern_count", a.patterns.len());

        let signals = Signals::new(bundle.corpus(), &metrics, ctx.project_type);
        let test_strategy = heuristics::collect_guidance(TEST_STRATEGY, &signals);

        let mut out = TransformationOutput::base(TransitionPair::new(Self::SOURCE, Self::TARGET), ctx.now);
        out.tech_stack = heuristics::select_stack(STACK_RULES, RULES.categories, &signals, &ctx.tech_stack);
        out.decisions = heuristics::collect_guidance(RULES.decisions, &signals);
        out.recommendations = heuristics::collect_guidance(RULES.recommendations, &signals);

        let mut findings = Vec::new();
        if !a.services.is_empty() {
            findings.push(format!("Services: {}", a.services.join(", ")));
        }
        if !a.endpoints.is_empty() {
            findings.push(format!("{} API endpoints to implement", a.endpoints.len()));
        }
        if !a.tables.is_empty() {
            findings.push(format!("{} tables to migrate", a.tables.len()));
        }
        if !a.patterns.is_empty() {
            findings.push(format!("Patterns in use: {}", a.patterns.join(", ")));
        }
        out.insights.key_findings = findings;
        out.insights.metrics = metrics;
        out.implementation_plan = Some(ImplementationPlan {
            modules,
            milestones,
            test_strategy,
        });
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

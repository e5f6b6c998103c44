//! implementation → deployment: environments, pipeline, monitoring and
//! rollback from what was built and how well it is tested.

use super::heuristics::{self, GuidanceRule, RuleSet, Signals, Trigger, STACK_RULES};
use super::{
    dedupe, metric, DeploymentPlan, EnvironmentSpec, Metrics, PhaseTransform, TransformContext,
    TransformationOutput, TransitionPair,
};
use crate::analysis::{InsightMap, PhaseAnalysisBundle};
use crate::types::{Phase, ProjectType};

const MODULES: &[&str] = &["modules", "source_modules", "components"];
const DEPENDENCIES: &[&str] = &["dependencies", "external_services"];
const ENV_VARS: &[&str] = &["environment_variables", "config_keys", "secrets"];
const FAILING_TESTS: &[&str] = &["failing_tests", "test_failures"];
const COVERAGE: &[&str] = &["test_coverage", "coverage"];

const MIGRATION_WORDS: &[&str] = &[
    "migration", "migrations", "database", "postgres", "postgresql", "mysql", "schema",
];

const MONITORING: &[GuidanceRule] = &[
    GuidanceRule {
        text: "Error-rate and latency dashboards per endpoint",
        when: Trigger::ProjectIsNot(&[ProjectType::Library, ProjectType::CliTool]),
    },
    GuidanceRule {
        text: "Uptime checks on public endpoints",
        when: Trigger::ProjectIsNot(&[ProjectType::Library, ProjectType::CliTool]),
    },
    GuidanceRule {
        text: "Queue depth and consumer lag alerts",
        when: Trigger::Mentions(&["queue", "rabbitmq", "kafka", "worker", "background jobs"]),
    },
    GuidanceRule {
        text: "Distributed tracing across the {module_count} modules",
        when: Trigger::MetricAbove("module_count", 5),
    },
    GuidanceRule {
        text: "Crash reporting from client builds",
        when: Trigger::ProjectIs(&[ProjectType::MobileApp, ProjectType::WebApplication]),
    },
    GuidanceRule {
        text: "Download and issue tracker trends",
        when: Trigger::ProjectIs(&[ProjectType::Library, ProjectType::CliTool]),
    },
];

const ROLLBACK: &[GuidanceRule] = &[
    GuidanceRule {
        text: "Rolling update with automatic rollback on failed readiness probes",
        when: Trigger::Mentions(&["kubernetes", "k8s", "helm"]),
    },
    GuidanceRule {
        text: "Staged store rollout; halt and ship a hotfix build on regressions",
        when: Trigger::ProjectIs(&[ProjectType::MobileApp]),
    },
    GuidanceRule {
        text: "Yank the release and publish a patch version",
        when: Trigger::ProjectIs(&[ProjectType::Library, ProjectType::CliTool]),
    },
    GuidanceRule {
        text: "Blue/green switch with the previous release kept warm",
        when: Trigger::Always,
    },
];

pub const RULES: RuleSet = RuleSet {
    categories: &["hosting", "ci_cd", "monitoring", "database", "cache"],
    decisions: &[
        GuidanceRule {
            text: "Promote builds through {environment_count} environments",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Run database migrations as a gated pipeline step",
            when: Trigger::Mentions(MIGRATION_WORDS),
        },
        GuidanceRule {
            text: "Provision {secret_count} secrets through the platform secret store",
            when: Trigger::MetricAbove("secret_count", 0),
        },
    ],
    recommendations: &[
        GuidanceRule {
            text: "Fix the {failing_test_count} failing tests before release",
            when: Trigger::MetricAbove("failing_test_count", 0),
        },
        GuidanceRule {
            text: "Raise test coverage from {coverage_percent}% to at least 70% before production",
            when: Trigger::MetricBelow("coverage_percent", 70),
        },
        GuidanceRule {
            text: "Rehearse a rollback in staging",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Pin versions of the {dependency_count} external dependencies",
            when: Trigger::MetricAbove("dependency_count", 0),
        },
    ],
};

#[derive(Debug, Default)]
struct ImplementationInsights {
    modules: Vec<String>,
    dependencies: Vec<String>,
    env_vars: Vec<String>,
    failing_tests: usize,
    coverage_percent: Option<u64>,
}

/// Leading number of "82%", "82.5", "coverage: 82%".
fn parse_percent(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().ok()?;
    Some(value.round().clamp(0.0, 100.0) as u64)
}

impl ImplementationInsights {
    fn extract(insights: &InsightMap) -> Self {
        let get = |keys: &[&str]| dedupe(insights.first_strings(keys));
        let failing_tests = FAILING_TESTS
            .iter()
            .find_map(|k| match insights.get(k) {
                Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as usize),
                Some(_) => Some(insights.count(k)),
                None => None,
            })
            .unwrap_or(0);
        let coverage_percent = COVERAGE
            .iter()
            .find_map(|k| insights.text(k))
            .and_then(|t| parse_percent(&t));
        Self {
            modules: get(MODULES),
            dependencies: get(DEPENDENCIES),
            env_vars: get(ENV_VARS),
            failing_tests,
            coverage_percent,
        }
    }
}

pub struct ImplementationToDeployment;

impl ImplementationToDeployment {
    fn environments(&self, project_type: ProjectType) -> Vec<EnvironmentSpec> {
        let env = |name: &str, purpose: &str, approval_required| EnvironmentSpec {
            name: name.to_string(),
            purpose: purpose.to_string(),
            approval_required,
        };
        let mut out = vec![env("development", "Shared integration of merged work", false)];
        if project_type == ProjectType::WebApplication {
            out.push(env("preview", "Per-branch review deployments", false));
        }
        out.push(env("staging", "Production-like release candidate checks", false));
        out.push(env("production", "Customer traffic", true));
        out
    }

    fn pipeline(&self, corpus: &str) -> Vec<String> {
        let mut stages = vec![
            "build",
            "unit tests",
            "integration tests",
            "security scan",
            "deploy staging",
            "smoke tests",
            "deploy production",
        ];
        if heuristics::mentions_any(corpus, MIGRATION_WORDS) {
            stages.insert(4, "database migrations");
        }
        stages.into_iter().map(str::to_string).collect()
    }
}

impl PhaseTransform for ImplementationToDeployment {
    const SOURCE: Phase = Phase::Implementation;
    const TARGET: Phase = Phase::Deployment;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput {
        let i = ImplementationInsights::extract(&bundle.insights);
        let corpus = bundle.corpus();
        let environments = self.environments(ctx.project_type);
        let pipeline = self.pipeline(&corpus);

        let mut metrics = Metrics::new();
        metric(&mut metrics, "module_count", i.modules.len());
        metric(&mut metrics, "dependency_count", i.dependencies.len());
        metric(&mut metrics, "secret_count", i.env_vars.len());
        metric(&mut metrics, "failing_test_count", i.failing_tests);
        metric(&mut metrics, "environment_count", environments.len());
        if let Some(coverage) = i.coverage_percent {
            metrics.insert("coverage_percent".to_string(), coverage);
        }

        let signals = Signals::new(corpus.as_str(), &metrics, ctx.project_type);
        let monitoring = heuristics::collect_guidance(MONITORING, &signals);
        let rollback_strategy = heuristics::first_match(ROLLBACK, &signals)
            .unwrap_or_else(|| "Redeploy the previous release".to_string());

        let mut out = TransformationOutput::base(TransitionPair::new(Self::SOURCE, Self::TARGET), ctx.now);
        out.tech_stack = heuristics::select_stack(STACK_RULES, RULES.categories, &signals, &ctx.tech_stack);
        out.decisions = heuristics::collect_guidance(RULES.decisions, &signals);
        out.recommendations = heuristics::collect_guidance(RULES.recommendations, &signals);

        let mut findings = Vec::new();
        if !i.modules.is_empty() {
            findings.push(format!("{} modules ready to ship", i.modules.len()));
        }
        if let Some(coverage) = i.coverage_percent {
            findings.push(format!("Test coverage at {coverage}%"));
        }
        if i.failing_tests > 0 {
            findings.push(format!("{} failing tests outstanding", i.failing_tests));
        }
        if !i.dependencies.is_empty() {
            findings.push(format!("External dependencies: {}", i.dependencies.join(", ")));
        }
        out.insights.key_findings = findings;
        out.insights.metrics = metrics;
        out.deployment_plan = Some(DeploymentPlan {
            environments,
            pipeline,
            monitoring,
            rollback_strategy,
            required_secrets: i.env_vars,
        });
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

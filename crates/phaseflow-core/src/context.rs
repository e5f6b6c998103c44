//! Phase-targeted guidance built from a transformation.

use crate::catalog;
use crate::error::{PhaseflowError, Result};
use crate::transform::{TechStack, TransformationOutput};
use crate::types::{Impact, Phase, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUBJECT: &str = "enhanced context";

/// Upper bound on `keyInsights`.
pub const MAX_KEY_INSIGHTS: usize = 7;

const TECH_FOCUS: &str = "Technology integration";
const RISK_FOCUS: &str = "Risk mitigation";

// ---------------------------------------------------------------------------
// EnhancedContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedTask {
    pub task: String,
    pub priority: Priority,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub risk: String,
    pub impact: Impact,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStackGuidance {
    pub recommended: TechStack,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedContext {
    pub phase: Phase,
    pub focus_areas: Vec<String>,
    pub key_insights: Vec<String>,
    pub tech_stack_guidance: TechStackGuidance,
    pub prioritized_tasks: Vec<PrioritizedTask>,
    pub risk_factors: Vec<RiskFactor>,
    pub quality_gates: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl EnhancedContext {
    /// Every problem with this context; empty when valid.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.focus_areas.is_empty() {
            issues.push("focusAreas is empty".to_string());
        }
        if self.key_insights.len() > MAX_KEY_INSIGHTS {
            issues.push(format!(
                "keyInsights has {} entries (max {MAX_KEY_INSIGHTS})",
                self.key_insights.len()
            ));
        }
        if self.prioritized_tasks.is_empty() {
            issues.push("prioritizedTasks is empty".to_string());
        }
        let blank = |s: &String| s.trim().is_empty();
        if self.focus_areas.iter().any(blank) || self.key_insights.iter().any(blank) {
            issues.push("blank focus area or insight".to_string());
        }
        if self
            .prioritized_tasks
            .iter()
            .any(|t| t.task.trim().is_empty() || t.rationale.trim().is_empty())
        {
            issues.push("task with blank text or rationale".to_string());
        }
        if self
            .risk_factors
            .iter()
            .any(|r| r.risk.trim().is_empty() || r.mitigation.trim().is_empty())
        {
            issues.push("risk with blank text or mitigation".to_string());
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Per-phase guides
// ---------------------------------------------------------------------------

struct TaskTemplate {
    task: &'static str,
    priority: Priority,
    rationale: &'static str,
}

struct RiskTemplate {
    risk: &'static str,
    impact: Impact,
    mitigation: &'static str,
}

struct PhaseGuide {
    focus_areas: &'static [&'static str],
    tasks: &'static [TaskTemplate],
    risks: &'static [RiskTemplate],
    quality_gates: &'static [&'static str],
}

macro_rules! task {
    ($task:literal, $priority:ident, $why:literal) => {
        TaskTemplate {
            task: $task,
            priority: Priority::$priority,
            rationale: $why,
        }
    };
}

macro_rules! risk {
    ($risk:literal, $impact:ident, $mitigation:literal) => {
        RiskTemplate {
            risk: $risk,
            impact: Impact::$impact,
            mitigation: $mitigation,
        }
    };
}

const CONCEPT: PhaseGuide = PhaseGuide {
    focus_areas: &["Market validation", "User research"],
    tasks: &[task!("Validate the problem with target users", Critical, "Everything downstream assumes the problem is real")],
    risks: &[risk!("Building for an unvalidated market", High, "Interview at least five target users before committing")],
    quality_gates: &[],
};

const REQUIREMENTS: PhaseGuide = PhaseGuide {
    focus_areas: &["Requirement clarity", "User story coverage", "Acceptance criteria"],
    tasks: &[
        task!("Prioritize functional requirements with stakeholders", Critical, "Priorities set the scope design works to"),
        task!("Write acceptance criteria for each user story", High, "Criteria make requirements testable"),
        task!("Document non-functional requirements", Medium, "They constrain architecture choices"),
    ],
    risks: &[
        risk!("Scope creep from unprioritized requirements", High, "Agree a must-have list and a change process"),
        risk!("Ambiguous acceptance criteria", Medium, "Review stories with QA before sign-off"),
    ],
    quality_gates: &["Stakeholders approve requirement priorities"],
};

const DESIGN: PhaseGuide = PhaseGuide {
    focus_areas: &["User experience", "Information architecture", "Component reuse"],
    tasks: &[
        task!("Produce wireframes for every primary screen", Critical, "Screens anchor the component inventory"),
        task!("Map user flows end to end", High, "Flows expose missing screens and states"),
        task!("Define shared components and design tokens", Medium, "Reuse keeps the UI consistent"),
    ],
    risks: &[
        risk!("Usability issues found after build", High, "Test clickable prototypes with real users"),
        risk!("Designs that ignore technical constraints", Medium, "Review wireframes with engineering"),
    ],
    quality_gates: &["Usability review completed"],
};

const ARCHITECTURE: PhaseGuide = PhaseGuide {
    focus_areas: &["System boundaries", "Data modelling", "API contracts"],
    tasks: &[
        task!("Finalize the database schema", Critical, "Schema changes get expensive once code depends on them"),
        task!("Specify API contracts", Critical, "Frontend and backend build against the contract in parallel"),
        task!("Choose the deployment topology", High, "Topology shapes service boundaries"),
    ],
    risks: &[
        risk!("Schema changes after implementation starts", High, "Walk every user flow through the schema first"),
        risk!("Unclear service boundaries", Medium, "Record boundary decisions as ADRs"),
    ],
    quality_gates: &["Architecture review signed off"],
};

const IMPLEMENTATION: PhaseGuide = PhaseGuide {
    focus_areas: &["Code quality", "Test coverage", "Incremental delivery"],
    tasks: &[
        task!("Set up the repository, CI and shared module", Critical, "Every later milestone builds on it"),
        task!("Implement core features milestone by milestone", High, "Small increments keep main releasable"),
        task!("Write unit and integration tests alongside code", High, "Tests written later rarely get written"),
    ],
    risks: &[
        risk!("Integration problems discovered late", High, "Integrate continuously behind feature flags"),
        risk!("Falling test coverage", Medium, "Fail CI below the agreed coverage threshold"),
    ],
    quality_gates: &["All tests pass in CI"],
};

const DEPLOYMENT: PhaseGuide = PhaseGuide {
    focus_areas: &["Release safety", "Observability", "Operational readiness"],
    tasks: &[
        task!("Configure the deployment pipeline", Critical, "Releases must be repeatable"),
        task!("Set up monitoring and alerts", High, "Incidents must be seen before users report them"),
        task!("Rehearse a rollback in staging", High, "An untested rollback is not a rollback"),
    ],
    risks: &[
        risk!("Failed release without a tested rollback", High, "Rehearse rollback before the first production deploy"),
        risk!("Missing alerts hide production incidents", Medium, "Alert on error rate and latency from day one"),
    ],
    quality_gates: &["Smoke tests pass in production"],
};

const COMPLETE: PhaseGuide = PhaseGuide {
    focus_areas: &["Retrospective", "Handover"],
    tasks: &[task!("Run a project retrospective", Medium, "Lessons carry into the next project")],
    risks: &[risk!("Knowledge loss after handover", Medium, "Keep runbooks and ADRs with the code")],
    quality_gates: &[],
};

fn guide(phase: Phase) -> &'static PhaseGuide {
    match phase {
        Phase::Concept => &CONCEPT,
        Phase::Requirements => &REQUIREMENTS,
        Phase::Design => &DESIGN,
        Phase::Architecture => &ARCHITECTURE,
        Phase::Implementation => &IMPLEMENTATION,
        Phase::Deployment => &DEPLOYMENT,
        Phase::Complete => &COMPLETE,
    }
}

/// Risk raised when a metric crosses a bound. `{value}` is filled in.
struct ThresholdRisk {
    metric: &'static str,
    above: u64,
    risk: &'static str,
    impact: Impact,
    mitigation: &'static str,
}

/// Pseudo-metric carrying the size of the proposed stack.
const TECH_STACK_SIZE: &str = "tech_stack_size";

const THRESHOLD_RISKS: &[ThresholdRisk] = &[
    ThresholdRisk {
        metric: "requirement_count",
        above: 10,
        risk: "Large requirement set ({value} requirements) may delay delivery",
        impact: Impact::High,
        mitigation: "Ship must-have requirements first and defer the rest",
    },
    ThresholdRisk {
        metric: TECH_STACK_SIZE,
        above: 5,
        risk: "Broad technology stack ({value} technologies) raises integration effort",
        impact: Impact::Medium,
        mitigation: "Prototype the riskiest integrations early",
    },
    ThresholdRisk {
        metric: "component_count",
        above: 12,
        risk: "High component count ({value}) increases UI complexity",
        impact: Impact::Medium,
        mitigation: "Consolidate into a shared component library",
    },
    ThresholdRisk {
        metric: "endpoint_count",
        above: 20,
        risk: "Wide API surface ({value} endpoints)",
        impact: Impact::High,
        mitigation: "Group endpoints by resource and version the API",
    },
    ThresholdRisk {
        metric: "failing_test_count",
        above: 0,
        risk: "{value} failing tests going into release",
        impact: Impact::High,
        mitigation: "Block the release until the suite is green",
    },
];

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EnhancedContextBuilder;

impl EnhancedContextBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, transformation: &TransformationOutput, target: Phase) -> Result<EnhancedContext> {
        self.build_at(transformation, target, Utc::now())
    }

    pub fn build_at(
        &self,
        transformation: &TransformationOutput,
        target: Phase,
        now: DateTime<Utc>,
    ) -> Result<EnhancedContext> {
        let g = guide(target);
        let stack = &transformation.tech_stack;

        let risk_factors = self.risks(g, transformation);

        let mut focus_areas: Vec<String> = g.focus_areas.iter().map(|s| s.to_string()).collect();
        if !stack.is_empty() {
            focus_areas.push(TECH_FOCUS.to_string());
        }
        if !risk_factors.is_empty() {
            focus_areas.push(RISK_FOCUS.to_string());
        }

        let mut prioritized_tasks: Vec<PrioritizedTask> = g
            .tasks
            .iter()
            .map(|t| PrioritizedTask {
                task: t.task.to_string(),
                priority: t.priority,
                rationale: t.rationale.to_string(),
            })
            .collect();
        if !stack.is_empty() {
            let names: Vec<&str> = stack.values().map(String::as_str).collect();
            prioritized_tasks.push(PrioritizedTask {
                task: format!("Integrate the chosen stack: {}", names.join(", ")),
                priority: Priority::High,
                rationale: format!("{} technologies were selected for {target}", stack.len()),
            });
        }
        prioritized_tasks.sort_by_key(|t| t.priority);

        let quality_gates = catalog::required_deliverables(target)
            .iter()
            .map(|d| format!("{d} completed"))
            .chain(g.quality_gates.iter().map(|s| s.to_string()))
            .collect();

        let ctx = EnhancedContext {
            phase: target,
            focus_areas,
            key_insights: self.key_insights(transformation),
            tech_stack_guidance: TechStackGuidance {
                recommended: stack.clone(),
                notes: stack
                    .iter()
                    .map(|(category, tech)| format!("{category}: {tech}"))
                    .collect(),
            },
            prioritized_tasks,
            risk_factors,
            quality_gates,
            generated_at: now,
        };

        let issues = ctx.issues();
        if !issues.is_empty() {
            return Err(PhaseflowError::Schema {
                subject: SUBJECT,
                issues,
            });
        }
        Ok(ctx)
    }

    /// First three decisions, first three findings, then the top
    /// recommendation; capped at [`MAX_KEY_INSIGHTS`].
    fn key_insights(&self, t: &TransformationOutput) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let picks = t
            .decisions
            .iter()
            .take(3)
            .chain(t.insights.key_findings.iter().take(3))
            .chain(t.recommendations.iter().take(1));
        for item in picks {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        out.truncate(MAX_KEY_INSIGHTS);
        out
    }

    fn risks(&self, g: &PhaseGuide, t: &TransformationOutput) -> Vec<RiskFactor> {
        let mut out: Vec<RiskFactor> = g
            .risks
            .iter()
            .map(|r| RiskFactor {
                risk: r.risk.to_string(),
                impact: r.impact,
                mitigation: r.mitigation.to_string(),
            })
            .collect();
        for th in THRESHOLD_RISKS {
            let value = if th.metric == TECH_STACK_SIZE {
                Some(t.tech_stack.len() as u64)
            } else {
                t.metric(th.metric)
            };
            if let Some(value) = value.filter(|v| *v > th.above) {
                out.push(RiskFactor {
                    risk: th.risk.replace("{value}", &value.to_string()),
                    impact: th.impact,
                    mitigation: th.mitigation.to_string(),
                });
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! concept → requirements: research insights become a requirements draft.

use super::heuristics::{self, GuidanceRule, RuleSet, Signals, Trigger, STACK_RULES};
use super::{
    dedupe, lower_first, metric, seq_id, Metrics, PhaseTransform, RequirementItem,
    RequirementsDraft, TransformContext, TransformationOutput, TransitionPair, UserStory,
};
use crate::analysis::{InsightMap, PhaseAnalysisBundle};
use crate::types::{Phase, Priority, ProjectType};

const TARGET_USERS: &[&str] = &["target_users", "user_personas", "personas"];
const PAIN_POINTS: &[&str] = &["pain_points", "problems", "user_needs"];
const FEATURES: &[&str] = &["key_features", "features", "proposed_features"];
const OPPORTUNITIES: &[&str] = &["market_opportunities", "opportunities", "market_analysis"];
const COMPETITORS: &[&str] = &["competitors", "competitor_research", "competitor_names"];
const DIFFERENTIATORS: &[&str] = &["differentiators", "competitive_gaps", "value_propositions"];

/// Non-functional requirements, emitted when their trigger fires.
const NFR_RULES: &[GuidanceRule] = &[
    GuidanceRule {
        text: "Interactive requests complete within 2 seconds at p95",
        when: Trigger::ProjectIsNot(&[ProjectType::Library]),
    },
    GuidanceRule {
        text: "Real-time updates reach connected clients within 500 ms",
        when: Trigger::Mentions(&["real-time", "realtime", "live", "chat", "collaboration"]),
    },
    GuidanceRule {
        text: "Sensitive data is encrypted at rest and in transit",
        when: Trigger::Mentions(&[
            "payment", "payments", "billing", "health", "medical", "pii", "personal data", "financial",
        ]),
    },
    GuidanceRule {
        text: "Role-based access separates the {persona_count} user groups",
        when: Trigger::MetricAbove("persona_count", 2),
    },
    GuidanceRule {
        text: "Layouts remain usable on mobile viewports",
        when: Trigger::AllOf(&[
            Trigger::ProjectIs(&[ProjectType::WebApplication]),
            Trigger::Mentions(&["mobile", "on the go", "phone", "tablet"]),
        ]),
    },
    GuidanceRule {
        text: "User interface meets WCAG 2.1 AA",
        when: Trigger::ProjectIs(&[ProjectType::WebApplication, ProjectType::MobileApp]),
    },
    GuidanceRule {
        text: "Public APIs are versioned and documented",
        when: Trigger::ProjectIs(&[ProjectType::ApiService, ProjectType::Library]),
    },
];

pub const RULES: RuleSet = RuleSet {
    categories: &["frontend", "backend", "database"],
    decisions: &[
        GuidanceRule {
            text: "Scope the first release around the top {feature_count} proposed features",
            when: Trigger::MetricAbove("feature_count", 0),
        },
        GuidanceRule {
            text: "Write stories for each of the {persona_count} personas before design starts",
            when: Trigger::MetricAbove("persona_count", 1),
        },
        GuidanceRule {
            text: "Treat real-time collaboration as a core requirement",
            when: Trigger::Mentions(&["real-time", "realtime", "collaboration", "collaborative"]),
        },
        GuidanceRule {
            text: "Differentiate on the gaps found across {competitor_count} competitors",
            when: Trigger::MetricAbove("competitor_count", 0),
        },
        GuidanceRule {
            text: "Derive requirements from the {project_type} baseline",
            when: Trigger::Always,
        },
    ],
    recommendations: &[
        GuidanceRule {
            text: "Run persona interviews; no target users were identified",
            when: Trigger::MetricBelow("persona_count", 1),
        },
        GuidanceRule {
            text: "Split the {requirement_count} functional requirements into must-have and later",
            when: Trigger::MetricAbove("requirement_count", 10),
        },
        GuidanceRule {
            text: "Validate acceptance criteria with stakeholders before design",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Review compliance obligations for regulated data early",
            when: Trigger::Mentions(&["payment", "health", "medical", "pii", "gdpr", "hipaa"]),
        },
    ],
};

#[derive(Debug, Default)]
struct ConceptInsights {
    target_users: Vec<String>,
    pain_points: Vec<String>,
    features: Vec<String>,
    opportunities: Vec<String>,
    competitors: Vec<String>,
    differentiators: Vec<String>,
}

impl ConceptInsights {
    fn extract(insights: &InsightMap) -> Self {
        let get = |keys: &[&str]| dedupe(insights.first_strings(keys));
        Self {
            target_users: get(TARGET_USERS),
            pain_points: get(PAIN_POINTS),
            features: get(FEATURES),
            opportunities: get(OPPORTUNITIES),
            competitors: get(COMPETITORS),
            differentiators: get(DIFFERENTIATORS),
        }
    }
}

pub struct ConceptToRequirements;

impl ConceptToRequirements {
    fn functional(&self, c: &ConceptInsights) -> Vec<RequirementItem> {
        let from_features = c.features.iter().enumerate().map(|(i, f)| {
            let priority = if i < 3 { Priority::High } else { Priority::Medium };
            (f.clone(), priority, "features")
        });
        let from_pain = c
            .pain_points
            .iter()
            .map(|p| (format!("Resolve: {p}"), Priority::High, "pain_points"));
        let from_gaps = c
            .differentiators
            .iter()
            .map(|d| (format!("Differentiate: {d}"), Priority::Medium, "differentiators"));

        from_features
            .chain(from_pain)
            .chain(from_gaps)
            .enumerate()
            .map(|(i, (title, priority, source))| RequirementItem {
                id: seq_id("FR", i, 3),
                title,
                priority,
                source: source.to_string(),
            })
            .collect()
    }

    fn stories(&self, c: &ConceptInsights) -> Vec<UserStory> {
        c.features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let persona = c
                    .target_users
                    .get(i % c.target_users.len().max(1))
                    .cloned()
                    .unwrap_or_else(|| "user".to_string());
                let benefit = c
                    .pain_points
                    .get(i % c.pain_points.len().max(1))
                    .map(|p| format!("I no longer struggle with {}", lower_first(p)))
                    .unwrap_or_else(|| "I reach my goal faster".to_string());
                let want = lower_first(feature);
                UserStory {
                    id: seq_id("US", i, 3),
                    acceptance_criteria: vec![
                        format!("A {persona} can {want} without assistance"),
                        "Failures are reported with an actionable message".to_string(),
                    ],
                    persona,
                    want,
                    benefit,
                }
            })
            .collect()
    }

    fn findings(&self, c: &ConceptInsights) -> Vec<String> {
        let mut out = Vec::new();
        if !c.target_users.is_empty() {
            out.push(format!(
                "{} target user groups: {}",
                c.target_users.len(),
                c.target_users.join(", ")
            ));
        }
        if !c.pain_points.is_empty() {
            out.push(format!("{} pain points identified", c.pain_points.len()));
        }
        if let Some(top) = c.opportunities.first() {
            out.push(format!("Top market opportunity: {top}"));
        }
        if !c.competitors.is_empty() {
            out.push(format!("{} competitors analysed", c.competitors.len()));
        }
        out
    }
}

impl PhaseTransform for ConceptToRequirements {
    const SOURCE: Phase = Phase::Concept;
    const TARGET: Phase = Phase::Requirements;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput {
        let c = ConceptInsights::extract(&bundle.insights);
        let functional = self.functional(&c);
        let user_stories = self.stories(&c);

        let mut metrics = Metrics::new();
        metric(&mut metrics, "persona_count", c.target_users.len());
        metric(&mut metrics, "feature_count", c.features.len());
        metric(&mut metrics, "competitor_count", c.competitors.len());
        metric(&mut metrics, "requirement_count", functional.len());
        metric(&mut metrics, "user_story_count", user_stories.len());

        let signals = Signals::new(bundle.corpus(), &metrics, ctx.project_type);
        let non_functional: Vec<RequirementItem> = heuristics::collect_guidance(NFR_RULES, &signals)
            .into_iter()
            .enumerate()
            .map(|(i, title)| RequirementItem {
                id: seq_id("NFR", i, 3),
                title,
                priority: Priority::High,
                source: "heuristics".to_string(),
            })
            .collect();

        let mut out = TransformationOutput::base(TransitionPair::new(Self::SOURCE, Self::TARGET), ctx.now);
        out.tech_stack = heuristics::select_stack(STACK_RULES, RULES.categories, &signals, &ctx.tech_stack);
        out.decisions = heuristics::collect_guidance(RULES.decisions, &signals);
        out.recommendations = heuristics::collect_guidance(RULES.recommendations, &signals);
        out.insights.key_findings = self.findings(&c);
        metric(&mut metrics, "nfr_count", non_functional.len());
        out.insights.metrics = metrics;
        out.requirements = Some(RequirementsDraft {
            functional,
            non_functional,
            user_stories,
        });
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

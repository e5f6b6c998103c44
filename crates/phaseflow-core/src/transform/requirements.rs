//! requirements → design: screens, flows and components from requirements
//! and user stories.

use super::heuristics::{self, GuidanceRule, RuleSet, Signals, Trigger, STACK_RULES};
use super::{
    capitalise, dedupe, lower_first, metric, seq_id, ComponentKind, ComponentSpec, Metrics, PhaseTransform,
    TransformContext, TransformationOutput, TransitionPair, UserFlow, Wireframe,
};
use crate::analysis::{InsightMap, PhaseAnalysisBundle};
use crate::types::{Phase, ProjectType};
use regex::Regex;
use std::sync::OnceLock;

const FUNCTIONAL: &[&str] = &["functional_requirements", "requirements", "features"];
const STORIES: &[&str] = &["user_stories", "stories"];
const NON_FUNCTIONAL: &[&str] = &["non_functional_requirements", "quality_attributes", "constraints"];
const PERSONAS: &[&str] = &["personas", "user_roles", "actors", "target_users"];

/// Screen a requirement lands on, by keyword. First match wins.
const SCREENS: &[(&str, &[&str])] = &[
    ("Login", &["login", "log in", "sign in", "authenticate", "authentication", "password"]),
    ("Sign Up", &["register", "registration", "sign up", "signup", "onboarding"]),
    ("Checkout", &["checkout", "payment", "payments", "cart", "purchase", "pay"]),
    ("Search", &["search", "filter", "find", "browse"]),
    ("Messages", &["message", "messages", "chat", "inbox"]),
    ("Notifications", &["notification", "notifications", "alert", "alerts"]),
    ("Reports", &["report", "reports", "analytics", "export", "chart"]),
    ("Profile", &["profile", "account", "avatar"]),
    ("Settings", &["settings", "preferences", "configure"]),
    ("Admin", &["admin", "moderate", "manage users", "permissions"]),
    ("Dashboard", &["dashboard", "overview", "summary", "track"]),
];

const HOME: &str = "Home";

/// Shared UI components, by keyword over all requirement text.
const SHARED: &[(&str, &str, &[&str])] = &[
    ("FormField", "Labelled input with inline validation", &["enter", "submit", "create", "edit", "register", "form"]),
    ("DataTable", "Sortable, paginated list of records", &["list", "browse", "view all", "history", "search"]),
    ("FileUploader", "Drag-and-drop file upload with progress", &["upload", "attach", "attachment", "import"]),
    ("Toast", "Transient status and error messages", &["notify", "notification", "notifications", "alert"]),
    ("Chart", "Time-series and category charts", &["chart", "report", "reports", "analytics", "graph"]),
    ("PresenceIndicator", "Shows who else is viewing or editing", &["real-time", "realtime", "live", "collaboration", "collaborative"]),
];

const MAX_ELEMENTS: usize = 6;

pub const RULES: RuleSet = RuleSet {
    categories: &["frontend", "realtime", "auth", "mobile"],
    decisions: &[
        GuidanceRule {
            text: "Design {screen_count} screens covering {requirement_count} requirements",
            when: Trigger::MetricAbove("screen_count", 0),
        },
        GuidanceRule {
            text: "Skip wireframes: a {project_type} has no user interface",
            when: Trigger::ProjectIsNot(&[ProjectType::WebApplication, ProjectType::MobileApp]),
        },
        GuidanceRule {
            text: "Build a shared component library before page work",
            when: Trigger::MetricAbove("component_count", 6),
        },
        GuidanceRule {
            text: "Design presence and conflict states for live editing",
            when: Trigger::Mentions(&["real-time", "realtime", "live", "collaboration", "collaborative"]),
        },
        GuidanceRule {
            text: "Mobile-first layouts",
            when: Trigger::ProjectIs(&[ProjectType::MobileApp]),
        },
    ],
    recommendations: &[
        GuidanceRule {
            text: "Prototype the {flow_count} primary user flows and test with real users",
            when: Trigger::MetricAbove("flow_count", 0),
        },
        GuidanceRule {
            text: "Write user stories; flows were inferred from screens only",
            when: Trigger::MetricBelow("user_story_count", 1),
        },
        GuidanceRule {
            text: "Define a design token set (colour, spacing, type) up front",
            when: Trigger::ProjectIs(&[ProjectType::WebApplication, ProjectType::MobileApp]),
        },
        GuidanceRule {
            text: "Document empty, loading and error states for every screen",
            when: Trigger::Always,
        },
    ],
};

fn story_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^as an? (.+?),\s*i want(?: to)? (.+?)(?:,?\s*so that (.+?))?\.?$")
            .expect("valid regex")
    })
}

/// `(persona, want, benefit)` from "As a X, I want Y, so that Z".
fn parse_story(story: &str) -> Option<(String, String, Option<String>)> {
    let caps = story_pattern().captures(story.trim())?;
    Some((
        caps[1].trim().to_string(),
        caps[2].trim().to_string(),
        caps.get(3).map(|m| m.as_str().trim().to_string()),
    ))
}

fn screen_for(text: &str) -> &'static str {
    SCREENS
        .iter()
        .find(|(_, words)| heuristics::mentions_any(text, words))
        .map(|(screen, _)| *screen)
        .unwrap_or(HOME)
}

fn component_name(screen: &str) -> String {
    let mut name: String = screen.split_whitespace().collect();
    name.push_str("Page");
    name
}

#[derive(Debug, Default)]
struct RequirementsInsights {
    functional: Vec<String>,
    stories: Vec<String>,
    non_functional: Vec<String>,
    personas: Vec<String>,
}

impl RequirementsInsights {
    fn extract(insights: &InsightMap) -> Self {
        let get = |keys: &[&str]| dedupe(insights.first_strings(keys));
        Self {
            functional: get(FUNCTIONAL),
            stories: get(STORIES),
            non_functional: get(NON_FUNCTIONAL),
            personas: get(PERSONAS),
        }
    }
}

pub struct RequirementsToDesign;

impl RequirementsToDesign {
    /// Requirements grouped by screen, screens in first-seen order.
    fn wireframes(&self, r: &RequirementsInsights) -> Vec<Wireframe> {
        let mut screens: Vec<(&'static str, Vec<String>)> = Vec::new();
        for requirement in &r.functional {
            let screen = screen_for(requirement);
            match screens.iter_mut().find(|(s, _)| *s == screen) {
                Some((_, items)) => items.push(requirement.clone()),
                None => screens.push((screen, vec![requirement.clone()])),
            }
        }
        screens
            .into_iter()
            .enumerate()
            .map(|(i, (screen, items))| Wireframe {
                id: seq_id("WF", i, 2),
                screen: screen.to_string(),
                purpose: format!(
                    "Supports: {}",
                    items.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
                ),
                elements: items.into_iter().take(MAX_ELEMENTS).collect(),
            })
            .collect()
    }

    fn flows(&self, r: &RequirementsInsights, wireframes: &[Wireframe]) -> Vec<UserFlow> {
        let default_persona = r.personas.first().cloned().unwrap_or_else(|| "user".to_string());

        if r.stories.is_empty() {
            return wireframes
                .iter()
                .filter(|w| w.screen != HOME)
                .enumerate()
                .map(|(i, w)| UserFlow {
                    id: seq_id("UF", i, 2),
                    name: format!("Reach {}", w.screen),
                    persona: default_persona.clone(),
                    steps: vec![
                        format!("Open {HOME}"),
                        format!("Navigate to {}", w.screen),
                        format!("Complete: {}", w.elements.first().cloned().unwrap_or_default()),
                    ],
                })
                .collect();
        }

        r.stories
            .iter()
            .enumerate()
            .map(|(i, story)| {
                let (persona, want, benefit) = parse_story(story)
                    .unwrap_or_else(|| (default_persona.clone(), lower_first(story), None));
                let screen = screen_for(&want);
                let mut steps = vec![format!("Open {screen}"), capitalise(&want)];
                if let Some(benefit) = benefit {
                    steps.push(format!("Confirm outcome: {benefit}"));
                } else {
                    steps.push("Confirm outcome".to_string());
                }
                UserFlow {
                    id: seq_id("UF", i, 2),
                    name: capitalise(&want),
                    persona,
                    steps,
                }
            })
            .collect()
    }

    fn components(&self, r: &RequirementsInsights, wireframes: &[Wireframe]) -> Vec<ComponentSpec> {
        if wireframes.is_empty() {
            return Vec::new();
        }
        let mut out = vec![ComponentSpec {
            name: "AppShell".to_string(),
            kind: ComponentKind::Layout,
            responsibility: "Navigation, layout and session state".to_string(),
            used_by: wireframes.iter().map(|w| w.screen.clone()).collect(),
        }];

        for w in wireframes {
            out.push(ComponentSpec {
                name: component_name(&w.screen),
                kind: ComponentKind::Page,
                responsibility: w.purpose.clone(),
                used_by: vec![w.screen.clone()],
            });
        }

        let all_requirements = r.functional.join("\n");
        for (name, responsibility, words) in SHARED {
            let used_by: Vec<String> = wireframes
                .iter()
                .filter(|w| heuristics::mentions_any(&w.elements.join("\n"), words))
                .map(|w| w.screen.clone())
                .collect();
            let mentioned_anywhere = heuristics::mentions_any(&all_requirements, words);
            if !used_by.is_empty() || mentioned_anywhere {
                out.push(ComponentSpec {
                    name: name.to_string(),
                    kind: ComponentKind::Shared,
                    responsibility: responsibility.to_string(),
                    used_by,
                });
            }
        }
        out
    }
}

impl PhaseTransform for RequirementsToDesign {
    const SOURCE: Phase = Phase::Requirements;
    const TARGET: Phase = Phase::Design;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput {
        let r = RequirementsInsights::extract(&bundle.insights);
        let wireframes = if ctx.project_type.has_ui() {
            self.wireframes(&r)
        } else {
            Vec::new()
        };
        let flows = self.flows(&r, &wireframes);
        let components = self.components(&r, &wireframes);

        let mut metrics = Metrics::new();
        metric(&mut metrics, "requirement_count", r.functional.len());
        metric(&mut metrics, "user_story_count", r.stories.len());
        metric(&mut metrics, "nfr_count", r.non_functional.len());
        metric(&mut metrics, "screen_count", wireframes.len());
        metric(&mut metrics, "flow_count", flows.len());
        metric(&mut metrics, "component_count", components.len());

        let signals = Signals::new(bundle.corpus(), &metrics, ctx.project_type);
        let mut out = TransformationOutput::base(TransitionPair::new(Self::SOURCE, Self::TARGET), ctx.now);
        out.tech_stack = heuristics::select_stack(STACK_RULES, RULES.categories, &signals, &ctx.tech_stack);
        out.decisions = heuristics::collect_guidance(RULES.decisions, &signals);
        out.recommendations = heuristics::collect_guidance(RULES.recommendations, &signals);

        let mut findings = Vec::new();
        if !r.functional.is_empty() {
            findings.push(format!("{} functional requirements to design for", r.functional.len()));
        }
        if !wireframes.is_empty() {
            let names: Vec<&str> = wireframes.iter().map(|w| w.screen.as_str()).collect();
            findings.push(format!("Screens: {}", names.join(", ")));
        }
        if !r.non_functional.is_empty() {
            findings.push(format!("{} non-functional constraints apply", r.non_functional.len()));
        }
        out.insights.key_findings = findings;
        out.insights.metrics = metrics;
        out.wireframes = Some(wireframes);
        out.user_flows = Some(flows);
        out.component_specs = Some(components);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

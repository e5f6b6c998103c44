//! Declarative heuristic rules shared by every transformer.
//!
//! Rules are plain data: a [`Trigger`] plus what to emit when it fires. One
//! evaluator walks the tables, so the same input always yields the same
//! stack, decisions and recommendations.

use crate::types::ProjectType;
use std::collections::BTreeMap;

pub type TechStack = BTreeMap<String, String>;
pub type Metrics = BTreeMap<String, u64>;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    Always,
    /// Any keyword appears as a whole word or phrase in the bundle text.
    Mentions(&'static [&'static str]),
    /// Metric is present and strictly greater than the bound.
    MetricAbove(&'static str, u64),
    /// Metric is present and strictly below the bound.
    MetricBelow(&'static str, u64),
    ProjectIs(&'static [ProjectType]),
    ProjectIsNot(&'static [ProjectType]),
    AllOf(&'static [Trigger]),
}

// ---------------------------------------------------------------------------
// Rule shapes
// ---------------------------------------------------------------------------

/// Picks `choice` for `category` when `when` fires. The first matching rule
/// per category wins.
#[derive(Debug, Clone, Copy)]
pub struct StackRule {
    pub category: &'static str,
    pub choice: &'static str,
    pub when: Trigger,
}

/// Emits `text` when `when` fires. `{metric}` and `{project_type}`
/// placeholders are filled from the signals.
#[derive(Debug, Clone, Copy)]
pub struct GuidanceRule {
    pub text: &'static str,
    pub when: Trigger,
}

/// Per-transformer rule tables.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    /// Stack categories this transformer proposes.
    pub categories: &'static [&'static str],
    pub decisions: &'static [GuidanceRule],
    pub recommendations: &'static [GuidanceRule],
}

macro_rules! stack {
    ($category:literal => $choice:literal, $when:expr) => {
        StackRule {
            category: $category,
            choice: $choice,
            when: $when,
        }
    };
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Everything a trigger may look at.
#[derive(Debug, Clone)]
pub struct Signals<'a> {
    corpus: String,
    metrics: &'a Metrics,
    project_type: ProjectType,
}

impl<'a> Signals<'a> {
    pub fn new(corpus: impl Into<String>, metrics: &'a Metrics, project_type: ProjectType) -> Self {
        Self {
            corpus: corpus.into().to_lowercase(),
            metrics,
            project_type,
        }
    }

    pub fn mentions(&self, keyword: &str) -> bool {
        contains_word(&self.corpus, keyword)
    }

    pub fn metric(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).copied()
    }

    pub fn project_type(&self) -> ProjectType {
        self.project_type
    }

    pub fn fires(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::Always => true,
            Trigger::Mentions(words) => words.iter().any(|w| self.mentions(w)),
            Trigger::MetricAbove(name, bound) => self.metric(name).is_some_and(|v| v > *bound),
            Trigger::MetricBelow(name, bound) => self.metric(name).is_some_and(|v| v < *bound),
            Trigger::ProjectIs(types) => types.contains(&self.project_type),
            Trigger::ProjectIsNot(types) => !types.contains(&self.project_type),
            Trigger::AllOf(all) => all.iter().all(|t| self.fires(t)),
        }
    }

    /// Fill `{name}` placeholders from metrics and the project type.
    pub fn render(&self, template: &str) -> String {
        let mut out = template.replace("{project_type}", self.project_type.as_str());
        for (name, value) in self.metrics {
            out = out.replace(&format!("{{{name}}}"), &value.to_string());
        }
        out
    }
}

/// Case-insensitive whole-word (or whole-phrase) match. A hit needs a
/// non-word character or the text edge on both sides.
pub fn contains_word(text: &str, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    text.match_indices(keyword.as_str()).any(|(start, hit)| {
        let before = text[..start].chars().next_back();
        let after = text[start + hit.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_word(text, k))
}

// ---------------------------------------------------------------------------
// Shared stack table
// ---------------------------------------------------------------------------

const REALTIME_WORDS: &[&str] = &[
    "real-time",
    "realtime",
    "live updates",
    "live",
    "chat",
    "collaboration",
    "collaborative",
    "multiplayer",
    "websocket",
    "websockets",
];

const ML_WORDS: &[&str] = &[
    "machine learning",
    "ml model",
    "data science",
    "recommendation engine",
    "recommendations",
    "ai",
    "prediction",
];

const NO_SERVER: &[ProjectType] = &[ProjectType::CliTool, ProjectType::Library];

pub const STACK_RULES: &[StackRule] = &[
    // frontend
    stack!("frontend" => "React Native", Trigger::ProjectIs(&[ProjectType::MobileApp])),
    stack!("frontend" => "React Native", Trigger::Mentions(&["mobile app", "ios", "android"])),
    stack!("frontend" => "Next.js", Trigger::AllOf(&[
        Trigger::ProjectIs(&[ProjectType::WebApplication]),
        Trigger::Mentions(&["seo", "server-side rendering", "ssr", "marketing site"]),
    ])),
    stack!("frontend" => "React", Trigger::ProjectIs(&[ProjectType::WebApplication])),
    stack!("frontend" => "React", Trigger::Mentions(&["dashboard", "admin panel", "web ui"])),
    // backend
    stack!("backend" => "Node.js (Socket.IO)", Trigger::Mentions(REALTIME_WORDS)),
    stack!("backend" => "Python (FastAPI)", Trigger::Mentions(ML_WORDS)),
    stack!("backend" => "Python", Trigger::ProjectIs(&[ProjectType::DataPipeline])),
    stack!("backend" => "Go", Trigger::Mentions(&["high throughput", "low latency", "performance-critical"])),
    stack!("backend" => "Node.js (Express)", Trigger::ProjectIsNot(NO_SERVER)),
    // database
    stack!("database" => "Neo4j", Trigger::Mentions(&["graph", "social network", "connections between"])),
    stack!("database" => "TimescaleDB", Trigger::Mentions(&["time series", "time-series", "telemetry", "iot", "sensor"])),
    stack!("database" => "MongoDB", Trigger::Mentions(&["unstructured", "flexible schema", "document store"])),
    stack!("database" => "SQLite", Trigger::ProjectIs(&[ProjectType::CliTool])),
    stack!("database" => "PostgreSQL", Trigger::ProjectIsNot(&[ProjectType::Library])),
    // realtime
    stack!("realtime" => "WebSockets", Trigger::Mentions(REALTIME_WORDS)),
    // cache
    stack!("cache" => "Redis", Trigger::Mentions(&["high traffic", "scalability", "scalable", "caching", "cache", "sessions", "leaderboard"])),
    stack!("cache" => "Redis", Trigger::MetricAbove("endpoint_count", 15)),
    // search
    stack!("search" => "Elasticsearch", Trigger::Mentions(&["full-text", "full text search", "search", "catalog"])),
    // auth
    stack!("auth" => "SAML SSO (Keycloak)", Trigger::Mentions(&["enterprise", "sso", "saml"])),
    stack!("auth" => "OAuth 2.0 / OIDC", Trigger::Mentions(&["login", "sign in", "sign up", "signup", "account", "accounts", "authentication", "register"])),
    // messaging
    stack!("messaging" => "Kafka", Trigger::MetricAbove("service_count", 3)),
    stack!("messaging" => "RabbitMQ", Trigger::Mentions(&["event-driven", "queue", "background jobs", "asynchronous processing", "notifications", "notification"])),
    // hosting
    stack!("hosting" => "Kubernetes", Trigger::Mentions(&["kubernetes", "microservices", "microservice"])),
    stack!("hosting" => "Kubernetes", Trigger::MetricAbove("service_count", 3)),
    stack!("hosting" => "Expo EAS + App Stores", Trigger::ProjectIs(&[ProjectType::MobileApp])),
    stack!("hosting" => "Package registry", Trigger::ProjectIs(NO_SERVER)),
    stack!("hosting" => "Docker on AWS ECS", Trigger::Always),
    // ci_cd
    stack!("ci_cd" => "GitHub Actions", Trigger::Always),
    // monitoring
    stack!("monitoring" => "Prometheus + Grafana", Trigger::Mentions(&["kubernetes", "microservices", "microservice"])),
    stack!("monitoring" => "Prometheus + Grafana", Trigger::MetricAbove("service_count", 3)),
    stack!("monitoring" => "Sentry + CloudWatch", Trigger::ProjectIsNot(NO_SERVER)),
    // testing
    stack!("testing" => "pytest", Trigger::Mentions(ML_WORDS)),
    stack!("testing" => "Detox + Jest", Trigger::ProjectIs(&[ProjectType::MobileApp])),
    stack!("testing" => "Playwright + Jest", Trigger::ProjectIs(&[ProjectType::WebApplication])),
    stack!("testing" => "Jest + Supertest", Trigger::Always),
    // mobile
    stack!("mobile" => "React Native (Expo)", Trigger::ProjectIs(&[ProjectType::MobileApp])),
];

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Choose one technology per category in `categories`, then overlay the
/// configured defaults (configured choices always win).
pub fn select_stack(
    rules: &[StackRule],
    categories: &[&str],
    signals: &Signals<'_>,
    configured: &TechStack,
) -> TechStack {
    let mut stack = TechStack::new();
    for rule in rules {
        if !categories.contains(&rule.category) || stack.contains_key(rule.category) {
            continue;
        }
        if signals.fires(&rule.when) {
            stack.insert(rule.category.to_string(), rule.choice.to_string());
        }
    }
    for (category, technology) in configured {
        if !technology.trim().is_empty() {
            stack.insert(category.clone(), technology.clone());
        }
    }
    stack
}

/// Rendered text of every rule that fires, in table order, without repeats.
pub fn collect_guidance(rules: &[GuidanceRule], signals: &Signals<'_>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rule in rules {
        if signals.fires(&rule.when) {
            let text = signals.render(rule.text);
            if !out.contains(&text) {
                out.push(text);
            }
        }
    }
    out
}

/// Text of the first rule that fires.
pub fn first_match(rules: &[GuidanceRule], signals: &Signals<'_>) -> Option<String> {
    rules
        .iter()
        .find(|r| signals.fires(&r.when))
        .map(|r| signals.render(r.text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn signals<'a>(text: &str, metrics: &'a Metrics, pt: ProjectType) -> Signals<'a> {
        Signals::new(text, metrics, pt)
    }

    #[test]
    fn realtime_language_changes_backend() {
        let m = Metrics::new();
        let crud = signals("manage invoices and customers", &m, ProjectType::WebApplication);
        let live = signals("live collaboration on invoices", &m, ProjectType::WebApplication);
        let none = TechStack::new();

        let a = select_stack(STACK_RULES, &["backend", "realtime"], &crud, &none);
        let b = select_stack(STACK_RULES, &["backend", "realtime"], &live, &none);
        assert_eq!(a["backend"], "Node.js (Express)");
        assert!(!a.contains_key("realtime"));
        assert_eq!(b["backend"], "Node.js (Socket.IO)");
        assert_eq!(b["realtime"], "WebSockets");
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let m = Metrics::new();
        let s = signals("we maintain a detailed plan", &m, ProjectType::ApiService);
        // "ai" appears inside "maintain" and "detailed" but never as a word.
        assert!(!s.mentions("ai"));
        assert!(s.mentions("plan"));
        let s = signals("An AI assistant", &m, ProjectType::ApiService);
        assert!(s.mentions("ai"));
        // a later whole-word hit counts even after an embedded one
        assert!(contains_word("maintain the AI queue", "ai"));
        assert!(contains_word("Real-Time dashboards", "real-time"));
        assert!(contains_word("uses live updates.", "live updates"));
        assert!(!contains_word("delivery", "live"));
        assert!(!contains_word("anything", ""));
    }

    #[test]
    fn configured_stack_wins_over_rules() {
        let m = Metrics::new();
        let s = signals("", &m, ProjectType::WebApplication);
        let mut configured = TechStack::new();
        configured.insert("database".to_string(), "MySQL".to_string());
        configured.insert("language".to_string(), "TypeScript".to_string());
        let stack = select_stack(STACK_RULES, &["database", "frontend"], &s, &configured);
        assert_eq!(stack["database"], "MySQL");
        assert_eq!(stack["frontend"], "React");
        assert_eq!(stack["language"], "TypeScript");
    }

    #[test]
    fn selection_is_deterministic() {
        let mut m = Metrics::new();
        m.insert("service_count".to_string(), 5);
        let s = signals("search the catalog in real-time", &m, ProjectType::WebApplication);
        let cats = ["frontend", "backend", "database", "search", "messaging", "hosting"];
        let a = select_stack(STACK_RULES, &cats, &s, &TechStack::new());
        let b = select_stack(STACK_RULES, &cats, &s, &TechStack::new());
        assert_eq!(a, b);
        assert_eq!(a["messaging"], "Kafka");
        assert_eq!(a["hosting"], "Kubernetes");
        assert_eq!(a["search"], "Elasticsearch");
    }

    #[test]
    fn metric_triggers_require_presence() {
        let mut m = Metrics::new();
        m.insert("requirement_count".to_string(), 12);
        let s = signals("", &m, ProjectType::CliTool);
        assert!(s.fires(&Trigger::MetricAbove("requirement_count", 10)));
        assert!(!s.fires(&Trigger::MetricAbove("requirement_count", 12)));
        assert!(!s.fires(&Trigger::MetricBelow("coverage_percent", 70)));
        assert!(s.fires(&Trigger::ProjectIsNot(&[ProjectType::Library])));
    }

    #[test]
    fn guidance_renders_placeholders_and_dedupes() {
        const RULES: &[GuidanceRule] = &[
            GuidanceRule {
                text: "Scope {requirement_count} requirements for {project_type}",
                when: Trigger::Always,
            },
            GuidanceRule {
                text: "Scope {requirement_count} requirements for {project_type}",
                when: Trigger::MetricAbove("requirement_count", 1),
            },
            GuidanceRule {
                text: "never",
                when: Trigger::Mentions(&["blockchain"]),
            },
        ];
        let mut m = Metrics::new();
        m.insert("requirement_count".to_string(), 4);
        let s = signals("", &m, ProjectType::ApiService);
        assert_eq!(
            collect_guidance(RULES, &s),
            vec!["Scope 4 requirements for api_service"]
        );
        assert_eq!(
            first_match(RULES, &s).as_deref(),
            Some("Scope 4 requirements for api_service")
        );
    }
}

//! design → architecture: entities, tables, endpoints and services from the
//! component inventory.

use super::heuristics::{self, GuidanceRule, RuleSet, Signals, Trigger, STACK_RULES};
use super::{
    capitalise, dedupe, metric, ApiEndpoint, ColumnSpec, Metrics, PhaseTransform, SystemDesign,
    TableSpec, TransformContext, TransformationOutput, TransitionPair,
};
use crate::analysis::{InsightMap, PhaseAnalysisBundle};
use crate::types::Phase;

const COMPONENTS: &[&str] = &["component_specifications", "components", "component_specs"];
const SCREENS: &[&str] = &["wireframes", "screens"];
const FLOWS: &[&str] = &["user_flows", "flows"];
const ENTITIES: &[&str] = &["data_entities", "entities", "domain_objects"];

/// Suffixes stripped from component names to find the domain noun.
const UI_SUFFIXES: &[&str] = &[
    "Page", "Screen", "View", "List", "Form", "Card", "Table", "Details", "Detail", "Editor",
    "Manager", "Component", "Modal", "Panel", "Widget",
];

/// Names that describe UI chrome, not data.
const UI_ONLY: &[&str] = &[
    "App", "AppShell", "Shell", "Layout", "Navigation", "Nav", "Header", "Footer", "Sidebar",
    "Toast", "Button", "FormField", "DataTable", "Chart", "FileUploader", "PresenceIndicator",
    "Home", "Dashboard", "Login", "SignUp", "Search", "Settings", "Checkout", "Reports",
    "Notifications", "Messages", "Admin",
];

const USER_WORDS: &[&str] = &[
    "login", "sign in", "sign up", "account", "accounts", "profile", "user", "users",
];

const STYLE_RULES: &[GuidanceRule] = &[
    GuidanceRule {
        text: "microservices",
        when: Trigger::Mentions(&["microservice", "microservices"]),
    },
    GuidanceRule {
        text: "microservices",
        when: Trigger::MetricAbove("component_count", 12),
    },
    GuidanceRule {
        text: "event-driven modular monolith",
        when: Trigger::Mentions(&["event-driven", "queue", "background jobs", "notifications"]),
    },
    GuidanceRule {
        text: "modular monolith",
        when: Trigger::Always,
    },
];

pub const RULES: RuleSet = RuleSet {
    categories: &[
        "frontend", "backend", "database", "cache", "realtime", "search", "auth", "messaging",
    ],
    decisions: &[
        GuidanceRule {
            text: "Model {entity_count} core entities in a relational schema",
            when: Trigger::MetricAbove("entity_count", 0),
        },
        GuidanceRule {
            text: "Expose {endpoint_count} REST endpoints behind a versioned /api prefix",
            when: Trigger::MetricAbove("endpoint_count", 0),
        },
        GuidanceRule {
            text: "Split into {service_count} independently deployable services",
            when: Trigger::MetricAbove("service_count", 2),
        },
        GuidanceRule {
            text: "Push updates over a WebSocket channel",
            when: Trigger::Mentions(&["real-time", "realtime", "live", "collaboration", "chat"]),
        },
    ],
    recommendations: &[
        GuidanceRule {
            text: "Write an OpenAPI document for the {endpoint_count} endpoints before coding",
            when: Trigger::MetricAbove("endpoint_count", 0),
        },
        GuidanceRule {
            text: "Consider an API gateway and GraphQL layer; {endpoint_count} endpoints is a wide surface",
            when: Trigger::MetricAbove("endpoint_count", 20),
        },
        GuidanceRule {
            text: "Record architecture decisions (ADRs) as they are made",
            when: Trigger::Always,
        },
        GuidanceRule {
            text: "Add indexes for every foreign key",
            when: Trigger::MetricAbove("table_count", 1),
        },
    ],
};

/// `OrderHistoryList` → `OrderHistory`; `None` for pure UI chrome.
fn entity_from_component(component: &str) -> Option<String> {
    let name: String = component
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(capitalise)
        .collect();
    let mut base = name.as_str();
    for suffix in UI_SUFFIXES {
        if let Some(stripped) = base.strip_suffix(suffix) {
            if !stripped.is_empty() {
                base = stripped;
                break;
            }
        }
    }
    if base.is_empty()
        || UI_SUFFIXES.contains(&base)
        || UI_ONLY.contains(&base)
        || UI_ONLY.contains(&name.as_str())
    {
        return None;
    }
    Some(singular(base))
}

fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{stem}y")
    } else if word.ends_with("ss") || !word.ends_with('s') {
        word.to_string()
    } else {
        word[..word.len() - 1].to_string()
    }
}

fn plural(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        format!("{stem}ies")
    } else if word.ends_with('s') {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// `OrderItem` → `order_item`.
fn snake(word: &str) -> String {
    let mut out = String::new();
    for (i, c) in word.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn column(name: &str, data_type: &str, constraints: &[&str]) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        data_type: data_type.to_string(),
        constraints: constraints.iter().map(|c| c.to_string()).collect(),
    }
}

fn table_for(entity: &str, has_users: bool) -> TableSpec {
    let name = plural(&snake(entity));
    let mut columns = vec![column("id", "uuid", &["primary key"])];
    if entity == "User" {
        columns.push(column("email", "text", &["not null", "unique"]));
        columns.push(column("password_hash", "text", &["not null"]));
        columns.push(column("display_name", "text", &[]));
    } else {
        columns.push(column("name", "text", &["not null"]));
        if has_users {
            columns.push(column("owner_id", "uuid", &["not null", "references users(id)"]));
        }
    }
    columns.push(column("created_at", "timestamptz", &["not null", "default now()"]));
    columns.push(column("updated_at", "timestamptz", &["not null", "default now()"]));
    TableSpec { name, columns }
}

fn endpoints_for(table: &TableSpec) -> Vec<ApiEndpoint> {
    let base = format!("/api/{}", table.name.replace('_', "-"));
    let label = table.name.replace('_', " ");
    let ep = |method: &str, path: String, description: String| ApiEndpoint {
        method: method.to_string(),
        path,
        description,
    };
    vec![
        ep("GET", base.clone(), format!("List {label}")),
        ep("POST", base.clone(), format!("Create one of {label}")),
        ep("GET", format!("{base}/{{id}}"), format!("Fetch one of {label}")),
        ep("PUT", format!("{base}/{{id}}"), format!("Update one of {label}")),
        ep("DELETE", format!("{base}/{{id}}"), format!("Delete one of {label}")),
    ]
}

#[derive(Debug, Default)]
struct DesignInsights {
    components: Vec<String>,
    screens: Vec<String>,
    flows: Vec<String>,
    entities: Vec<String>,
}

impl DesignInsights {
    fn extract(insights: &InsightMap) -> Self {
        let get = |keys: &[&str]| dedupe(insights.first_strings(keys));
        Self {
            components: get(COMPONENTS),
            screens: get(SCREENS),
            flows: get(FLOWS),
            entities: get(ENTITIES),
        }
    }
}

pub struct DesignToArchitecture;

impl DesignToArchitecture {
    fn entities(&self, d: &DesignInsights, corpus: &str) -> Vec<String> {
        let mut entities: Vec<String> = d.entities.iter().map(|e| singular(&capitalise(e.trim()))).collect();
        entities.extend(d.components.iter().filter_map(|c| entity_from_component(c)));
        if heuristics::mentions_any(corpus, USER_WORDS) {
            entities.insert(0, "User".to_string());
        }
        dedupe(entities)
    }

    fn services(&self, style: &str, tables: &[TableSpec], stack_has_messaging: bool) -> Vec<String> {
        if style == "microservices" {
            let mut services = vec!["api-gateway".to_string()];
            services.extend(tables.iter().map(|t| format!("{}-service", t.name.replace('_', "-"))));
            return services;
        }
        let mut services = vec!["api".to_string()];
        if stack_has_messaging || style.starts_with("event-driven") {
            services.push("worker".to_string());
        }
        services
    }
}

impl PhaseTransform for DesignToArchitecture {
    const SOURCE: Phase = Phase::Design;
    const TARGET: Phase = Phase::Architecture;

    fn derive(&self, bundle: &PhaseAnalysisBundle, ctx: &TransformContext) -> TransformationOutput {
        let d = DesignInsights::extract(&bundle.insights);
        let corpus = bundle.corpus();

        let entities = self.entities(&d, &corpus);
        let has_users = entities.iter().any(|e| e == "User");
        let tables: Vec<TableSpec> = entities.iter().map(|e| table_for(e, has_users)).collect();

        let mut endpoints: Vec<ApiEndpoint> = tables.iter().flat_map(endpoints_for).collect();
        if has_users {
            endpoints.push(ApiEndpoint {
                method: "POST".to_string(),
                path: "/api/auth/login".to_string(),
                description: "Exchange credentials for a session token".to_string(),
            });
        }

        let mut metrics = Metrics::new();
        metric(&mut metrics, "component_count", d.components.len());
        metric(&mut metrics, "screen_count", d.screens.len());
        metric(&mut metrics, "flow_count", d.flows.len());
        metric(&mut metrics, "entity_count", entities.len());
        metric(&mut metrics, "table_count", tables.len());

        let (style, stack) = {
            let signals = Signals::new(corpus.as_str(), &metrics, ctx.project_type);
            let style = heuristics::first_match(STYLE_RULES, &signals)
                .unwrap_or_else(|| "modular monolith".to_string());
            let stack = heuristics::select_stack(STACK_RULES, RULES.categories, &signals, &ctx.tech_stack);
            (style, stack)
        };
        if stack.contains_key("realtime") {
            endpoints.push(ApiEndpoint {
                method: "GET".to_string(),
                path: "/ws".to_string(),
                description: "WebSocket upgrade for live updates".to_string(),
            });
        }
        let services = self.services(&style, &tables, stack.contains_key("messaging"));
        metric(&mut metrics, "endpoint_count", endpoints.len());
        metric(&mut metrics, "service_count", services.len());

        let signals = Signals::new(corpus.as_str(), &metrics, ctx.project_type);
        let mut out = TransformationOutput::base(TransitionPair::new(Self::SOURCE, Self::TARGET), ctx.now);
        out.tech_stack = stack;
        out.decisions = heuristics::collect_guidance(RULES.decisions, &signals);
        out.decisions.insert(0, format!("Adopt a {style} architecture"));
        out.recommendations = heuristics::collect_guidance(RULES.recommendations, &signals);

        let mut findings = Vec::new();
        if !d.components.is_empty() {
            findings.push(format!("{} UI components specified", d.components.len()));
        }
        if !entities.is_empty() {
            findings.push(format!("Entities: {}", entities.join(", ")));
        }
        if !d.flows.is_empty() {
            findings.push(format!("{} user flows drive the API surface", d.flows.len()));
        }
        out.insights.key_findings = findings;
        out.insights.metrics = metrics;
        out.system_design = Some(SystemDesign {
            architecture_style: style,
            database_schema: tables,
            api_endpoints: endpoints,
            services,
        });
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TechStack;
    use crate::types::ProjectType;
    use chrono::Utc;
    use serde_json::json;

    fn derive(insights: InsightMap) -> TransformationOutput {
        let mut b = PhaseAnalysisBundle::empty(Phase::Design, 3);
        b.insights = insights;
        let ctx = TransformContext::new(ProjectType::WebApplication, TechStack::new(), Utc::now());
        DesignToArchitecture.derive(&b, &ctx)
    }

    #[test]
    fn entity_names_come_from_components() {
        assert_eq!(entity_from_component("OrderHistoryList").as_deref(), Some("OrderHistory"));
        assert_eq!(entity_from_component("ProductCard").as_deref(), Some("Product"));
        assert_eq!(entity_from_component("invoice editor").as_deref(), Some("Invoice"));
        assert_eq!(entity_from_component("CategoriesPage").as_deref(), Some("Category"));
        assert_eq!(entity_from_component("AppShell"), None);
        assert_eq!(entity_from_component("LoginPage"), None);
        assert_eq!(entity_from_component("Page"), None);
    }

    #[test]
    fn naming_helpers() {
        assert_eq!(snake("OrderItem"), "order_item");
        assert_eq!(plural("category"), "categories");
        assert_eq!(plural("address"), "addresses");
        assert_eq!(singular("Address"), "Address");
    }

    #[test]
    fn builds_schema_and_crud_endpoints() {
        let out = derive(
            InsightMap::new()
                .with("components", json!(["AppShell", "LoginPage", "ProductCard", "OrderHistoryList"]))
                .with("wireframes", json!(["Login screen", "Product grid"]))
                .with("user_flows", json!(["Browse and buy"])),
        );
        let sd = out.system_design.as_ref().unwrap();
        let tables: Vec<&str> = sd.database_schema.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["users", "products", "order_histories"]);

        let users = &sd.database_schema[0];
        assert!(users.columns.iter().any(|c| c.name == "email"));
        let products = &sd.database_schema[1];
        assert!(products
            .columns
            .iter()
            .any(|c| c.constraints.contains(&"references users(id)".to_string())));

        // 3 tables * 5 + login
        assert_eq!(sd.api_endpoints.len(), 16);
        assert!(sd
            .api_endpoints
            .iter()
            .any(|e| e.method == "DELETE" && e.path == "/api/order-histories/{id}"));
        assert_eq!(sd.architecture_style, "modular monolith");
        assert_eq!(sd.services, vec!["api"]);
        assert_eq!(out.metric("endpoint_count"), Some(16));
        assert_eq!(out.decisions[0], "Adopt a modular monolith architecture");
    }

    #[test]
    fn many_components_select_microservices() {
        let components: Vec<String> = (0..13).map(|i| format!("Widget{i}Card")).collect();
        let out = derive(InsightMap::new().with("components", json!(components)));
        let sd = out.system_design.as_ref().unwrap();
        assert_eq!(sd.architecture_style, "microservices");
        assert_eq!(sd.services[0], "api-gateway");
        assert_eq!(sd.services.len(), sd.database_schema.len() + 1);
    }

    #[test]
    fn realtime_design_adds_websocket_endpoint() {
        let out = derive(
            InsightMap::new()
                .with("components", json!(["ChatPanel"]))
                .with("wireframes", json!(["Live chat room"])),
        );
        let sd = out.system_design.as_ref().unwrap();
        assert!(sd.api_endpoints.iter().any(|e| e.path == "/ws"));
        assert_eq!(out.tech_stack["realtime"], "WebSockets");
    }
}

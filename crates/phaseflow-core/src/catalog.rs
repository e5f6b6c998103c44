//! Static lifecycle table: what each phase requires and where it leads.

use crate::types::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDefinition {
    pub phase: Phase,
    pub name: &'static str,
    /// Who drives the phase; shown in the current-phase document.
    pub role: &'static str,
    pub description: &'static str,
    pub required_deliverables: &'static [&'static str],
    pub next: Option<Phase>,
}

impl PhaseDefinition {
    pub fn requires(&self, deliverable: &str) -> bool {
        self.required_deliverables.contains(&deliverable)
    }
}

static CATALOG: [PhaseDefinition; 7] = [
    PhaseDefinition {
        phase: Phase::Concept,
        name: "Concept",
        role: "Product Strategist",
        description: "Validate the idea: market, users and competition",
        required_deliverables: &["market_analysis", "user_personas", "competitor_research"],
        next: Some(Phase::Requirements),
    },
    PhaseDefinition {
        phase: Phase::Requirements,
        name: "Requirements",
        role: "Business Analyst",
        description: "Capture functional and non-functional requirements as user stories",
        required_deliverables: &[
            "functional_requirements",
            "non_functional_requirements",
            "user_stories",
        ],
        next: Some(Phase::Design),
    },
    PhaseDefinition {
        phase: Phase::Design,
        name: "Design",
        role: "UX Designer",
        description: "Shape the user experience: wireframes, flows and components",
        required_deliverables: &["wireframes", "user_flows", "component_specifications"],
        next: Some(Phase::Architecture),
    },
    PhaseDefinition {
        phase: Phase::Architecture,
        name: "Architecture",
        role: "Software Architect",
        description: "Define the system structure, data model and API surface",
        required_deliverables: &["system_architecture", "database_schema", "api_specification"],
        next: Some(Phase::Implementation),
    },
    PhaseDefinition {
        phase: Phase::Implementation,
        name: "Implementation",
        role: "Software Engineer",
        description: "Build and test the system",
        required_deliverables: &["source_code", "unit_tests", "integration_tests"],
        next: Some(Phase::Deployment),
    },
    PhaseDefinition {
        phase: Phase::Deployment,
        name: "Deployment",
        role: "DevOps Engineer",
        description: "Ship to production with monitoring in place",
        required_deliverables: &["deployment_config", "monitoring_setup", "production_release"],
        next: Some(Phase::Complete),
    },
    PhaseDefinition {
        phase: Phase::Complete,
        name: "Complete",
        role: "Project Lead",
        description: "Project delivered",
        required_deliverables: &[],
        next: None,
    },
];

pub fn definition(phase: Phase) -> &'static PhaseDefinition {
    &CATALOG[phase.index()]
}

pub fn definitions() -> &'static [PhaseDefinition] {
    &CATALOG
}

pub fn required_deliverables(phase: Phase) -> &'static [&'static str] {
    definition(phase).required_deliverables
}

pub fn next_phase(phase: Phase) -> Option<Phase> {
    definition(phase).next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_indexed_by_phase() {
        for phase in Phase::all() {
            assert_eq!(definition(*phase).phase, *phase);
        }
    }

    #[test]
    fn concept_deliverables() {
        assert_eq!(
            required_deliverables(Phase::Concept),
            &["market_analysis", "user_personas", "competitor_research"]
        );
        assert!(definition(Phase::Concept).requires("user_personas"));
        assert!(!definition(Phase::Concept).requires("wireframes"));
    }

    #[test]
    fn next_chain_walks_the_lifecycle() {
        let mut phase = Phase::Concept;
        let mut visited = vec![phase];
        while let Some(next) = next_phase(phase) {
            assert!(next > phase, "lifecycle must move forward");
            phase = next;
            visited.push(phase);
        }
        assert_eq!(visited, Phase::all().to_vec());
    }

    #[test]
    fn only_complete_is_terminal() {
        for def in definitions() {
            assert_eq!(def.next.is_none(), def.phase.is_terminal());
            assert_eq!(def.required_deliverables.is_empty(), def.phase.is_terminal());
        }
    }
}

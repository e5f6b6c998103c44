use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Concept,
    Requirements,
    Design,
    Architecture,
    Implementation,
    Deployment,
    Complete,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Concept,
            Phase::Requirements,
            Phase::Design,
            Phase::Architecture,
            Phase::Implementation,
            Phase::Deployment,
            Phase::Complete,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Complete
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Concept => "concept",
            Phase::Requirements => "requirements",
            Phase::Design => "design",
            Phase::Architecture => "architecture",
            Phase::Implementation => "implementation",
            Phase::Deployment => "deployment",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::PhaseflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concept" => Ok(Phase::Concept),
            "requirements" => Ok(Phase::Requirements),
            "design" => Ok(Phase::Design),
            "architecture" => Ok(Phase::Architecture),
            "implementation" => Ok(Phase::Implementation),
            "deployment" => Ok(Phase::Deployment),
            "complete" => Ok(Phase::Complete),
            _ => Err(crate::error::PhaseflowError::UnknownPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    #[default]
    WebApplication,
    ApiService,
    MobileApp,
    CliTool,
    Library,
    DataPipeline,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::WebApplication => "web_application",
            ProjectType::ApiService => "api_service",
            ProjectType::MobileApp => "mobile_app",
            ProjectType::CliTool => "cli_tool",
            ProjectType::Library => "library",
            ProjectType::DataPipeline => "data_pipeline",
        }
    }

    /// Whether the project ships a user interface that design-phase artifacts
    /// (wireframes, screens) apply to.
    pub fn has_ui(self) -> bool {
        matches!(self, ProjectType::WebApplication | ProjectType::MobileApp)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectType {
    type Err = crate::error::PhaseflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_application" | "web-application" | "web" => Ok(ProjectType::WebApplication),
            "api_service" | "api-service" | "api" => Ok(ProjectType::ApiService),
            "mobile_app" | "mobile-app" | "mobile" => Ok(ProjectType::MobileApp),
            "cli_tool" | "cli-tool" | "cli" => Ok(ProjectType::CliTool),
            "library" => Ok(ProjectType::Library),
            "data_pipeline" | "data-pipeline" => Ok(ProjectType::DataPipeline),
            _ => Err(crate::error::PhaseflowError::InvalidConfig(format!(
                "unknown project type '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Priority / Impact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

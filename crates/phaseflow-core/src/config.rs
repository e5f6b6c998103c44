use crate::error::{PhaseflowError, Result};
use crate::paths;
use crate::types::ProjectType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Tech-stack categories the built-in transformers know how to reason about.
pub const KNOWN_STACK_CATEGORIES: &[&str] = &[
    "frontend",
    "backend",
    "database",
    "cache",
    "messaging",
    "realtime",
    "auth",
    "hosting",
    "ci_cd",
    "monitoring",
    "testing",
    "mobile",
    "language",
    "search",
];

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub project_type: ProjectType,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,
    /// Total transform attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    30 * 60
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_transform_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    5_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_true(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            transform_timeout_ms: default_transform_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// DeliverablesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverablesConfig {
    #[serde(default = "default_deliverables_dir")]
    pub dir: String,
    /// Lookup order when locating a deliverable's artifact on disk.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_deliverables_dir() -> String {
    paths::DEFAULT_DELIVERABLES_DIR.to_string()
}

fn default_extensions() -> Vec<String> {
    ["md", "json", "yaml", "yml", "txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for DeliverablesConfig {
    fn default() -> Self {
        Self {
            dir: default_deliverables_dir(),
            extensions: default_extensions(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    /// Preferred stack, category → technology. A non-empty configured category
    /// overrides the transformers' rule-selected choice, and categories the
    /// rules never name are carried through unchanged.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tech_stack: BTreeMap<String, String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub deliverables: DeliverablesConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
                project_type: ProjectType::default(),
            },
            tech_stack: BTreeMap::new(),
            engine: EngineConfig::default(),
            deliverables: DeliverablesConfig::default(),
        }
    }

    pub fn with_project_type(mut self, project_type: ProjectType) -> Self {
        self.project.project_type = project_type;
        self
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PhaseflowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        crate::migrations::migrate_config(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Write this config unless the project already has one. Returns
    /// whether a file was written.
    pub fn init(&self, root: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(self)?;
        crate::io::write_if_missing(&paths::config_path(root), data.as_bytes())
    }

    /// Fails on the first error-level warning; warnings alone pass.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(PhaseflowError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let engine = &self.engine;

        if engine.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.max_attempts must be at least 1".to_string(),
            });
        } else if engine.max_attempts > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "engine.max_attempts={} (>10 is unusual)",
                    engine.max_attempts
                ),
            });
        }

        if engine.transform_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.transform_timeout_ms must be greater than 0".to_string(),
            });
        }

        if engine.backoff_base_ms > engine.backoff_cap_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "engine.backoff_base_ms ({}) exceeds backoff_cap_ms ({}); every delay will be the cap",
                    engine.backoff_base_ms, engine.backoff_cap_ms
                ),
            });
        }

        if engine.cache_enabled && engine.cache_ttl_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "engine.cache_ttl_secs is 0: cached transitions expire immediately"
                    .to_string(),
            });
        }

        if self.deliverables.extensions.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "deliverables.extensions is empty: no artifact can be located"
                    .to_string(),
            });
        }

        if self.deliverables.dir.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "deliverables.dir is empty".to_string(),
            });
        }

        for (category, technology) in &self.tech_stack {
            if !KNOWN_STACK_CATEGORIES.contains(&category.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown tech_stack category '{category}'"),
                });
            }
            if technology.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("tech_stack category '{category}' has an empty value"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.engine.max_attempts, 3);
        assert_eq!(parsed.engine.cache_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "project:\n  name: shop\n  project_type: api_service\ntech_stack:\n  database: mysql\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.project.project_type, ProjectType::ApiService);
        assert_eq!(cfg.tech_stack["database"], "mysql");
        assert!(cfg.engine.cache_enabled);
        assert_eq!(cfg.engine.backoff_cap_ms, 5_000);
        assert_eq!(cfg.deliverables.extensions[0], "md");
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(PhaseflowError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("proj").with_project_type(ProjectType::MobileApp);
        cfg.engine.max_attempts = 5;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.project_type, ProjectType::MobileApp);
        assert_eq!(loaded.engine.max_attempts, 5);
    }

    #[test]
    fn init_keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        assert!(Config::new("first").init(dir.path()).unwrap());
        assert!(!Config::new("second").init(dir.path()).unwrap());
        assert_eq!(Config::load(dir.path()).unwrap().project.name, "first");
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::new("p").validate().is_empty());
        Config::new("p").ensure_valid().unwrap();
    }

    #[test]
    fn zero_attempts_is_an_error() {
        let mut cfg = Config::new("p");
        cfg.engine.max_attempts = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("max_attempts")));
        assert!(matches!(
            cfg.ensure_valid(),
            Err(PhaseflowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_stack_category_warns() {
        let mut cfg = Config::new("p");
        cfg.tech_stack
            .insert("quantum".to_string(), "qiskit".to_string());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("quantum"));
        cfg.ensure_valid().unwrap();
    }

    #[test]
    fn backoff_base_above_cap_warns() {
        let mut cfg = Config::new("p");
        cfg.engine.backoff_base_ms = 10_000;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("backoff_base_ms")));
    }
}

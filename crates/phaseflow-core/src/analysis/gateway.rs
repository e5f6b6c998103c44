use super::{AnalyzerReport, DeliverableAnalysis, PhaseAnalysisBundle};
use crate::catalog;
use crate::config::DeliverablesConfig;
use crate::error::Result;
use crate::paths;
use crate::types::Phase;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns one artifact on disk into structured insights.
#[async_trait]
pub trait DeliverableAnalyzer: Send + Sync {
    async fn analyze(&self, path: &Path, deliverable: &str) -> Result<AnalyzerReport>;
}

/// Locates each required deliverable of a phase and folds the analyzer's
/// results into a [`PhaseAnalysisBundle`].
///
/// A deliverable whose artifact is missing, or whose analysis fails, is
/// logged and skipped; it never aborts the bundle.
#[derive(Clone)]
pub struct AnalysisGateway {
    root: PathBuf,
    deliverables: DeliverablesConfig,
    analyzer: Arc<dyn DeliverableAnalyzer>,
}

impl AnalysisGateway {
    pub fn new(root: impl Into<PathBuf>, analyzer: Arc<dyn DeliverableAnalyzer>) -> Self {
        Self::with_config(root, DeliverablesConfig::default(), analyzer)
    }

    pub fn with_config(
        root: impl Into<PathBuf>,
        deliverables: DeliverablesConfig,
        analyzer: Arc<dyn DeliverableAnalyzer>,
    ) -> Self {
        Self {
            root: root.into(),
            deliverables,
            analyzer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First existing candidate path for `deliverable`, trying extensions in
    /// configured order.
    pub async fn locate(&self, phase: Phase, deliverable: &str) -> Option<PathBuf> {
        let candidates = paths::deliverable_candidates(
            &self.root,
            &self.deliverables.dir,
            phase,
            deliverable,
            &self.deliverables.extensions,
        );
        for candidate in candidates {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }

    pub async fn analyze_phase(&self, phase: Phase) -> PhaseAnalysisBundle {
        let required = catalog::required_deliverables(phase);
        let mut bundle = PhaseAnalysisBundle::empty(phase, required.len());

        for deliverable in required {
            let Some(path) = self.locate(phase, deliverable).await else {
                tracing::warn!(
                    phase = %phase,
                    deliverable,
                    "deliverable artifact not found; skipping"
                );
                bundle.skip(deliverable, "artifact not found");
                continue;
            };

            match self.analyzer.analyze(&path, deliverable).await {
                Ok(report) => {
                    tracing::debug!(
                        phase = %phase,
                        deliverable,
                        insights = report.insights.len(),
                        "deliverable analyzed"
                    );
                    bundle.add(DeliverableAnalysis {
                        deliverable: deliverable.to_string(),
                        success: true,
                        path: self.display_path(&path),
                        insights: report.insights,
                        relationships: report.relationships,
                        metadata: report.metadata,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        phase = %phase,
                        deliverable,
                        error = %e,
                        "deliverable analysis failed; skipping"
                    );
                    bundle.skip(deliverable, e.to_string());
                }
            }
        }

        tracing::info!(
            phase = %phase,
            total = bundle.metadata.total_deliverables,
            successful = bundle.metadata.successful_analyses,
            "phase analysis finished"
        );
        bundle
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::InsightMap;
    use crate::error::PhaseflowError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Reports the file's first line under `summary`, failing for one name.
    struct FirstLineAnalyzer {
        fail_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DeliverableAnalyzer for FirstLineAnalyzer {
        async fn analyze(&self, path: &Path, deliverable: &str) -> Result<AnalyzerReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(deliverable) {
                return Err(PhaseflowError::Analyzer {
                    deliverable: deliverable.to_string(),
                    reason: "unparseable".to_string(),
                });
            }
            let content = tokio::fs::read_to_string(path).await?;
            let first = content.lines().next().unwrap_or_default().to_string();
            Ok(AnalyzerReport {
                insights: InsightMap::new().with(deliverable, json!([first])),
                ..Default::default()
            })
        }
    }

    fn write(dir: &TempDir, rel: &str, body: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn gateway(dir: &TempDir, fail_on: Option<&'static str>) -> (AnalysisGateway, Arc<FirstLineAnalyzer>) {
        let analyzer = Arc::new(FirstLineAnalyzer {
            fail_on,
            calls: AtomicUsize::new(0),
        });
        (AnalysisGateway::new(dir.path(), analyzer.clone()), analyzer)
    }

    #[tokio::test]
    async fn locate_prefers_earlier_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "deliverables/concept/user_personas.json", "{}");
        write(&dir, "deliverables/concept/user_personas.md", "# Personas");
        let (gw, _) = gateway(&dir, None);
        let found = gw.locate(Phase::Concept, "user_personas").await.unwrap();
        assert!(found.ends_with("user_personas.md"));
        assert!(gw.locate(Phase::Concept, "market_analysis").await.is_none());
    }

    #[tokio::test]
    async fn missing_and_failing_deliverables_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "deliverables/concept/market_analysis.md", "SMB market");
        write(&dir, "deliverables/concept/competitor_research.txt", "Acme");
        let (gw, analyzer) = gateway(&dir, Some("competitor_research"));

        let bundle = gw.analyze_phase(Phase::Concept).await;
        assert_eq!(bundle.metadata.total_deliverables, 3);
        assert_eq!(bundle.metadata.successful_analyses, 1);
        assert_eq!(bundle.metadata.analyzed, vec!["market_analysis"]);
        let skipped: Vec<_> = bundle
            .metadata
            .skipped
            .iter()
            .map(|s| s.deliverable.as_str())
            .collect();
        assert_eq!(skipped, vec!["user_personas", "competitor_research"]);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            bundle.insights.strings("market_analysis"),
            vec!["SMB market"]
        );
        assert_eq!(
            bundle.deliverables[0].path,
            "deliverables/concept/market_analysis.md"
        );
    }

    #[tokio::test]
    async fn custom_directory_and_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "docs/design/wireframes.yaml", "home screen");
        let analyzer = Arc::new(FirstLineAnalyzer {
            fail_on: None,
            calls: AtomicUsize::new(0),
        });
        let gw = AnalysisGateway::with_config(
            dir.path(),
            DeliverablesConfig {
                dir: "docs".to_string(),
                extensions: vec!["yaml".to_string()],
            },
            analyzer,
        );
        let bundle = gw.analyze_phase(Phase::Design).await;
        assert_eq!(bundle.metadata.successful_analyses, 1);
        assert_eq!(bundle.insights.strings("wireframes"), vec!["home screen"]);
    }
}

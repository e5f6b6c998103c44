//! Analysis results for a phase's deliverables.
//!
//! The analyzer itself is an external collaborator; this module owns the
//! shapes it produces and how per-deliverable results fold into one
//! [`PhaseAnalysisBundle`].

pub mod gateway;

pub use gateway::{AnalysisGateway, DeliverableAnalyzer};

use crate::types::Phase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Object keys consulted, in order, when an insight entry is an object rather
/// than a plain string.
const LABEL_KEYS: &[&str] = &["title", "name", "summary", "description", "text", "value"];

// ---------------------------------------------------------------------------
// InsightMap
// ---------------------------------------------------------------------------

/// Key → JSON value map with lenient typed accessors. Absent keys read as
/// empty, so transformers branch on presence instead of failing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsightMap(BTreeMap<String, Value>);

impl InsightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// The entry under `key` as a list of strings.
    ///
    /// Arrays yield one string per element (objects via their first label
    /// field); a multi-line string yields its non-empty lines; anything else
    /// yields an empty list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(label_of).collect(),
            Some(Value::String(s)) => s
                .lines()
                .map(|l| l.trim().trim_start_matches(['-', '*']).trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Some(v @ Value::Object(_)) => label_of(v).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Strings from the first of `keys` that is present and non-empty.
    pub fn first_strings(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .map(|k| self.strings(k))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                let parts = self.strings(key);
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            _ => None,
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.strings(key).len()
    }

    /// Fold `other` into `self`: arrays concatenate, objects merge one level
    /// deep, anything else is replaced by `other`'s value.
    pub fn merge(&mut self, other: &InsightMap) {
        for (key, incoming) in &other.0 {
            match (self.0.get_mut(key), incoming) {
                (Some(Value::Array(existing)), Value::Array(more)) => {
                    existing.extend(more.iter().cloned());
                }
                (Some(Value::Object(existing)), Value::Object(more)) => {
                    for (k, v) in more {
                        existing.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    self.0.insert(key.clone(), incoming.clone());
                }
            }
        }
    }

    /// Every string leaf, lowercased, one per line. Used for keyword rules.
    pub fn corpus(&self) -> String {
        let mut out = String::new();
        for value in self.0.values() {
            collect_text(value, &mut out);
        }
        out
    }
}

impl FromIterator<(String, Value)> for InsightMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => LABEL_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(label_of),
        _ => None,
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(&s.to_lowercase());
            out.push('\n');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// AnalyzerReport / DeliverableAnalysis
// ---------------------------------------------------------------------------

/// What the external analyzer returns for one artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyzerReport {
    #[serde(default)]
    pub insights: InsightMap,
    #[serde(default)]
    pub relationships: InsightMap,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableAnalysis {
    pub deliverable: String,
    pub success: bool,
    pub path: String,
    pub insights: InsightMap,
    pub relationships: InsightMap,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDeliverable {
    pub deliverable: String,
    pub reason: String,
}

/// Counts and names describing how complete a bundle is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub phase: Phase,
    pub total_deliverables: usize,
    pub successful_analyses: usize,
    pub analyzed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedDeliverable>,
}

// ---------------------------------------------------------------------------
// PhaseAnalysisBundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseAnalysisBundle {
    pub phase: Phase,
    /// Successful analyses in catalog order.
    pub deliverables: Vec<DeliverableAnalysis>,
    pub insights: InsightMap,
    pub relationships: InsightMap,
    pub metadata: AnalysisSummary,
}

impl PhaseAnalysisBundle {
    pub fn empty(phase: Phase, total_deliverables: usize) -> Self {
        Self {
            phase,
            deliverables: Vec::new(),
            insights: InsightMap::new(),
            relationships: InsightMap::new(),
            metadata: AnalysisSummary {
                phase,
                total_deliverables,
                successful_analyses: 0,
                analyzed: Vec::new(),
                skipped: Vec::new(),
            },
        }
    }

    pub fn add(&mut self, analysis: DeliverableAnalysis) {
        self.insights.merge(&analysis.insights);
        self.relationships.merge(&analysis.relationships);
        self.metadata.successful_analyses += 1;
        self.metadata.analyzed.push(analysis.deliverable.clone());
        self.deliverables.push(analysis);
    }

    pub fn skip(&mut self, deliverable: &str, reason: impl Into<String>) {
        self.metadata.skipped.push(SkippedDeliverable {
            deliverable: deliverable.to_string(),
            reason: reason.into(),
        });
    }

    pub fn deliverable(&self, name: &str) -> Option<&DeliverableAnalysis> {
        self.deliverables.iter().find(|d| d.deliverable == name)
    }

    /// Insights and relationships flattened into one lowercase text blob.
    pub fn corpus(&self) -> String {
        let mut text = self.insights.corpus();
        text.push_str(&self.relationships.corpus());
        text
    }

    pub fn is_complete(&self) -> bool {
        self.metadata.successful_analyses == self.metadata.total_deliverables
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

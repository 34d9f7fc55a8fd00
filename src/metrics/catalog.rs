//! Metric Catalog: definitions and scoring bands for the four metrics.
//!
//! The definitions resource is a JSON mapping from metric name (English or
//! localized) to an object with `定義` (definition), `スコア基準`
//! (band label → criterion) and an optional `質問` (guiding question).
//! English field names are accepted as aliases.
//!
//! The catalog is loaded once, never mutated, and shared by reference
//! (`Arc<MetricCatalog>`) between the synthesizer and the annotator.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MetricKind;
use crate::utilities::errors::CatalogLoadError;

/// One scoring band and its criterion, e.g. `"7-9"` → "Clearly intimidating".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCriterion {
    pub label: String,
    pub description: String,
}

/// Definition of a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub kind: MetricKind,
    /// Name as written in the definitions resource.
    pub name: String,
    pub definition: String,
    /// Bands in resource order.
    pub score_bands: Vec<ScoreCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guiding_question: Option<String>,
}

impl MetricDefinition {
    /// The criterion describing the 7-9 band.
    ///
    /// Picks the first band whose label starts its numbers at 7, falling back
    /// to the last band listed.
    pub fn high_band(&self) -> Option<&ScoreCriterion> {
        self.score_bands
            .iter()
            .find(|band| band.label.chars().find(char::is_ascii_digit) == Some('7'))
            .or_else(|| self.score_bands.last())
    }

    /// Render as prompt text.
    pub fn render(&self) -> String {
        let mut text = if self.name == self.kind.as_str() {
            format!("【{}】\n", self.kind)
        } else {
            format!("【{} / {}】\n", self.kind, self.name)
        };
        text.push_str(&format!("Definition: {}\n", self.definition));
        if !self.score_bands.is_empty() {
            text.push_str("Scoring criteria:\n");
            for band in &self.score_bands {
                text.push_str(&format!("  {}: {}\n", band.label, band.description));
            }
        }
        if let Some(ref question) = self.guiding_question {
            text.push_str(&format!("Guiding question: {}\n", question));
        }
        text
    }
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(rename = "定義", alias = "definition", default)]
    definition: String,
    #[serde(rename = "スコア基準", alias = "score_bands", default)]
    score_bands: Map<String, Value>,
    #[serde(rename = "質問", alias = "guiding_question", default)]
    guiding_question: Option<String>,
}

/// The loaded set of metric definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricCatalog {
    definitions: BTreeMap<MetricKind, MetricDefinition>,
}

impl MetricCatalog {
    /// A catalog with no definitions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the definitions resource from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        if !path.exists() {
            return Err(CatalogLoadError::Missing { path: origin });
        }
        let content = std::fs::read_to_string(path).map_err(|source| {
            CatalogLoadError::Unreadable {
                path: origin.clone(),
                source,
            }
        })?;
        let catalog = Self::from_json_str(&content, &origin)?;
        log::info!("Loaded {} metric definitions from {}", catalog.len(), origin);
        Ok(catalog)
    }

    /// Load the resource, degrading to an empty catalog with a warning.
    ///
    /// Only scenario synthesis tolerates a missing catalog; annotation does not.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                log::warn!("{}; continuing with an empty metric catalog", e);
                Self::empty()
            }
        }
    }

    /// Parse the resource contents. `origin` names the source in errors.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, CatalogLoadError> {
        let malformed = |message: String| CatalogLoadError::Malformed {
            path: origin.to_string(),
            message,
        };

        let value: Value = serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;
        let entries = match value {
            Value::Object(map) => map,
            _ => return Err(malformed("expected a mapping of metric name to definition".to_string())),
        };

        let mut definitions = BTreeMap::new();
        for (name, body) in entries {
            let kind = MetricKind::from_label(&name)
                .ok_or_else(|| malformed(format!("unknown metric '{}'", name)))?;
            if definitions.contains_key(&kind) {
                return Err(malformed(format!("metric '{}' is defined more than once", kind)));
            }
            let raw: RawDefinition = serde_json::from_value(body)
                .map_err(|e| malformed(format!("metric '{}': {}", name, e)))?;
            let score_bands = raw
                .score_bands
                .into_iter()
                .map(|(label, description)| ScoreCriterion {
                    label,
                    description: match description {
                        Value::String(s) => s,
                        other => other.to_string(),
                    },
                })
                .collect();
            definitions.insert(
                kind,
                MetricDefinition {
                    kind,
                    name,
                    definition: raw.definition,
                    score_bands,
                    guiding_question: raw.guiding_question,
                },
            );
        }

        let missing: Vec<&str> = MetricKind::ALL
            .iter()
            .filter(|kind| !definitions.contains_key(*kind))
            .map(MetricKind::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!("missing definitions for: {}", missing.join(", "))));
        }

        Ok(Self { definitions })
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricDefinition> {
        self.definitions.get(&kind)
    }

    /// Definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Render one metric as prompt text.
    pub fn format_definition(&self, kind: MetricKind) -> Option<String> {
        self.get(kind).map(MetricDefinition::render)
    }

    /// Render every metric as prompt text.
    pub fn format_all(&self) -> String {
        self.iter()
            .map(MetricDefinition::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//! Saved pipeline runs.
//!
//! Each run is one pretty-printed JSON file named
//! `<YYYYMMDD_HHMMSS>_<profile stem>.json` holding [`RunMetadata`] and the
//! annotated utterances. Human reviewers can later overlay their own scores;
//! the first edit of an utterance moves the model's scores from `metrics` to
//! `machine_annotations` so both stay on record.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{checked_path, json_file_names};
use crate::annotation::AnnotatedUtterance;
use crate::metrics::{MetricKind, MetricScores, SCORE_MAX};
use crate::utilities::errors::StorageError;

/// Byte-order mark so spreadsheet tools detect UTF-8.
pub const CSV_BOM: &str = "\u{feff}";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub generated_at: String,
    pub meeting_purpose: String,
    pub meeting_format: String,
    pub num_utterances: usize,
    pub profile_filename: String,
    pub scenario_model: String,
    pub annotation_model: String,
    pub sanitize_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_human_annotation: Option<String>,
    /// Fields written by other tools, kept on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reviewer's score for one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanAnnotation {
    pub score: Option<u8>,
    pub edited_at: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUtterance {
    pub speaker: String,
    pub text: String,
    /// Model scores until the first human edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricScores>,
    /// Model scores after the first human edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_annotations: Option<MetricScores>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub human_annotations: BTreeMap<MetricKind, HumanAnnotation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<AnnotatedUtterance> for StoredUtterance {
    fn from(utterance: AnnotatedUtterance) -> Self {
        Self {
            speaker: utterance.speaker,
            text: utterance.text,
            metrics: Some(utterance.metrics),
            machine_annotations: None,
            human_annotations: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

/// One saved run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub metadata: RunMetadata,
    pub scenario: Vec<StoredUtterance>,
}

impl RunRecord {
    pub fn new(metadata: RunMetadata, annotated: Vec<AnnotatedUtterance>) -> Self {
        Self {
            metadata,
            scenario: annotated.into_iter().map(StoredUtterance::from).collect(),
        }
    }
}

/// Listing entry for a saved run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSummary {
    pub filename: String,
    pub generated_at: String,
    pub meeting_purpose: String,
    pub meeting_format: String,
    pub num_utterances: usize,
    pub profile_filename: String,
}

/// Incoming reviewer edit for one metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanEdit {
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub note: String,
}

/// Utterance index (as a string) → metric name → edit.
pub type HumanEdits = BTreeMap<String, BTreeMap<String, HumanEdit>>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of an existing saved run.
    pub fn path_of(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let path = checked_path(&self.dir, filename)?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                name: filename.to_string(),
            });
        }
        Ok(path)
    }

    /// Save a run, returning the new file name.
    pub fn save(&self, record: &RunRecord, profile_filename: &str) -> Result<String, StorageError> {
        self.save_at(record, profile_filename, Local::now())
    }

    fn save_at(
        &self,
        record: &RunRecord,
        profile_filename: &str,
        now: DateTime<Local>,
    ) -> Result<String, StorageError> {
        let stem = Path::new(profile_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("scenario");
        let prefix = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), stem);
        let body = serde_json::to_string_pretty(record)?;

        // Runs saved within the same second get a numeric suffix.
        let mut attempt = 1u32;
        loop {
            let filename = if attempt == 1 {
                format!("{}.json", prefix)
            } else {
                format!("{}_{}.json", prefix, attempt)
            };
            let path = checked_path(&self.dir, &filename)?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())?;
                    log::info!("Saved run to {}", path.display());
                    return Ok(filename);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn load(&self, filename: &str) -> Result<RunRecord, StorageError> {
        let content = std::fs::read_to_string(self.path_of(filename)?)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Summaries of every readable run, newest first.
    pub fn list(&self) -> Result<Vec<OutputSummary>, StorageError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = json_file_names(&self.dir)?;
        names.reverse();
        let summaries = names
            .into_iter()
            .filter_map(|filename| match self.load(&filename) {
                Ok(record) => Some(OutputSummary {
                    filename,
                    generated_at: record.metadata.generated_at,
                    meeting_purpose: record.metadata.meeting_purpose,
                    meeting_format: record.metadata.meeting_format,
                    num_utterances: record.metadata.num_utterances,
                    profile_filename: record.metadata.profile_filename,
                }),
                Err(e) => {
                    log::debug!("Skipping unreadable output {}: {}", filename, e);
                    None
                }
            })
            .collect();
        Ok(summaries)
    }

    /// Overlay reviewer scores onto a saved run and write it back.
    ///
    /// Indices that do not parse or fall outside the scenario are skipped, as
    /// are unknown metric names and scores above 9.
    pub fn save_human_annotations(&self, filename: &str, edits: &HumanEdits) -> Result<RunRecord, StorageError> {
        let path = self.path_of(filename)?;
        let mut record = self.load(filename)?;
        let now = Local::now().to_rfc3339();
        record.metadata.last_human_annotation = Some(now.clone());

        for (index, metric_edits) in edits {
            let utterance = match index.parse::<usize>().ok().and_then(|i| record.scenario.get_mut(i)) {
                Some(u) => u,
                None => {
                    log::warn!("Ignoring annotation for invalid utterance index '{}'", index);
                    continue;
                }
            };
            if utterance.machine_annotations.is_none() {
                if let Some(metrics) = utterance.metrics.take() {
                    utterance.machine_annotations = Some(metrics);
                }
            }
            for (name, edit) in metric_edits {
                let Some(kind) = MetricKind::from_label(name) else {
                    log::warn!("Ignoring annotation for unknown metric '{}'", name);
                    continue;
                };
                if edit.score.map_or(false, |s| s > SCORE_MAX) {
                    log::warn!("Ignoring out-of-range score for '{}' at index {}", kind, index);
                    continue;
                }
                utterance.human_annotations.insert(
                    kind,
                    HumanAnnotation {
                        score: edit.score,
                        edited_at: now.clone(),
                        note: edit.note.clone(),
                    },
                );
            }
        }

        std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Render a run as CSV: speaker, content, then the human score per metric.
///
/// Metric columns stay empty until a reviewer scores them. Output starts with
/// a UTF-8 BOM and uses CRLF line endings.
pub fn to_csv(record: &RunRecord) -> String {
    let mut out = String::from(CSV_BOM);
    let header: Vec<&str> = ["Speaker", "Content"]
        .into_iter()
        .chain(MetricKind::ALL.iter().map(MetricKind::localized_label))
        .collect();
    push_row(&mut out, header.iter().map(|s| s.to_string()));

    for utterance in &record.scenario {
        let scores = MetricKind::ALL.iter().map(|kind| {
            utterance
                .human_annotations
                .get(kind)
                .and_then(|a| a.score)
                .map(|s| s.to_string())
                .unwrap_or_default()
        });
        let row = [utterance.speaker.clone(), utterance.text.clone()]
            .into_iter()
            .chain(scores);
        push_row(&mut out, row);
    }
    out
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let line = fields.map(|f| csv_field(&f)).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

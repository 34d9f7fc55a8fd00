//! The four communication-risk metrics and their per-utterance annotations.
//!
//! - [`MetricKind`] - the fixed set: coercion, deviation, invalidation, bias
//! - [`Annotation`] - one `{score, reason}` pair on the 0-9 scale
//! - [`catalog`] - definitions and scoring bands loaded from the definitions resource

pub mod catalog;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use catalog::{MetricCatalog, MetricDefinition};

// ---------------------------------------------------------------------------
// Metric kinds
// ---------------------------------------------------------------------------

/// One of the four fixed metrics.
///
/// Serialized with its English name. Parsing also accepts the localized
/// labels used as keys in the definitions resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MetricKind {
    /// Pressure or intimidation toward other participants.
    Coercion,
    /// Drift away from the meeting's purpose.
    Deviation,
    /// Dismissing or ignoring what others said.
    Invalidation,
    /// Lopsided participation or one-sided judgement.
    Bias,
}

impl MetricKind {
    /// All metrics in catalog order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Coercion,
        MetricKind::Deviation,
        MetricKind::Invalidation,
        MetricKind::Bias,
    ];

    /// English key used in prompts, responses and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Coercion => "coercion",
            MetricKind::Deviation => "deviation",
            MetricKind::Invalidation => "invalidation",
            MetricKind::Bias => "bias",
        }
    }

    /// Label used by the Japanese definitions resource.
    pub fn localized_label(&self) -> &'static str {
        match self {
            MetricKind::Coercion => "威圧度",
            MetricKind::Deviation => "逸脱度",
            MetricKind::Invalidation => "発言無効度",
            MetricKind::Bias => "偏り度",
        }
    }

    /// Resolve an English name (any case) or a localized label.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        let lower = trimmed.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower || kind.localized_label() == trimmed)
    }

    /// Whether `metrics` names every metric.
    pub fn covers_all(metrics: &[MetricKind]) -> bool {
        Self::ALL.iter().all(|kind| metrics.contains(kind))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("Unknown metric '{}'", s))
    }
}

impl TryFrom<String> for MetricKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Highest score on the annotation scale.
pub const SCORE_MAX: u8 = 9;

/// The three qualitative bands of the 0-9 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    /// 0-3: healthy.
    Low,
    /// 4-6: ordinary.
    Medium,
    /// 7-9: problematic.
    High,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        match score {
            0..=3 => ScoreBand::Low,
            4..=6 => ScoreBand::Medium,
            _ => ScoreBand::High,
        }
    }
}

/// A single metric judgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Score in `0..=9`.
    pub score: u8,
    /// Short justification from the model.
    pub reason: String,
}

impl Annotation {
    pub fn new(score: u8, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.score)
    }
}

/// Annotations for one utterance, keyed in catalog order.
pub type MetricScores = BTreeMap<MetricKind, Annotation>;

/// Share of score maps whose `kind` annotation falls in the high band.
///
/// Returns `None` when no map carries that metric.
pub fn high_band_share<'a, I>(scores: I, kind: MetricKind) -> Option<f64>
where
    I: IntoIterator<Item = &'a MetricScores>,
{
    let (total, high) = scores
        .into_iter()
        .filter_map(|map| map.get(&kind))
        .fold((0usize, 0usize), |(total, high), annotation| {
            let hit = usize::from(annotation.band() == ScoreBand::High);
            (total + 1, high + hit)
        });
    (total > 0).then(|| high as f64 / total as f64)
}

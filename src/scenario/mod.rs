//! Scenario synthesis: persona-conditioned dialogue generation.
//!
//! - [`normalize`] - alias resolution and response-shape normalization,
//!   shared with the annotator
//! - [`intensity`] - focus handling, intensity policies and ratio bands
//! - [`synthesizer`] - the Scenario Synthesizer itself

pub mod intensity;
pub mod normalize;
pub mod synthesizer;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use intensity::{BehaviorBand, IntensityPolicy, MetricFocus};
pub use synthesizer::ScenarioSynthesizer;

/// One speaker-attributed line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    /// `"speaker: text"`, the form used in rolling context.
    pub fn render(&self) -> String {
        format!("{}: {}", self.speaker, self.text)
    }
}

/// Ordered utterances of one synthesized meeting.
///
/// Order is speaking order and is never changed after synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario(Vec<Utterance>);

impl Scenario {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Utterance> {
        self.0.iter()
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.0
    }

    /// Plain `{speaker, text}` records, the annotator's input shape.
    pub fn to_records(&self) -> Vec<Value> {
        self.0
            .iter()
            .map(|u| serde_json::json!({"speaker": u.speaker, "text": u.text}))
            .collect()
    }
}

impl From<Vec<Utterance>> for Scenario {
    fn from(utterances: Vec<Utterance>) -> Self {
        Self(utterances)
    }
}

impl<'a> IntoIterator for &'a Scenario {
    type Item = &'a Utterance;
    type IntoIter = std::slice::Iter<'a, Utterance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

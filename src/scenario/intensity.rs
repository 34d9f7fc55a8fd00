//! Controls for how much problem behavior a generated scenario contains.
//!
//! Two tables drive the prompt: the [`IntensityPolicy`] picked from the focus
//! set and ratio, and the [`BehaviorBand`] picked from the ratio alone. Both
//! are piecewise on purpose; the thresholds live in [`RATIO_BANDS`] and
//! [`IntensityPolicy::select`].

use crate::metrics::MetricKind;

/// Ratio used when focus metrics are given without a ratio.
pub const DEFAULT_TARGET_RATIO: u8 = 50;

/// Accepted target ratio range, in percent.
pub const MIN_TARGET_RATIO: u8 = 10;
pub const MAX_TARGET_RATIO: u8 = 90;

// ---------------------------------------------------------------------------
// Focus
// ---------------------------------------------------------------------------

/// Which metrics the generation should skew toward high severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricFocus {
    /// Mix low, medium and high scores across every metric.
    Balanced,
    /// Push `metrics` into the 7-9 band for about `ratio` percent of utterances.
    Targeted { metrics: Vec<MetricKind>, ratio: u8 },
}

impl MetricFocus {
    /// Build from the caller's optional controls.
    ///
    /// Duplicate metrics are dropped. No focus, or a focus naming all four
    /// metrics, is [`MetricFocus::Balanced`]. The ratio defaults to
    /// [`DEFAULT_TARGET_RATIO`] and is clamped into 10..=90.
    pub fn from_request(focus: Option<&[MetricKind]>, ratio: Option<u8>) -> Self {
        let mut metrics: Vec<MetricKind> = Vec::new();
        for kind in focus.unwrap_or_default() {
            if !metrics.contains(kind) {
                metrics.push(*kind);
            }
        }
        if metrics.is_empty() || MetricKind::covers_all(&metrics) {
            return MetricFocus::Balanced;
        }

        let requested = ratio.unwrap_or(DEFAULT_TARGET_RATIO);
        let clamped = requested.clamp(MIN_TARGET_RATIO, MAX_TARGET_RATIO);
        if clamped != requested {
            log::warn!(
                "target_ratio {} outside {}-{}; using {}",
                requested,
                MIN_TARGET_RATIO,
                MAX_TARGET_RATIO,
                clamped
            );
        }
        MetricFocus::Targeted {
            metrics,
            ratio: clamped,
        }
    }

    pub fn includes(&self, kind: MetricKind) -> bool {
        match self {
            MetricFocus::Balanced => false,
            MetricFocus::Targeted { metrics, .. } => metrics.contains(&kind),
        }
    }

    pub fn ratio(&self) -> Option<u8> {
        match self {
            MetricFocus::Balanced => None,
            MetricFocus::Targeted { ratio, .. } => Some(*ratio),
        }
    }

    pub fn metrics(&self) -> &[MetricKind] {
        match self {
            MetricFocus::Balanced => &[],
            MetricFocus::Targeted { metrics, .. } => metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Intensity policies
// ---------------------------------------------------------------------------

/// The behavioral-intensity instruction variant embedded in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityPolicy {
    /// Deviation is a focus metric and the ratio is at least 50.
    DeviationHighRatio,
    /// Deviation is a focus metric and the ratio is below 50.
    DeviationLowRatio,
    /// Everything else.
    Generic,
}

/// Ratio at which deviation-focused generation switches to the high template.
pub const DEVIATION_HIGH_THRESHOLD: u8 = 50;

impl IntensityPolicy {
    pub fn select(focus: &MetricFocus) -> Self {
        match focus.ratio() {
            Some(ratio) if focus.includes(MetricKind::Deviation) => {
                if ratio >= DEVIATION_HIGH_THRESHOLD {
                    IntensityPolicy::DeviationHighRatio
                } else {
                    IntensityPolicy::DeviationLowRatio
                }
            }
            _ => IntensityPolicy::Generic,
        }
    }

    /// Instruction text for this policy.
    pub fn render(&self, focus: &MetricFocus) -> String {
        match self {
            IntensityPolicy::DeviationHighRatio => format!(
                "■ Behavioral intensity: topic deviation (high)\n\
                 - About {}% of the utterances must drift clearly away from the meeting purpose.\n\
                 - Let participants steer the discussion to unrelated subjects such as after-work \
                 drinks, personal anecdotes or other projects, and let the drift persist over \
                 several turns before anyone returns to the agenda.\n\
                 - Participants who try to bring the meeting back on track should be brushed aside \
                 at least once.",
                focus.ratio().unwrap_or(DEFAULT_TARGET_RATIO)
            ),
            IntensityPolicy::DeviationLowRatio => format!(
                "■ Behavioral intensity: topic deviation (low)\n\
                 - Keep the meeting mostly on its purpose; only about {}% of the utterances drift \
                 off topic.\n\
                 - Digressions are short side remarks that the group quickly abandons.",
                focus.ratio().unwrap_or(DEFAULT_TARGET_RATIO)
            ),
            IntensityPolicy::Generic => "■ Behavioral intensity\n\
                 - Express each character's behavior pattern faithfully and keep a natural flow of \
                 conversation."
                .to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ratio bands
// ---------------------------------------------------------------------------

/// Qualitative directive for how problem behavior is spread over the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorBand {
    /// 70% and above.
    Saturate,
    /// 50-69%.
    RampUp,
    /// 30-49%.
    MidpointOnset,
    /// Below 30%.
    RareFlashes,
}

/// `(minimum ratio, band)` in descending order; anything lower is
/// [`BehaviorBand::RareFlashes`].
pub const RATIO_BANDS: &[(u8, BehaviorBand)] = &[
    (70, BehaviorBand::Saturate),
    (50, BehaviorBand::RampUp),
    (30, BehaviorBand::MidpointOnset),
];

impl BehaviorBand {
    pub fn for_ratio(ratio: u8) -> Self {
        RATIO_BANDS
            .iter()
            .find(|(threshold, _)| ratio >= *threshold)
            .map(|(_, band)| *band)
            .unwrap_or(BehaviorBand::RareFlashes)
    }

    pub fn directive(&self) -> &'static str {
        match self {
            BehaviorBand::Saturate => {
                "Maximize the problem behavior throughout the meeting: most utterances should \
                 clearly show it from the opening to the close."
            }
            BehaviorBand::RampUp => {
                "Start from ordinary exchanges and ramp the problem behavior up until it \
                 dominates the second half."
            }
            BehaviorBand::MidpointOnset => {
                "Keep utterances mostly at baseline; from around the midpoint, let the problem \
                 behavior appear occasionally."
            }
            BehaviorBand::RareFlashes => {
                "Keep utterances at baseline with only rare, brief flashes of the problem behavior."
            }
        }
    }
}

//! Per-utterance metric annotation.
//!
//! - [`context`] - the rolling context window
//! - [`annotator`] - the Metric Annotator

pub mod annotator;
pub mod context;

pub use annotator::{AnnotatedUtterance, MetricAnnotator};
pub use context::{RollingContext, CONTEXT_WINDOW};

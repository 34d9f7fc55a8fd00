//! Rolling context window for annotation.

use crate::scenario::Utterance;

/// Number of prior utterances shown to the annotator.
pub const CONTEXT_WINDOW: usize = 5;

/// Rendered in place of context for the first utterance.
pub const MEETING_START_PLACEHOLDER: &str = "(start of the meeting)";

/// Every `"speaker: text"` line seen so far, in speaking order.
///
/// Only the trailing [`CONTEXT_WINDOW`] lines are ever rendered; older lines
/// are dropped from the prompt, not summarized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollingContext {
    lines: Vec<String>,
}

impl RollingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an utterance, returning the extended context.
    pub fn push(mut self, utterance: &Utterance) -> Self {
        self.lines.push(utterance.render());
        self
    }

    /// The trailing window.
    pub fn window(&self) -> &[String] {
        let start = self.lines.len().saturating_sub(CONTEXT_WINDOW);
        &self.lines[start..]
    }

    /// Window text for the prompt, or the placeholder when empty.
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            MEETING_START_PLACEHOLDER.to_string()
        } else {
            self.window().join("\n")
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_of(n: usize) -> RollingContext {
        (1..=n).fold(RollingContext::new(), |ctx, i| {
            ctx.push(&Utterance::new(format!("s{i}"), format!("t{i}")))
        })
    }

    #[test]
    fn test_empty_context_renders_placeholder() {
        assert_eq!(RollingContext::new().render(), MEETING_START_PLACEHOLDER);
    }

    #[test]
    fn test_short_context_renders_everything() {
        assert_eq!(context_of(2).render(), "s1: t1\ns2: t2");
    }

    #[test]
    fn test_window_keeps_last_five() {
        let ctx = context_of(8);
        assert_eq!(ctx.len(), 8);
        assert_eq!(ctx.window(), ["s4: t4", "s5: t5", "s6: t6", "s7: t7", "s8: t8"]);
        assert!(!ctx.render().contains("s3: t3"));
    }
}

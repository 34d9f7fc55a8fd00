//! Persona Formatter: renders participants into a prompt-ready text block.
//!
//! With sanitization enabled, each persona's instructions pass through
//! [`SANITIZE_TABLE`] before rendering. The table softens emotionally charged
//! vocabulary so the generation request is less likely to trip the
//! provider's content policy. Role and stance are never rewritten.

use super::profile::Persona;

/// Ordered `(pattern, replacement)` pairs applied to persona instructions.
///
/// Applied in this order, each pattern replacing all of its non-overlapping,
/// case-sensitive occurrences. Already-substituted text is not rescanned.
pub const SANITIZE_TABLE: &[(&str, &str)] = &[
    ("高圧的", "直接的なコミュニケーションスタイル"),
    ("威圧的", "強いリーダーシップ"),
    ("詰める", "確認する"),
    ("追い込む", "明確化を求める"),
    ("責任追及", "状況確認"),
    ("丸投げ", "委任"),
    ("忖度", "配慮"),
    ("都合の悪い", "困難な"),
    ("せいにする", "について確認する"),
    ("委縮", "慎重"),
    ("しどろもどろ", "丁寧に説明"),
    ("苛立ち", "関心を持ち"),
    ("強い口調", "明確な言葉"),
    ("気が重い", "慎重に検討"),
];

/// Apply [`SANITIZE_TABLE`] to an instructions string.
pub fn sanitize_instructions(instructions: &str) -> String {
    SANITIZE_TABLE
        .iter()
        .fold(instructions.to_string(), |text, (pattern, replacement)| {
            text.replace(pattern, replacement)
        })
}

/// A table entry whose replacement text contains some pattern of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionConflict {
    /// Index of the entry whose replacement contains the pattern.
    pub replacement_index: usize,
    /// Index of the pattern found inside that replacement.
    pub pattern_index: usize,
}

/// List every replacement that contains a pattern of the table.
///
/// A conflict makes sanitization order-dependent (pattern earlier in the
/// table) or non-idempotent (pattern later in the table).
pub fn substitution_conflicts(table: &[(&str, &str)]) -> Vec<SubstitutionConflict> {
    let mut conflicts = Vec::new();
    for (replacement_index, (_, replacement)) in table.iter().enumerate() {
        for (pattern_index, (pattern, _)) in table.iter().enumerate() {
            if replacement.contains(pattern) {
                conflicts.push(SubstitutionConflict {
                    replacement_index,
                    pattern_index,
                });
            }
        }
    }
    conflicts
}

/// Renders personas into one paragraph each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaFormatter {
    pub sanitize: bool,
}

impl Default for PersonaFormatter {
    fn default() -> Self {
        Self { sanitize: true }
    }
}

impl PersonaFormatter {
    pub fn new(sanitize: bool) -> Self {
        Self { sanitize }
    }

    /// Render the personas, in order, separated by blank lines.
    pub fn format(&self, personas: &[Persona]) -> String {
        personas
            .iter()
            .map(|p| self.format_one(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_one(&self, persona: &Persona) -> String {
        let mut text = format!("◆ Character: {}\n", persona.id);
        if let Some(ref profile) = persona.profile {
            text.push_str(&format!("  - Role: {}\n", profile.role()));
            text.push_str(&format!("  - Stance: {}\n", profile.stance()));
            text.push_str(&format!("  - Motivation: {}\n", profile.motivation()));
            text.push_str(&format!("  - Talkativeness: {}\n", profile.talkativeness()));
        }
        if let Some(ref instructions) = persona.instructions {
            let rendered = if self.sanitize {
                sanitize_instructions(instructions)
            } else {
                instructions.clone()
            };
            text.push_str(&format!("  - Behavior pattern: {}\n", rendered));
        }
        text
    }
}

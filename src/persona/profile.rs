//! Participant profiles supplied by the caller.

use serde::{Deserialize, Serialize};

/// Default for motivation / talkativeness when a profile omits them.
pub const DEFAULT_TRAIT_LEVEL: f64 = 0.5;

/// Placeholder rendered for a missing role or stance.
pub const UNKNOWN_FIELD: &str = "unknown";

/// One meeting participant.
///
/// Immutable input; the formatter works on a sanitized copy of the
/// instructions, never on the persona itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name used as the speaker label.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<PersonaProfile>,
    /// Free-form behavior instructions for the character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Persona {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            profile: None,
            instructions: None,
        }
    }

    pub fn with_profile(mut self, profile: PersonaProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Structured traits of a participant.
///
/// Every field is optional in the input files; rendering substitutes
/// [`UNKNOWN_FIELD`] and [`DEFAULT_TRAIT_LEVEL`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<String>,
    /// Drive to participate, in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<f64>,
    /// How often the participant speaks, in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talkativeness: Option<f64>,
}

impl PersonaProfile {
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(UNKNOWN_FIELD)
    }

    pub fn stance(&self) -> &str {
        self.stance.as_deref().unwrap_or(UNKNOWN_FIELD)
    }

    pub fn motivation(&self) -> f64 {
        self.motivation.unwrap_or(DEFAULT_TRAIT_LEVEL)
    }

    pub fn talkativeness(&self) -> f64 {
        self.talkativeness.unwrap_or(DEFAULT_TRAIT_LEVEL)
    }
}

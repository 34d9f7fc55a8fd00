//! Meeting participants and their prompt rendering.
//!
//! - [`profile`] - `Persona` / `PersonaProfile` as read from profile files
//! - [`formatter`] - Persona Formatter with optional instruction sanitization

pub mod formatter;
pub mod profile;

pub use formatter::{sanitize_instructions, PersonaFormatter, SANITIZE_TABLE};
pub use profile::{Persona, PersonaProfile};

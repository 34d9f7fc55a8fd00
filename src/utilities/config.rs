//! Runtime configuration loaded from the environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | OPENAI_API_KEY | (none) | API key for the generative service. |
//! | OPENAI_BASE_URL | https://api.openai.com/v1 | Chat Completions base URL. |
//! | OPENAI_TIMEOUT | 120 | Per-request timeout in seconds. |
//! | SCENARIO_MODEL_NAME | OPENAI_MODEL_NAME, then gpt-4o-mini | Model used for scenario synthesis. |
//! | ANNOTATION_MODEL_NAME | OPENAI_MODEL_NAME, then gpt-4o | Model used for annotation. |
//! | EXTRA_JSON_PATH | data/extra.json | Metric definitions resource. |
//! | PROFILES_DIR | data/profiles | Persona profile files. |
//! | OUTPUTS_DIR | data/outputs | Saved run records. |
//! | SANITIZE_MODE | true | "true" \| "1" \| "yes" enable instruction sanitization. |
//! | HOST / PORT | 0.0.0.0 / 5000 | Server bind address. |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SCENARIO_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANNOTATION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EXTRA_JSON_PATH: &str = "data/extra.json";
pub const DEFAULT_PROFILES_DIR: &str = "data/profiles";
pub const DEFAULT_OUTPUTS_DIR: &str = "data/outputs";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Settings for the pipeline and the HTTP surface around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Never serialized; kept out of run metadata and API responses.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Per-request timeout in seconds; the provider default when unset.
    pub request_timeout_secs: Option<f64>,
    pub scenario_model: String,
    pub annotation_model: String,
    pub extra_json_path: PathBuf,
    pub profiles_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub sanitize_mode: bool,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let shared_model = get("OPENAI_MODEL_NAME");
        let scenario_model = get("SCENARIO_MODEL_NAME")
            .or_else(|| shared_model.clone())
            .unwrap_or_else(|| DEFAULT_SCENARIO_MODEL.to_string());
        let annotation_model = get("ANNOTATION_MODEL_NAME")
            .or(shared_model)
            .unwrap_or_else(|| DEFAULT_ANNOTATION_MODEL.to_string());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("Ignoring invalid PORT value '{}', using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let request_timeout_secs = get("OPENAI_TIMEOUT").and_then(|raw| {
            match raw.trim().parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => Some(secs),
                _ => {
                    log::warn!("Ignoring invalid OPENAI_TIMEOUT value '{}'", raw);
                    None
                }
            }
        });

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            request_timeout_secs,
            scenario_model,
            annotation_model,
            extra_json_path: PathBuf::from(
                get("EXTRA_JSON_PATH").unwrap_or_else(|| DEFAULT_EXTRA_JSON_PATH.to_string()),
            ),
            profiles_dir: PathBuf::from(
                get("PROFILES_DIR").unwrap_or_else(|| DEFAULT_PROFILES_DIR.to_string()),
            ),
            outputs_dir: PathBuf::from(
                get("OUTPUTS_DIR").unwrap_or_else(|| DEFAULT_OUTPUTS_DIR.to_string()),
            ),
            sanitize_mode: get("SANITIZE_MODE").map(|v| parse_flag(&v)).unwrap_or(true),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        }
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `true`, `1` and `yes` (any case) enable a flag; anything else disables it.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings_from(&[]);
        assert_eq!(s.scenario_model, DEFAULT_SCENARIO_MODEL);
        assert_eq!(s.annotation_model, DEFAULT_ANNOTATION_MODEL);
        assert_eq!(s.extra_json_path, PathBuf::from("data/extra.json"));
        assert!(s.sanitize_mode);
        assert_eq!(s.bind_addr(), "0.0.0.0:5000");
        assert!(s.openai_api_key.is_none());
        assert!(s.request_timeout_secs.is_none());
    }

    #[test]
    fn test_request_timeout_parsing() {
        assert_eq!(settings_from(&[("OPENAI_TIMEOUT", "30")]).request_timeout_secs, Some(30.0));
        assert_eq!(settings_from(&[("OPENAI_TIMEOUT", " 2.5 ")]).request_timeout_secs, Some(2.5));
        assert!(settings_from(&[("OPENAI_TIMEOUT", "0")]).request_timeout_secs.is_none());
        assert!(settings_from(&[("OPENAI_TIMEOUT", "-5")]).request_timeout_secs.is_none());
        assert!(settings_from(&[("OPENAI_TIMEOUT", "soon")]).request_timeout_secs.is_none());
    }

    #[test]
    fn test_shared_model_fallback() {
        let s = settings_from(&[("OPENAI_MODEL_NAME", "gpt-4.1")]);
        assert_eq!(s.scenario_model, "gpt-4.1");
        assert_eq!(s.annotation_model, "gpt-4.1");
    }

    #[test]
    fn test_stage_specific_models_win() {
        let s = settings_from(&[
            ("OPENAI_MODEL_NAME", "gpt-4.1"),
            ("SCENARIO_MODEL_NAME", "gpt-4o-mini"),
            ("ANNOTATION_MODEL_NAME", "gpt-4o"),
        ]);
        assert_eq!(s.scenario_model, "gpt-4o-mini");
        assert_eq!(s.annotation_model, "gpt-4o");
    }

    #[test]
    fn test_sanitize_flag_parsing() {
        assert!(settings_from(&[("SANITIZE_MODE", "YES")]).sanitize_mode);
        assert!(settings_from(&[("SANITIZE_MODE", "1")]).sanitize_mode);
        assert!(!settings_from(&[("SANITIZE_MODE", "false")]).sanitize_mode);
        assert!(!settings_from(&[("SANITIZE_MODE", "off")]).sanitize_mode);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let s = settings_from(&[("PORT", "eighty")]);
        assert_eq!(s.port, DEFAULT_PORT);
        let s = settings_from(&[("PORT", "8081"), ("HOST", "127.0.0.1")]);
        assert_eq!(s.bind_addr(), "127.0.0.1:8081");
    }

    #[test]
    fn test_api_key_not_serialized() {
        let s = settings_from(&[("OPENAI_API_KEY", "sk-secret")]);
        assert_eq!(s.openai_api_key.as_deref(), Some("sk-secret"));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}

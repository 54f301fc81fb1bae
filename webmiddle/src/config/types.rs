use crate::context::{options, Options};
use crate::error::EvalResult;
use crate::evaluator::DEFAULT_MAX_STEPS;
use crate::serialization::json_to_value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings file.
///
/// ```toml
/// [evaluation]
/// debug = true
/// max_steps = 5000
///
/// [serialization]
/// max_depth = 3
/// max_string_length = 1000
///
/// [options]
/// userAgent = "webmiddle"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub evaluation: EvaluationSettings,
    pub serialization: SerializationSettings,
    /// Free-form options seeded into every root context.
    pub options: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Record the call tree.
    pub debug: bool,
    /// Upper bound on normalization steps for a single `evaluate`.
    pub max_steps: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            debug: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationSettings {
    pub max_depth: usize,
    pub max_string_length: usize,
}

impl Default for SerializationSettings {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_string_length: 1000,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> EvalResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> EvalResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Options a root context starts from. `debug` is only set when enabled,
    /// so an explicit `[options] debug` still applies otherwise.
    pub fn root_options(&self) -> Options {
        let mut root: Options = self
            .options
            .iter()
            .map(|(key, value)| (key.clone(), json_to_value(value.clone())))
            .collect();
        if self.evaluation.debug {
            root.insert(options::DEBUG, true);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_when_empty() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.evaluation.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(settings.serialization.max_depth, 3);
        assert!(settings.root_options().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[evaluation]
debug = true
max_steps = 50

[serialization]
max_string_length = 20

[options]
retries = 2
userAgent = "webmiddle"
"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.evaluation.max_steps, 50);
        assert_eq!(settings.serialization.max_depth, 3);
        assert_eq!(settings.serialization.max_string_length, 20);

        let root = settings.root_options();
        assert!(root.debug());
        assert_eq!(root.get("retries"), Some(&Value::from(2)));
        assert_eq!(root.get("userAgent"), Some(&Value::from("webmiddle")));
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        let out = Settings::from_toml_str("[evaluation]\nmax_steps = \"many\"");
        assert!(matches!(out, Err(EvalError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = Settings::load(dir.path().join("absent.toml"));
        assert!(matches!(out, Err(EvalError::Config(_))));
    }
}

//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KilnConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates `<project_dir>/kiln.toml`.
pub fn load_config(project_dir: &Path) -> Result<KilnConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<KilnConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks thread budgets, define names, feature families and the compiler command.
fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    if config.compilation.foreground_threads == 0 {
        return Err(ConfigError::Invalid(
            "compilation.foreground_threads must be > 0".to_string(),
        ));
    }
    if config.compilation.background_threads == 0 {
        return Err(ConfigError::Invalid(
            "compilation.background_threads must be > 0".to_string(),
        ));
    }
    if config.watch.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "watch.poll_interval_ms must be > 0".to_string(),
        ));
    }

    for define in &config.defines {
        if define.name.is_empty() {
            return Err(ConfigError::MissingField("defines.name".to_string()));
        }
        if !is_identifier(&define.name) {
            return Err(ConfigError::Invalid(format!(
                "define '{}' is not a valid preprocessor symbol",
                define.name
            )));
        }
    }

    for (name, feature) in &config.features {
        if !is_identifier(&feature.define) {
            return Err(ConfigError::Invalid(format!(
                "feature '{name}' has invalid define '{}'",
                feature.define
            )));
        }
        feature
            .resolved_families()
            .map_err(|e| ConfigError::Invalid(format!("feature '{name}': {e}")))?;
    }

    if let Some(compiler) = &config.compiler {
        if compiler.program.trim().is_empty() {
            return Err(ConfigError::MissingField("compiler.program".to_string()));
        }
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

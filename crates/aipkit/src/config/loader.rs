use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "AIPKIT_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: Config = serde_json::from_value(json_value)?;
    config.tools.assign_names();

    validate_config(&config)?;

    Ok(config)
}

/// Resolves the config file location: explicit path, then `AIPKIT_CONFIG`,
/// then `<platform config dir>/aipkit/config.json` if it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(from_env) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(from_env));
    }

    dirs::config_dir()
        .map(|dir| dir.join("aipkit").join("config.json"))
        .filter(|path| path.is_file())
        .ok_or(ConfigError::NotFound)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let code_pattern = Regex::new(r"^[a-z0-9_-]+$").map_err(|e| ConfigError::Validation {
        message: e.to_string(),
    })?;

    let mut seen = HashSet::new();
    for department in &config.departments {
        if !code_pattern.is_match(department) {
            return Err(ConfigError::Validation {
                message: format!(
                    "Department code '{}' must be lowercase letters, digits, '-' or '_'",
                    department
                ),
            });
        }
        if !seen.insert(department.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate department code: {}", department),
            });
        }
    }

    for rule in &config.metadata_rules {
        if !seen.contains(rule.department.as_str()) {
            return Err(ConfigError::Validation {
                message: format!(
                    "Metadata rule for '{}' names an unknown department",
                    rule.department
                ),
            });
        }
    }

    if config.workers == 0 {
        return Err(ConfigError::Validation {
            message: "workers must be at least 1".to_string(),
        });
    }

    for tool in config.tools.all() {
        if tool.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: format!("Timeout for {} must be at least one second", tool.name),
            });
        }
    }

    Ok(())
}

impl Config {
    /// Lists configured resources that are not usable on this machine:
    /// stylesheets and schema that do not exist, and programs that are
    /// neither an existing path nor found on `PATH`.
    pub fn check_resources(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let files = [
            ("cleanup stylesheet", &self.stylesheets.cleanup),
            ("single-file stylesheet", &self.stylesheets.single_file),
            ("multi-file stylesheet", &self.stylesheets.multi_file),
            ("preservation schema", &self.schema),
        ];
        for (label, path) in files {
            if !path.is_file() {
                problems.push(format!("{} not found: {}", label, path.display()));
            }
        }

        for tool in self.tools.all() {
            let found = if tool.program.components().count() > 1 {
                tool.program.is_file()
            } else {
                which::which(&tool.program).is_ok()
            };
            if !found {
                problems.push(format!(
                    "{} program not found: {}",
                    tool.name,
                    tool.program.display()
                ));
            }
        }

        problems
    }
}

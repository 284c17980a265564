//! Configuration file loading and parsing.

use crate::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// Loads and validates `.deliberator/config.yaml` relative to a project directory.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from `.deliberator/config.yaml`, or the all-defaults
    /// config when the file is absent. Either way, `${VAR}`/`${VAR:-default}`
    /// and `~` references in the result are expanded — a missing file is
    /// equivalent to an all-defaults config only once its own `${VAR}`
    /// templates (e.g. `db_path`, `transcripts.dir`) have gone through the
    /// same expansion a present file would.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config_path = self.base_path.join(".deliberator/config.yaml");

        let contents = if config_path.exists() {
            std::fs::read_to_string(&config_path)?
        } else {
            serde_yaml::to_string(&Config::default()).map_err(|e| ConfigError::ParseError {
                line: None,
                message: e.to_string(),
            })?
        };

        let expanded = self.expand_vars(&contents)?;

        let config: Config = serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        self.validate(&config)?;
        Ok(config)
    }

    /// Expand `${VAR}` / `${VAR:-default}` env references and a leading `~`.
    fn expand_vars(&self, content: &str) -> Result<String, ConfigError> {
        let env_expanded = self.expand_env_vars(content)?;
        Ok(expand_tilde(&env_expanded))
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();

        for cap in re.captures_iter(content) {
            let full_match = cap.get(0).unwrap().as_str();
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    /// Validate numeric/range invariants across the config tree.
    fn validate(&self, config: &Config) -> Result<(), ConfigError> {
        let tb = &config.decision_graph.tier_boundaries;
        if !(0.0 < tb.moderate && tb.moderate < tb.strong && tb.strong <= 1.0) {
            return Err(ConfigError::Validation {
                message: "decision_graph.tier_boundaries must satisfy 0 < moderate < strong <= 1"
                    .to_string(),
            });
        }

        let es = &config.deliberation.early_stopping;
        if !(0.0..=1.0).contains(&es.threshold) {
            return Err(ConfigError::Validation {
                message: "deliberation.early_stopping.threshold must be in [0, 1]".to_string(),
            });
        }

        let cd = &config.deliberation.convergence_detection;
        for (name, value) in [
            ("semantic_similarity_threshold", cd.semantic_similarity_threshold),
            ("divergence_threshold", cd.divergence_threshold),
            ("stance_stability_threshold", cd.stance_stability_threshold),
            ("response_length_drop_threshold", cd.response_length_drop_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation {
                    message: format!(
                        "deliberation.convergence_detection.{name} must be in [0, 1]"
                    ),
                });
            }
        }

        if config.decision_graph.query_window == 0 {
            return Err(ConfigError::Validation {
                message: "decision_graph.query_window must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(".deliberator");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.yaml");
        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// Expand a leading `~` or `~/` into the user's home directory.
fn expand_tilde(content: &str) -> String {
    let Some(home) = dirs_home() else {
        return content.to_string();
    };
    let mut result = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if let Some(idx) = line.find('~') {
            let follows_boundary = idx == 0
                || matches!(line.as_bytes()[idx - 1], b' ' | b':' | b'"' | b'\'' | b'/');
            let next_is_slash_or_end = line[idx + 1..].starts_with('/') || line[idx + 1..].trim_end().is_empty();
            if follows_boundary && next_is_slash_or_end {
                result.push_str(&line[..idx]);
                result.push_str(&home);
                result.push_str(&line[idx + 1..]);
                continue;
            }
        }
        result.push_str(line);
    }
    result
}

fn dirs_home() -> Option<String> {
    std::env::var("HOME").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert!(config.decision_graph.enabled);
        assert_eq!(config.decision_graph.query_window, 1000);
    }

    #[test]
    fn defaults_have_their_env_var_templates_expanded_even_without_a_file() {
        std::env::remove_var("DELIBERATOR_DATA_DIR");
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.decision_graph.db_path, ".deliberator/decisions.db");
        assert_eq!(config.transcripts.dir, ".deliberator/transcripts");
    }

    #[test]
    fn defaults_honor_an_env_var_override_even_without_a_file() {
        std::env::set_var("DELIBERATOR_DATA_DIR", "/tmp/custom-data-dir");
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.decision_graph.db_path, "/tmp/custom-data-dir/decisions.db");
        std::env::remove_var("DELIBERATOR_DATA_DIR");
    }

    #[test]
    fn load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        let cfg_dir = dir.path().join(".deliberator");
        fs::create_dir_all(&cfg_dir).unwrap();

        let config_content = r#"
backends:
  claude:
    type: cli
    command: claude
    args: ["-p", "{prompt}"]
    timeout_secs: 90
deliberation:
  early_stopping:
    threshold: 0.75
decision_graph:
  query_window: 500
"#;
        fs::write(cfg_dir.join("config.yaml"), config_content).unwrap();

        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.deliberation.early_stopping.threshold, 0.75);
        assert_eq!(config.decision_graph.query_window, 500);
        assert!(config.deliberation.convergence_detection.enabled);
    }

    #[test]
    fn env_var_expansion_with_default() {
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("key: ${NONEXISTENT:-default}").unwrap();
        assert_eq!(result, "key: default");
    }

    #[test]
    fn env_var_missing_is_an_error() {
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("key: ${MISSING_VAR}");
        assert!(result.is_err());
        match result.unwrap_err() {
            ConfigError::EnvVarNotFound { var } => assert_eq!(var, "MISSING_VAR"),
            _ => panic!("expected EnvVarNotFound"),
        }
    }

    #[test]
    fn tilde_expands_to_home() {
        std::env::set_var("HOME", "/home/tester");
        let expanded = expand_tilde("db_path: ~/decisions.db");
        assert_eq!(expanded, "db_path: /home/tester/decisions.db");
    }

    #[test]
    fn tier_boundary_validation_rejects_inverted_bounds() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let mut config = Config::default();
        config.decision_graph.tier_boundaries.strong = 0.5;
        config.decision_graph.tier_boundaries.moderate = 0.6;
        let result = loader.validate(&config);
        assert!(result.is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let mut config = Config::default();
        config.decision_graph.query_window = 42;

        loader.save(&config).unwrap();
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.decision_graph.query_window, 42);
    }
}

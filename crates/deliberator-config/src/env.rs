//! Environment variable handling.

use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    // API keys, looked up per-backend-id through `ApiKeys`.
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";

    // Configuration
    pub const DELIBERATOR_CONFIG_PATH: &str = "DELIBERATOR_CONFIG_PATH";
    pub const DELIBERATOR_LOG_LEVEL: &str = "DELIBERATOR_LOG_LEVEL";
    pub const DELIBERATOR_LOG_FORMAT: &str = "DELIBERATOR_LOG_FORMAT";
    pub const DELIBERATOR_DATA_DIR: &str = "DELIBERATOR_DATA_DIR";

    pub const NODE_ENV: &str = "NODE_ENV";
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Environment initialization and typed accessors.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Load `.env` files in order (later files override earlier ones).
    pub fn init() -> Result<Self, EnvError> {
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::NODE_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: "expected integer".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }
}

/// API key lookup keyed by backend id, per the config's `backends.<id>` map.
///
/// A backend-id string is matched by provider family so `claude`, `anthropic-opus`,
/// etc. all resolve against `ANTHROPIC_API_KEY`. Backends that don't match a known
/// family (e.g. a bespoke HTTP gateway) carry their key directly in config instead.
pub struct ApiKeys;

impl ApiKeys {
    pub fn anthropic() -> Option<String> {
        Environment::get(vars::ANTHROPIC_API_KEY)
    }

    pub fn openai() -> Option<String> {
        Environment::get(vars::OPENAI_API_KEY)
    }

    pub fn google() -> Option<String> {
        Environment::get(vars::GOOGLE_API_KEY)
    }

    pub fn openrouter() -> Option<String> {
        Environment::get(vars::OPENROUTER_API_KEY)
    }

    /// Resolve an API key for a backend id by provider-family prefix match.
    /// Returns `None` when the backend is unauthenticated (e.g. a local CLI) or
    /// carries its key directly in config — never an error, per §4.1's "missing
    /// optional API keys produce a request without an authorization header".
    pub fn for_backend(backend_id: &str) -> Option<String> {
        let id = backend_id.to_lowercase();
        if id.contains("claude") || id.contains("anthropic") {
            Self::anthropic()
        } else if id.contains("gpt") || id.contains("openai") || id.contains("codex") {
            Self::openai()
        } else if id.contains("gemini") || id.contains("google") {
            Self::google()
        } else if id.contains("openrouter") || id.contains("gateway") {
            Self::openrouter()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_falls_back_to_default() {
        let val = Environment::get_or("NONEXISTENT_VAR_12345", "default");
        assert_eq!(val, "default");
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_forms() {
        env::set_var("TEST_DELIBERATOR_BOOL", "true");
        assert_eq!(Environment::get_bool("TEST_DELIBERATOR_BOOL"), Some(true));
        env::set_var("TEST_DELIBERATOR_BOOL", "1");
        assert_eq!(Environment::get_bool("TEST_DELIBERATOR_BOOL"), Some(true));
        env::set_var("TEST_DELIBERATOR_BOOL", "false");
        assert_eq!(Environment::get_bool("TEST_DELIBERATOR_BOOL"), Some(false));
        env::remove_var("TEST_DELIBERATOR_BOOL");
    }

    #[test]
    fn api_key_backend_family_matching() {
        env::set_var(vars::ANTHROPIC_API_KEY, "test-claude-key");
        env::set_var(vars::OPENAI_API_KEY, "test-openai-key");
        env::set_var(vars::OPENROUTER_API_KEY, "test-router-key");

        assert_eq!(ApiKeys::for_backend("claude"), Some("test-claude-key".to_string()));
        assert_eq!(ApiKeys::for_backend("anthropic-opus"), Some("test-claude-key".to_string()));
        assert_eq!(ApiKeys::for_backend("codex"), Some("test-openai-key".to_string()));
        assert_eq!(ApiKeys::for_backend("gateway-gpt4"), Some("test-router-key".to_string()));
        assert_eq!(ApiKeys::for_backend("local-llamacpp"), None);

        env::remove_var(vars::ANTHROPIC_API_KEY);
        env::remove_var(vars::OPENAI_API_KEY);
        env::remove_var(vars::OPENROUTER_API_KEY);
    }

    #[test]
    fn integer_parsing_rejects_non_numeric() {
        env::set_var("TEST_DELIBERATOR_INT", "42");
        let val: Result<Option<i32>, _> = Environment::get_int("TEST_DELIBERATOR_INT");
        assert_eq!(val.unwrap(), Some(42));

        env::set_var("TEST_DELIBERATOR_INT", "invalid");
        let val: Result<Option<i32>, _> = Environment::get_int("TEST_DELIBERATOR_INT");
        assert!(val.is_err());

        env::remove_var("TEST_DELIBERATOR_INT");
        let val: Result<Option<i32>, _> = Environment::get_int("TEST_DELIBERATOR_INT");
        assert_eq!(val.unwrap(), None);
    }

    #[test]
    fn init_succeeds_without_env_files_present() {
        let result = Environment::init();
        assert!(result.is_ok());
    }
}

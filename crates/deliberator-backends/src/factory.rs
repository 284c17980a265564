//! Startup wiring: resolves each configured backend into a concrete adapter
//! via a deterministic `(configured backend, CLI available?, API key present?)`
//! decision table, rather than a dynamic try-one-then-another preference chain.

use crate::error::{BackendError, BackendResult};
use crate::http::HttpAdapter;
use crate::invoke::{Invoke, InvokeRequest};
use crate::subprocess::SubprocessAdapter;
use async_trait::async_trait;
use deliberator_config::{ApiKeys, BackendConfig, Config};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Known CLI-command-to-gateway-model fallbacks, consulted when a configured
/// CLI backend's command isn't found on `PATH`.
struct FallbackEntry {
    cli_prefix: &'static str,
    gateway_model: &'static str,
}

const FALLBACK_TABLE: &[FallbackEntry] = &[
    FallbackEntry { cli_prefix: "claude", gateway_model: "anthropic/claude-3.5-sonnet" },
    FallbackEntry { cli_prefix: "codex", gateway_model: "openai/gpt-4o" },
    FallbackEntry { cli_prefix: "gemini", gateway_model: "google/gemini-1.5-pro" },
];

fn fallback_model_for(command: &str) -> Option<&'static str> {
    FALLBACK_TABLE.iter().find(|entry| command.contains(entry.cli_prefix)).map(|entry| entry.gateway_model)
}

static PATH_CACHE: OnceLock<Mutex<HashMap<String, bool>>> = OnceLock::new();

/// Cached `PATH` lookup for a command's presence, per the spec's "startup probe
/// (via PATH lookup, cached)".
pub fn command_on_path(command: &str) -> bool {
    let cache = PATH_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Some(&hit) = cache.lock().expect("lock poisoned").get(command) {
        return hit;
    }
    let found = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(command))))
        .unwrap_or(false);
    cache.lock().expect("lock poisoned").insert(command.to_string(), found);
    found
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Either concrete adapter, dispatched uniformly through `Invoke`.
pub enum ResolvedAdapter {
    Subprocess(SubprocessAdapter),
    Http(HttpAdapter),
    HttpFallback(HttpAdapter),
}

impl ResolvedAdapter {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Subprocess(_) => "subprocess",
            Self::Http(_) => "http",
            Self::HttpFallback(_) => "http (cli fallback)",
        }
    }
}

#[async_trait]
impl Invoke for ResolvedAdapter {
    async fn invoke(&self, request: &InvokeRequest) -> BackendResult<String> {
        match self {
            Self::Subprocess(adapter) => adapter.invoke(request).await,
            Self::Http(adapter) | Self::HttpFallback(adapter) => adapter.invoke(request).await,
        }
    }
}

/// Resolve one backend config entry into a concrete adapter, given an optional
/// `(gateway_id, gateway_config)` to fall back to when a CLI command is absent.
pub fn build_adapter(backend_id: &str, config: &BackendConfig, gateway: Option<(&str, &BackendConfig)>) -> BackendResult<ResolvedAdapter> {
    match config {
        BackendConfig::Cli { command, args, timeout_secs } => {
            if command_on_path(command) {
                tracing::info!(backend_id, command, "backend resolution: cli (available on PATH)");
                return Ok(ResolvedAdapter::Subprocess(SubprocessAdapter::new(
                    backend_id.to_string(),
                    command.clone(),
                    args.clone(),
                    Duration::from_secs(*timeout_secs),
                )));
            }

            let fallback_model = fallback_model_for(command).ok_or_else(|| BackendError::NoFallback { backend_id: backend_id.to_string() })?;
            let (gateway_id, gateway_config) = gateway.ok_or_else(|| BackendError::NoFallback { backend_id: backend_id.to_string() })?;
            let BackendConfig::Http { base_url, api_key, timeout_secs, max_retries } = gateway_config else {
                return Err(BackendError::NoFallback { backend_id: backend_id.to_string() });
            };
            let key = api_key.clone().or_else(|| ApiKeys::for_backend(gateway_id));
            if key.is_none() {
                return Err(BackendError::NoFallback { backend_id: backend_id.to_string() });
            }

            tracing::info!(
                backend_id, command, fallback_model, gateway = gateway_id,
                "backend resolution: cli unavailable, falling back to http gateway"
            );
            Ok(ResolvedAdapter::HttpFallback(
                HttpAdapter::new(backend_id.to_string(), base_url.clone(), key, Duration::from_secs(*timeout_secs), *max_retries)
                    .with_model_override(fallback_model.to_string()),
            ))
        }
        BackendConfig::Http { base_url, api_key, timeout_secs, max_retries } => {
            let key = api_key.clone().or_else(|| ApiKeys::for_backend(backend_id));
            tracing::info!(backend_id, has_key = key.is_some(), "backend resolution: http");
            Ok(ResolvedAdapter::Http(HttpAdapter::new(backend_id.to_string(), base_url.clone(), key, Duration::from_secs(*timeout_secs), *max_retries)))
        }
    }
}

/// All backend adapters resolved once at startup, per the deterministic
/// decision table: `(configured backend, CLI available?, API key present?) →
/// concrete adapter`.
pub struct BackendRegistry {
    adapters: HashMap<String, ResolvedAdapter>,
}

impl BackendRegistry {
    pub fn from_config(config: &Config) -> BackendResult<Self> {
        let gateway = config
            .backends
            .iter()
            .find(|(id, cfg)| matches!(cfg, BackendConfig::Http { .. }) && id.to_lowercase().contains("gateway"));

        let mut adapters = HashMap::new();
        let mut table = Vec::new();
        for (id, cfg) in &config.backends {
            let gw = gateway.map(|(gid, gcfg)| (gid.as_str(), gcfg));
            let resolved = build_adapter(id, cfg, gw)?;
            table.push(format!("{id} -> {}", resolved.kind_name()));
            adapters.insert(id.clone(), resolved);
        }
        tracing::info!(resolution_table = ?table, "backend adapters resolved");

        Ok(Self { adapters })
    }

    pub fn get(&self, backend_id: &str) -> Option<&ResolvedAdapter> {
        self.adapters.get(backend_id)
    }

    pub fn backend_ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn command_on_path_finds_a_real_binary() {
        assert!(command_on_path("sh"));
    }

    #[test]
    fn command_on_path_rejects_a_bogus_name() {
        assert!(!command_on_path("definitely-not-a-real-command-xyz"));
    }

    #[test]
    fn cli_with_no_fallback_entry_and_missing_binary_fails_clearly() {
        let config = BackendConfig::Cli { command: "definitely-not-a-real-command-xyz".to_string(), args: vec![], timeout_secs: 30 };
        let result = build_adapter("mystery", &config, None);
        assert!(matches!(result, Err(BackendError::NoFallback { .. })));
    }

    #[test]
    fn cli_backend_with_known_fallback_but_no_gateway_fails_clearly() {
        let config = BackendConfig::Cli { command: "claude".to_string(), args: vec![], timeout_secs: 30 };
        // "claude" may or may not be on this machine's PATH; force the no-gateway path
        // by asserting only when it's genuinely absent, otherwise this just resolves.
        if !command_on_path("claude") {
            let result = build_adapter("claude-main", &config, None);
            assert!(matches!(result, Err(BackendError::NoFallback { .. })));
        }
    }

    #[test]
    fn http_backend_resolves_without_a_configured_key() {
        let config = BackendConfig::Http { base_url: "https://example.test".to_string(), api_key: None, timeout_secs: 30, max_retries: 1 };
        let resolved = build_adapter("bespoke", &config, None).unwrap();
        assert_eq!(resolved.kind_name(), "http");
    }

    #[test]
    fn registry_resolves_every_configured_backend() {
        let mut backends = Map::new();
        backends.insert("bespoke".to_string(), BackendConfig::Http { base_url: "https://example.test".to_string(), api_key: Some("k".to_string()), timeout_secs: 30, max_retries: 1 });
        let config = Config { backends, ..Default::default() };
        let registry = BackendRegistry::from_config(&config).unwrap();
        assert!(registry.get("bespoke").is_some());
        assert_eq!(registry.backend_ids().count(), 1);
    }
}

//! Provider configuration and credential resolution (spec §6).

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::LlmError;
use crate::options::CompletionOptions;

/// Base URL and auth-header style for a provider family.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub auth_style: AuthStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `x-api-key: <key>`.
    ApiKeyHeader,
}

fn default_base_url(provider: &str) -> &'static str {
    match provider {
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com",
        "groq" => "https://api.groq.com/openai/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "xai" => "https://api.x.ai/v1",
        _ => "https://api.openai.com/v1",
    }
}

fn default_auth_style(provider: &str) -> AuthStyle {
    match provider {
        "anthropic" => AuthStyle::ApiKeyHeader,
        _ => AuthStyle::Bearer,
    }
}

impl ProviderConfig {
    pub fn for_provider(provider: &str, base_url_override: Option<String>) -> Self {
        Self {
            name: provider.to_string(),
            base_url: base_url_override.unwrap_or_else(|| default_base_url(provider).to_string()),
            auth_style: default_auth_style(provider),
        }
    }

    /// Builds the single auth header this provider's family expects.
    pub fn auth_header(&self, api_key: &str) -> (&'static str, String) {
        match self.auth_style {
            AuthStyle::Bearer => ("authorization", format!("Bearer {}", api_key)),
            AuthStyle::ApiKeyHeader => ("x-api-key", api_key.to_string()),
        }
    }
}

/// Process-wide credential store; writing to it is an explicit operation
/// distinct from reading the environment (spec §6 "Credential resolution").
fn process_config() -> &'static Mutex<HashMap<String, String>> {
    static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Sets `<provider>_api_key` in the process configuration.
pub fn set_credential(provider: &str, api_key: impl Into<String>) {
    if let Ok(mut store) = process_config().lock() {
        store.insert(format!("{}_api_key", provider), api_key.into());
    }
}

fn env_key_name(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

/// Resolves an API key by precedence: per-request option → process
/// configuration entry → environment variable. Absence is a fatal
/// configuration error (spec §6).
pub fn resolve_api_key(provider: &str, opts: &CompletionOptions) -> Result<String, LlmError> {
    if let Some(key) = &opts.api_key {
        return Ok(key.clone());
    }
    if let Ok(store) = process_config().lock() {
        if let Some(key) = store.get(&format!("{}_api_key", provider)) {
            return Ok(key.clone());
        }
    }
    if let Ok(key) = std::env::var(env_key_name(provider)) {
        return Ok(key);
    }
    Err(LlmError::ConfigError(format!(
        "no API key found for provider '{}': set opts.api_key, process config, or {}",
        provider,
        env_key_name(provider)
    )))
}

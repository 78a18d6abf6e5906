//! OpenAI-compatible chat client configuration.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for LLM API requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Per-request LLM endpoint configuration.
///
/// Resolved once per HTTP request from the process defaults shadowed by
/// header overrides; never written back to shared settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub base_url: String,
    /// API key for the endpoint.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Create a chat client for the given endpoint configuration.
///
/// Uses a 2-minute timeout by default to prevent hung API calls.
pub fn create_client(config: &LlmConfig) -> Client<OpenAIConfig> {
    create_client_with_timeout(config, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a chat client with a custom timeout.
pub fn create_client_with_timeout(config: &LlmConfig, timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    let openai_config = OpenAIConfig::new()
        .with_api_base(config.base_url.as_str())
        .with_api_key(config.api_key.as_str());

    Client::with_config(openai_config).with_http_client(http_client)
}

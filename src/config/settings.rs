//! Configuration settings for Lekse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub canvas: CanvasSettings,
    pub agent: AgentSettings,
}


/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Directory with the static frontend, served when present.
    pub frontend_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            frontend_dir: "frontend".to_string(),
        }
    }
}

/// LLM endpoint settings.
///
/// Base URL and key have no sensible defaults; they come from the config
/// file, the environment, or per-request headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat-completions base URL (OpenAI-compatible).
    pub base_url: Option<String>,
    /// API key for the LLM endpoint.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Canvas LMS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct CanvasSettings {
    /// Canvas instance base URL, e.g. https://your-school.instructure.com
    pub base_url: Option<String>,
}


/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum reasoning iterations per chat request.
    pub max_iterations: usize,
    /// Log intermediate prompts and tool traces.
    pub verbose: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment variables take precedence over file values.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env();
        Ok(settings)
    }

    /// Shadow file values with environment variables where set.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            if !v.is_empty() {
                self.llm.base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            if !v.is_empty() {
                self.llm.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            if !v.is_empty() {
                self.llm.model = v;
            }
        }
        if let Ok(v) = std::env::var("CANVAS_BASE_URL") {
            if !v.is_empty() {
                self.canvas.base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("AGENT_VERBOSE") {
            self.agent.verbose = parse_flag(&v);
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LekseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lekse")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded frontend directory path.
    pub fn frontend_dir(&self) -> PathBuf {
        Self::expand_path(&self.server.frontend_dir)
    }
}

/// Parse a boolean flag the way env vars and headers spell it.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

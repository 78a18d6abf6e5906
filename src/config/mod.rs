//! Configuration module for Lekse.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    parse_flag, AgentSettings, CanvasSettings, LlmSettings, ServerSettings, Settings,
};

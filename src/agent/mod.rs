//! LLM agent with Canvas query tools.
//!
//! Binds the Canvas tool set to an OpenAI-compatible chat model and runs a
//! bounded tool-calling loop per incoming chat message. The caller's Canvas
//! token stays inside the tool context; the model only ever selects tool
//! names and non-secret arguments.

mod runner;
mod tools;

pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{parse_tool_call, tool_definitions, ToolCall, ToolContext};

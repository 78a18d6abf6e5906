//! Lekse - Canvas LMS Chat Assistant Backend
//!
//! A thin web backend that answers natural-language questions about Canvas
//! courses, upcoming deadlines and announcements through an LLM agent.
//!
//! The name "Lekse" comes from the Norwegian word for "homework."
//!
//! # Overview
//!
//! Lekse exposes three HTTP endpoints:
//!
//! - `POST /api/chat` - answer a question using the agent and Canvas tools
//! - `POST /api/tool_test` - invoke one Canvas tool directly, bypassing the agent
//! - `GET /api/health` - liveness check
//!
//! The caller supplies a Canvas API token with every request; the backend
//! holds it only for the lifetime of that request and never logs it.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `canvas` - Canvas REST API client
//! - `agent` - LLM agent with Canvas query tools
//! - `openai` - Chat client construction
//! - `cli` - Command-line interface and HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use lekse::agent::{ToolCall, ToolContext};
//! use lekse::canvas::CanvasClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CanvasClient::new("https://school.instructure.com", "token", "req-1")?;
//!     let tools = ToolContext::new(Arc::new(client), "req-1");
//!
//!     let summary = tools.execute(&ToolCall::GetUpcomingAssignments).await?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod canvas;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;

pub use error::{LekseError, Result};

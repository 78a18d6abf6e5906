//! Agent runner with tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::error::{LekseError, Result};
use crate::openai::{create_client, LlmConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use tracing::{debug, info};

/// Default system prompt for the agent.
const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an assistant for the Canvas learning platform.

Guidelines:
- When the user asks about assignments, homework or deadlines, call 'get_upcoming_assignments'
- When the user asks for their course list, or a course reference is unclear, call 'list_my_courses'
- When the user asks about announcements or notices, call 'get_announcements' (with or without course_name)
- Summarize the structured lists the tools return, keeping dates, course names and assignment or announcement titles
- Answer concisely, in the language the user wrote in"#;

/// Default bound on the reasoning loop.
const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Agent that answers one Canvas question per run using the query tools.
pub struct Agent {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    tools: ToolContext,
    max_iterations: usize,
    system_prompt: String,
    verbose: bool,
}

impl Agent {
    /// Create a new agent over the given tool context and LLM endpoint.
    pub fn new(tools: ToolContext, llm: &LlmConfig) -> Self {
        Self {
            client: create_client(llm),
            model: llm.model.clone(),
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            verbose: false,
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Log intermediate prompts and tool traces at info level.
    ///
    /// Only changes what is logged, never the returned content.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the agent for one user message.
    pub async fn run(&self, message: &str) -> Result<AgentResponse> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| LekseError::Agent(e.to_string()))?
                .into(),
        ];

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()
                .map_err(|e| LekseError::Agent(e.to_string()))?
                .into(),
        );

        if self.verbose {
            info!(model = %self.model, "agent start: {}", truncate_for_log(message, 200));
        }

        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(LekseError::Agent(format!(
                    "Agent did not converge within {} iterations",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            // Call LLM with tools
            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages.clone())
                .tools(tool_definitions())
                .build()
                .map_err(|e| LekseError::Agent(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(map_llm_error)?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| LekseError::Agent("No response from model".to_string()))?;

            // Check if the model wants to call tools
            if let Some(ref tool_calls) = choice.message.tool_calls {
                if tool_calls.is_empty() {
                    return self.build_response(&choice.message.content, tool_calls_made, iterations);
                }

                // Add assistant message with tool calls to history
                let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()
                    .map_err(|e| LekseError::Agent(e.to_string()))?;
                messages.push(assistant_msg.into());

                // Execute each tool call; Canvas failures abort the run
                for tool_call in tool_calls {
                    let record = self.execute_tool_call(tool_call).await?;

                    let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(&tool_call.id)
                        .content(record.result.clone())
                        .build()
                        .map_err(|e| LekseError::Agent(e.to_string()))?;
                    messages.push(tool_msg.into());

                    tool_calls_made.push(record);
                }
            } else {
                // No tool calls - the model is done, return final response
                return self.build_response(&choice.message.content, tool_calls_made, iterations);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    ///
    /// Arguments the model got wrong are fed back as text so it can correct
    /// itself within the iteration bound; Canvas failures propagate.
    async fn execute_tool_call(
        &self,
        tool_call: &ChatCompletionMessageToolCall,
    ) -> Result<ToolCallRecord> {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        if self.verbose {
            info!("Agent calling tool: {} with args: {}", name, arguments);
        } else {
            debug!("Agent calling tool: {} with args: {}", name, arguments);
        }

        let result = match parse_tool_call(name, arguments) {
            Ok(tool) => self.tools.execute(&tool).await?,
            Err(e) => format!("Tool call could not be parsed: {}", e),
        };

        if self.verbose {
            info!("Tool {} returned: {}", name, truncate_for_log(&result, 200));
        }

        Ok(ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        })
    }

    /// Build the final agent response.
    fn build_response(
        &self,
        content: &Option<String>,
        tool_calls: Vec<ToolCallRecord>,
        iterations: usize,
    ) -> Result<AgentResponse> {
        let content = content.clone().unwrap_or_default();

        if self.verbose {
            info!(iterations, "agent finish: {}", truncate_for_log(&content, 200));
        }

        Ok(AgentResponse {
            content,
            tool_calls,
            iterations,
        })
    }
}

/// Classify an LLM client failure into the error taxonomy.
fn map_llm_error(err: OpenAIError) -> LekseError {
    match err {
        OpenAIError::Reqwest(e) if e.is_timeout() => {
            LekseError::Timeout("LLM request timed out".to_string())
        }
        OpenAIError::Reqwest(e) => LekseError::Upstream(format!("LLM request failed: {}", e)),
        OpenAIError::ApiError(api) => {
            let is_auth = api.code.as_deref() == Some("invalid_api_key")
                || api.r#type.as_deref() == Some("authentication_error");
            if is_auth {
                LekseError::Auth(format!("LLM API rejected the key: {}", api.message))
            } else {
                LekseError::Upstream(format!("LLM API error: {}", api.message))
            }
        }
        other => LekseError::Agent(format!("LLM client error: {}", other)),
    }
}

/// Truncate long text for log lines.
fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "get_announcements".to_string(),
            arguments: r#"{"course_name": "CS101"}"#.to_string(),
            result: "[CS101] Lab moved".to_string(),
        };
        assert_eq!(
            format!("{}", record),
            r#"get_announcements({"course_name": "CS101"})"#
        );
    }

    #[test]
    fn test_map_llm_error_auth() {
        let api = async_openai::error::ApiError {
            message: "Incorrect API key provided".to_string(),
            r#type: Some("invalid_request_error".to_string()),
            param: None,
            code: Some("invalid_api_key".to_string()),
        };
        let mapped = map_llm_error(OpenAIError::ApiError(api));
        assert!(matches!(mapped, LekseError::Auth(_)));
    }

    #[test]
    fn test_map_llm_error_generic_api_failure() {
        let api = async_openai::error::ApiError {
            message: "The server is overloaded".to_string(),
            r#type: Some("server_error".to_string()),
            param: None,
            code: None,
        };
        let mapped = map_llm_error(OpenAIError::ApiError(api));
        assert!(matches!(mapped, LekseError::Upstream(_)));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("0123456789abc", 10), "0123456789...");
    }
}

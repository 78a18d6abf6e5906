//! Tool definitions and implementations for the Canvas agent.

use crate::canvas::{CanvasApi, Course};
use crate::error::{LekseError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

/// Number of announcements returned by one query, newest first.
pub const MAX_ANNOUNCEMENTS: usize = 5;

/// Announcement body length after HTML stripping.
const BODY_PREVIEW_CHARS: usize = 240;

/// Available tools for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// List the caller's active courses.
    ListMyCourses,

    /// List assignments that are not yet due, earliest deadline first.
    GetUpcomingAssignments,

    /// Fetch recent announcements, optionally scoped to one course.
    GetAnnouncements { course_name: Option<String> },
}

impl ToolCall {
    /// Tool name as exposed to the model.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListMyCourses => "list_my_courses",
            ToolCall::GetUpcomingAssignments => "get_upcoming_assignments",
            ToolCall::GetAnnouncements { .. } => "get_announcements",
        }
    }
}

/// Tool execution context holding the per-request Canvas client.
///
/// The Canvas token lives inside the client behind the [`CanvasApi`] seam;
/// tool arguments coming from the model never carry it.
pub struct ToolContext {
    canvas: Arc<dyn CanvasApi>,
    request_id: String,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(canvas: Arc<dyn CanvasApi>, request_id: &str) -> Self {
        Self {
            canvas,
            request_id: request_id.to_string(),
        }
    }

    /// Execute a tool call and return the result as a text block.
    ///
    /// "No data" is always a descriptive success message; only transport,
    /// authentication and parse failures come back as errors.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        let name = tool.name();
        let start = Instant::now();
        debug!(tool = name, request_id = %self.request_id, "tool start");

        let result = match tool {
            ToolCall::ListMyCourses => self.list_my_courses().await,
            ToolCall::GetUpcomingAssignments => self.upcoming_assignments().await,
            ToolCall::GetAnnouncements { course_name } => {
                self.announcements(course_name.as_deref()).await
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(tool = name, elapsed_ms, request_id = %self.request_id, "tool end"),
            Err(e) => {
                debug!(tool = name, elapsed_ms, error = %e, request_id = %self.request_id, "tool failed")
            }
        }

        result
    }

    async fn list_my_courses(&self) -> Result<String> {
        let mut courses = self.canvas.get_courses().await?;

        if courses.is_empty() {
            return Ok("No active courses found.".to_string());
        }

        courses.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let lines = courses
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {} (id {})", i + 1, c.name, c.id))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(lines)
    }

    async fn upcoming_assignments(&self) -> Result<String> {
        let now = Utc::now();
        let courses = self.canvas.get_courses().await?;

        let mut upcoming: Vec<(DateTime<Utc>, String, String)> = Vec::new();

        for course in &courses {
            let assignments = self.canvas.get_assignments(course.id).await?;
            for assignment in assignments {
                let Some(due) = assignment.due_at else {
                    continue;
                };
                if due <= now {
                    continue;
                }
                upcoming.push((due, course.name.clone(), assignment.display_name()));
            }
        }

        if upcoming.is_empty() {
            return Ok("No upcoming assignments.".to_string());
        }

        // Earliest deadline first; course then assignment name keeps the
        // order stable when deadlines collide.
        upcoming.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let lines = upcoming
            .iter()
            .map(|(due, course, name)| {
                format!("[{}] {} - due {}", course, name, format_time(due))
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(lines)
    }

    async fn announcements(&self, course_name: Option<&str>) -> Result<String> {
        let courses = self.canvas.get_courses().await?;

        let scoped: Vec<&Course> = match course_name {
            Some(raw) => {
                let target = raw.trim().to_lowercase();
                let matched: Vec<&Course> = courses
                    .iter()
                    .filter(|c| c.name.to_lowercase() == target)
                    .collect();
                if matched.is_empty() {
                    return Ok(format!("No course named \"{}\" was found.", raw.trim()));
                }
                matched
            }
            None => courses.iter().collect(),
        };

        if scoped.is_empty() {
            return Ok("No announcements found.".to_string());
        }

        let context_codes: Vec<String> = scoped.iter().map(|c| c.context_code()).collect();
        let mut announcements = self
            .canvas
            .get_announcements(&context_codes, MAX_ANNOUNCEMENTS)
            .await?;

        if announcements.is_empty() {
            return Ok("No announcements found.".to_string());
        }

        // Newest first; entries without any timestamp sink to the end.
        announcements.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
        announcements.truncate(MAX_ANNOUNCEMENTS);

        let lines = announcements
            .iter()
            .map(|ann| {
                let course = ann
                    .course_id()
                    .and_then(|id| courses.iter().find(|c| c.id == id))
                    .map(|c| c.name.clone())
                    .or_else(|| ann.context_code.clone())
                    .unwrap_or_else(|| "unknown course".to_string());
                let when = ann
                    .published_at()
                    .map(|t| format_time(&t))
                    .unwrap_or_else(|| "unknown date".to_string());
                let body = preview(&strip_html(ann.message.as_deref().unwrap_or("")));
                format!(
                    "[{}] {} - posted {}: {}",
                    course,
                    ann.display_title(),
                    when,
                    body
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(lines)
    }
}

/// Render a timestamp as a stable, human-readable UTC string.
fn format_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// Strip HTML tags and collapse whitespace runs.
fn strip_html(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let text = tags.replace_all(html, " ");
    spaces.replace_all(&text, " ").trim().to_string()
}

/// Truncate a body to the preview length on a character boundary.
fn preview(text: &str) -> String {
    if text.chars().count() <= BODY_PREVIEW_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    }
}

/// Get OpenAI function/tool definitions for the agent.
pub fn tool_definitions() -> Vec<async_openai::types::ChatCompletionTool> {
    use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};

    vec![
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "list_my_courses".to_string(),
                description: Some(
                    "List the full names and ids of all courses the user is actively \
                    enrolled in. Use this when the user asks for their course list or \
                    when a course reference is ambiguous."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {}
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "get_upcoming_assignments".to_string(),
                description: Some(
                    "List assignments across all active courses that are not yet due, \
                    earliest deadline first. Use this when the user asks about homework, \
                    assignments, deadlines or due dates."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {}
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "get_announcements".to_string(),
                description: Some(
                    "Fetch recent course announcements. Pass course_name to scope the \
                    query to a single course, or omit it to cover all active courses."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "course_name": {
                            "type": "string",
                            "description": "Exact course name; leave empty for all courses"
                        }
                    }
                })),
                strict: None,
            },
        },
    ]
}

/// Parse a tool call from the OpenAI response format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    // Models occasionally send an empty argument string for no-arg tools.
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };

    let args: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| LekseError::Agent(format!("Invalid tool arguments: {}", e)))?;

    match name {
        "list_my_courses" => Ok(ToolCall::ListMyCourses),
        "get_upcoming_assignments" => Ok(ToolCall::GetUpcomingAssignments),
        "get_announcements" => {
            let course_name = args["course_name"]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
            Ok(ToolCall::GetAnnouncements { course_name })
        }
        _ => Err(LekseError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Announcement, Assignment};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;

    /// In-memory Canvas backend for tool tests.
    struct FakeCanvas {
        courses: Vec<Course>,
        assignments: HashMap<u64, Vec<Assignment>>,
        announcements: Vec<Announcement>,
    }

    impl FakeCanvas {
        fn new(courses: Vec<Course>) -> Self {
            Self {
                courses,
                assignments: HashMap::new(),
                announcements: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CanvasApi for FakeCanvas {
        async fn get_courses(&self) -> Result<Vec<Course>> {
            Ok(self.courses.clone())
        }

        async fn get_assignments(&self, course_id: u64) -> Result<Vec<Assignment>> {
            Ok(self.assignments.get(&course_id).cloned().unwrap_or_default())
        }

        async fn get_announcements(
            &self,
            context_codes: &[String],
            _limit: usize,
        ) -> Result<Vec<Announcement>> {
            Ok(self
                .announcements
                .iter()
                .filter(|a| {
                    a.context_code
                        .as_deref()
                        .is_some_and(|code| context_codes.iter().any(|c| c == code))
                })
                .cloned()
                .collect())
        }
    }

    fn course(id: u64, name: &str) -> Course {
        Course {
            id,
            name: name.to_string(),
        }
    }

    fn assignment(id: u64, name: &str, due_at: Option<DateTime<Utc>>) -> Assignment {
        Assignment {
            id,
            name: Some(name.to_string()),
            due_at,
        }
    }

    fn announcement(id: u64, title: &str, course_id: u64, created_at: DateTime<Utc>) -> Announcement {
        Announcement {
            id,
            title: Some(title.to_string()),
            message: Some(format!("<p>Body of {}</p>", title)),
            context_code: Some(format!("course_{}", course_id)),
            posted_at: None,
            created_at: Some(created_at),
        }
    }

    fn context(canvas: FakeCanvas) -> ToolContext {
        ToolContext::new(Arc::new(canvas), "test")
    }

    #[tokio::test]
    async fn test_list_courses_sorted_and_formatted() {
        let fake = FakeCanvas::new(vec![course(2, "MATH201"), course(1, "CS101")]);

        let out = context(fake).execute(&ToolCall::ListMyCourses).await.unwrap();
        assert_eq!(out, "1. CS101 (id 1)\n2. MATH201 (id 2)");
    }

    #[tokio::test]
    async fn test_list_courses_empty_state() {
        let fake = FakeCanvas::new(Vec::new());

        let out = context(fake).execute(&ToolCall::ListMyCourses).await.unwrap();
        assert_eq!(out, "No active courses found.");
    }

    #[tokio::test]
    async fn test_upcoming_assignments_filtered_and_ordered() {
        let now = Utc::now();
        let mut fake = FakeCanvas::new(vec![course(1, "CS101"), course(2, "MATH201")]);
        fake.assignments.insert(
            1,
            vec![assignment(10, "Lab 3", Some(now + Duration::days(2)))],
        );
        fake.assignments.insert(
            2,
            vec![
                assignment(20, "Problem set", Some(now + Duration::days(5))),
                assignment(21, "Old quiz", Some(now - Duration::days(1))),
                assignment(22, "Undated", None),
            ],
        );

        let out = context(fake)
            .execute(&ToolCall::GetUpcomingAssignments)
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[CS101] Lab 3 - due "));
        assert!(lines[1].starts_with("[MATH201] Problem set - due "));
        assert!(!out.contains("Old quiz"));
        assert!(!out.contains("Undated"));
    }

    #[tokio::test]
    async fn test_upcoming_assignments_tie_broken_by_course_then_name() {
        let due = Utc::now() + Duration::days(3);
        let mut fake = FakeCanvas::new(vec![course(2, "MATH201"), course(1, "CS101")]);
        fake.assignments
            .insert(1, vec![assignment(11, "Zeta task", Some(due))]);
        fake.assignments.insert(
            2,
            vec![
                assignment(21, "Beta task", Some(due)),
                assignment(22, "Alpha task", Some(due)),
            ],
        );

        let out = context(fake)
            .execute(&ToolCall::GetUpcomingAssignments)
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines[0].starts_with("[CS101] Zeta task"));
        assert!(lines[1].starts_with("[MATH201] Alpha task"));
        assert!(lines[2].starts_with("[MATH201] Beta task"));
    }

    #[tokio::test]
    async fn test_upcoming_assignments_empty_state() {
        let fake = FakeCanvas::new(vec![course(1, "CS101")]);

        let out = context(fake)
            .execute(&ToolCall::GetUpcomingAssignments)
            .await
            .unwrap();
        assert_eq!(out, "No upcoming assignments.");
    }

    #[tokio::test]
    async fn test_announcements_case_insensitive_course_filter() {
        let now = Utc::now();
        let mut fake = FakeCanvas::new(vec![course(1, "CS101"), course(2, "MATH201")]);
        fake.announcements = vec![
            announcement(1, "Lab moved", 1, now - Duration::hours(1)),
            announcement(2, "Exam schedule", 2, now),
        ];

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements {
                course_name: Some("cs101".to_string()),
            })
            .await
            .unwrap();

        assert!(out.contains("Lab moved"));
        assert!(!out.contains("Exam schedule"));
    }

    #[tokio::test]
    async fn test_announcements_unknown_course_is_not_an_error() {
        let fake = FakeCanvas::new(vec![course(1, "CS101")]);

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements {
                course_name: Some("BIO300".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(out, "No course named \"BIO300\" was found.");
    }

    #[tokio::test]
    async fn test_announcements_substring_does_not_match() {
        let fake = FakeCanvas::new(vec![course(1, "CS101")]);

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements {
                course_name: Some("CS1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(out, "No course named \"CS1\" was found.");
    }

    #[tokio::test]
    async fn test_announcements_newest_first_and_capped() {
        let now = Utc::now();
        let mut fake = FakeCanvas::new(vec![course(1, "CS101")]);
        fake.announcements = (0..7)
            .map(|i| announcement(i, &format!("Notice {}", i), 1, now - Duration::days(i as i64)))
            .collect();

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements { course_name: None })
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), MAX_ANNOUNCEMENTS);
        assert!(lines[0].contains("Notice 0"));
        assert!(lines[4].contains("Notice 4"));
        assert!(!out.contains("Notice 5"));
    }

    #[tokio::test]
    async fn test_announcements_empty_state() {
        let fake = FakeCanvas::new(vec![course(1, "CS101")]);

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements { course_name: None })
            .await
            .unwrap();
        assert_eq!(out, "No announcements found.");
    }

    #[tokio::test]
    async fn test_announcement_body_is_stripped_of_html() {
        let now = Utc::now();
        let mut fake = FakeCanvas::new(vec![course(1, "CS101")]);
        let mut ann = announcement(1, "Reading", 1, now);
        ann.message = Some("<p>Read  <b>chapter\n4</b> by Friday</p>".to_string());
        fake.announcements = vec![ann];

        let out = context(fake)
            .execute(&ToolCall::GetAnnouncements { course_name: None })
            .await
            .unwrap();
        assert!(out.contains("Read chapter 4 by Friday"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn test_parse_list_courses_tool() {
        let tool = parse_tool_call("list_my_courses", "{}").unwrap();
        assert!(matches!(tool, ToolCall::ListMyCourses));

        // Empty argument strings are tolerated for no-arg tools.
        let tool = parse_tool_call("get_upcoming_assignments", "").unwrap();
        assert!(matches!(tool, ToolCall::GetUpcomingAssignments));
    }

    #[test]
    fn test_parse_announcements_tool() {
        let tool = parse_tool_call("get_announcements", r#"{"course_name": " CS101 "}"#).unwrap();
        match tool {
            ToolCall::GetAnnouncements { course_name } => {
                assert_eq!(course_name.as_deref(), Some("CS101"));
            }
            _ => panic!("Expected GetAnnouncements tool"),
        }

        let tool = parse_tool_call("get_announcements", r#"{"course_name": ""}"#).unwrap();
        match tool {
            ToolCall::GetAnnouncements { course_name } => assert!(course_name.is_none()),
            _ => panic!("Expected GetAnnouncements tool"),
        }
    }

    #[test]
    fn test_parse_unknown_tool() {
        assert!(parse_tool_call("drop_course", "{}").is_err());
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello <b>world</b></p>"),
            "Hello world"
        );
        assert_eq!(strip_html("plain text"), "plain text");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn test_preview_truncates_long_bodies() {
        let long = "x".repeat(BODY_PREVIEW_CHARS + 10);
        let short = preview(&long);
        assert_eq!(short.chars().count(), BODY_PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));

        assert_eq!(preview("short"), "short");
    }
}

//! Canvas REST resource models.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A course the caller is actively enrolled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: u64,
    pub name: String,
}

impl Course {
    /// Context code used by the aggregated announcements endpoint.
    pub fn context_code(&self) -> String {
        format!("course_{}", self.id)
    }
}

/// Raw course entry as returned by the courses listing.
///
/// Restricted or unpublished enrollments can come back without an id or
/// name; those entries are dropped during normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCourse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RawCourse {
    /// Convert into a [`Course`], skipping entries without id or name.
    pub fn normalize(self) -> Option<Course> {
        match (self.id, self.name) {
            (Some(id), Some(name)) if !name.is_empty() => Some(Course { id, name }),
            _ => None,
        }
    }
}

/// An assignment within one course.
#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Due timestamp; absent for undated assignments.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Assignment name with a fallback for unnamed entries.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| "Unnamed assignment".to_string())
    }
}

/// One entry from the aggregated announcements endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Announcement {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    /// Announcement body as HTML.
    #[serde(default)]
    pub message: Option<String>,
    /// Owning context, e.g. `course_42`.
    #[serde(default)]
    pub context_code: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Announcement {
    /// Announcement title with a fallback for untitled entries.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| "Untitled announcement".to_string())
    }

    /// Best-effort publication time. Canvas fills `created_at` reliably;
    /// `posted_at` covers delayed posts.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.posted_at)
    }

    /// Course id parsed from the context code, if present.
    pub fn course_id(&self) -> Option<u64> {
        self.context_code
            .as_deref()
            .and_then(|code| code.strip_prefix("course_"))
            .and_then(|id| id.parse().ok())
    }
}

//! Canvas LMS REST API access.
//!
//! Provides a trait-based seam over the three queries the tool layer needs,
//! with an HTTP implementation against the Canvas v1 API.

mod client;
mod models;

pub use client::CanvasClient;
pub use models::{Announcement, Assignment, Course, RawCourse};

use crate::error::Result;
use async_trait::async_trait;

/// Trait over the Canvas queries used by the tool layer.
///
/// The implementation owns the caller's token; nothing above this seam ever
/// handles the credential.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// List courses the caller is actively enrolled in.
    async fn get_courses(&self) -> Result<Vec<Course>>;

    /// List all assignments for one course.
    async fn get_assignments(&self, course_id: u64) -> Result<Vec<Assignment>>;

    /// Fetch recent announcements for the given course context codes
    /// (`course_<id>`), at most `limit` entries.
    async fn get_announcements(
        &self,
        context_codes: &[String],
        limit: usize,
    ) -> Result<Vec<Announcement>>;
}

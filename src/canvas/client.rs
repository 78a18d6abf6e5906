//! HTTP client for the Canvas v1 REST API.

use super::models::{Announcement, Assignment, Course, RawCourse};
use super::CanvasApi;
use crate::error::{LekseError, Result};
use async_trait::async_trait;
use reqwest::{header, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::debug;

/// Timeout for Canvas API requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size used when walking paginated listings.
const PAGE_SIZE: u32 = 100;

/// Client for authenticated, read-only Canvas API calls.
///
/// Holds the caller's token for the lifetime of one request; the token goes
/// into the Authorization header only and is never logged or echoed.
pub struct CanvasClient {
    http: reqwest::Client,
    api_root: String,
    request_id: String,
}

impl CanvasClient {
    /// Create a client for the given Canvas instance and token.
    ///
    /// Accepts a bare domain, a URL ending in `/api`, or a full `/api/v1`
    /// URL; all three normalize to the same API root.
    pub fn new(base_url: &str, token: &str, request_id: &str) -> Result<Self> {
        let api_root = normalize_api_root(base_url)?;

        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| {
                LekseError::Config("Canvas token contains invalid header characters".to_string())
            })?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LekseError::Config(format!("Failed to build HTTP client: {}", e)))?;

        debug!(api_root = %api_root, request_id = %request_id, "Canvas client ready");

        Ok(Self {
            http,
            api_root,
            request_id: request_id.to_string(),
        })
    }

    /// Issue one GET and classify transport-level failures.
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Response> {
        let start = Instant::now();
        let result = self.http.get(url).query(params).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => {
                debug!(
                    status = %resp.status(),
                    url,
                    elapsed_ms,
                    request_id = %self.request_id,
                    "GET"
                );
                Ok(resp)
            }
            Err(e) if e.is_timeout() => Err(LekseError::Timeout(format!(
                "Canvas request to {} timed out",
                url
            ))),
            Err(e) => Err(LekseError::Upstream(format!("Canvas request failed: {}", e))),
        }
    }

    /// Walk a paginated listing by following the Link header `rel="next"`
    /// URL until exhausted.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        resource: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut url = format!("{}{}", self.api_root, path);
        let mut params: Vec<(String, String)> = params.to_vec();
        params.push(("per_page".to_string(), PAGE_SIZE.to_string()));

        loop {
            let resp = self.get(&url, &params).await?;
            let resp = check_status(resp, resource)?;

            // The next link carries the full query, so later requests send none.
            let next = next_page_url(resp.headers());
            let page: Vec<T> = decode(resp, resource).await?;
            items.extend(page);

            match next {
                Some(n) => {
                    debug!(request_id = %self.request_id, "following pagination link");
                    url = n;
                    params.clear();
                }
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl CanvasApi for CanvasClient {
    async fn get_courses(&self) -> Result<Vec<Course>> {
        let raw: Vec<RawCourse> = self
            .get_paginated(
                "/courses",
                &[("enrollment_state".to_string(), "active".to_string())],
                "course list",
            )
            .await?;

        Ok(raw.into_iter().filter_map(RawCourse::normalize).collect())
    }

    async fn get_assignments(&self, course_id: u64) -> Result<Vec<Assignment>> {
        self.get_paginated(
            &format!("/courses/{}/assignments", course_id),
            &[],
            &format!("assignments for course {}", course_id),
        )
        .await
    }

    async fn get_announcements(
        &self,
        context_codes: &[String],
        limit: usize,
    ) -> Result<Vec<Announcement>> {
        // Aggregate endpoint; one page is enough for the recency window.
        let mut params: Vec<(String, String)> =
            vec![("per_page".to_string(), limit.to_string())];
        for code in context_codes {
            params.push(("context_codes[]".to_string(), code.clone()));
        }

        let url = format!("{}/announcements", self.api_root);
        let resp = self.get(&url, &params).await?;
        let resp = check_status(resp, "announcements")?;
        decode(resp, "announcements").await
    }
}

/// Normalize a configured Canvas base URL to the API v1 root.
fn normalize_api_root(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim_end_matches('/');

    url::Url::parse(trimmed)
        .map_err(|e| LekseError::Config(format!("Invalid Canvas base URL: {}", e)))?;

    let lowered = trimmed.to_lowercase();
    let root = if lowered.ends_with("/api/v1") {
        trimmed.to_string()
    } else if lowered.ends_with("/api") {
        format!("{}/v1", trimmed)
    } else {
        format!("{}/api/v1", trimmed)
    };

    Ok(root)
}

/// Map a non-success status to the matching error kind.
fn check_status(resp: Response, resource: &str) -> Result<Response> {
    match resp.status() {
        s if s.is_success() => Ok(resp),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LekseError::Auth(format!(
            "Canvas rejected the token while fetching {}",
            resource
        ))),
        StatusCode::NOT_FOUND => Err(LekseError::NotFound(format!(
            "Canvas resource not found: {}",
            resource
        ))),
        s => Err(LekseError::Upstream(format!(
            "Canvas returned {} for {}",
            s, resource
        ))),
    }
}

/// Decode a response body, reporting which resource was malformed.
async fn decode<T: DeserializeOwned>(resp: Response, resource: &str) -> Result<T> {
    resp.json::<T>().await.map_err(|e| {
        LekseError::Parse(format!("Malformed Canvas response for {}: {}", resource, e))
    })
}

/// Extract the `rel="next"` target from a Canvas Link header, if any.
fn next_page_url(headers: &header::HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;

    for part in link.split(',') {
        let mut segments = part.split(';');
        let target = match segments.next() {
            Some(t) => t.trim(),
            None => continue,
        };
        if segments.any(|s| s.trim() == r#"rel="next""#) {
            return Some(
                target
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_api_root() {
        assert_eq!(
            normalize_api_root("https://school.instructure.com").unwrap(),
            "https://school.instructure.com/api/v1"
        );
        assert_eq!(
            normalize_api_root("https://school.instructure.com/").unwrap(),
            "https://school.instructure.com/api/v1"
        );
        assert_eq!(
            normalize_api_root("https://school.instructure.com/api").unwrap(),
            "https://school.instructure.com/api/v1"
        );
        assert_eq!(
            normalize_api_root("https://school.instructure.com/API/V1").unwrap(),
            "https://school.instructure.com/API/V1"
        );
    }

    #[test]
    fn test_normalize_api_root_rejects_garbage() {
        assert!(normalize_api_root("not a url").is_err());
    }

    #[test]
    fn test_next_page_url() {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::LINK,
            header::HeaderValue::from_static(
                "<https://c.test/api/v1/courses?page=1&per_page=100>; rel=\"current\", \
                 <https://c.test/api/v1/courses?page=2&per_page=100>; rel=\"next\"",
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://c.test/api/v1/courses?page=2&per_page=100")
        );
    }

    #[test]
    fn test_next_page_url_absent_on_last_page() {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::LINK,
            header::HeaderValue::from_static(
                "<https://c.test/api/v1/courses?page=1>; rel=\"current\"",
            ),
        );
        assert_eq!(next_page_url(&headers), None);
        assert_eq!(next_page_url(&header::HeaderMap::new()), None);
    }
}

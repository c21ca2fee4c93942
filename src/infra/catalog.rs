//! HTTP client for the course catalog service.
//!
//! The catalog owns course content and instructor assignment; this
//! core only asks two questions of it. Failures map to
//! `EnrollmentError::Catalog` and are treated as transient by the
//! consumer and as fail-closed by authorization.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::{CourseId, InstructorId};
use crate::infra::{CourseCatalog, EnrollmentError, Result};

/// HTTP implementation of [`CourseCatalog`].
pub struct HttpCourseCatalog {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LessonCountResponse {
    total_lessons: i32,
}

#[derive(Debug, Deserialize)]
struct InstructorResponse {
    instructor_id: uuid::Uuid,
}

impl HttpCourseCatalog {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| EnrollmentError::Catalog(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrollmentError::Catalog(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrollmentError::Catalog(format!(
                "catalog returned {status} for {url}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EnrollmentError::Catalog(format!("invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl CourseCatalog for HttpCourseCatalog {
    async fn total_lessons(&self, course_id: CourseId) -> Result<i32> {
        let body: LessonCountResponse = self
            .get_json(&format!("/api/v1/courses/{course_id}/lesson-count"))
            .await?;
        Ok(body.total_lessons)
    }

    async fn instructor_id(&self, course_id: CourseId) -> Result<InstructorId> {
        let body: InstructorResponse = self
            .get_json(&format!("/api/v1/courses/{course_id}/instructor"))
            .await?;
        Ok(InstructorId::from_uuid(body.instructor_id))
    }
}

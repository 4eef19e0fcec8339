//! Upstream LMS and enterprise-catalog endpoints.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::enrollments::{ProgramEnrollment, RawCourseEnrollment};
use crate::error::PortalError;
use crate::models::{
    CatalogData, CommunityActivity, CourseId, EnterpriseConfig, EnterpriseCustomerList, FeatureFlags, LearningPathData,
};

pub const ENTERPRISE_CUSTOMER_ENDPOINT: &str = "/enterprise/api/v1/enterprise-customer/";
pub const ENROLL_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/enterprise_course_enrollments/";
pub const PROGRAM_ENROLLMENTS_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/enterprise_programs_list/";
pub const LEARNING_PATH_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/learning_path/";
pub const FEATURE_FLAGS_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/feature_flags/";
pub const COURSE_ACCESS_REQUEST_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/course_access_request/";
pub const RECENT_COMMUNITY_ACTIVITY_ENDPOINT: &str = "/enterprise_learner_portal/api/v1/community_activity/recent/";

/// Query parameters of the mark-complete / save-for-later PATCH.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompleteStatusRequest {
    pub course_id: String,
    pub enterprise_id: Uuid,
    /// `True` archives the course, `False` brings it back.
    pub marked_done: String,
}

impl CompleteStatusRequest {
    pub fn new(course_id: &str, enterprise_id: Uuid, marked_done: bool) -> Self {
        CompleteStatusRequest {
            course_id: course_id.to_string(),
            enterprise_id,
            marked_done: if marked_done { "True" } else { "False" }.to_string(),
        }
    }
}

#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn fetch_enterprise_config(&self, slug: &str) -> Result<Option<EnterpriseConfig>, PortalError>;
    async fn fetch_catalog(&self, enterprise_id: Uuid) -> Result<CatalogData, PortalError>;
    async fn fetch_learning_path(&self) -> Result<LearningPathData, PortalError>;
    async fn fetch_feature_flags(&self) -> Result<FeatureFlags, PortalError>;
    async fn fetch_course_enrollments(&self, enterprise_id: Uuid) -> Result<Vec<RawCourseEnrollment>, PortalError>;
    async fn fetch_program_enrollments(&self, enterprise_id: Uuid) -> Result<Vec<ProgramEnrollment>, PortalError>;
    async fn update_course_complete_status(&self, req: &CompleteStatusRequest) -> Result<(), PortalError>;
    async fn request_course(&self, course_id: CourseId) -> Result<(), PortalError>;
    async fn fetch_recent_community_activity(&self) -> Result<Vec<CommunityActivity>, PortalError>;
}

pub struct HttpPortalApi {
    http: reqwest::Client,
    lms_base_url: String,
    catalog_base_url: String,
}

impl HttpPortalApi {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        HttpPortalApi {
            http,
            lms_base_url: cfg.lms_base_url.trim_end_matches('/').to_string(),
            catalog_base_url: cfg.catalog_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn lms(&self, path: &str) -> String {
        format!("{}{}", self.lms_base_url, path)
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response, PortalError> {
        let res = req.send().await.map_err(|source| PortalError::Network { url: url.to_string(), source })?;
        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "upstream request failed");
            return Err(PortalError::UpstreamStatus { url: url.to_string(), status });
        }
        Ok(res)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, query: &[(&str, String)]) -> Result<T, PortalError> {
        tracing::debug!(%url, "GET");
        let res = self.send(&url, self.http.get(&url).query(query)).await?;
        res.json::<T>().await.map_err(|source| PortalError::Decode { url, source })
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn fetch_enterprise_config(&self, slug: &str) -> Result<Option<EnterpriseConfig>, PortalError> {
        let list: EnterpriseCustomerList =
            self.get_json(self.lms(ENTERPRISE_CUSTOMER_ENDPOINT), &[("slug", slug.to_string())]).await?;
        Ok(list.into_config())
    }

    async fn fetch_catalog(&self, enterprise_id: Uuid) -> Result<CatalogData, PortalError> {
        let url = format!(
            "{}/api/v1/enterprise-customer/{}/content-metadata/courses/",
            self.catalog_base_url, enterprise_id
        );
        self.get_json(url, &[]).await
    }

    async fn fetch_learning_path(&self) -> Result<LearningPathData, PortalError> {
        self.get_json(self.lms(LEARNING_PATH_ENDPOINT), &[]).await
    }

    async fn fetch_feature_flags(&self) -> Result<FeatureFlags, PortalError> {
        self.get_json(self.lms(FEATURE_FLAGS_ENDPOINT), &[]).await
    }

    async fn fetch_course_enrollments(&self, enterprise_id: Uuid) -> Result<Vec<RawCourseEnrollment>, PortalError> {
        self.get_json(self.lms(ENROLL_ENDPOINT), &[("enterprise_id", enterprise_id.to_string())])
            .await
    }

    async fn fetch_program_enrollments(&self, enterprise_id: Uuid) -> Result<Vec<ProgramEnrollment>, PortalError> {
        let url = format!("{}{}/", self.lms(PROGRAM_ENROLLMENTS_ENDPOINT), enterprise_id);
        self.get_json(url, &[]).await
    }

    async fn update_course_complete_status(&self, req: &CompleteStatusRequest) -> Result<(), PortalError> {
        let url = self.lms(ENROLL_ENDPOINT);
        tracing::info!(course_id = %req.course_id, marked_done = %req.marked_done, "updating course status");
        self.send(&url, self.http.patch(&url).query(req)).await?;
        Ok(())
    }

    async fn request_course(&self, course_id: CourseId) -> Result<(), PortalError> {
        let url = self.lms(COURSE_ACCESS_REQUEST_ENDPOINT);
        tracing::info!(course_id, "requesting catalog access");
        self.send(&url, self.http.post(&url).json(&serde_json::json!({ "course_id": course_id })))
            .await?;
        Ok(())
    }

    async fn fetch_recent_community_activity(&self) -> Result<Vec<CommunityActivity>, PortalError> {
        self.get_json(self.lms(RECENT_COMMUNITY_ACTIVITY_ENDPOINT), &[]).await
    }
}

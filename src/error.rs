use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    UpstreamStatus { url: String, status: reqwest::StatusCode },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{count} enrollments share course run {course_run_id} in {status}")]
    DuplicateEnrollment {
        course_run_id: String,
        status: &'static str,
        count: usize,
    },
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl PortalError {
    /// True for the failures that come from talking to upstream services.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            PortalError::Network { .. } | PortalError::UpstreamStatus { .. } | PortalError::Decode { .. }
        )
    }
}

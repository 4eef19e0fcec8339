//! Learner enrollments for the dashboard sidebar and course sections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{CompleteStatusRequest, PortalApi};
use crate::enrollments::{
    group_by_status, move_status, CourseEnrollment, EnrollmentPatch, EnrollmentStatus, EnrollmentsByStatus,
    ProgramEnrollment,
};
use crate::error::PortalError;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub course_run_id: String,
    pub original_status: EnrollmentStatus,
    pub new_status: EnrollmentStatus,
    #[serde(flatten)]
    pub patch: EnrollmentPatch,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient toast shown after a status change.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentsContext {
    #[serde(skip)]
    enterprise_id: Uuid,
    pub course_enrollments_by_status: EnrollmentsByStatus,
    pub program_enrollments: Vec<ProgramEnrollment>,
    pub fetch_error: Option<String>,
}

impl EnrollmentsContext {
    /// Course and program enrollments are fetched concurrently. A failure
    /// leaves its slice empty and is kept as `fetch_error`.
    pub async fn load<A: PortalApi + ?Sized>(api: &A, enterprise_id: Uuid) -> Self {
        let (courses, programs) = tokio::join!(
            api.fetch_course_enrollments(enterprise_id),
            api.fetch_program_enrollments(enterprise_id),
        );
        let mut fetch_error = None;

        let course_enrollments_by_status = match courses {
            Ok(raw) => group_by_status(raw.into_iter().map(CourseEnrollment::from)),
            Err(e) => {
                tracing::error!(error = %e, %enterprise_id, "course enrollments fetch failed");
                fetch_error = Some(e.to_string());
                EnrollmentsByStatus::default()
            }
        };
        let program_enrollments = programs.unwrap_or_else(|e| {
            tracing::error!(error = %e, %enterprise_id, "program enrollments fetch failed");
            fetch_error = Some(e.to_string());
            Vec::new()
        });

        EnrollmentsContext { enterprise_id, course_enrollments_by_status, program_enrollments, fetch_error }
    }

    /// Moves the enrollment locally, then tells the LMS. An upstream failure
    /// becomes an error notification; the local move stays in place.
    pub async fn update_status<A: PortalApi + ?Sized>(
        &mut self,
        api: &A,
        update: &StatusUpdate,
    ) -> Result<Notification, PortalError> {
        let marked_done = update.patch.marked_done.unwrap_or(matches!(
            update.new_status,
            EnrollmentStatus::SavedForLater | EnrollmentStatus::Completed
        ));
        // the local record carries the same flag the LMS is sent
        let patch = EnrollmentPatch { marked_done: Some(marked_done), ..update.patch.clone() };
        self.course_enrollments_by_status = move_status(
            &self.course_enrollments_by_status,
            &update.course_run_id,
            update.original_status,
            update.new_status,
            &patch,
        )?;

        let req = CompleteStatusRequest::new(&update.course_run_id, self.enterprise_id, marked_done);
        match api.update_course_complete_status(&req).await {
            Ok(()) => Ok(Notification { kind: NotificationKind::Success, message: success_message(update.new_status) }),
            Err(e) => {
                tracing::error!(error = %e, course_run_id = %update.course_run_id, "status update failed");
                Ok(Notification {
                    kind: NotificationKind::Error,
                    message: "There was a problem updating your course. Please try again.".into(),
                })
            }
        }
    }
}

fn success_message(status: EnrollmentStatus) -> String {
    match status {
        EnrollmentStatus::SavedForLater => "Your course was saved for later.",
        EnrollmentStatus::InProgress => "Your course was moved to In Progress.",
        EnrollmentStatus::Completed => "Your course was marked as complete.",
        EnrollmentStatus::Upcoming | EnrollmentStatus::Requested => "Your course was updated.",
    }
    .to_string()
}

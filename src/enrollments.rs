use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PortalError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    InProgress,
    Upcoming,
    Completed,
    SavedForLater,
    Requested,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 5] = [
        Self::InProgress,
        Self::Upcoming,
        Self::Completed,
        Self::SavedForLater,
        Self::Requested,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
            Self::SavedForLater => "saved_for_later",
            Self::Requested => "requested",
        }
    }
}

/// Enrollment record as the LMS returns it.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawCourseEnrollment {
    pub course_run_id: String,
    pub course_run_status: Option<EnrollmentStatus>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub course_run_url: Option<String>,
    #[serde(default)]
    pub resume_course_run_url: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_revoked: bool,
    #[serde(default)]
    pub marked_done: bool,
    #[serde(default)]
    pub saved_for_later: bool,
    #[serde(default)]
    pub emails_enabled: Option<bool>,
    #[serde(default)]
    pub due_dates: Vec<serde_json::Value>,
    #[serde(default)]
    pub micromasters_title: Option<String>,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub pacing: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrollment {
    pub course_run_id: String,
    pub course_run_status: EnrollmentStatus,
    pub title: String,
    pub link_to_course: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub is_revoked: bool,
    pub marked_done: bool,
    pub saved_for_later: bool,
    pub has_emails_enabled: Option<bool>,
    pub notifications: Vec<serde_json::Value>,
    pub micro_masters_title: Option<String>,
    pub org_name: Option<String>,
    pub pacing: Option<String>,
}

impl From<RawCourseEnrollment> for CourseEnrollment {
    fn from(raw: RawCourseEnrollment) -> Self {
        // records without a status are ones the learner parked
        let status = raw.course_run_status.unwrap_or(if raw.saved_for_later {
            EnrollmentStatus::SavedForLater
        } else {
            EnrollmentStatus::InProgress
        });
        CourseEnrollment {
            course_run_id: raw.course_run_id,
            course_run_status: status,
            title: raw.display_name,
            link_to_course: raw.resume_course_run_url.or(raw.course_run_url),
            start_date: raw.start_date,
            end_date: raw.end_date,
            created: raw.created,
            is_revoked: raw.is_revoked,
            marked_done: raw.marked_done,
            saved_for_later: raw.saved_for_later,
            has_emails_enabled: raw.emails_enabled,
            notifications: raw.due_dates,
            micro_masters_title: raw.micromasters_title,
            org_name: raw.org_name,
            pacing: raw.pacing,
        }
    }
}

/// Fields merged into a record when it changes bucket.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentPatch {
    #[serde(default)]
    pub saved_for_later: Option<bool>,
    #[serde(default)]
    pub marked_done: Option<bool>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentsByStatus {
    pub in_progress: Vec<CourseEnrollment>,
    pub upcoming: Vec<CourseEnrollment>,
    pub completed: Vec<CourseEnrollment>,
    pub saved_for_later: Vec<CourseEnrollment>,
    pub requested: Vec<CourseEnrollment>,
}

impl EnrollmentsByStatus {
    pub fn bucket(&self, status: EnrollmentStatus) -> &Vec<CourseEnrollment> {
        match status {
            EnrollmentStatus::InProgress => &self.in_progress,
            EnrollmentStatus::Upcoming => &self.upcoming,
            EnrollmentStatus::Completed => &self.completed,
            EnrollmentStatus::SavedForLater => &self.saved_for_later,
            EnrollmentStatus::Requested => &self.requested,
        }
    }

    fn bucket_mut(&mut self, status: EnrollmentStatus) -> &mut Vec<CourseEnrollment> {
        match status {
            EnrollmentStatus::InProgress => &mut self.in_progress,
            EnrollmentStatus::Upcoming => &mut self.upcoming,
            EnrollmentStatus::Completed => &mut self.completed,
            EnrollmentStatus::SavedForLater => &mut self.saved_for_later,
            EnrollmentStatus::Requested => &mut self.requested,
        }
    }

    pub fn len(&self) -> usize {
        EnrollmentStatus::ALL.iter().map(|s| self.bucket(*s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions enrollments into the five buckets, keeping input order
/// inside each bucket.
pub fn group_by_status<I>(enrollments: I) -> EnrollmentsByStatus
where
    I: IntoIterator<Item = CourseEnrollment>,
{
    let mut out = EnrollmentsByStatus::default();
    for e in enrollments {
        out.bucket_mut(e.course_run_status).push(e);
    }
    out
}

/// Moves the single enrollment with `course_run_id` out of `from` and
/// appends a patched copy to `to`. The input grouping is left untouched.
pub fn move_status(
    buckets: &EnrollmentsByStatus,
    course_run_id: &str,
    from: EnrollmentStatus,
    to: EnrollmentStatus,
    patch: &EnrollmentPatch,
) -> Result<EnrollmentsByStatus, PortalError> {
    let matches = buckets
        .bucket(from)
        .iter()
        .filter(|e| e.course_run_id == course_run_id)
        .count();
    match matches {
        0 => {
            return Err(PortalError::NotFound(format!(
                "enrollment {course_run_id} not in {}",
                from.as_str()
            )))
        }
        1 => {}
        n => {
            return Err(PortalError::DuplicateEnrollment {
                course_run_id: course_run_id.to_string(),
                status: from.as_str(),
                count: n,
            })
        }
    }

    let mut next = buckets.clone();
    let source = next.bucket_mut(from);
    let idx = source
        .iter()
        .position(|e| e.course_run_id == course_run_id)
        .ok_or_else(|| PortalError::NotFound(course_run_id.to_string()))?;
    let mut moved = source.remove(idx);
    moved.course_run_status = to;
    if let Some(v) = patch.saved_for_later {
        moved.saved_for_later = v;
    }
    if let Some(v) = patch.marked_done {
        moved.marked_done = v;
    }
    next.bucket_mut(to).push(moved);
    Ok(next)
}

/// Program enrollment, passed through as received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgramEnrollment {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}


#[cfg(test)]
mod tests {
    use super::testutil::enrollment;
    use super::*;
    use serde_json::json;

    fn sample() -> EnrollmentsByStatus {
        group_by_status(vec![
            enrollment("run-0", EnrollmentStatus::InProgress),
            enrollment("run-1", EnrollmentStatus::Upcoming),
            enrollment("run-2", EnrollmentStatus::InProgress),
            enrollment("run-3", EnrollmentStatus::Completed),
            enrollment("run-4", EnrollmentStatus::Requested),
        ])
    }

    fn runs(v: &[CourseEnrollment]) -> Vec<&str> {
        v.iter().map(|e| e.course_run_id.as_str()).collect()
    }

    #[test]
    fn groups_preserve_relative_order() {
        let g = sample();
        assert_eq!(runs(&g.in_progress), ["run-0", "run-2"]);
        assert_eq!(runs(&g.upcoming), ["run-1"]);
        assert!(g.saved_for_later.is_empty());
        assert_eq!(g.len(), 5);
    }

    #[test]
    fn move_status_relocates_and_stamps() {
        let before = sample();
        let patch = EnrollmentPatch { saved_for_later: Some(true), marked_done: None };
        let after = move_status(
            &before,
            "run-0",
            EnrollmentStatus::InProgress,
            EnrollmentStatus::SavedForLater,
            &patch,
        )
        .unwrap();
        assert_eq!(runs(&after.in_progress), ["run-2"]);
        let moved = &after.saved_for_later[0];
        assert_eq!(moved.course_run_status, EnrollmentStatus::SavedForLater);
        assert!(moved.saved_for_later);
        assert_eq!(moved.title, "title run-0");
        assert_eq!(after.len(), before.len());
        // input is untouched
        assert_eq!(runs(&before.in_progress), ["run-0", "run-2"]);
    }

    #[test]
    fn move_status_appends_to_target() {
        let after = move_status(
            &sample(),
            "run-3",
            EnrollmentStatus::Completed,
            EnrollmentStatus::InProgress,
            &EnrollmentPatch::default(),
        )
        .unwrap();
        assert_eq!(runs(&after.in_progress), ["run-0", "run-2", "run-3"]);
    }

    #[test]
    fn move_status_missing_is_not_found() {
        let err = move_status(
            &sample(),
            "run-1",
            EnrollmentStatus::InProgress,
            EnrollmentStatus::Completed,
            &EnrollmentPatch::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
    }

    #[test]
    fn move_status_rejects_duplicates() {
        let g = group_by_status(vec![
            enrollment("dup", EnrollmentStatus::Upcoming),
            enrollment("dup", EnrollmentStatus::Upcoming),
        ]);
        let err = move_status(
            &g,
            "dup",
            EnrollmentStatus::Upcoming,
            EnrollmentStatus::Completed,
            &EnrollmentPatch::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PortalError::DuplicateEnrollment { count: 2, .. }));
    }

    #[test]
    fn raw_record_is_transformed() {
        let raw: RawCourseEnrollment = serde_json::from_value(json!({
            "course_run_id": "course-v1:edX+DemoX+2T2020",
            "course_run_status": "in_progress",
            "display_name": "Demo",
            "course_run_url": "https://lms/course",
            "resume_course_run_url": "https://lms/resume",
            "emails_enabled": true,
            "due_dates": [{"name": "quiz"}],
            "created": "2020-07-21T16:00:00Z"
        }))
        .unwrap();
        let e = CourseEnrollment::from(raw);
        assert_eq!(e.title, "Demo");
        assert_eq!(e.link_to_course.as_deref(), Some("https://lms/resume"));
        assert_eq!(e.has_emails_enabled, Some(true));
        assert_eq!(e.notifications.len(), 1);
        assert_eq!(e.course_run_status, EnrollmentStatus::InProgress);
    }
}

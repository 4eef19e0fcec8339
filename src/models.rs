use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use uuid::Uuid;

pub type CourseId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Basic,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [Self::Basic, Self::Intermediate, Self::Advanced];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(v: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == v)
    }

    /// Position on the fixed basic -> advanced scale.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LearningPathMembership {
    // upstream sends this as a number on some endpoints and a string on others
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub internal_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

fn lenient_level<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DifficultyLevel>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(DifficultyLevel::parse))
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Course {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: CourseId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub primary_language: Option<String>,
    // levels outside the known scale are treated as unset
    #[serde(default, deserialize_with = "lenient_level")]
    pub difficulty_level: Option<DifficultyLevel>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub hours_required: Option<f64>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub learning_path: Vec<LearningPathMembership>,
    #[serde(default)]
    pub user_requested_access: bool,
    #[serde(default)]
    pub has_certificate: bool,
    #[serde(default)]
    pub has_subtitles: bool,
    #[serde(default)]
    pub prerequisites: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CatalogData {
    #[serde(default)]
    pub courses_metadata: Vec<Course>,
}

impl CatalogData {
    /// Flags the course as requested once the upstream call succeeded.
    /// Returns false when the id is not in the catalog.
    pub fn mark_access_requested(&mut self, course_id: CourseId) -> bool {
        let mut found = false;
        for course in self.courses_metadata.iter_mut().filter(|c| c.id == course_id) {
            course.user_requested_access = true;
            found = true;
        }
        found
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LearningPathData {
    #[serde(default)]
    pub learning_path_name: Option<String>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub count: u32,
}

pub const SHOW_LEARNING_PATH_FLAG: &str = "SHOW_LEARNING_PATH";
pub const FEATURE_ENROLL_WITH_CODES: &str = "ENROLL_WITH_CODES";
pub const FEATURE_ENABLE_AUTO_APPLIED_LICENSES: &str = "FEATURE_ENABLE_AUTO_APPLIED_LICENSES";
pub const FEATURE_BROWSE_AND_REQUEST: &str = "FEATURE_BROWSE_AND_REQUEST";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct FeatureFlags(pub HashMap<String, bool>);

impl FeatureFlags {
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.0.get(flag).copied().unwrap_or(false)
    }
}

// --- community activity ---

/// One entry of the recent community activity feed. Read as snake_case,
/// served as camelCase; fields not listed here pass through unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct CommunityActivity {
    #[serde(default)]
    pub actor: ActivityActor,
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub timesince: Option<String>,
    #[serde(default)]
    pub target: Option<ActivityObject>,
    #[serde(default)]
    pub action_object: Option<ActivityObject>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ActivityActor {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct ActivityObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
}

// --- enterprise customer config ---

pub const DEFAULT_BANNER_BORDER_COLOR: &str = "#007D88";
pub const DEFAULT_BANNER_BACKGROUND_COLOR: &str = "#D7E3FC";

#[derive(Deserialize, Debug, Clone)]
pub struct EnterpriseCustomerList {
    #[serde(default)]
    pub results: Vec<EnterpriseCustomer>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseCustomer {
    pub name: String,
    pub uuid: Uuid,
    pub slug: String,
    #[serde(default, alias = "contact_email")]
    pub contact_email: Option<String>,
    #[serde(default, alias = "branding_configuration")]
    pub branding_configuration: BrandingConfiguration,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrandingConfiguration {
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default, alias = "banner_background_color")]
    pub banner_background_color: Option<String>,
    #[serde(default, alias = "banner_border_color")]
    pub banner_border_color: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseConfig {
    pub name: String,
    pub uuid: Uuid,
    pub slug: String,
    pub contact_email: Option<String>,
    pub branding: Branding,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub logo: Option<String>,
    pub banner: Banner,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub border_color: String,
    pub background_color: String,
}

impl From<EnterpriseCustomer> for EnterpriseConfig {
    fn from(c: EnterpriseCustomer) -> Self {
        let b = c.branding_configuration;
        EnterpriseConfig {
            name: c.name,
            uuid: c.uuid,
            slug: c.slug,
            contact_email: c.contact_email,
            branding: Branding {
                logo: b.logo,
                banner: Banner {
                    border_color: b
                        .banner_border_color
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| DEFAULT_BANNER_BORDER_COLOR.into()),
                    background_color: b
                        .banner_background_color
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| DEFAULT_BANNER_BACKGROUND_COLOR.into()),
                },
            },
        }
    }
}

impl EnterpriseCustomerList {
    /// The portal uses the last matching customer record.
    pub fn into_config(mut self) -> Option<EnterpriseConfig> {
        self.results.pop().map(EnterpriseConfig::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_keeps_courses_with_odd_fields() {
        let data: CatalogData = serde_json::from_value(json!({
            "courses_metadata": [
                {"id": 1, "title": "ok", "difficulty_level": "basic"},
                {"id": 2, "title": "odd", "difficulty_level": ""},
                {"id": 3, "difficulty_level": 4},
                {"id": 4, "title": "expert", "difficulty_level": "expert"}
            ]
        }))
        .unwrap();
        let levels: Vec<_> = data.courses_metadata.iter().map(|c| c.difficulty_level).collect();
        assert_eq!(levels, [Some(DifficultyLevel::Basic), None, None, None]);
        assert_eq!(data.courses_metadata[2].title, "");
    }

    #[test]
    fn community_activity_reads_snake_and_writes_camel() {
        let item: CommunityActivity = serde_json::from_value(json!({
            "actor": {"username": "ada", "first_name": "Ada"},
            "verb": "enrolled in",
            "action_object": {"display_name": "Rust 101", "url": "/course/1", "org": "edX"},
            "timesince": "2 hours",
            "id": 9
        }))
        .unwrap();
        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["actor"]["firstName"], "Ada");
        assert_eq!(out["actionObject"]["displayName"], "Rust 101");
        assert_eq!(out["id"], 9);
    }

    #[test]
    fn catalog_decodes_odd_course_from_bytes() {
        let body = br#"{"courses_metadata":[{"id":1,"title":"ok"},{"id":2,"difficulty_level":""}]}"#;
        let data: CatalogData = serde_json::from_slice(body).unwrap();
        assert_eq!(data.courses_metadata.len(), 2);
    }

    #[test]
    fn course_accepts_string_and_numeric_ids() {
        let c: Course = serde_json::from_value(json!({
            "id": "42",
            "title": "Rust",
            "hours_required": 6,
            "difficulty_level": null,
            "learning_path": [{"internal_id": 7}, {"internal_id": "8"}]
        }))
        .unwrap();
        assert_eq!(c.id, 42);
        assert_eq!(c.hours_required, Some(6.0));
        assert_eq!(c.difficulty_level, None);
        assert_eq!(c.learning_path[0].internal_id, Some(7));
        assert_eq!(c.learning_path[1].internal_id, Some(8));
    }

    #[test]
    fn mark_access_requested_only_touches_matching_course() {
        let mut data = CatalogData {
            courses_metadata: vec![
                Course { id: 1, title: "a".into(), ..Default::default() },
                Course { id: 2, title: "b".into(), ..Default::default() },
            ],
        };
        assert!(data.mark_access_requested(2));
        assert!(!data.courses_metadata[0].user_requested_access);
        assert!(data.courses_metadata[1].user_requested_access);
        assert!(!data.mark_access_requested(99));
    }

    #[test]
    fn missing_flags_are_off() {
        let flags: FeatureFlags = serde_json::from_value(json!({"SHOW_LEARNING_PATH": true})).unwrap();
        assert!(flags.is_enabled(SHOW_LEARNING_PATH_FLAG));
        assert!(!flags.is_enabled(FEATURE_BROWSE_AND_REQUEST));
    }

    #[test]
    fn enterprise_config_uses_last_result_and_default_banner() {
        let list: EnterpriseCustomerList = serde_json::from_value(json!({
            "results": [
                {"name": "Old", "uuid": "c2b2cbda-c25e-4efd-a845-7579a3f0258e", "slug": "old"},
                {
                    "name": "Acme",
                    "uuid": "28b32b5a-ad61-403d-87b8-8cde04ff696d",
                    "slug": "acme",
                    "contactEmail": "learning@acme.test",
                    "brandingConfiguration": {"logo": "logo.png", "bannerBackgroundColor": "#000000"}
                }
            ]
        }))
        .unwrap();
        let cfg = list.into_config().unwrap();
        assert_eq!(cfg.slug, "acme");
        assert_eq!(cfg.contact_email.as_deref(), Some("learning@acme.test"));
        assert_eq!(cfg.branding.banner.background_color, "#000000");
        assert_eq!(cfg.branding.banner.border_color, DEFAULT_BANNER_BORDER_COLOR);
    }
}

//! Dashboard aggregate: catalog, learning path and feature flags, loaded
//! together, plus the filter/sort state bound to the location.
//!
//! Construction order is fixed: fetch the sources concurrently, join,
//! then freeze the data. Only the query state changes afterwards, and only
//! through [`SubsidyContext::apply`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{self, FacetGroup, FilterOption, FilterOptions, FilterSpec, Locale, PaginationMeta, SortKey};
use crate::client::PortalApi;
use crate::error::PortalError;
use crate::models::{
    CatalogData, CommunityActivity, Course, CourseId, FeatureFlags, LearningPathData, SHOW_LEARNING_PATH_FLAG,
};
use crate::query::{Location, ParamKey, ParamValue, QueryState, QueryStore};

/// User actions against the catalog panel.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DashboardCommand {
    #[serde(rename_all = "camelCase")]
    ToggleFilter { group: FacetGroup, values: Vec<String> },
    ClearFilters,
    Search { text: String },
    Sort { key: SortKey },
    Paginate { page: u32 },
    #[serde(rename_all = "camelCase")]
    SetPerPage { per_page: u32 },
}

#[derive(Debug, Clone)]
pub struct SubsidyContext {
    catalog_data: CatalogData,
    learning_path_data: LearningPathData,
    feature_flags: FeatureFlags,
    community_activity: Option<Vec<CommunityActivity>>,
    options: FilterOptions,
    store: QueryStore,
    locale: Locale,
    default_per_page: u32,
}

impl SubsidyContext {
    /// Runs the four fetches concurrently. Catalog and learning-path
    /// failures leave that slice empty and a flag failure turns every flag
    /// off. The community feed is hidden when it fails or has no items.
    pub async fn load<A: PortalApi + ?Sized>(
        api: &A,
        enterprise_id: Uuid,
        location: Location,
        locale: Locale,
        default_per_page: u32,
    ) -> Self {
        let (catalog, learning_path, flags, activity) = tokio::join!(
            api.fetch_catalog(enterprise_id),
            api.fetch_learning_path(),
            api.fetch_feature_flags(),
            api.fetch_recent_community_activity(),
        );

        let catalog_data = catalog.unwrap_or_else(|e| {
            tracing::error!(error = %e, %enterprise_id, "catalog fetch failed");
            CatalogData::default()
        });
        let learning_path_data = learning_path.unwrap_or_else(|e| {
            tracing::error!(error = %e, "learning path fetch failed");
            LearningPathData::default()
        });
        let feature_flags = flags.unwrap_or_else(|e| {
            tracing::error!(error = %e, "feature flag fetch failed");
            FeatureFlags::default()
        });

        let community_activity = match activity {
            Ok(items) if items.is_empty() => None,
            Ok(items) => Some(items),
            Err(e) => {
                tracing::warn!(error = %e, "community activity fetch failed");
                None
            }
        };

        let mut ctx =
            Self::from_parts(catalog_data, learning_path_data, feature_flags, location, locale, default_per_page);
        ctx.community_activity = community_activity;
        ctx
    }

    pub fn from_parts(
        catalog_data: CatalogData,
        learning_path_data: LearningPathData,
        feature_flags: FeatureFlags,
        location: Location,
        locale: Locale,
        default_per_page: u32,
    ) -> Self {
        let options = FilterOptions::for_catalog(&catalog_data.courses_metadata);
        SubsidyContext {
            catalog_data,
            learning_path_data,
            feature_flags,
            community_activity: None,
            options,
            store: QueryStore::mount(location, &ParamKey::ALL),
            locale,
            default_per_page,
        }
    }

    pub fn catalog_data(&self) -> &CatalogData {
        &self.catalog_data
    }

    pub fn location(&self) -> &Location {
        self.store.location()
    }

    pub fn show_learning_paths(&self) -> bool {
        self.feature_flags.is_enabled(SHOW_LEARNING_PATH_FLAG)
    }

    fn visible_groups(&self) -> Vec<FacetGroup> {
        FacetGroup::ALL
            .into_iter()
            .filter(|g| *g != FacetGroup::LearningPaths || self.show_learning_paths())
            .collect()
    }

    pub fn filter_spec(&self) -> FilterSpec {
        let mut spec = FilterSpec::from_query(self.store.state(), &self.options);
        if !self.show_learning_paths() {
            spec.learning_paths.clear();
        }
        spec
    }

    /// Full filtered and sorted list, before pagination.
    pub fn displayed_courses(&self) -> Vec<Course> {
        catalog::derive(
            &self.catalog_data.courses_metadata,
            &self.filter_spec(),
            self.store.state().sort,
            &self.locale,
        )
    }

    fn per_page(&self) -> u32 {
        if self.store.is_set(ParamKey::PerPage) {
            self.store.state().per_page
        } else {
            self.default_per_page
        }
    }

    /// Applies one user action as a single location replacement.
    pub fn apply(&mut self, cmd: DashboardCommand) -> Result<(), PortalError> {
        let reset_page = (ParamKey::CurrentPage, ParamValue::Empty);
        match cmd {
            DashboardCommand::ToggleFilter { group, values } => {
                if !self.visible_groups().contains(&group) {
                    tracing::debug!(?group, "toggle on hidden filter group ignored");
                    return Ok(());
                }
                let current = self.store.state().list(group.param()).cloned().unwrap_or_default();
                let next = self.options.toggle(group, &current, &values);
                if next == current {
                    return Ok(());
                }
                self.store.write_batch(&[(group.param(), ParamValue::List(next)), reset_page]);
            }
            DashboardCommand::ClearFilters => {
                let mut writes: Vec<_> = ParamKey::FILTERS.iter().map(|k| (*k, ParamValue::Empty)).collect();
                writes.push(reset_page);
                self.store.write_batch(&writes);
            }
            DashboardCommand::Search { text } => {
                self.store
                    .write_batch(&[(ParamKey::Search, ParamValue::Text(text.trim().to_string())), reset_page]);
            }
            DashboardCommand::Sort { key } => {
                let value = match key {
                    SortKey::Recommended => ParamValue::Empty,
                    other => ParamValue::Text(other.as_str().to_string()),
                };
                self.store.write_batch(&[(ParamKey::Sort, value), reset_page]);
            }
            DashboardCommand::Paginate { page } => {
                if page == 0 {
                    return Err(PortalError::InvalidCommand("pages start at 1".into()));
                }
                self.store.write(ParamKey::CurrentPage, ParamValue::Int(page));
            }
            DashboardCommand::SetPerPage { per_page } => {
                if per_page == 0 {
                    return Err(PortalError::InvalidCommand("per page must be positive".into()));
                }
                self.store.write_batch(&[(ParamKey::PerPage, ParamValue::Int(per_page)), reset_page]);
            }
        }
        Ok(())
    }

    /// Asks upstream for access, then flags the course locally.
    pub async fn request_course<A: PortalApi + ?Sized>(
        &mut self,
        api: &A,
        course_id: CourseId,
    ) -> Result<(), PortalError> {
        if !self.catalog_data.courses_metadata.iter().any(|c| c.id == course_id) {
            return Err(PortalError::NotFound(format!("course {course_id}")));
        }
        api.request_course(course_id).await?;
        self.catalog_data.mark_access_requested(course_id);
        Ok(())
    }

    /// Pure projection of the current state.
    pub fn view(&self) -> DashboardView {
        let state = self.store.state();
        let displayed = self.displayed_courses();
        let page = catalog::paginate(&displayed, state.current_page, self.per_page());

        let groups = self.visible_groups();
        let mut active = Vec::new();
        for group in &groups {
            let selected = state.list(group.param()).cloned().unwrap_or_default();
            for opt in self.options.group(*group) {
                // one tag per option, also when only an expanded code is in the URL
                if selected.iter().any(|v| opt.covers(v)) {
                    active.push(ActiveFilter {
                        group: group.param().field(),
                        group_name: Some(group.group_name()),
                        value: opt.value.clone(),
                        label: opt.label.clone(),
                    });
                }
            }
        }
        if !state.search.is_empty() {
            active.push(ActiveFilter {
                group: ParamKey::Search.field(),
                group_name: None,
                value: state.search.clone(),
                label: state.search.clone(),
            });
        }

        DashboardView {
            location: self.store.location().href(),
            learning_path: LearningPathView {
                name: self.learning_path_data.learning_path_name.clone(),
                count: self.learning_path_data.count,
                courses: self.learning_path_data.courses.clone(),
            },
            catalog: CatalogView { courses: page.courses, pagination: page.pagination },
            filter: FilterView {
                is_show_learning_path_flag: self.show_learning_paths(),
                current: state.clone(),
                groups: groups
                    .iter()
                    .map(|g| FilterGroupView {
                        id: *g,
                        group_name: g.group_name(),
                        options: self.options.group(*g).to_vec(),
                    })
                    .collect(),
                active,
            },
            sorting: SortingView {
                option: state.sort,
                options: SortKey::ALL
                    .into_iter()
                    .map(|k| SortOptionView { value: k, label: k.label() })
                    .collect(),
            },
            feature_flags: self.feature_flags.clone(),
            recent_community_activity: self.community_activity.clone(),
        }
    }

    pub fn query_state(&self) -> &QueryState {
        self.store.state()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub location: String,
    pub learning_path: LearningPathView,
    pub catalog: CatalogView,
    pub filter: FilterView,
    pub sorting: SortingView,
    pub feature_flags: FeatureFlags,
    pub recent_community_activity: Option<Vec<CommunityActivity>>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LearningPathView {
    pub name: Option<String>,
    pub count: u32,
    pub courses: Vec<Course>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CatalogView {
    pub courses: Vec<Course>,
    pub pagination: PaginationMeta,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterView {
    pub is_show_learning_path_flag: bool,
    pub current: QueryState,
    pub groups: Vec<FilterGroupView>,
    pub active: Vec<ActiveFilter>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroupView {
    pub id: FacetGroup,
    pub group_name: &'static str,
    pub options: Vec<FilterOption>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFilter {
    /// Field name of the group, `search` for the free-text tag.
    pub group: &'static str,
    pub group_name: Option<&'static str>,
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SortingView {
    pub option: SortKey,
    pub options: Vec<SortOptionView>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SortOptionView {
    pub value: SortKey,
    pub label: &'static str,
}

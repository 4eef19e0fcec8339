//! Catalog filter/sort pipeline.
//!
//! [`derive`] is pure: it never touches the raw catalog and always sorts a
//! copy, so the same inputs give the same displayed list.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Course, DifficultyLevel};
use crate::query::{ParamKey, QueryState, DEFAULT_PER_PAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "recomended", alias = "recommended")]
    Recommended,
    #[serde(rename = "alphabetically")]
    Alphabetical,
    #[serde(rename = "difficultyASC")]
    DifficultyAsc,
    #[serde(rename = "difficultyDESC")]
    DifficultyDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        Self::Recommended,
        Self::Alphabetical,
        Self::DifficultyAsc,
        Self::DifficultyDesc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recommended => "recomended",
            Self::Alphabetical => "alphabetically",
            Self::DifficultyAsc => "difficultyASC",
            Self::DifficultyDesc => "difficultyDESC",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Recommended => "Dojo recommended",
            Self::Alphabetical => "Alphabetically",
            Self::DifficultyAsc => "Difficulty: Basic to Advanced",
            Self::DifficultyDesc => "Difficulty: Advanced to Basic",
        }
    }

    /// Unknown values fall back to the recommended order.
    pub fn parse(v: &str) -> Self {
        match v {
            "alphabetically" => Self::Alphabetical,
            "difficultyASC" => Self::DifficultyAsc,
            "difficultyDESC" => Self::DifficultyDesc,
            _ => Self::Recommended,
        }
    }
}

/// Language tag used for case folding and title collation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(String);

impl Default for Locale {
    fn default() -> Self {
        Locale("en".into())
    }
}

impl Locale {
    pub fn new(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() || tag == "*" {
            return Locale::default();
        }
        Locale(tag.to_ascii_lowercase())
    }

    /// First tag of an `Accept-Language` header.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let first = header.split(',').next()?.split(';').next()?.trim();
        if first.is_empty() || first == "*" {
            None
        } else {
            Some(Locale::new(first))
        }
    }

    pub fn tag(&self) -> &str {
        &self.0
    }

    fn language(&self) -> &str {
        self.0.split(['-', '_']).next().unwrap_or("")
    }

    fn dotted_i(&self) -> bool {
        matches!(self.language(), "tr" | "az")
    }

    pub fn fold(&self, s: &str) -> String {
        if !self.dotted_i() {
            return s.to_lowercase();
        }
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            match ch {
                'I' => out.push('ı'),
                'İ' => out.push('i'),
                _ => out.extend(ch.to_lowercase()),
            }
        }
        out
    }

    /// Case-insensitive first; on a tie lowercase sorts before uppercase.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.fold(a).cmp(&self.fold(b)).then_with(|| {
            for (x, y) in a.chars().zip(b.chars()) {
                if x != y {
                    return match (x.is_lowercase(), y.is_lowercase()) {
                        (true, false) => Ordering::Less,
                        (false, true) => Ordering::Greater,
                        _ => x.cmp(&y),
                    };
                }
            }
            a.len().cmp(&b.len())
        })
    }
}

/// One independent filter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetGroup {
    DifficultyLevels,
    Languages,
    LearningPaths,
    DeliveryMethods,
}

impl FacetGroup {
    pub const ALL: [FacetGroup; 4] = [
        Self::DifficultyLevels,
        Self::Languages,
        Self::LearningPaths,
        Self::DeliveryMethods,
    ];

    pub fn param(self) -> ParamKey {
        match self {
            Self::DifficultyLevels => ParamKey::DifficultyLevels,
            Self::Languages => ParamKey::Languages,
            Self::LearningPaths => ParamKey::LearningPaths,
            Self::DeliveryMethods => ParamKey::DeliveryMethods,
        }
    }

    pub fn group_name(self) -> &'static str {
        match self {
            Self::DifficultyLevels => "Difficulty level",
            Self::Languages => "Language",
            Self::LearningPaths => "Learning path",
            Self::DeliveryMethods => "Delivery method",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    /// Codes selected together with this option. Empty means just `value`.
    #[serde(skip)]
    pub expands_to: Vec<String>,
}

impl FilterOption {
    pub fn new(value: &str, label: &str) -> Self {
        FilterOption { value: value.into(), label: label.into(), expands_to: Vec::new() }
    }

    pub fn expanding(value: &str, label: &str, codes: &[&str]) -> Self {
        FilterOption {
            value: value.into(),
            label: label.into(),
            expands_to: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn codes(&self) -> Vec<String> {
        if self.expands_to.is_empty() {
            vec![self.value.clone()]
        } else {
            self.expands_to.clone()
        }
    }

    pub(crate) fn covers(&self, v: &str) -> bool {
        self.value == v || self.expands_to.iter().any(|c| c == v)
    }
}

/// Selectable values per facet; anything outside these is ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub difficulty_levels: Vec<FilterOption>,
    pub languages: Vec<FilterOption>,
    pub learning_paths: Vec<FilterOption>,
    pub delivery_methods: Vec<FilterOption>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            difficulty_levels: vec![
                FilterOption::new("basic", "Basic"),
                FilterOption::new("intermediate", "Intermediate"),
                FilterOption::new("advanced", "Advanced"),
            ],
            languages: vec![
                FilterOption::expanding("en", "English", &["en", "en-us", "en-gb"]),
                FilterOption::new("de", "German"),
                FilterOption::new("es", "Spanish"),
                FilterOption::new("fr", "French"),
                FilterOption::new("ja", "Japanese"),
                FilterOption::expanding("zh", "Chinese", &["zh", "zh-cn", "zh-tw"]),
            ],
            learning_paths: Vec::new(),
            delivery_methods: vec![
                FilterOption::new("self_paced", "Self-paced"),
                FilterOption::new("instructor_led", "Instructor-led"),
                FilterOption::new("blended", "Blended"),
            ],
        }
    }
}

impl FilterOptions {
    /// Standard options plus one learning-path option per membership id
    /// found in the catalog, in first-seen order.
    pub fn for_catalog(courses: &[Course]) -> Self {
        let mut options = FilterOptions::default();
        for path in courses.iter().flat_map(|c| c.learning_path.iter()) {
            let Some(id) = path.internal_id else { continue };
            let value = id.to_string();
            if options.learning_paths.iter().any(|o| o.value == value) {
                continue;
            }
            let label = path.name.clone().unwrap_or_else(|| format!("Learning path {id}"));
            options.learning_paths.push(FilterOption { value, label, expands_to: Vec::new() });
        }
        options
    }

    pub fn group(&self, group: FacetGroup) -> &[FilterOption] {
        match group {
            FacetGroup::DifficultyLevels => &self.difficulty_levels,
            FacetGroup::Languages => &self.languages,
            FacetGroup::LearningPaths => &self.learning_paths,
            FacetGroup::DeliveryMethods => &self.delivery_methods,
        }
    }

    pub fn contains(&self, group: FacetGroup, value: &str) -> bool {
        self.group(group).iter().any(|o| o.covers(value))
    }

    /// Codes a toggle of `value` flips, or `None` for an unknown value.
    pub fn expand(&self, group: FacetGroup, value: &str) -> Option<Vec<String>> {
        let options = self.group(group);
        if let Some(opt) = options.iter().find(|o| o.value == value) {
            return Some(opt.codes());
        }
        options.iter().any(|o| o.covers(value)).then(|| vec![value.to_string()])
    }

    /// Flips each value (after expansion) in `current`. Unknown values are
    /// dropped without error.
    pub fn toggle(&self, group: FacetGroup, current: &[String], values: &[String]) -> Vec<String> {
        let mut next = current.to_vec();
        for value in values {
            let Some(codes) = self.expand(group, value) else {
                tracing::debug!(?group, %value, "ignoring unknown filter value");
                continue;
            };
            for code in codes {
                if let Some(pos) = next.iter().position(|v| *v == code) {
                    next.remove(pos);
                } else {
                    next.push(code);
                }
            }
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    pub search: String,
    pub difficulty_levels: BTreeSet<DifficultyLevel>,
    pub languages: BTreeSet<String>,
    pub learning_paths: BTreeSet<String>,
    pub delivery_methods: BTreeSet<String>,
}

impl FilterSpec {
    /// Builds the spec from URL state, keeping only values in the option
    /// domain of each facet.
    pub fn from_query(state: &QueryState, options: &FilterOptions) -> Self {
        let pick = |group: FacetGroup, values: &[String]| -> BTreeSet<String> {
            values.iter().filter(|v| options.contains(group, v)).cloned().collect()
        };
        FilterSpec {
            search: state.search.clone(),
            difficulty_levels: state
                .difficulty_levels
                .iter()
                .filter_map(|v| DifficultyLevel::parse(v))
                .collect(),
            languages: pick(FacetGroup::Languages, &state.languages),
            learning_paths: pick(FacetGroup::LearningPaths, &state.learning_paths),
            delivery_methods: pick(FacetGroup::DeliveryMethods, &state.delivery_methods),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
            && self.difficulty_levels.is_empty()
            && self.languages.is_empty()
            && self.learning_paths.is_empty()
            && self.delivery_methods.is_empty()
    }

    fn matches(&self, course: &Course, needle: Option<&str>, locale: &Locale) -> bool {
        if !self.learning_paths.is_empty()
            && !course.learning_path.iter().any(|p| {
                p.internal_id
                    .map(|id| self.learning_paths.contains(&id.to_string()))
                    .unwrap_or(false)
            })
        {
            return false;
        }
        if !self.difficulty_levels.is_empty()
            && !course
                .difficulty_level
                .map(|d| self.difficulty_levels.contains(&d))
                .unwrap_or(false)
        {
            return false;
        }
        if !in_set(&self.languages, course.primary_language.as_deref()) {
            return false;
        }
        if !in_set(&self.delivery_methods, course.delivery_method.as_deref()) {
            return false;
        }
        match needle {
            Some(n) => locale.fold(&course.full_description).contains(n),
            None => true,
        }
    }
}

fn in_set(selected: &BTreeSet<String>, value: Option<&str>) -> bool {
    selected.is_empty() || value.map(|v| selected.contains(v)).unwrap_or(false)
}

/// Displayed course list for a filter and sort key.
pub fn derive(courses: &[Course], filter: &FilterSpec, sort: SortKey, locale: &Locale) -> Vec<Course> {
    let needle = (!filter.search.is_empty()).then(|| locale.fold(&filter.search));
    let mut out: Vec<Course> = courses
        .iter()
        .filter(|c| filter.matches(c, needle.as_deref(), locale))
        .cloned()
        .collect();
    sort_courses(&mut out, sort, locale);
    out
}

/// Stable in-place sort of an owned list.
pub fn sort_courses(courses: &mut [Course], sort: SortKey, locale: &Locale) {
    match sort {
        SortKey::Recommended => {}
        SortKey::Alphabetical => courses.sort_by(|a, b| locale.compare(&a.title, &b.title)),
        SortKey::DifficultyAsc => courses.sort_by(|a, b| by_difficulty(a, b, false)),
        SortKey::DifficultyDesc => courses.sort_by(|a, b| by_difficulty(a, b, true)),
    }
}

// courses without a level go last in both directions
fn by_difficulty(a: &Course, b: &Course, descending: bool) -> Ordering {
    match (a.difficulty_level, b.difficulty_level) {
        (Some(x), Some(y)) if descending => y.rank().cmp(&x.rank()),
        (Some(x), Some(y)) => x.rank().cmp(&y.rank()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_items: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub courses: Vec<Course>,
    pub pagination: PaginationMeta,
}

/// Slices one page out of the full sorted list. Pages are 1-based; a page
/// past the end is empty.
pub fn paginate(courses: &[Course], page: u32, per_page: u32) -> Page {
    let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
    let page = page.max(1);
    let total_items = courses.len() as u32;
    let total_pages = total_items.div_ceil(per_page);
    let start = ((page - 1) as usize).saturating_mul(per_page as usize);
    let items = courses.iter().skip(start).take(per_page as usize).cloned().collect();
    Page {
        courses: items,
        pagination: PaginationMeta {
            page,
            per_page,
            total_pages,
            total_items,
            has_next: page < total_pages,
            has_prev: page > 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LearningPathMembership;

    fn course(id: u64, title: &str, level: Option<DifficultyLevel>) -> Course {
        Course { id, title: title.into(), difficulty_level: level, ..Default::default() }
    }

    fn titles(cs: &[Course]) -> Vec<&str> {
        cs.iter().map(|c| c.title.as_str()).collect()
    }

    fn en() -> Locale {
        Locale::default()
    }

    #[test]
    fn empty_filter_is_identity() {
        let raw = vec![
            course(1, "C", None),
            course(2, "A", Some(DifficultyLevel::Advanced)),
            course(3, "B", Some(DifficultyLevel::Basic)),
        ];
        let out = derive(&raw, &FilterSpec::default(), SortKey::Recommended, &en());
        assert_eq!(out, raw);
    }

    #[test]
    fn alphabetical_and_difficulty_scenario() {
        let raw = vec![course(1, "B", None), course(2, "A", Some(DifficultyLevel::Basic))];
        let spec = FilterSpec::default();
        assert_eq!(titles(&derive(&raw, &spec, SortKey::Alphabetical, &en())), ["A", "B"]);
        assert_eq!(titles(&derive(&raw, &spec, SortKey::DifficultyAsc, &en())), ["A", "B"]);
        // input untouched
        assert_eq!(titles(&raw), ["B", "A"]);
    }

    #[test]
    fn null_difficulty_sorts_last_both_ways() {
        let raw = vec![
            course(1, "none-1", None),
            course(2, "adv", Some(DifficultyLevel::Advanced)),
            course(3, "none-2", None),
            course(4, "basic", Some(DifficultyLevel::Basic)),
            course(5, "mid", Some(DifficultyLevel::Intermediate)),
        ];
        let spec = FilterSpec::default();
        let asc = derive(&raw, &spec, SortKey::DifficultyAsc, &en());
        assert_eq!(titles(&asc), ["basic", "mid", "adv", "none-1", "none-2"]);
        let desc = derive(&raw, &spec, SortKey::DifficultyDesc, &en());
        assert_eq!(titles(&desc), ["adv", "mid", "basic", "none-1", "none-2"]);
    }

    #[test]
    fn sorting_is_idempotent() {
        let raw = vec![
            course(1, "beta", Some(DifficultyLevel::Basic)),
            course(2, "Alpha", None),
            course(3, "alpha", Some(DifficultyLevel::Basic)),
            course(4, "gamma", Some(DifficultyLevel::Advanced)),
        ];
        for key in SortKey::ALL {
            let once = derive(&raw, &FilterSpec::default(), key, &en());
            let twice = derive(&once, &FilterSpec::default(), key, &en());
            assert_eq!(once, twice, "{key:?}");
        }
    }

    #[test]
    fn alphabetical_is_case_insensitive_with_lowercase_first() {
        let raw = vec![course(1, "beta", None), course(2, "Alpha", None), course(3, "alpha", None)];
        let out = derive(&raw, &FilterSpec::default(), SortKey::Alphabetical, &en());
        assert_eq!(titles(&out), ["alpha", "Alpha", "beta"]);
    }

    #[test]
    fn language_filter_scenario() {
        let mut a = course(1, "en", None);
        a.primary_language = Some("en".into());
        let mut b = course(2, "fr", None);
        b.primary_language = Some("fr".into());
        let spec = FilterSpec { languages: ["en".to_string()].into(), ..Default::default() };
        let out = derive(&[a, b], &spec, SortKey::Recommended, &en());
        assert_eq!(titles(&out), ["en"]);
    }

    #[test]
    fn facets_are_conjunctive_and_values_disjunctive() {
        let mut raw = Vec::new();
        for (id, lang, level, method) in [
            (1, "en", Some(DifficultyLevel::Basic), "self_paced"),
            (2, "en", Some(DifficultyLevel::Advanced), "self_paced"),
            (3, "de", Some(DifficultyLevel::Basic), "blended"),
            (4, "fr", Some(DifficultyLevel::Intermediate), "self_paced"),
            (5, "en", None, "self_paced"),
        ] {
            let mut c = course(id, &id.to_string(), level);
            c.primary_language = Some(lang.into());
            c.delivery_method = Some(method.into());
            raw.push(c);
        }
        let spec = FilterSpec {
            languages: ["en".to_string(), "fr".to_string()].into(),
            difficulty_levels: [DifficultyLevel::Basic, DifficultyLevel::Intermediate].into(),
            delivery_methods: ["self_paced".to_string()].into(),
            ..Default::default()
        };
        let out = derive(&raw, &spec, SortKey::Recommended, &en());
        assert_eq!(titles(&out), ["1", "4"]);
        for c in &out {
            assert!(spec.languages.contains(c.primary_language.as_deref().unwrap()));
            assert!(spec.difficulty_levels.contains(&c.difficulty_level.unwrap()));
        }
    }

    #[test]
    fn learning_path_filter_matches_any_membership() {
        let mut a = course(1, "a", None);
        a.learning_path = vec![
            LearningPathMembership { internal_id: Some(3), name: None },
            LearningPathMembership { internal_id: Some(9), name: None },
        ];
        let b = course(2, "b", None);
        let spec = FilterSpec { learning_paths: ["9".to_string()].into(), ..Default::default() };
        assert_eq!(titles(&derive(&[a, b], &spec, SortKey::Recommended, &en())), ["a"]);
    }

    #[test]
    fn search_is_case_folded_over_full_description() {
        let mut a = course(1, "a", None);
        a.full_description = "Intro to ASYNC Rust".into();
        let mut b = course(2, "async in the title", None);
        b.full_description = "nothing here".into();
        let spec = FilterSpec { search: "async".into(), ..Default::default() };
        assert_eq!(titles(&derive(&[a, b], &spec, SortKey::Recommended, &en())), ["a"]);
    }

    #[test]
    fn turkish_folding_handles_dotted_i() {
        let tr = Locale::new("tr-TR");
        assert_eq!(tr.fold("İSTANBUL"), "istanbul");
        assert_eq!(tr.fold("IŞIK"), "ışık");
        assert_eq!(Locale::from_accept_language("tr-TR,tr;q=0.9,en;q=0.8"), Some(tr));
        assert_eq!(Locale::from_accept_language("*"), None);
    }

    #[test]
    fn from_query_drops_values_outside_the_domain() {
        let state = QueryState {
            difficulty_levels: vec!["basic".into(), "expert".into()],
            languages: vec!["en-us".into(), "klingon".into()],
            delivery_methods: vec!["blended".into()],
            learning_paths: vec!["4".into()],
            ..Default::default()
        };
        let spec = FilterSpec::from_query(&state, &FilterOptions::default());
        assert_eq!(spec.difficulty_levels, [DifficultyLevel::Basic].into());
        assert_eq!(spec.languages, ["en-us".to_string()].into());
        assert_eq!(spec.delivery_methods, ["blended".to_string()].into());
        assert!(spec.learning_paths.is_empty());
    }

    #[test]
    fn toggle_expands_and_flips() {
        let opts = FilterOptions::default();
        let on = opts.toggle(FacetGroup::Languages, &[], &["en".into()]);
        assert_eq!(on, ["en", "en-us", "en-gb"]);
        let off = opts.toggle(FacetGroup::Languages, &on, &["en".into()]);
        assert!(off.is_empty());
        let ignored = opts.toggle(FacetGroup::DifficultyLevels, &["basic".into()], &["expert".into()]);
        assert_eq!(ignored, ["basic"]);
    }

    #[test]
    fn learning_path_options_come_from_catalog() {
        let mut a = course(1, "a", None);
        a.learning_path = vec![LearningPathMembership { internal_id: Some(5), name: Some("Cloud".into()) }];
        let mut b = course(2, "b", None);
        b.learning_path = vec![
            LearningPathMembership { internal_id: Some(5), name: Some("Cloud".into()) },
            LearningPathMembership { internal_id: Some(6), name: None },
        ];
        let opts = FilterOptions::for_catalog(&[a, b]);
        let values: Vec<_> = opts.learning_paths.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, ["5", "6"]);
        assert_eq!(opts.learning_paths[1].label, "Learning path 6");
    }

    #[test]
    fn paginate_slices_and_reports_meta() {
        let raw: Vec<Course> = (1..=25).map(|i| course(i, &i.to_string(), None)).collect();
        let p = paginate(&raw, 3, 12);
        assert_eq!(titles(&p.courses), ["25"]);
        assert_eq!(p.pagination.total_pages, 3);
        assert!(p.pagination.has_prev);
        assert!(!p.pagination.has_next);

        let past_end = paginate(&raw, 9, 12);
        assert!(past_end.courses.is_empty());

        let zero = paginate(&raw, 1, 0);
        assert_eq!(zero.pagination.per_page, DEFAULT_PER_PAGE);
        assert_eq!(zero.courses.len(), 12);
    }

    #[test]
    fn sort_key_parses_wire_values() {
        for key in SortKey::ALL {
            assert_eq!(SortKey::parse(key.as_str()), key);
        }
        assert_eq!(SortKey::parse("bogus"), SortKey::Recommended);
    }
}

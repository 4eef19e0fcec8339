//! Two-way binding between dashboard state and the URL query string.
//!
//! The location is the only place dashboard state lives, so every mutation
//! goes through [`QueryStore`], which rewrites the full query string and
//! replaces the current location instead of pushing a new one.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::catalog::SortKey;

pub const DEFAULT_PER_PAGE: u32 = 12;

// application/x-www-form-urlencoded leaves only these unescaped
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Search,
    Sort,
    DifficultyLevels,
    Languages,
    LearningPaths,
    DeliveryMethods,
    CurrentPage,
    PerPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Text,
    List,
    Int,
}

impl ParamKey {
    pub const ALL: [ParamKey; 8] = [
        Self::Search,
        Self::Sort,
        Self::DifficultyLevels,
        Self::Languages,
        Self::LearningPaths,
        Self::DeliveryMethods,
        Self::CurrentPage,
        Self::PerPage,
    ];

    /// Keys the catalog filter panel reads and clears.
    pub const FILTERS: [ParamKey; 5] = [
        Self::Search,
        Self::DifficultyLevels,
        Self::Languages,
        Self::LearningPaths,
        Self::DeliveryMethods,
    ];

    pub fn short(self) -> &'static str {
        match self {
            Self::Search => "q",
            Self::Sort => "s",
            Self::DifficultyLevels => "fDiff",
            Self::Languages => "fLan",
            Self::LearningPaths => "fLern",
            Self::DeliveryMethods => "fDel",
            Self::CurrentPage => "pAct",
            Self::PerPage => "pPer",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Sort => "sort",
            Self::DifficultyLevels => "difficultyLevels",
            Self::Languages => "languages",
            Self::LearningPaths => "learningPaths",
            Self::DeliveryMethods => "deliveryMethods",
            Self::CurrentPage => "paginCurrentPage",
            Self::PerPage => "paginPerPage",
        }
    }

    pub fn from_short(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.short() == s)
    }

    pub fn from_field(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.field() == s)
    }

    fn coercion(self) -> Coercion {
        match self {
            Self::DifficultyLevels | Self::Languages | Self::LearningPaths | Self::DeliveryMethods => {
                Coercion::List
            }
            Self::CurrentPage | Self::PerPage => Coercion::Int,
            Self::Search | Self::Sort => Coercion::Text,
        }
    }
}

/// A raw value handed to [`QueryStore::write`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
    Int(u32),
    /// Drops the parameter and resets the field to its default.
    Empty,
}

impl ParamValue {
    fn is_empty(&self) -> bool {
        match self {
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::List(v) => v.is_empty(),
            ParamValue::Int(_) => false,
            ParamValue::Empty => true,
        }
    }

    fn format(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::List(v) => v.join(","),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Empty => String::new(),
        }
    }
}

/// Typed view of every recognised parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub search: String,
    pub sort: SortKey,
    pub difficulty_levels: Vec<String>,
    pub languages: Vec<String>,
    pub learning_paths: Vec<String>,
    pub delivery_methods: Vec<String>,
    #[serde(rename = "paginCurrentPage")]
    pub current_page: u32,
    #[serde(rename = "paginPerPage")]
    pub per_page: u32,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            search: String::new(),
            sort: SortKey::default(),
            difficulty_levels: Vec::new(),
            languages: Vec::new(),
            learning_paths: Vec::new(),
            delivery_methods: Vec::new(),
            current_page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl QueryState {
    pub fn list(&self, key: ParamKey) -> Option<&Vec<String>> {
        match key {
            ParamKey::DifficultyLevels => Some(&self.difficulty_levels),
            ParamKey::Languages => Some(&self.languages),
            ParamKey::LearningPaths => Some(&self.learning_paths),
            ParamKey::DeliveryMethods => Some(&self.delivery_methods),
            _ => None,
        }
    }

    fn reset(&mut self, key: ParamKey) {
        let d = QueryState::default();
        match key {
            ParamKey::Search => self.search = d.search,
            ParamKey::Sort => self.sort = d.sort,
            ParamKey::DifficultyLevels => self.difficulty_levels = d.difficulty_levels,
            ParamKey::Languages => self.languages = d.languages,
            ParamKey::LearningPaths => self.learning_paths = d.learning_paths,
            ParamKey::DeliveryMethods => self.delivery_methods = d.delivery_methods,
            ParamKey::CurrentPage => self.current_page = d.current_page,
            ParamKey::PerPage => self.per_page = d.per_page,
        }
    }

    /// Seeds one field from its raw URL text. Unparsable integers keep the
    /// default.
    fn seed(&mut self, key: ParamKey, raw: &str) {
        match key.coercion() {
            Coercion::Text => match key {
                ParamKey::Search => self.search = raw.to_string(),
                ParamKey::Sort => self.sort = SortKey::parse(raw),
                _ => {}
            },
            Coercion::List => {
                let items = split_list(raw);
                match key {
                    ParamKey::DifficultyLevels => self.difficulty_levels = items,
                    ParamKey::Languages => self.languages = items,
                    ParamKey::LearningPaths => self.learning_paths = items,
                    ParamKey::DeliveryMethods => self.delivery_methods = items,
                    _ => {}
                }
            }
            Coercion::Int => match raw.trim().parse::<u32>() {
                Ok(n) if key == ParamKey::CurrentPage => self.current_page = n,
                Ok(n) => self.per_page = n,
                Err(_) => self.reset(key),
            },
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').filter(|s| !s.is_empty()) {
        if !out.iter().any(|v| v == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Path plus query string of the page being viewed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub pathname: String,
    /// Query string without the leading `?`.
    pub search: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>, search: impl Into<String>) -> Self {
        let search = search.into();
        Location {
            pathname: pathname.into(),
            search: search.strip_prefix('?').map(str::to_string).unwrap_or(search),
        }
    }

    pub fn parse(href: &str) -> Self {
        match href.split_once('?') {
            Some((path, query)) => Location::new(path, query),
            None => Location::new(href, ""),
        }
    }

    pub fn href(&self) -> String {
        if self.search.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, self.search)
        }
    }
}

/// Ordered query pairs, duplicate keys allowed, like `URLSearchParams`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchParams(Vec<(String, String)>);

impl SearchParams {
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = query
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => (decode(k), decode(v)),
                None => (decode(p), String::new()),
            })
            .collect();
        SearchParams(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Replaces the first occurrence in place and drops the rest; appends
    /// when the key is new.
    pub fn set(&mut self, key: &str, value: String) {
        match self.0.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.0[idx].1 = value;
                let mut seen = 0usize;
                self.0.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn delete(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn encode(s: &str) -> String {
    // a literal '%' is itself escaped, so "%20" can only come from a space
    utf8_percent_encode(s, FORM).to_string().replace("%20", "+")
}

fn decode(s: &str) -> String {
    percent_decode_str(&s.replace('+', " ")).decode_utf8_lossy().into_owned()
}

/// In-memory dashboard state bound to a location.
#[derive(Debug, Clone)]
pub struct QueryStore {
    location: Location,
    state: QueryState,
}

impl QueryStore {
    /// Seeds every bound key present in the location; the rest keep their
    /// defaults.
    pub fn mount(location: Location, keys: &[ParamKey]) -> Self {
        let params = SearchParams::parse(&location.search);
        let mut state = QueryState::default();
        for key in keys {
            if let Some(raw) = params.get(key.short()) {
                state.seed(*key, raw);
            }
        }
        QueryStore { location, state }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Current values of the requested keys; other fields at their default.
    pub fn read(&self, keys: &[ParamKey]) -> QueryState {
        let mut out = QueryState::default();
        for key in keys {
            match key {
                ParamKey::Search => out.search = self.state.search.clone(),
                ParamKey::Sort => out.sort = self.state.sort,
                ParamKey::DifficultyLevels => out.difficulty_levels = self.state.difficulty_levels.clone(),
                ParamKey::Languages => out.languages = self.state.languages.clone(),
                ParamKey::LearningPaths => out.learning_paths = self.state.learning_paths.clone(),
                ParamKey::DeliveryMethods => out.delivery_methods = self.state.delivery_methods.clone(),
                ParamKey::CurrentPage => out.current_page = self.state.current_page,
                ParamKey::PerPage => out.per_page = self.state.per_page,
            }
        }
        out
    }

    pub fn write(&mut self, key: ParamKey, value: ParamValue) {
        self.write_batch(&[(key, value)]);
    }

    /// Applies every write of one user action as a single transition: one
    /// read of the current query, one replaced location.
    pub fn write_batch(&mut self, writes: &[(ParamKey, ParamValue)]) {
        let mut params = SearchParams::parse(&self.location.search);
        let mut next = self.state.clone();
        for (key, value) in writes {
            if value.is_empty() {
                params.delete(key.short());
                next.reset(*key);
                continue;
            }
            let raw = match (key.coercion(), value) {
                (Coercion::List, ParamValue::List(items)) => {
                    let mut deduped: Vec<String> = Vec::new();
                    for item in items.iter().filter(|s| !s.is_empty()) {
                        if !deduped.contains(item) {
                            deduped.push(item.clone());
                        }
                    }
                    if deduped.is_empty() {
                        params.delete(key.short());
                        next.reset(*key);
                        continue;
                    }
                    deduped.join(",")
                }
                _ => value.format(),
            };
            next.seed(*key, &raw);
            params.set(key.short(), raw);
        }
        tracing::debug!(search = %params.to_query_string(), "replacing location");
        self.location = Location {
            pathname: self.location.pathname.clone(),
            search: params.to_query_string(),
        };
        self.state = next;
    }

    /// Whether the location carries the parameter at all.
    pub fn is_set(&self, key: ParamKey) -> bool {
        SearchParams::parse(&self.location.search).get(key.short()).is_some()
    }
}

use std::fmt;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(1000);

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        next company
  k / Up          previous company
  l / Right       next page
  h / Left        previous page
  g / G           first / last page

Filtering
  /               search by name (Enter keeps, Esc reverts)
  o / O           next / previous location
  i / I           next / previous industry
  s               cycle sort: none, name, location, industry
  c               clear all filters

Other
  Enter           show company details
  y               copy company as csv line
  r               reload data
  ?               this help
  Esc             close popup
  q               quit";

#[derive(Debug, Error)]
pub enum DirError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("invalid json: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    HttpStatus(u16),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("could not install logger: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

/// A single directory entry. Loaded once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Company {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl Company {
    pub fn new(id: impl Into<String>, name: &str, location: &str, industry: &str) -> Self {
        Company {
            id: id.into(),
            name: name.to_string(),
            location: Some(location.to_string()),
            industry: Some(industry.to_string()),
        }
    }

    /// Value used when ordering by `key`. `None` when the record has no such field.
    pub fn field(&self, key: SortKey) -> Option<&str> {
        match key {
            SortKey::None => None,
            SortKey::Name => Some(self.name.as_str()),
            SortKey::Location => self.location.as_deref(),
            SortKey::Industry => self.industry.as_deref(),
        }
    }
}

// Ids show up as numbers in the bundled data and as strings from some services.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number as id, got {other}"
        ))),
    }
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    None,
    Name,
    Location,
    Industry,
}

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            SortKey::None => SortKey::Name,
            SortKey::Name => SortKey::Location,
            SortKey::Location => SortKey::Industry,
            SortKey::Industry => SortKey::None,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::None => "none",
            SortKey::Name => "name",
            SortKey::Location => "location",
            SortKey::Industry => "industry",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Location,
    Industry,
}

/// Current filter, sort and page selection.
///
/// Values are never edited in place: every `with_*` call returns a new state.
/// Changing a filter or the sort key always starts over at page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub name_filter: String,
    pub location_filter: String,
    pub industry_filter: String,
    pub sort_key: SortKey,
    pub page: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            name_filter: String::new(),
            location_filter: String::new(),
            industry_filter: String::new(),
            sort_key: SortKey::None,
            page: 1,
        }
    }
}

impl QueryState {
    pub fn filter(&self, field: FilterField) -> &str {
        match field {
            FilterField::Name => &self.name_filter,
            FilterField::Location => &self.location_filter,
            FilterField::Industry => &self.industry_filter,
        }
    }

    pub fn with_filter(&self, field: FilterField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let value = value.into();
        match field {
            FilterField::Name => next.name_filter = value,
            FilterField::Location => next.location_filter = value,
            FilterField::Industry => next.industry_filter = value,
        }
        next.page = 1;
        next
    }

    pub fn with_sort_key(&self, sort_key: SortKey) -> Self {
        QueryState {
            sort_key,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: usize) -> Self {
        QueryState {
            page: page.max(1),
            ..self.clone()
        }
    }

    /// Drops all filters but keeps the sort order.
    pub fn cleared(&self) -> Self {
        QueryState {
            sort_key: self.sort_key,
            ..QueryState::default()
        }
    }

    pub fn has_filters(&self) -> bool {
        !(self.name_filter.is_empty()
            && self.location_filter.is_empty()
            && self.industry_filter.is_empty())
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DirConfig {
    pub page_size: usize,
    pub event_poll_time: u64,
    pub load_delay: Duration,
    pub max_column_width: usize,
}

impl Default for DirConfig {
    fn default() -> Self {
        DirConfig {
            page_size: DEFAULT_PAGE_SIZE,
            event_poll_time: 100,
            load_delay: DEFAULT_LOAD_DELAY,
            max_column_width: 40,
        }
    }
}

impl DirConfig {
    pub fn validate(&self) -> Result<(), DirError> {
        if self.page_size == 0 {
            return Err(DirError::InvalidConfig("page size must be at least 1".into()));
        }
        if self.max_column_width < 4 {
            return Err(DirError::InvalidConfig(
                "max column width must be at least 4".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    EditNameFilter,
    NextLocation,
    PrevLocation,
    NextIndustry,
    PrevIndustry,
    CycleSort,
    ClearFilters,
    Enter,
    Exit,
    CopyRecord,
    Reload,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_change_resets_page() {
        let state = QueryState::default().with_page(4);
        assert_eq!(state.page, 4);

        let next = state.with_filter(FilterField::Location, "NY");
        assert_eq!(next.page, 1);
        assert_eq!(next.location_filter, "NY");
        // Original value is untouched
        assert_eq!(state.page, 4);
        assert!(state.location_filter.is_empty());

        let sorted = state.with_sort_key(SortKey::Industry);
        assert_eq!(sorted.page, 1);
        assert_eq!(sorted.sort_key, SortKey::Industry);
    }

    #[test]
    fn page_is_always_positive() {
        assert_eq!(QueryState::default().with_page(0).page, 1);
    }

    #[test]
    fn cleared_keeps_sort_key() {
        let state = QueryState::default()
            .with_sort_key(SortKey::Name)
            .with_filter(FilterField::Name, "ac")
            .with_filter(FilterField::Industry, "Tech")
            .with_page(3);
        assert!(state.has_filters());

        let cleared = state.cleared();
        assert!(!cleared.has_filters());
        assert_eq!(cleared.sort_key, SortKey::Name);
        assert_eq!(cleared.page, 1);
    }

    #[test]
    fn sort_key_cycles_back_to_none() {
        let mut key = SortKey::None;
        let mut seen = Vec::new();
        for _ in 0..4 {
            key = key.next();
            seen.push(key);
        }
        assert_eq!(
            seen,
            vec![SortKey::Name, SortKey::Location, SortKey::Industry, SortKey::None]
        );
    }

    #[test]
    fn company_accepts_numeric_and_string_ids() {
        let json = r#"[
            {"id": 7, "name": "Acme", "location": "NY", "industry": "Tech"},
            {"id": "b-2", "name": "Bolt", "location": null}
        ]"#;
        let companies: Vec<Company> = serde_json::from_str(json).unwrap();
        assert_eq!(companies[0].id, "7");
        assert_eq!(companies[1].id, "b-2");
        assert_eq!(companies[1].location, None);
        assert_eq!(companies[1].industry, None);
        assert_eq!(companies[1].field(SortKey::Name), Some("Bolt"));
        assert_eq!(companies[1].field(SortKey::Location), None);
    }

    #[test]
    fn company_rejects_structured_id() {
        let json = r#"[{"id": {"x": 1}, "name": "Acme"}]"#;
        assert!(serde_json::from_str::<Vec<Company>>(json).is_err());
    }

    #[test]
    fn config_validation() {
        assert!(DirConfig::default().validate().is_ok());
        let err = DirConfig::default().with_page_size(0).validate().unwrap_err();
        assert!(matches!(err, DirError::InvalidConfig(_)));
        assert!(DirConfig::default().with_max_column_width(2).validate().is_err());
    }
}

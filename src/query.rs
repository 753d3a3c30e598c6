//! In-memory query engine for the company directory.
//!
//! Everything here is a pure function of the dataset and a [`QueryState`]:
//! filter, then sort, then cut out one page. Facets are derived from the full
//! dataset so picking one filter never hides the options of another.

use std::cmp::Ordering;
use std::collections::HashSet;

use rayon::prelude::*;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::domain::{Company, QueryState, SortKey};

/// The visible slice of the directory for one query state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub page_records: Vec<Company>,
    pub total_pages: usize,
    pub total_matches: usize,
}

impl Default for View {
    fn default() -> Self {
        View {
            page_records: Vec::new(),
            total_pages: 1,
            total_matches: 0,
        }
    }
}

/// Derive the page selected by `query`.
///
/// The page number is not clamped. Asking for a page past the end yields an
/// empty `page_records` while `total_pages` still reports the real count, so
/// callers should run the page through [`clamp_page`] after any change.
pub fn compute_view(dataset: &[Company], query: &QueryState, page_size: usize) -> View {
    let page_size = page_size.max(1);

    let mut matches = filter_records(dataset, query);
    sort_records(&mut matches, query.sort_key);

    let total_matches = matches.len();
    let start = query.page.saturating_sub(1).saturating_mul(page_size);
    let page_records = matches
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    View {
        page_records,
        total_pages: page_count(total_matches, page_size),
        total_matches,
    }
}

/// Number of pages for `matches` results. Never less than one.
pub fn page_count(matches: usize, page_size: usize) -> usize {
    matches.div_ceil(page_size.max(1)).max(1)
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Check a single record against the filters. `name_needle` must already be lowercased.
pub fn matches_filters(company: &Company, name_needle: &str, query: &QueryState) -> bool {
    let name_ok = name_needle.is_empty() || company.name.to_lowercase().contains(name_needle);
    name_ok
        && exact_match(&query.location_filter, company.location.as_deref())
        && exact_match(&query.industry_filter, company.industry.as_deref())
}

fn exact_match(filter: &str, value: Option<&str>) -> bool {
    filter.is_empty() || value == Some(filter)
}

// Order of the dataset is kept, rayon collects in input order.
fn filter_records<'a>(dataset: &'a [Company], query: &QueryState) -> Vec<&'a Company> {
    let needle = query.name_filter.to_lowercase();
    dataset
        .par_iter()
        .filter(|company| matches_filters(company, &needle, query))
        .collect()
}

fn sort_records(records: &mut [&Company], key: SortKey) {
    if key == SortKey::None {
        return;
    }
    // sort_by is stable, equal keys keep their filter order
    records.sort_by(|a, b| compare_field(a.field(key), b.field(key)));
}

// Records without the field go last.
fn compare_field(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => locale_cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Human oriented string order.
///
/// Compares in levels, each one only breaking ties of the previous:
/// base letters without accents or case ("Émile" < "Zeta"), then accents
/// ("resume" < "résumé"), then case with lowercase first ("acme" < "Acme"),
/// and finally code points so the result is a total order.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented_letters(a).cmp(accented_letters(b)))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn accented_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().flat_map(char::to_lowercase).nfd()
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    accented_letters(s).filter(|c| !is_combining_mark(*c))
}

pub fn distinct_locations(dataset: &[Company]) -> Vec<String> {
    distinct_values(dataset, |c| c.location.as_deref())
}

pub fn distinct_industries(dataset: &[Company]) -> Vec<String> {
    distinct_values(dataset, |c| c.industry.as_deref())
}

fn distinct_values<'a, F>(dataset: &'a [Company], field: F) -> Vec<String>
where
    F: Fn(&'a Company) -> Option<&'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    dataset
        .iter()
        .filter_map(field)
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

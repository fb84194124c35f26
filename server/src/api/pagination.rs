//! Lenient parsing of `page` / `per_page` query parameters.
//!
//! Out-of-range or unparsable values fall back to defaults, never
//! rejected.

use serde::Deserialize;

use crate::store::PageRequest;

pub const DEFAULT_PER_PAGE: u32 = 20;
/// Default for listings nested under a parent resource.
pub const NESTED_DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 100;

/// Raw paging parameters, kept as strings so bad input can fall back to
/// defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn resolve(&self, default_per_page: u32) -> PageRequest {
        resolve(self.page.as_deref(), self.per_page.as_deref(), default_per_page)
    }
}

/// `page < 1` becomes 1. `per_page` outside `1..=MAX_PER_PAGE`, missing, or
/// unparsable falls back to `default_per_page`.
#[must_use]
pub fn resolve(page: Option<&str>, per_page: Option<&str>, default_per_page: u32) -> PageRequest {
    let page = page
        .and_then(|p| p.trim().parse::<i64>().ok())
        .map_or(1, |p| u32::try_from(p.max(1)).unwrap_or(u32::MAX));

    let per_page = per_page
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|p| (1..=MAX_PER_PAGE).contains(p))
        .unwrap_or(default_per_page);

    PageRequest::new(page, per_page)
}

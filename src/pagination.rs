//! Pagination and list-query utilities shared by all list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
pub const MIN_PER_PAGE: i64 = 1;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page number (1-indexed). Defaults to 1.
    #[param(minimum = 1, default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,

    /// Number of items per page. Defaults to 20, max 100.
    #[param(minimum = 1, maximum = 100, default = 20)]
    #[serde(default = "default_per_page")]
    pub per_page: i64,

    /// Optional case-insensitive substring filter on the resource's name field.
    #[serde(default)]
    pub search: Option<String>,

    /// Sort direction for endpoints with a natural ordering.
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            order: SortOrder::default(),
        }
    }
}

impl ListParams {
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE)
    }

    pub fn limit_offset(&self) -> (i64, i64) {
        (self.per_page(), (self.page() - 1) * self.per_page())
    }

    /// SQL LIKE pattern for the search term, if one was given.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        Some(format!("%{}%", term.replace('%', "\\%").replace('_', "\\_")))
    }

    pub fn into_metadata(self, total_count: i64) -> PaginationMeta {
        PaginationMeta::new(self.page(), self.per_page(), total_count)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: i64, per_page: i64, total_count: i64) -> Self {
        let total_pages = if total_count == 0 {
            1
        } else {
            (total_count + per_page - 1) / per_page
        };

        Self {
            page,
            per_page,
            total_count,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: i64, per_page: i64) -> ListParams {
        ListParams {
            page,
            per_page,
            ..Default::default()
        }
    }

    #[test]
    fn test_list_params_defaults() {
        let p = ListParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(p.order, SortOrder::Desc);
        assert!(p.search_pattern().is_none());
    }

    #[test]
    fn test_list_params_clamping() {
        assert_eq!(params(0, 20).page(), 1);
        assert_eq!(params(-5, 20).page(), 1);
        assert_eq!(params(1, 500).per_page(), MAX_PER_PAGE);
        assert_eq!(params(1, 0).per_page(), MIN_PER_PAGE);
    }

    #[test]
    fn test_limit_offset() {
        assert_eq!(params(1, 20).limit_offset(), (20, 0));
        assert_eq!(params(2, 20).limit_offset(), (20, 20));
        assert_eq!(params(3, 10).limit_offset(), (10, 20));
    }

    #[test]
    fn test_search_pattern() {
        let mut p = ListParams::default();
        p.search = Some("  ".to_string());
        assert!(p.search_pattern().is_none());

        p.search = Some("patel".to_string());
        assert_eq!(p.search_pattern().as_deref(), Some("%patel%"));

        // LIKE metacharacters in user input are escaped
        p.search = Some("100%".to_string());
        assert_eq!(p.search_pattern().as_deref(), Some("%100\\%%"));
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(1, 20, 100);
        assert_eq!(meta.total_pages, 5);
        assert!(meta.has_next);
        assert!(!meta.has_prev);

        let meta = PaginationMeta::new(5, 20, 100);
        assert!(!meta.has_next);
        assert!(meta.has_prev);

        let meta = PaginationMeta::new(1, 20, 0);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next);

        let meta = PaginationMeta::new(1, 20, 95);
        assert_eq!(meta.total_pages, 5);
    }
}

//! Pagination math shared by list endpoints and list views.
//!
//! Pages are 1-based. The server turns `page`/`limit` parameters into
//! `LIMIT`/`OFFSET`; the client tracks the current page against the total the
//! server reports.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 10;

/// Upper bound on the page size a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// Highest page a caller may request. Later pages are answered as this one,
/// which keeps `OFFSET` well inside `i64`.
pub const MAX_PAGE: i64 = 1_000_000;

/// `ceil(total_items / items_per_page)`, never less than 1.
pub fn total_pages(total_items: i64, items_per_page: i64) -> i64 {
    if total_items <= 0 || items_per_page <= 0 {
        return 1;
    }
    ((total_items + items_per_page - 1) / items_per_page).max(1)
}

/// `page` and `limit` as received in a query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// The `meta` block of a paginated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(params: &PageParams, total: i64) -> Self {
        let limit = params.limit();
        Self {
            page: params.page(),
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }
}

/// Client-side pagination state for one list.
///
/// Does not clamp `current_page` against `total_pages` on its own; the list
/// view that owns it decides when to clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: i64,
    items_per_page: i64,
    total_items: i64,
}

impl Pagination {
    pub fn new(items_per_page: i64) -> Self {
        Self {
            current_page: 1,
            items_per_page: items_per_page.max(1),
            total_items: 0,
        }
    }

    pub fn current_page(&self) -> i64 {
        self.current_page
    }

    pub fn items_per_page(&self) -> i64 {
        self.items_per_page
    }

    pub fn total_items(&self) -> i64 {
        self.total_items
    }

    pub fn total_pages(&self) -> i64 {
        total_pages(self.total_items, self.items_per_page)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    /// Record the total reported by the server.
    pub fn set_total_items(&mut self, total_items: i64) {
        self.total_items = total_items.max(0);
    }

    /// Move to `page` as given. Values below 1 become 1.
    pub fn set_page(&mut self, page: i64) {
        self.current_page = page.max(1);
    }

    /// Bring `current_page` back inside `1..=total_pages`. Returns whether it
    /// moved.
    pub fn clamp(&mut self) -> bool {
        let clamped = self.current_page.clamp(1, self.total_pages());
        let moved = clamped != self.current_page;
        self.current_page = clamped;
        moved
    }

    /// Changing the page size starts over at page 1.
    pub fn set_items_per_page(&mut self, items_per_page: i64) {
        self.items_per_page = items_per_page.max(1);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn params(&self) -> PageParams {
        PageParams::new(self.current_page, self.items_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_is_ceiling_with_minimum_one() {
        for total in 0..=250 {
            for per_page in 1..=30 {
                let expected = ((total as f64) / (per_page as f64)).ceil().max(1.0) as i64;
                assert_eq!(total_pages(total, per_page), expected, "{total}/{per_page}");
            }
        }
    }

    #[test]
    fn test_params_defaults_and_clamps() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_LIMIT);
        assert_eq!(params.offset(), 0);

        let params = PageParams::new(-3, 500);
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_LIMIT);

        let params = PageParams::new(3, 20);
        assert_eq!(params.offset(), 40);
    }

    #[test]
    fn test_huge_page_is_capped() {
        let params = PageParams::new(i64::MAX, MAX_LIMIT);
        assert_eq!(params.page(), MAX_PAGE);
        assert_eq!(params.offset(), (MAX_PAGE - 1) * MAX_LIMIT);
        assert_eq!(PageMeta::new(&params, 3).page, MAX_PAGE);
    }

    #[test]
    fn test_meta_reports_total_pages() {
        let meta = PageMeta::new(&PageParams::new(2, 10), 35);
        assert_eq!(meta.page, 2);
        assert_eq!(meta.total_pages, 4);
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["totalPages"], 4);
    }

    #[test]
    fn test_page_size_change_resets_to_first_page() {
        let mut pagination = Pagination::new(10);
        pagination.set_total_items(95);
        pagination.set_page(7);
        pagination.set_items_per_page(25);
        assert_eq!(pagination.current_page(), 1);
        assert_eq!(pagination.total_pages(), 4);
    }

    #[test]
    fn test_calculator_does_not_clamp_until_asked() {
        let mut pagination = Pagination::new(10);
        pagination.set_total_items(15);
        pagination.set_page(9);
        assert_eq!(pagination.current_page(), 9);
        assert!(!pagination.has_next());
        assert!(pagination.clamp());
        assert_eq!(pagination.current_page(), 2);
        assert!(!pagination.clamp());
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let mut pagination = Pagination::new(10);
        pagination.set_total_items(0);
        assert_eq!(pagination.total_pages(), 1);
        assert!(!pagination.has_previous());
        assert!(!pagination.has_next());
    }
}

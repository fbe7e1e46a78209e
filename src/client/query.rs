//! Query strings for list endpoints.
//!
//! Fields are emitted in a fixed order and only when present and non-blank,
//! so the same filter state always yields the same string. That string is
//! also the cache key of the fetch.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{ProductSort, SortOrder};
use crate::domain::pagination::Pagination;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<ProductSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ListQuery {
    pub fn page(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Page and limit taken from a list's pagination state.
    pub fn from_pagination(pagination: &Pagination) -> Self {
        Self::page(pagination.current_page(), pagination.items_per_page())
    }

    pub fn sorted(mut self, sort_by: ProductSort, sort_order: SortOrder) -> Self {
        self.sort_by = Some(sort_by);
        self.sort_order = Some(sort_order);
        self
    }

    pub fn category(mut self, category: Option<Uuid>) -> Self {
        self.category = category;
        self
    }

    pub fn product(mut self, product: Option<Uuid>) -> Self {
        self.product = product;
        self
    }

    pub fn status(mut self, status: Option<impl Into<String>>) -> Self {
        self.status = status.map(Into::into);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// `page=1&limit=10&search=lamp`. Blank strings are dropped.
    pub fn to_query_string(&self) -> String {
        let cleaned = ListQuery {
            status: non_blank(&self.status),
            search: non_blank(&self.search),
            ..self.clone()
        };
        // Flat scalar fields always serialize.
        serde_urlencoded::to_string(&cleaned).unwrap_or_default()
    }
}

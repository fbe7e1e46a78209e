//! In-process store used when no database is configured and in tests.
//!
//! Lock order when more than one table is held: categories, products,
//! reviews, orders, users.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::UserRecord;
use crate::domain::models::{Category, Order, Product, Review};
use crate::domain::pagination::PageParams;

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub(crate) categories: RwLock<HashMap<Uuid, Category>>,
    pub(crate) products: RwLock<HashMap<Uuid, Product>>,
    pub(crate) reviews: RwLock<HashMap<Uuid, Review>>,
    pub(crate) orders: RwLock<HashMap<Uuid, Order>>,
    pub(crate) users: RwLock<HashMap<Uuid, UserRecord>>,
}

/// Case-insensitive substring match.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Slice an already filtered and sorted list into one page plus the total.
pub(crate) fn paginate<T>(items: Vec<T>, params: &PageParams) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    (page, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_slices_and_counts() {
        let (page, total) = paginate((1..=25).collect::<Vec<_>>(), &PageParams::new(3, 10));
        assert_eq!(total, 25);
        assert_eq!(page, vec![21, 22, 23, 24, 25]);

        let (page, total) = paginate((1..=5).collect::<Vec<_>>(), &PageParams::new(4, 10));
        assert_eq!(total, 5);
        assert!(page.is_empty());
    }

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci("Brass Desk Lamp", "lamp"));
        assert!(!contains_ci("Brass Desk Lamp", "chair"));
    }
}

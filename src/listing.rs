//! Filter / sort / page composition shared by every listing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{Category, UserId};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const CATALOG_PAGE_SIZE: u32 = 8;
pub const ADMIN_PAGE_SIZE: u32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub const fn sql(&self) -> &'static str {
        match self { Self::Asc => "ASC", Self::Desc => "DESC" }
    }

    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self { Self::Asc => ordering, Self::Desc => ordering.reverse() }
    }
}

/// Column a listing may be sorted by.
pub trait SortKey: Copy {
    fn column(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort { #[default] Id, Name, Brand, Category, Price, Stock, CreatedAt }

impl SortKey for ProductSort {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Brand => "brand",
            Self::Category => "category",
            Self::Price => "price",
            Self::Stock => "stock",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort { Id, Total, Status, #[default] CreatedAt }

impl SortKey for OrderSort {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Total => "total",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSort { #[default] Id, FirstName, LastName, Email, Role, CreatedAt }

impl SortKey for UserSort {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sort<K> {
    pub key: K,
    pub direction: Direction,
}

impl<K> Sort<K> {
    pub const fn new(key: K, direction: Direction) -> Self { Self { key, direction } }
}

/// 1-based page number with a clamped page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page: page.max(1), per_page: per_page.clamp(1, MAX_PAGE_SIZE) }
    }
    pub const fn page(&self) -> u32 { self.page }
    pub const fn per_page(&self) -> u32 { self.per_page }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.per_page) }
    pub fn limit(&self) -> u64 { u64::from(self.per_page) }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(1, DEFAULT_PAGE_SIZE) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub brand: Option<String>,
    pub category: Option<Category>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Case-insensitive substring of first name, last name or email.
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery<F, K> {
    pub filter: F,
    pub sort: Sort<K>,
    pub page: PageRequest,
}

pub type ProductQuery = ListQuery<ProductFilter, ProductSort>;
pub type OrderQuery = ListQuery<OrderFilter, OrderSort>;
pub type UserQuery = ListQuery<UserFilter, UserSort>;

/// One page of rows plus the size of the whole result set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page(),
            per_page: request.per_page(),
            total_pages: total_pages(total, request.per_page()),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

pub fn total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX)
}

/// Case-insensitive substring match; an empty needle matches everything.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Non-blank, trimmed search term.
pub fn search_term(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Slices an already filtered and sorted result set.
pub fn paginate<T>(rows: Vec<T>, request: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let data = rows.into_iter().skip(offset).take(request.per_page() as usize).collect();
    Page::new(data, total, request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        assert_eq!(total_pages(12, 5), 3);
        assert_eq!(total_pages(10, 5), 2);
        assert_eq!(total_pages(0, 5), 0);
        let req = PageRequest::new(2, 5);
        assert_eq!(req.offset(), 5);
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0), PageRequest::new(1, 1));
        assert_eq!(PageRequest::new(3, 1000).per_page(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_paginate_second_page() {
        let rows: Vec<u32> = (1..=12).collect();
        let page = paginate(rows, PageRequest::new(2, 5));
        assert_eq!(page.data, vec![6, 7, 8, 9, 10]);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);
        let last = paginate((1..=12).collect::<Vec<u32>>(), PageRequest::new(3, 5));
        assert_eq!(last.data, vec![11, 12]);
    }

    #[test]
    fn test_search_helpers() {
        assert!(contains_ci("Galaxy S24", "gal"));
        assert!(!contains_ci("Galaxy S24", "pixel"));
        assert_eq!(search_term(Some("  ")), None);
        assert_eq!(search_term(Some(" cam ")).as_deref(), Some("cam"));
        assert_eq!(Direction::Desc.apply(Ordering::Less), Ordering::Greater);
    }
}

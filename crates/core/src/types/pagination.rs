//! Page-based pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Requested page, as parsed from query parameters.
///
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// 1-indexed page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a clamped pagination.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Re-apply clamping after deserialization.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.page, self.per_page)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.clamped().per_page)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        let p = self.clamped();
        i64::from(p.page - 1) * i64::from(p.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assemble a page from a query result and the total row count.
    #[must_use]
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let p = pagination.clamped();
        let total_pages = if total <= 0 {
            0
        } else {
            let pages = (total + i64::from(p.per_page) - 1) / i64::from(p.per_page);
            u32::try_from(pages).unwrap_or(u32::MAX)
        };
        Self {
            items,
            page: p.page,
            per_page: p.per_page,
            total,
            total_pages,
        }
    }

    /// Convert the items, keeping paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let p = Pagination::new(3, 25);
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_clamping() {
        let p = Pagination::new(0, 10_000);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, Pagination::MAX_PER_PAGE);

        let raw = Pagination { page: 0, per_page: 0 };
        assert_eq!(raw.offset(), 0);
        assert_eq!(raw.limit(), 1);
    }

    #[test]
    fn test_total_pages() {
        let p = Pagination::new(1, 20);
        assert_eq!(Page::<()>::new(vec![], p, 0).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], p, 20).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], p, 21).total_pages, 2);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], Pagination::new(2, 2), 4).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 2);
    }
}

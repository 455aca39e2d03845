//! Page-based pagination for list views.

/// Requested page of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub per_page: u32,
}

impl Pagination {
    /// Build a pagination request, clamping the page to at least 1 and the
    /// page size to at least 1.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    /// SQL `LIMIT` value.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// SQL `OFFSET` value.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// One page of results with the total row count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    /// Wrap a page of rows.
    #[must_use]
    pub const fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
        }
    }

    /// Number of pages, at least 1.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let per_page = i64::from(self.per_page.max(1));
        let pages = (self.total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Map the rows, keeping the page bookkeeping.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let p = Pagination::new(Some(3), 20);
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let p = Pagination::new(Some(0), 20);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_page_flags() {
        let page: Page<()> = Page::new(vec![], Pagination::new(Some(1), 20), 41);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_prev());

        let last: Page<()> = Page::new(vec![], Pagination::new(Some(3), 20), 41);
        assert!(!last.has_next());
        assert!(last.has_prev());
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let page: Page<()> = Page::new(vec![], Pagination::new(None, 20), 0);
        assert_eq!(page.total_pages(), 1);
        assert!(!page.has_next());
    }
}

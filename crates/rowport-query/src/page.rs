//! Page windows and page navigation

use serde::{Deserialize, Serialize};

use crate::error::{QueryBuildError, QueryBuildResult};

/// A validated page window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> QueryBuildResult<Self> {
        if page_size == 0 {
            return Err(QueryBuildError::InvalidPageSize);
        }
        // the offset is bound as a signed 64-bit parameter
        let max_page = i64::MAX as u64 / page_size + 1;
        if page == 0 || page > max_page {
            return Err(QueryBuildError::PageOutOfRange { page, max_page });
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// Page navigation over a known row total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_rows: u64,
    pub page_size: u64,
}

impl Pagination {
    pub fn new(total_rows: u64, page_size: u64) -> QueryBuildResult<Self> {
        if page_size == 0 {
            return Err(QueryBuildError::InvalidPageSize);
        }
        Ok(Self {
            total_rows,
            page_size,
        })
    }

    /// Last valid page. An empty table still has page 1.
    pub fn max_page(&self) -> u64 {
        self.total_rows.div_ceil(self.page_size).max(1)
    }

    pub fn has_previous(&self, page: u64) -> bool {
        page > 1
    }

    pub fn has_next(&self, page: u64) -> bool {
        page < self.max_page()
    }

    /// Validate `page` against the total. Out-of-range pages are rejected,
    /// never clamped.
    pub fn request(&self, page: u64) -> QueryBuildResult<PageRequest> {
        let max_page = self.max_page();
        if page == 0 || page > max_page {
            return Err(QueryBuildError::PageOutOfRange { page, max_page });
        }
        PageRequest::new(page, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_derived_from_page() {
        let request = PageRequest::new(3, 50).unwrap();
        assert_eq!(request.offset(), 100);
        assert_eq!(request.limit(), 50);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(PageRequest::new(1, 0), Err(QueryBuildError::InvalidPageSize));
        assert_eq!(Pagination::new(10, 0), Err(QueryBuildError::InvalidPageSize));
    }

    #[test]
    fn huge_page_numbers_are_out_of_range() {
        let err = PageRequest::new(u64::MAX, 1000).unwrap_err();
        assert!(matches!(err, QueryBuildError::PageOutOfRange { page: u64::MAX, .. }));

        let last = i64::MAX as u64 / 1000 + 1;
        let request = PageRequest::new(last, 1000).unwrap();
        assert!(request.offset() <= i64::MAX as u64);
        assert!(PageRequest::new(last + 1, 1000).is_err());
    }

    #[test]
    fn max_page_rounds_up() {
        assert_eq!(Pagination::new(2500, 1000).unwrap().max_page(), 3);
        assert_eq!(Pagination::new(2000, 1000).unwrap().max_page(), 2);
        assert_eq!(Pagination::new(0, 1000).unwrap().max_page(), 1);
    }
}

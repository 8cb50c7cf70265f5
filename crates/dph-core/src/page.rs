//! # Pagination
//!
//! `page` is zero-based and `offset = page * limit`. Listing endpoints
//! clamp an oversized `limit` to the configured maximum; search rejects it.
//! Both reject a negative page or a non-positive limit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default and maximum page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBounds {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageBounds {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
        }
    }
}

/// Rejected pagination parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page must be zero or greater, got {0}")]
    NegativePage(i64),

    #[error("limit must be at least 1, got {0}")]
    NonPositiveLimit(i64),

    #[error("limit must be at most {max}, got {limit}")]
    LimitTooLarge { limit: i64, max: u32 },
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Validate for a listing endpoint. A `limit` above the maximum is
    /// clamped rather than rejected.
    pub fn clamped(
        page: Option<i64>,
        limit: Option<i64>,
        bounds: PageBounds,
    ) -> Result<Self, PageError> {
        Self::build(page, limit, bounds, true)
    }

    /// Validate for a search endpoint. Every out-of-range value is rejected.
    pub fn strict(
        page: Option<i64>,
        limit: Option<i64>,
        bounds: PageBounds,
    ) -> Result<Self, PageError> {
        Self::build(page, limit, bounds, false)
    }

    /// First page at the given limit.
    pub fn first(limit: u32) -> Self {
        Self { page: 0, limit }
    }

    fn build(
        page: Option<i64>,
        limit: Option<i64>,
        bounds: PageBounds,
        clamp: bool,
    ) -> Result<Self, PageError> {
        let page = page.unwrap_or(0);
        if page < 0 {
            return Err(PageError::NegativePage(page));
        }
        let page = u32::try_from(page).unwrap_or(u32::MAX);

        let limit = limit.unwrap_or(i64::from(bounds.default_limit));
        if limit < 1 {
            return Err(PageError::NonPositiveLimit(limit));
        }
        let max = i64::from(bounds.max_limit);
        let limit = if limit > max {
            if !clamp {
                return Err(PageError::LimitTooLarge {
                    limit,
                    max: bounds.max_limit,
                });
            }
            bounds.max_limit
        } else {
            // In range 1..=max, which fits in u32.
            limit as u32
        };

        Ok(Self { page, limit })
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.limit)
    }

    /// Apply this page to an already-ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(self.limit as usize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: PageBounds = PageBounds {
        default_limit: 25,
        max_limit: 100,
    };

    #[test]
    fn defaults_apply() {
        let p = PageRequest::clamped(None, None, BOUNDS).unwrap();
        assert_eq!(p, PageRequest { page: 0, limit: 25 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn offset_is_page_times_limit() {
        let p = PageRequest::strict(Some(3), Some(20), BOUNDS).unwrap();
        assert_eq!(p.offset(), 60);
    }

    #[test]
    fn listing_clamps_large_limit() {
        let p = PageRequest::clamped(Some(0), Some(500), BOUNDS).unwrap();
        assert_eq!(p.limit, 100);
    }

    #[test]
    fn search_rejects_large_limit() {
        assert_eq!(
            PageRequest::strict(Some(0), Some(101), BOUNDS),
            Err(PageError::LimitTooLarge { limit: 101, max: 100 })
        );
        assert!(PageRequest::strict(Some(0), Some(100), BOUNDS).is_ok());
    }

    #[test]
    fn both_reject_negative_page_and_non_positive_limit() {
        type Build = fn(Option<i64>, Option<i64>, PageBounds) -> Result<PageRequest, PageError>;
        let builders: [Build; 2] = [PageRequest::clamped, PageRequest::strict];
        for build in builders {
            assert_eq!(build(Some(-1), None, BOUNDS), Err(PageError::NegativePage(-1)));
            assert_eq!(build(None, Some(0), BOUNDS), Err(PageError::NonPositiveLimit(0)));
            assert_eq!(build(None, Some(-5), BOUNDS), Err(PageError::NonPositiveLimit(-5)));
        }
    }

    #[test]
    fn slice_skips_and_takes() {
        let p = PageRequest { page: 1, limit: 2 };
        assert_eq!(p.slice(0..10), vec![2, 3]);
        let far = PageRequest { page: 50, limit: 2 };
        assert!(far.slice(0..10).is_empty());
    }
}

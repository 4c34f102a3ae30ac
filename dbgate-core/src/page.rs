//! Offset/limit paging for repository reads

use serde::{Deserialize, Serialize};

/// Offset/limit window applied to a query.
///
/// `take = None` means unbounded. The default window is everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    /// Rows to skip
    pub skip: u64,
    /// Maximum rows to return
    pub take: Option<u64>,
}

impl Page {
    /// Every row: skip 0, take unbounded.
    pub const fn all() -> Self {
        Self {
            skip: 0,
            take: None,
        }
    }

    pub const fn new(skip: u64, take: u64) -> Self {
        Self {
            skip,
            take: Some(take),
        }
    }

    /// Skip rows without bounding the result.
    pub const fn skip(skip: u64) -> Self {
        Self { skip, take: None }
    }

    /// Page-number addressing.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to minimum of 1
    pub fn number(page: u32, per_page: u32) -> Self {
        let page = u64::from(page.max(1));
        let per_page = u64::from(per_page.max(1));
        Self::new((page - 1) * per_page, per_page)
    }

    /// True when the window selects every row.
    pub fn is_all(&self) -> bool {
        self.skip == 0 && self.take.is_none()
    }

    /// Limit clamped to what a signed 64-bit bind can carry.
    pub(crate) fn take_i64(&self) -> Option<i64> {
        self.take.map(|t| i64::try_from(t).unwrap_or(i64::MAX))
    }

    pub(crate) fn skip_i64(&self) -> i64 {
        i64::try_from(self.skip).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_everything() {
        assert!(Page::default().is_all());
        assert_eq!(Page::default(), Page::all());
        assert!(!Page::new(0, 10).is_all());
        assert!(!Page::skip(3).is_all());
    }

    #[test]
    fn page_number_offsets() {
        assert_eq!(Page::number(1, 10), Page::new(0, 10));
        assert_eq!(Page::number(2, 10), Page::new(10, 10));
        assert_eq!(Page::number(3, 25), Page::new(50, 25));
    }

    #[test]
    fn page_number_clamps() {
        assert_eq!(Page::number(0, 10), Page::new(0, 10));
        assert_eq!(Page::number(1, 0), Page::new(0, 1));
    }

    #[test]
    fn huge_take_is_clamped_for_binding() {
        let page = Page::new(u64::MAX, u64::MAX);
        assert_eq!(page.take_i64(), Some(i64::MAX));
        assert_eq!(page.skip_i64(), i64::MAX);
    }
}

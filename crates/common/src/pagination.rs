//! Page-number pagination shared by every listing.
//!
//! Listings are addressed by a 1-based page number taken verbatim from the
//! query string. Anything unparsable falls back to the first page and
//! out-of-range numbers clamp to the nearest existing page, so a listing
//! request never fails because of its `page` parameter.

use serde::Serialize;

/// The slice of a listing selected by a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number after clamping.
    pub number: u64,
    /// Total number of pages (at least one, even for an empty listing).
    pub num_pages: u64,
    /// Total number of items in the listing.
    pub count: u64,
    /// Page size.
    pub per_page: u64,
}

impl PageWindow {
    /// Resolve the requested page against a listing of `count` items.
    #[must_use]
    pub fn resolve(count: u64, per_page: u64, requested: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        let num_pages = count.div_ceil(per_page).max(1);
        let number = parse_page_number(requested).clamp(1, num_pages as i64) as u64;

        Self {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    /// Number of items to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    /// Maximum number of items on this page.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.per_page
    }

    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    /// Whether an earlier page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Attach the items fetched for this window.
    #[must_use]
    pub fn into_page<T>(self, object_list: Vec<T>) -> Page<T> {
        Page {
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            next_page_number: self.has_next().then_some(self.number + 1),
            previous_page_number: self.has_previous().then(|| self.number - 1),
            object_list,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub object_list: Vec<T>,
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages.
    pub num_pages: u64,
    /// Total number of items across all pages.
    pub count: u64,
    /// Page size.
    pub per_page: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
    /// Number of the next page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_number: Option<u64>,
    /// Number of the previous page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_number: Option<u64>,
}

impl<T> Page<T> {
    /// Number of items on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    /// Whether this page holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}

fn parse_page_number(requested: Option<&str>) -> i64 {
    requested
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirteen_items_split_ten_and_three() {
        let first = PageWindow::resolve(13, 10, None);
        assert_eq!(first.number, 1);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.offset(), 0);
        assert_eq!(first.limit(), 10);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let second = PageWindow::resolve(13, 10, Some("2"));
        assert_eq!(second.number, 2);
        assert_eq!(second.offset(), 10);
        assert!(!second.has_next());
        assert!(second.has_previous());
    }

    #[test]
    fn test_non_numeric_page_is_first_page() {
        assert_eq!(PageWindow::resolve(30, 10, Some("abc")).number, 1);
        assert_eq!(PageWindow::resolve(30, 10, Some("")).number, 1);
    }

    #[test]
    fn test_out_of_range_pages_clamp() {
        assert_eq!(PageWindow::resolve(30, 10, Some("99")).number, 3);
        assert_eq!(PageWindow::resolve(30, 10, Some("0")).number, 1);
        assert_eq!(PageWindow::resolve(30, 10, Some("-4")).number, 1);
    }

    #[test]
    fn test_empty_listing_has_one_page() {
        let window = PageWindow::resolve(0, 10, Some("5"));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.offset(), 0);

        let page = window.into_page(Vec::<u8>::new());
        assert!(page.is_empty());
        assert!(!page.has_next);
        assert_eq!(page.next_page_number, None);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_page() {
        assert_eq!(PageWindow::resolve(20, 10, None).num_pages, 2);
    }

    #[test]
    fn test_into_page() {
        let page = PageWindow::resolve(13, 10, Some("2")).into_page(vec![1, 2, 3]);
        assert_eq!(page.len(), 3);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.number, 2);
        assert_eq!(page.count, 13);
    }
}

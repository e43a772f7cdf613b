//! Pagination request and result.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A page request (`current`, `size`) that is filled in with `total`, `total_page` and
/// `records` by [`select_page`](crate::crud::select_page).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub current: i64,
    pub size: i64,
    pub total: i64,
    pub total_page: i64,
    pub records: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl<T> Page<T> {
    pub fn new(current: i64, size: i64) -> Self {
        Self {
            current,
            size,
            total: 0,
            total_page: 0,
            records: Vec::new(),
        }
    }

    /// Clamp `current` to at least 1 and replace a `size` below 1 with the default.
    pub fn normalize(&mut self) {
        let (current, size) = normalize(self.current, self.size);
        self.current = current;
        self.size = size;
    }

    /// Zero-based row offset of this page.
    pub fn offset(&self) -> u64 {
        offset(self.current, self.size)
    }

    /// Record `total` and derive `total_page` from it.
    pub fn set_total(&mut self, total: i64) {
        self.total = total;
        self.total_page = total_pages(total, self.size);
    }
}

pub(crate) fn normalize(page: i64, size: i64) -> (i64, i64) {
    let page = if page < 1 { 1 } else { page };
    let size = if size < 1 { DEFAULT_PAGE_SIZE } else { size };
    (page, size)
}

pub(crate) fn offset(page: i64, size: i64) -> u64 {
    let (page, size) = normalize(page, size);
    ((page - 1) as u64).saturating_mul(size as u64)
}

/// `ceil(total / size)`, 0 for an empty result.
pub fn total_pages(total: i64, size: i64) -> i64 {
    let (_, size) = normalize(1, size);
    if total <= 0 {
        return 0;
    }
    (total + size - 1) / size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_clamps_page_and_size() {
        for page in [-5, 0, 1] {
            assert_eq!(normalize(page, 20).0, 1);
        }
        for size in [-1, 0] {
            assert_eq!(normalize(3, size).1, DEFAULT_PAGE_SIZE);
        }
        assert_eq!(normalize(4, 25), (4, 25));
    }

    #[test]
    fn test_offset_is_zero_based() {
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(3, 2), 4);
        assert_eq!(offset(0, 0), 0);
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 2), 0);
        assert_eq!(total_pages(7, 2), 4);
        assert_eq!(total_pages(8, 2), 4);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        // size below 1 is counted with the default page size
        assert_eq!(total_pages(25, 0), 3);
    }

    #[test]
    fn test_page_set_total() {
        let mut page: Page<()> = Page::new(0, -1);
        page.normalize();
        assert_eq!((page.current, page.size), (1, DEFAULT_PAGE_SIZE));
        page.set_total(21);
        assert_eq!(page.total, 21);
        assert_eq!(page.total_page, 3);
    }

    #[test]
    fn test_page_serializes_field_names() {
        let mut page = Page::new(2, 2);
        page.records = vec!["a", "b"];
        page.set_total(7);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total_page"], 4);
        assert_eq!(json["records"], serde_json::json!(["a", "b"]));
    }
}

use serde::Deserialize;
use serde::Serialize;

/// The response shape of `GET /submissions/?page=&page_size=`.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub page_size: u32,
}

pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PageQuery {
    /// Validates `page >= 1` and `page_size` within `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`,
    /// per §4.3 of the spec.
    pub fn validate(self) -> Result<(u32, u32), String> {
        if self.page < 1 {
            return Err("page must be >= 1".to_string());
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(format!(
                "page_size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}"
            ));
        }
        Ok((self.page, self.page_size))
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: u64, current_page: u32, page_size: u32) -> Self {
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(u64::from(page_size))
        };
        Self {
            items,
            total_items,
            total_pages,
            current_page,
            page_size,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_page_zero() {
        let err = PageQuery { page: 0, page_size: 20 }.validate().unwrap_err();
        assert!(err.contains("page"));
    }

    #[test]
    fn rejects_page_size_out_of_range() {
        assert!(PageQuery { page: 1, page_size: 0 }.validate().is_err());
        assert!(PageQuery { page: 1, page_size: MAX_PAGE_SIZE + 1 }.validate().is_err());
        assert!(PageQuery { page: 1, page_size: MAX_PAGE_SIZE }.validate().is_ok());
    }

    #[test]
    fn empty_result_set_still_reports_one_page() {
        let page: Page<()> = Page::new(vec![], 0, 1, 20);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page::new(vec![], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
    }
}

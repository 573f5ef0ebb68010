use crate::calendar::CalendarError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

fn default_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// A zero-based page over a stable ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest { page: 0, size: DEFAULT_PAGE_SIZE }
    }
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Result<Self, CalendarError> {
        let request = PageRequest { page, size };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.size == 0 {
            return Err(CalendarError::InvalidPageSize(self.size));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Inclusive `(first, last)` row indices covered by this page.
    pub fn range(&self) -> (usize, usize) {
        let offset = self.offset();
        (offset, offset.saturating_add(self.size.saturating_sub(1)))
    }

    pub fn next(&self) -> PageRequest {
        PageRequest { page: self.page + 1, size: self.size }
    }
}

/// The window of `items` covered by `request`. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], request: PageRequest) -> &[T] {
    let start = request.offset().min(items.len());
    let end = start.saturating_add(request.size).min(items.len());
    &items[start..end]
}

/// Client-side "load more" accumulator.
#[derive(Debug, Clone)]
pub struct PagedFeed<T> {
    items: Vec<T>,
    next_page: usize,
    size: usize,
    exhausted: bool,
}

impl<T> PagedFeed<T> {
    pub fn new(size: usize) -> Self {
        PagedFeed { items: Vec::new(), next_page: 0, size: size.max(1), exhausted: false }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    pub fn next_request(&self) -> PageRequest {
        PageRequest { page: self.next_page, size: self.size }
    }

    /// Fetches the next page. Page 0 replaces the accumulated items, later
    /// pages append. A page shorter than `size` marks the feed exhausted.
    pub fn load_more<F, E>(&mut self, fetch: F) -> Result<usize, E>
    where
        F: FnOnce(PageRequest) -> Result<Vec<T>, E>,
    {
        if self.exhausted {
            return Ok(0);
        }
        let request = self.next_request();
        let page = fetch(request)?;
        let fetched = page.len();
        if request.page == 0 {
            self.items = page;
        } else {
            self.items.extend(page);
        }
        self.exhausted = fetched < self.size;
        self.next_page += 1;
        Ok(fetched)
    }

    /// Drops accumulated state so the next `load_more` starts at page 0.
    pub fn reset(&mut self) {
        self.items.clear();
        self.next_page = 0;
        self.exhausted = false;
    }
}

use std::ops::Range;

pub const DEFAULT_PAGE_SIZES: [usize; 4] = [10, 20, 30, 50];

/// Client-side paging over the display rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    page_index: usize,
    page_size: usize,
    page_sizes: Vec<usize>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZES[0], DEFAULT_PAGE_SIZES.to_vec())
    }
}

impl Pagination {
    pub fn new(page_size: usize, page_sizes: Vec<usize>) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
            page_sizes,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Sizes offered to the user.
    pub fn page_sizes(&self) -> &[usize] {
        &self.page_sizes
    }

    /// At least one page, even when empty.
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Moves to `index`, clamped to the last page. Returns whether the page changed.
    pub fn set_page(&mut self, index: usize, total: usize) -> bool {
        let index = index.min(self.page_count(total) - 1);
        let changed = index != self.page_index;
        self.page_index = index;
        changed
    }

    pub fn next_page(&mut self, total: usize) -> bool {
        self.set_page(self.page_index.saturating_add(1), total)
    }

    pub fn prev_page(&mut self, total: usize) -> bool {
        self.set_page(self.page_index.saturating_sub(1), total)
    }

    /// Changes the page size and returns to the first page.
    pub fn set_page_size(&mut self, size: usize) -> bool {
        let size = size.max(1);
        let changed = size != self.page_size || self.page_index != 0;
        self.page_size = size;
        self.page_index = 0;
        changed
    }

    /// Re-clamps the page index after the row count changed.
    pub fn clamp(&mut self, total: usize) {
        self.page_index = self.page_index.min(self.page_count(total) - 1);
    }

    /// Display-row indices on the current page.
    pub fn page_range(&self, total: usize) -> Range<usize> {
        let index = self.page_index.min(self.page_count(total) - 1);
        let start = (index * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        start..end
    }
}

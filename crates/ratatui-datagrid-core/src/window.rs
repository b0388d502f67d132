//! Virtualization windower: which rows to materialize for a scroll position.

use std::ops::Range;

use virtualizer::Align;
use virtualizer::VirtualItem;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

use crate::error::GridError;

pub const DEFAULT_OVERSCAN: usize = 2;
pub const DEFAULT_FETCH_THRESHOLD: usize = 10;

/// Row density presets, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowSize {
    Xs,
    Sm,
    Md,
    #[default]
    Lg,
    Xl,
}

impl RowSize {
    pub fn height_px(self) -> u32 {
        match self {
            RowSize::Xs => 24,
            RowSize::Sm => 32,
            RowSize::Md => 40,
            RowSize::Lg => 48,
            RowSize::Xl => 64,
        }
    }
}

/// Whether the host can load more rows, and whether it is allowed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchCapability {
    /// No fetch collaborator registered.
    Unavailable,
    /// A collaborator is registered but infinite scroll is off.
    Disabled,
    Enabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchDecision {
    Idle,
    /// Ask the host for more rows; `loaded_rows` is the current total.
    Request { loaded_rows: usize },
    Refused,
}

pub struct VirtualWindow {
    virtualizer: Virtualizer,
    items: Vec<VirtualItem>,
    row_height: u32,
    viewport_height: u32,
    scroll_offset: u64,
    total_rows: usize,
    overscan: usize,
    fetch_threshold: usize,
    is_fetching_more: bool,
    refusal_reported: bool,
    visible_range: Range<usize>,
}

impl std::fmt::Debug for VirtualWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualWindow")
            .field("row_height", &self.row_height)
            .field("viewport_height", &self.viewport_height)
            .field("scroll_offset", &self.scroll_offset)
            .field("total_rows", &self.total_rows)
            .field("overscan", &self.overscan)
            .field("visible_range", &self.visible_range)
            .field("is_fetching_more", &self.is_fetching_more)
            .finish()
    }
}

impl Default for VirtualWindow {
    fn default() -> Self {
        Self::new(RowSize::default().height_px(), 0, DEFAULT_OVERSCAN)
    }
}

impl VirtualWindow {
    pub fn new(row_height: u32, viewport_height: u32, overscan: usize) -> Self {
        let row_height = row_height.max(1);
        let mut opts = VirtualizerOptions::new(0, move |_| row_height);
        opts.overscan = overscan;
        let mut window = Self {
            virtualizer: Virtualizer::new(opts),
            items: Vec::new(),
            row_height,
            viewport_height,
            scroll_offset: 0,
            total_rows: 0,
            overscan,
            fetch_threshold: DEFAULT_FETCH_THRESHOLD,
            is_fetching_more: false,
            refusal_reported: false,
            visible_range: 0..0,
        };
        window.recompute();
        window
    }

    pub fn with_fetch_threshold(mut self, rows: usize) -> Self {
        self.fetch_threshold = rows;
        self
    }

    pub fn row_height(&self) -> u32 {
        self.row_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn is_fetching_more(&self) -> bool {
        self.is_fetching_more
    }

    /// Height of all rows together.
    pub fn total_extent(&self) -> u64 {
        self.total_rows as u64 * self.row_height as u64
    }

    fn max_offset(&self) -> u64 {
        self.total_extent()
            .saturating_sub(self.viewport_height as u64)
    }

    /// Rows to materialize, overscan included.
    pub fn visible_range(&self) -> Range<usize> {
        self.visible_range.clone()
    }

    /// Rows intersecting the viewport, without overscan.
    pub fn viewport_range(&self) -> Range<usize> {
        let h = self.row_height as u64;
        let start = (self.scroll_offset / h) as usize;
        let end = (self.scroll_offset + self.viewport_height as u64).div_ceil(h) as usize;
        let end = end.min(self.total_rows);
        start.min(end)..end
    }

    pub fn set_row_height(&mut self, row_height: u32) {
        let row_height = row_height.max(1);
        if row_height == self.row_height {
            return;
        }
        self.row_height = row_height;
        let mut opts = VirtualizerOptions::new(self.total_rows, move |_| row_height);
        opts.overscan = self.overscan;
        self.virtualizer = Virtualizer::new(opts);
        self.recompute();
    }

    pub fn set_viewport_height(&mut self, px: u32) {
        self.viewport_height = px;
        self.recompute();
    }

    pub fn set_scroll_offset(&mut self, px: u64) {
        self.scroll_offset = px;
        self.recompute();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
        self.recompute();
    }

    pub fn set_total_row_count(&mut self, total: usize) {
        self.total_rows = total;
        self.recompute();
    }

    /// Scrolls the minimum distance needed to show row `index`.
    pub fn scroll_to_index(&mut self, index: usize) {
        if self.total_rows == 0 {
            return;
        }
        let index = index.min(self.total_rows - 1);
        self.sync_virtualizer();
        self.virtualizer.scroll_to_index(index, Align::Auto);
        self.scroll_offset = self.virtualizer.scroll_offset();
        self.recompute();
    }

    /// Index of the row at the top of the viewport.
    pub fn first_visible_index(&self) -> Option<usize> {
        self.virtualizer.index_at_offset(self.scroll_offset)
    }

    fn sync_virtualizer(&mut self) {
        self.virtualizer.set_count(self.total_rows);
        self.virtualizer.set_viewport_size(self.viewport_height);
        self.virtualizer.set_overscan(self.overscan);
        self.virtualizer.set_scroll_offset(self.scroll_offset);
    }

    fn recompute(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
        self.sync_virtualizer();
        self.virtualizer.collect_virtual_items(&mut self.items);

        let viewport = self.viewport_range();
        let (mut start, mut end) = (viewport.start, viewport.end);
        if let (Some(first), Some(last)) = (self.items.first(), self.items.last()) {
            start = start.min(first.index);
            end = end.max(last.index + 1);
        }
        let end = end.min(self.total_rows);
        self.visible_range = start.min(end)..end;
    }

    /// Decides whether the current window should trigger a fetch of more rows.
    ///
    /// At most one request is outstanding: after a `Request` the window stays in the fetching
    /// state until [`resolve_fetch`](Self::resolve_fetch).
    pub fn check_fetch(&mut self, capability: FetchCapability) -> FetchDecision {
        if self.is_fetching_more || capability == FetchCapability::Unavailable {
            return FetchDecision::Idle;
        }
        if self.visible_range.end + self.fetch_threshold < self.total_rows {
            return FetchDecision::Idle;
        }
        match capability {
            FetchCapability::Enabled => {
                self.is_fetching_more = true;
                tracing::debug!(loaded_rows = self.total_rows, "requesting more rows");
                FetchDecision::Request {
                    loaded_rows: self.total_rows,
                }
            }
            FetchCapability::Disabled => {
                if !self.refusal_reported {
                    self.refusal_reported = true;
                    let err = GridError::CapabilityMissing {
                        feature: "infinite_scroll",
                    };
                    tracing::error!(%err, "fetch-more request refused");
                }
                FetchDecision::Refused
            }
            FetchCapability::Unavailable => FetchDecision::Idle,
        }
    }

    /// Ends the outstanding fetch with the new row total.
    pub fn resolve_fetch(&mut self, new_total: usize) {
        self.is_fetching_more = false;
        self.set_total_row_count(new_total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(total: usize) -> VirtualWindow {
        let mut w = VirtualWindow::new(48, 480, 2);
        w.set_total_row_count(total);
        w
    }

    #[test]
    fn ten_thousand_rows_show_ten_per_viewport() {
        let mut w = window(10_000);
        assert_eq!(w.viewport_range(), 0..10);
        let r = w.visible_range();
        assert_eq!(r.start, 0);
        assert!(r.end >= 10 && r.end <= 12, "{r:?}");

        w.set_scroll_offset(479_500);
        assert_eq!(w.viewport_range().end, 10_000);
        assert_eq!(w.visible_range().end, 10_000);
        assert_eq!(w.total_extent(), 480_000);
    }

    #[test]
    fn scroll_past_end_is_clamped() {
        let mut w = window(100);
        w.set_scroll_offset(u64::MAX / 2);
        assert_eq!(w.scroll_offset(), 100 * 48 - 480);
        assert_eq!(w.visible_range().end, 100);
    }

    #[test]
    fn empty_and_zero_viewport_ranges_are_valid() {
        let w = window(0);
        assert_eq!(w.visible_range(), 0..0);

        let mut w = window(50);
        w.set_viewport_height(0);
        let r = w.visible_range();
        assert!(r.start <= r.end && r.end <= 50);
    }

    #[test]
    fn shrinking_total_keeps_range_in_bounds() {
        let mut w = window(1_000);
        w.set_scroll_offset(40_000);
        w.set_total_row_count(20);
        let r = w.visible_range();
        assert!(r.start <= r.end && r.end <= 20, "{r:?}");
    }

    #[test]
    fn fetch_fires_once_until_resolved() {
        let mut w = window(20);
        w.set_scroll_offset(20 * 48);
        assert_eq!(
            w.check_fetch(FetchCapability::Enabled),
            FetchDecision::Request { loaded_rows: 20 }
        );
        assert!(w.is_fetching_more());
        assert_eq!(w.check_fetch(FetchCapability::Enabled), FetchDecision::Idle);

        w.resolve_fetch(40);
        assert!(!w.is_fetching_more());
        assert_eq!(w.total_rows(), 40);
    }

    #[test]
    fn fetch_is_idle_far_from_end() {
        let mut w = window(1_000);
        assert_eq!(w.check_fetch(FetchCapability::Enabled), FetchDecision::Idle);
        assert!(!w.is_fetching_more());
    }

    #[test]
    fn disabled_fetch_is_refused() {
        let mut w = window(5);
        assert_eq!(w.check_fetch(FetchCapability::Disabled), FetchDecision::Refused);
        assert_eq!(w.check_fetch(FetchCapability::Disabled), FetchDecision::Refused);
        assert!(!w.is_fetching_more());
        assert_eq!(w.check_fetch(FetchCapability::Unavailable), FetchDecision::Idle);
    }

    #[test]
    fn row_size_presets() {
        assert_eq!(RowSize::default().height_px(), 48);
        assert_eq!(RowSize::Xs.height_px(), 24);
        assert_eq!(RowSize::Xl.height_px(), 64);
    }
}

use std::collections::BTreeMap;

use crate::column::ColumnId;
use crate::column::ColumnOverrides;
use crate::filter::FilterValue;
use crate::filter::UpdateMethod;
use crate::pagination::DEFAULT_PAGE_SIZES;
use crate::row::RowId;
use crate::selection::SelectionOptions;
use crate::sort::NestedSortPolicy;
use crate::sort::SortDirection;
use crate::storage::DEFAULT_STORAGE_NAMESPACE;
use crate::window::DEFAULT_FETCH_THRESHOLD;
use crate::window::DEFAULT_OVERSCAN;
use crate::window::RowSize;

/// How display rows are presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Every display row.
    #[default]
    All,
    /// One page at a time.
    Paged,
    /// Only the scroll window is materialized.
    Virtual,
}

/// Engine configuration. Features are switched on here, never through global state.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub display_mode: DisplayMode,
    /// Load more rows when scrolling near the end (virtual mode, needs a `fetch_more` collaborator).
    pub infinite_scroll: bool,
    pub selection: SelectionOptions,
    pub nested_sort: NestedSortPolicy,
    pub filter_update: UpdateMethod,
    /// The host filters its own records; applied filters are only reported.
    pub manual_filters: bool,
    pub row_size: RowSize,
    /// Overrides the `row_size` preset.
    pub row_height_px: Option<u32>,
    pub viewport_height_px: u32,
    pub overscan: usize,
    pub fetch_threshold: usize,
    pub page_size: usize,
    pub page_sizes: Vec<usize>,
    pub storage_namespace: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::All,
            infinite_scroll: false,
            selection: SelectionOptions::default(),
            nested_sort: NestedSortPolicy::PerParent,
            filter_update: UpdateMethod::Batch,
            manual_filters: false,
            row_size: RowSize::Lg,
            row_height_px: None,
            viewport_height_px: 0,
            overscan: DEFAULT_OVERSCAN,
            fetch_threshold: DEFAULT_FETCH_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZES[0],
            page_sizes: DEFAULT_PAGE_SIZES.to_vec(),
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
        }
    }
}

impl GridConfig {
    pub fn row_height(&self) -> u32 {
        self.row_height_px
            .unwrap_or_else(|| self.row_size.height_px())
            .max(1)
    }
}

/// Host-provided starting state. Ids that do not resolve are dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitialState {
    pub selected: Vec<RowId>,
    pub expanded: Vec<RowId>,
    /// Expand every expandable row; `expanded` is ignored when set.
    pub expand_all: bool,
    pub sort: Option<(ColumnId, SortDirection)>,
    pub filters: BTreeMap<String, FilterValue>,
    pub columns: ColumnOverrides,
    pub page_index: usize,
}

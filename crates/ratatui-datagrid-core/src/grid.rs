//! The engine facade: owns every component and runs the display pipeline.
//!
//! Display order is derived as filter -> sort -> expansion -> page/window. The row tree itself
//! never changes order; only the derived display list does.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::column::Column;
use crate::column::ColumnId;
use crate::column::ColumnList;
use crate::column::ColumnOverrides;
use crate::column::ColumnSpec;
use crate::column::resolve_columns;
use crate::config::DisplayMode;
use crate::config::GridConfig;
use crate::config::InitialState;
use crate::error::GridError;
use crate::error::GridResult;
use crate::event::EventBus;
use crate::event::GridEvent;
use crate::event::SubscriptionId;
use crate::expansion::ExpansionState;
use crate::filter::AppliedFilter;
use crate::filter::FilterChange;
use crate::filter::FilterDef;
use crate::filter::FilterState;
use crate::filter::FilterValue;
use crate::pagination::Pagination;
use crate::resize::ResizeEffect;
use crate::resize::ResizeEvent;
use crate::resize::ResizePhase;
use crate::resize::ResizeState;
use crate::row::DisplayTree;
use crate::row::Row;
use crate::row::RowId;
use crate::row::RowOptions;
use crate::row::RowTree;
use crate::row::build_row_tree;
use crate::selection::SelectAllState;
use crate::selection::SelectScope;
use crate::selection::SelectionMode;
use crate::selection::SelectionState;
use crate::sort::NestedSortPolicy;
use crate::sort::SortDirection;
use crate::sort::SortState;
use crate::sort::sort_row_ids;
use crate::storage::ColumnWidthStore;
use crate::storage::MemoryStorage;
use crate::storage::StorageBackend;
use crate::value::CellValue;
use crate::window::FetchCapability;
use crate::window::FetchDecision;
use crate::window::RowSize;
use crate::window::VirtualWindow;

/// One rendered row of a [`GridSnapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct RowView {
    pub id: RowId,
    /// Position in the full display list.
    pub display_index: usize,
    pub depth: usize,
    /// Cell values of the visible columns, in column order.
    pub cells: Vec<CellValue>,
    pub is_selected: bool,
    pub is_selectable: bool,
    pub is_expanded: bool,
    pub can_expand: bool,
    pub visible_nested_rows: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageInfo {
    pub index: usize,
    pub size: usize,
    pub count: usize,
}

/// Everything a presentation layer needs, captured after a completed transition.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSnapshot {
    pub rows: Vec<RowView>,
    /// Visible columns in order.
    pub columns: Vec<Column>,
    pub selection_mode: SelectionMode,
    /// Header checkbox for the current page.
    pub select_all: SelectAllState,
    pub filter_buttons_enabled: bool,
    pub applied_filters: Vec<AppliedFilter>,
    /// Display-row range materialized in `rows`.
    pub visible_range: Range<usize>,
    pub total_extent: u64,
    pub column_widths: BTreeMap<ColumnId, u32>,
    pub is_resizing: bool,
    /// Column of the resize in progress.
    pub resizing_column: Option<ColumnId>,
    pub is_fetching_more: bool,
    pub page: Option<PageInfo>,
    /// Number of display rows.
    pub total_rows: usize,
}

pub struct DataGridBuilder<R> {
    config: GridConfig,
    records: Option<Vec<R>>,
    columns: Option<Vec<ColumnSpec<R>>>,
    row_options: RowOptions<R>,
    filters: Vec<FilterDef>,
    initial: InitialState,
    storage: Option<Arc<dyn StorageBackend>>,
}

impl<R: Clone> DataGridBuilder<R> {
    pub fn records(mut self, records: Vec<R>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnSpec<R>>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn row_options(mut self, options: RowOptions<R>) -> Self {
        self.row_options = options;
        self
    }

    pub fn filters(mut self, filters: Vec<FilterDef>) -> Self {
        self.filters = filters;
        self
    }

    pub fn initial_state(mut self, initial: InitialState) -> Self {
        self.initial = initial;
        self
    }

    /// Backend for column widths. Defaults to an in-memory store.
    pub fn storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(backend);
        self
    }

    /// Builds the grid. Never fails: missing records or columns degrade to an empty grid and are
    /// reported through [`DataGrid::configuration_error`].
    pub fn build(self) -> DataGrid<R> {
        let missing = match (&self.records, &self.columns) {
            (None, _) => Some("row data"),
            (_, None) => Some("column definitions"),
            _ => None,
        };
        if let Some(what) = missing {
            let err = GridError::MissingInput { what };
            tracing::warn!(%err, "rendering an empty datagrid");
        }

        let config = self.config;
        let records = self.records.unwrap_or_default();
        let specs = self.columns.unwrap_or_default();
        let tree = build_row_tree(&records, &self.row_options);
        let backend: Arc<dyn StorageBackend> = match self.storage {
            Some(backend) => backend,
            None => Arc::new(MemoryStorage::new()),
        };
        let width_store = ColumnWidthStore::new(backend, config.storage_namespace.clone());

        let window = VirtualWindow::new(
            config.row_height(),
            config.viewport_height_px,
            config.overscan,
        )
        .with_fetch_threshold(config.fetch_threshold);

        let mut grid = DataGrid {
            selection: SelectionState::new(config.selection),
            filters: FilterState::new(self.filters, config.filter_update)
                .with_applied(self.initial.filters),
            pagination: Pagination::new(config.page_size, config.page_sizes.clone()),
            config,
            records,
            specs,
            row_options: self.row_options,
            tree,
            overrides: self.initial.columns,
            columns: ColumnList::default(),
            expansion: ExpansionState::default(),
            sort: SortState::default(),
            resize: ResizeState::default(),
            width_store,
            window,
            display: Vec::new(),
            bus: EventBus::default(),
            missing_input: missing,
        };
        grid.restore_widths();
        grid.restore_state(
            self.initial.selected,
            self.initial.expanded,
            self.initial.expand_all,
            self.initial.sort,
        );
        grid.refresh();
        let page_index = self.initial.page_index;
        let total = grid.display.len();
        grid.pagination.set_page(page_index, total);
        grid
    }
}

pub struct DataGrid<R> {
    config: GridConfig,
    records: Vec<R>,
    specs: Vec<ColumnSpec<R>>,
    row_options: RowOptions<R>,
    tree: RowTree<R>,
    overrides: ColumnOverrides,
    columns: ColumnList,
    expansion: ExpansionState,
    selection: SelectionState,
    sort: SortState,
    filters: FilterState,
    resize: ResizeState,
    width_store: ColumnWidthStore,
    pagination: Pagination,
    window: VirtualWindow,
    display: Vec<RowId>,
    bus: EventBus,
    missing_input: Option<&'static str>,
}

impl<R> fmt::Debug for DataGrid<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataGrid")
            .field("config", &self.config)
            .field("rows", &self.tree.len())
            .field("columns", &self.columns)
            .field("display_rows", &self.display.len())
            .field("selection", &self.selection)
            .field("sort", &self.sort)
            .field("filters", &self.filters)
            .field("resize", &self.resize)
            .field("window", &self.window)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<R: Clone> DataGrid<R> {
    pub fn builder(config: GridConfig) -> DataGridBuilder<R> {
        DataGridBuilder {
            config,
            records: None,
            columns: None,
            row_options: RowOptions::default(),
            filters: Vec::new(),
            initial: InitialState::default(),
            storage: None,
        }
    }

    /// Replaces the host records. Selection and expansion of ids that still exist are kept.
    pub fn set_records(&mut self, records: Vec<R>) {
        self.records = records;
        self.rebuild_tree();
        self.finish();
    }

    /// Appends a loaded batch and ends the outstanding fetch.
    pub fn append_records(&mut self, records: impl IntoIterator<Item = R>) {
        self.records.extend(records);
        self.rebuild_tree();
        let total = self.display.len();
        self.window.resolve_fetch(total);
        tracing::debug!(total, "fetched rows appended");
        self.finish();
    }

    fn rebuild_tree(&mut self) {
        self.tree = build_row_tree(&self.records, &self.row_options);
        self.expansion.retain_known(&self.tree);
        if self.selection.retain_known(&self.tree) {
            let selected = self.selection.selected_ids(&self.tree);
            self.bus.push(GridEvent::SelectionChanged { selected });
        }
        self.refresh();
    }
}

impl<R> DataGrid<R> {
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The configuration problem this grid was built with, if any.
    pub fn configuration_error(&self) -> Option<GridError> {
        self.missing_input
            .map(|what| GridError::MissingInput { what })
    }

    pub fn rows(&self) -> &RowTree<R> {
        &self.tree
    }

    pub fn columns(&self) -> &ColumnList {
        &self.columns
    }

    pub fn column_spec(&self, id: &ColumnId) -> Option<&ColumnSpec<R>> {
        self.specs.iter().find(|s| &s.id == id)
    }

    /// Full display order (filtered, sorted, expanded), before paging or windowing.
    pub fn display_rows(&self) -> &[RowId] {
        &self.display
    }

    pub fn display_len(&self) -> usize {
        self.display.len()
    }

    pub fn row_at(&self, display_index: usize) -> Option<&Row<R>> {
        self.display
            .get(display_index)
            .and_then(|id| self.tree.get(id))
    }

    pub fn cell_value(&self, row_id: &RowId, column_id: &ColumnId) -> Option<CellValue> {
        let row = self.tree.get(row_id)?;
        let spec = self.column_spec(column_id)?;
        Some(spec.value(&row.original))
    }

    /// Display indices currently rendered: the page, the scroll window, or everything.
    pub fn rendered_range(&self) -> Range<usize> {
        let total = self.display.len();
        match self.config.display_mode {
            DisplayMode::All => 0..total,
            DisplayMode::Paged => self.pagination.page_range(total),
            DisplayMode::Virtual => {
                let r = self.window.visible_range();
                r.start.min(total)..r.end.min(total)
            }
        }
    }

    fn scope_ids(&self, scope: SelectScope) -> Vec<RowId> {
        match scope {
            SelectScope::CurrentPage => self.display[self.rendered_range()].to_vec(),
            SelectScope::AllPages => self.tree.iter().map(|r| r.id.clone()).collect(),
        }
    }

    fn finish(&mut self) {
        self.bus.flush();
    }

    // Events

    pub fn subscribe(&mut self, listener: impl FnMut(&GridEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Hands sorting to the host. The grid keeps the host's record order from now on.
    pub fn on_sort(&mut self, f: impl FnMut(&ColumnId, SortDirection) + 'static) {
        self.bus.set_on_sort(f);
        self.refresh();
    }

    pub fn on_selection_change(&mut self, f: impl FnMut(&[RowId]) + 'static) {
        self.bus.set_on_selection_change(f);
    }

    pub fn fetch_more(&mut self, f: impl FnMut(usize) + 'static) {
        self.bus.set_fetch_more(f);
    }

    pub fn on_apply_filters(&mut self, f: impl FnMut(&[AppliedFilter]) + 'static) {
        self.bus.set_on_apply_filters(f);
    }

    // Selection

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected_ids(&self) -> Vec<RowId> {
        self.selection.selected_ids(&self.tree)
    }

    pub fn is_row_selectable(&self, id: &RowId) -> bool {
        self.selection.is_row_selectable(&self.tree, id)
    }

    pub fn toggle_row(&mut self, id: &RowId) -> bool {
        let changed = self.selection.toggle_row(&self.tree, id);
        self.selection_changed(changed);
        changed
    }

    /// Selects (or deselects) every selectable row in `scope`. No-op in single mode.
    pub fn toggle_all(&mut self, target: bool, scope: SelectScope) -> bool {
        let ids = self.scope_ids(scope);
        let changed = self.selection.set_all(&self.tree, &ids, target);
        self.selection_changed(changed);
        changed
    }

    pub fn select_all_state(&self, scope: SelectScope) -> SelectAllState {
        let ids = self.scope_ids(scope);
        self.selection.select_all_state(&self.tree, &ids)
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) -> bool {
        let changed = self.selection.set_mode(mode);
        self.config.selection.mode = mode;
        self.selection_changed(changed);
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.selection.clear();
        self.selection_changed(changed);
        changed
    }

    fn selection_changed(&mut self, changed: bool) {
        if changed {
            self.sync_row_flags();
            let selected = self.selection.selected_ids(&self.tree);
            self.bus.push(GridEvent::SelectionChanged { selected });
        }
        self.finish();
    }

    // Expansion

    /// Flips a row's expansion. `Ok(None)` for rows without sub-rows.
    pub fn toggle_expanded(&mut self, id: &RowId) -> GridResult<Option<bool>> {
        self.known_row(id)?;
        let Some(expanded) = self.expansion.toggle(&self.tree, id) else {
            return Ok(None);
        };
        self.expansion_changed(id.clone(), expanded);
        Ok(Some(expanded))
    }

    /// Returns whether the row's expansion changed.
    pub fn set_expanded(&mut self, id: &RowId, expanded: bool) -> GridResult<bool> {
        self.known_row(id)?;
        let changed = self.expansion.set(&self.tree, id, expanded);
        if changed {
            self.expansion_changed(id.clone(), expanded);
        }
        Ok(changed)
    }

    fn known_row(&self, id: &RowId) -> GridResult<()> {
        match self.tree.get(id) {
            Some(_) => Ok(()),
            None => Err(GridError::UnknownRow(id.to_string())),
        }
    }

    pub fn expand_all(&mut self) {
        self.expansion = ExpansionState::all(&self.tree);
        self.refresh();
        self.finish();
    }

    pub fn collapse_all(&mut self) {
        self.expansion.collapse_all();
        self.refresh();
        self.finish();
    }

    pub fn visible_nested_row_count(&self, id: &RowId) -> usize {
        self.tree.visible_nested_row_count(id, &self.expansion)
    }

    fn expansion_changed(&mut self, row_id: RowId, expanded: bool) {
        self.refresh();
        self.bus.push(GridEvent::ExpansionChanged { row_id, expanded });
        self.finish();
    }

    // Sort

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn is_manual_sort(&self) -> bool {
        self.bus.has_on_sort()
    }

    /// Advances the sort cycle of `column_id`. Unknown or unsortable columns are ignored.
    pub fn toggle_sort(&mut self, column_id: &ColumnId) -> Option<SortDirection> {
        if !self.column_spec(column_id).is_some_and(|s| s.is_sortable()) {
            tracing::debug!(column_id = %column_id, "sort toggle ignored for unsortable column");
            return None;
        }
        let direction = self.sort.toggle(column_id);
        self.refresh();
        let column_id = column_id.clone();
        if self.bus.has_on_sort() {
            self.bus.push(GridEvent::SortRequested {
                column_id,
                direction,
            });
        } else {
            self.bus.push(GridEvent::SortChanged {
                column_id,
                direction,
            });
        }
        self.finish();
        Some(direction)
    }

    // Filters

    pub fn filter_state(&self) -> &FilterState {
        &self.filters
    }

    pub fn set_filter_value(&mut self, filter_id: &str, value: FilterValue) -> GridResult<()> {
        let change = self.filters.set_pending_value(filter_id, value)?;
        self.filter_change(change);
        Ok(())
    }

    pub fn clear_filter_value(&mut self, filter_id: &str) -> GridResult<()> {
        let change = self.filters.clear_pending_value(filter_id)?;
        self.filter_change(change);
        Ok(())
    }

    pub fn apply_filters(&mut self) -> bool {
        let applied = self.filters.apply();
        let changed = applied.is_some();
        if let Some(filters) = applied {
            self.filters_applied(filters);
        }
        self.finish();
        changed
    }

    pub fn cancel_filters(&mut self) -> bool {
        self.filters.cancel()
    }

    /// The "clear filters" signal: drops pending and applied values.
    pub fn reset_filters(&mut self) {
        if self.filters.reset() {
            self.filters_applied(Vec::new());
        }
        self.finish();
    }

    /// Removes one applied filter (a summary tag).
    pub fn remove_filter(&mut self, filter_id: &str) -> bool {
        let Some(filters) = self.filters.remove_applied(filter_id) else {
            return false;
        };
        self.filters_applied(filters);
        self.finish();
        true
    }

    pub fn open_filter_panel(&mut self) {
        self.filters.open_panel();
    }

    pub fn close_filter_panel(&mut self) -> bool {
        self.filters.close_panel()
    }

    fn filter_change(&mut self, change: FilterChange) {
        if let FilterChange::Applied(filters) = change {
            self.filters_applied(filters);
        }
        self.finish();
    }

    fn filters_applied(&mut self, filters: Vec<AppliedFilter>) {
        if !self.config.manual_filters {
            self.refresh();
        }
        self.bus.push(GridEvent::FiltersApplied { filters });
    }

    // Columns and resizing

    pub fn resize_state(&self) -> &ResizeState {
        &self.resize
    }

    pub fn column_width(&self, id: &ColumnId) -> Option<u32> {
        self.columns.get(id).map(|c| c.width)
    }

    pub fn start_resize(&mut self, column_id: &ColumnId) -> GridResult<()> {
        self.dispatch_resize(ResizeEvent::Start {
            column_id: column_id.clone(),
        })
    }

    pub fn resize_column(&mut self, column_id: &ColumnId, width: u32) -> GridResult<()> {
        self.dispatch_resize(ResizeEvent::Resizing {
            column_id: column_id.clone(),
            width,
        })
    }

    pub fn end_resize(&mut self) -> GridResult<()> {
        self.dispatch_resize(ResizeEvent::End)
    }

    /// A complete keyboard resize: start, resize and end in one step.
    ///
    /// Fixed-width columns are left alone, including any drag in progress on another column.
    pub fn keyboard_resize(&mut self, column_id: &ColumnId, width: u32) -> GridResult<()> {
        if !self.resizable(column_id)? {
            return Ok(());
        }
        self.dispatch_resize(ResizeEvent::KeyboardResize {
            column_id: column_id.clone(),
            width,
        })?;
        self.dispatch_resize(ResizeEvent::End)
    }

    /// Runs one resize event through the reducer and executes its effect.
    ///
    /// Widths are clamped to the column minimum. Events for fixed-width columns are ignored.
    pub fn dispatch_resize(&mut self, event: ResizeEvent) -> GridResult<()> {
        let event = match event {
            ResizeEvent::Start { column_id } => {
                if !self.resizable(&column_id)? {
                    return Ok(());
                }
                ResizeEvent::Start { column_id }
            }
            ResizeEvent::Resizing { column_id, width } => {
                if !self.resizable(&column_id)? {
                    return Ok(());
                }
                let width = self.clamp_width(&column_id, width);
                ResizeEvent::Resizing { column_id, width }
            }
            ResizeEvent::KeyboardResize { column_id, width } => {
                if !self.resizable(&column_id)? {
                    return Ok(());
                }
                let width = self.clamp_width(&column_id, width);
                ResizeEvent::KeyboardResize { column_id, width }
            }
            ResizeEvent::End => ResizeEvent::End,
        };

        let transition = self.resize.reduce(event);
        self.resize = transition.state;
        self.resolve();

        if let Some(ResizeEffect::Persist(snapshot)) = transition.effect {
            match self.width_store.store(&snapshot) {
                Ok(()) => self.bus.push(GridEvent::ColumnWidthsPersisted {
                    widths: snapshot.column_widths,
                }),
                Err(err) => tracing::warn!(
                    %err,
                    namespace = self.width_store.namespace(),
                    "failed to persist column widths"
                ),
            }
        }
        self.finish();
        Ok(())
    }

    fn resizable(&self, column_id: &ColumnId) -> GridResult<bool> {
        let spec = self
            .column_spec(column_id)
            .ok_or_else(|| GridError::UnknownColumn(column_id.to_string()))?;
        if !spec.resizable {
            tracing::debug!(column_id = %column_id, "resize ignored for fixed-width column");
        }
        Ok(spec.resizable)
    }

    fn clamp_width(&self, column_id: &ColumnId, width: u32) -> u32 {
        let min = self
            .column_spec(column_id)
            .map(|s| s.effective_min_width())
            .unwrap_or(0);
        width.max(min)
    }

    pub fn set_column_visible(&mut self, column_id: &ColumnId, visible: bool) -> GridResult<()> {
        if self.column_spec(column_id).is_none() {
            return Err(GridError::UnknownColumn(column_id.to_string()));
        }
        self.overrides
            .visibility
            .insert(column_id.clone(), visible);
        self.resolve();
        self.bus.push(GridEvent::ColumnsChanged);
        self.finish();
        Ok(())
    }

    /// Moves a column to `to_index` in the overall column order. Sticky columns stay pinned.
    pub fn move_column(&mut self, column_id: &ColumnId, to_index: usize) -> GridResult<()> {
        if self.column_spec(column_id).is_none() {
            return Err(GridError::UnknownColumn(column_id.to_string()));
        }
        let mut order: Vec<ColumnId> = self.columns.iter().map(|c| c.id.clone()).collect();
        order.retain(|id| id != column_id);
        order.insert(to_index.min(order.len()), column_id.clone());
        self.overrides.order = order;
        self.resolve();
        self.bus.push(GridEvent::ColumnsChanged);
        self.finish();
        Ok(())
    }

    pub fn column_overrides(&self) -> &ColumnOverrides {
        &self.overrides
    }

    // Pagination

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn set_page(&mut self, index: usize) -> bool {
        let changed = self.pagination.set_page(index, self.display.len());
        self.page_changed(changed)
    }

    pub fn next_page(&mut self) -> bool {
        let changed = self.pagination.next_page(self.display.len());
        self.page_changed(changed)
    }

    pub fn prev_page(&mut self) -> bool {
        let changed = self.pagination.prev_page(self.display.len());
        self.page_changed(changed)
    }

    pub fn set_page_size(&mut self, size: usize) -> bool {
        let changed = self.pagination.set_page_size(size);
        self.page_changed(changed)
    }

    fn page_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.bus.push(GridEvent::PageChanged {
                page_index: self.pagination.page_index(),
                page_size: self.pagination.page_size(),
            });
        }
        self.finish();
        changed
    }

    // Virtualization

    pub fn window(&self) -> &VirtualWindow {
        &self.window
    }

    pub fn set_viewport_height(&mut self, px: u32) {
        self.config.viewport_height_px = px;
        self.window.set_viewport_height(px);
        self.after_scroll();
    }

    pub fn set_scroll_offset(&mut self, px: u64) {
        self.window.set_scroll_offset(px);
        self.after_scroll();
    }

    pub fn set_row_size(&mut self, size: RowSize) {
        self.config.row_size = size;
        self.config.row_height_px = None;
        self.window.set_row_height(size.height_px());
        self.after_scroll();
    }

    /// Brings display row `index` into view: scrolls in virtual mode, turns the page in paged
    /// mode.
    pub fn scroll_to_row(&mut self, index: usize) {
        match self.config.display_mode {
            DisplayMode::Virtual => {
                self.window.scroll_to_index(index);
                self.after_scroll();
            }
            DisplayMode::Paged => {
                let page = index / self.pagination.page_size();
                self.set_page(page);
            }
            DisplayMode::All => {}
        }
    }

    pub fn is_fetching_more(&self) -> bool {
        self.window.is_fetching_more()
    }

    /// Ends an outstanding fetch that produced no rows.
    pub fn resolve_fetch(&mut self) {
        let total = self.display.len();
        self.window.resolve_fetch(total);
        self.finish();
    }

    fn fetch_capability(&self) -> FetchCapability {
        if !self.bus.has_fetch_more() {
            FetchCapability::Unavailable
        } else if !self.config.infinite_scroll {
            FetchCapability::Disabled
        } else {
            FetchCapability::Enabled
        }
    }

    fn after_scroll(&mut self) {
        if self.config.display_mode == DisplayMode::Virtual {
            let capability = self.fetch_capability();
            if let FetchDecision::Request { loaded_rows } = self.window.check_fetch(capability) {
                self.bus.push(GridEvent::FetchMoreRequested { loaded_rows });
            }
        }
        self.finish();
    }

    // Derivation

    fn restore_widths(&mut self) {
        let persisted = match self.width_store.load() {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%err, "failed to load saved column widths");
                None
            }
        };
        let Some(mut persisted) = persisted else {
            return;
        };
        let specs: HashMap<&ColumnId, &ColumnSpec<R>> =
            self.specs.iter().map(|s| (&s.id, s)).collect();
        persisted.column_widths.retain(|id, width| match specs.get(id) {
            Some(spec) if spec.resizable => {
                *width = (*width).max(spec.effective_min_width());
                true
            }
            Some(_) => false,
            None => {
                tracing::debug!(column_id = %id, "dropping saved width of unknown column");
                false
            }
        });
        self.resize = ResizeState::from_persisted(persisted);
    }

    fn restore_state(
        &mut self,
        selected: Vec<RowId>,
        expanded: Vec<RowId>,
        expand_all: bool,
        sort: Option<(ColumnId, SortDirection)>,
    ) {
        let known: Vec<RowId> = selected
            .into_iter()
            .filter(|id| {
                let ok = self.selection.is_row_selectable(&self.tree, id);
                if !ok {
                    tracing::debug!(row_id = %id, "dropping initial selection of unknown or disabled row");
                }
                ok
            })
            .collect();
        match self.selection.mode() {
            SelectionMode::Multi => {
                self.selection.set_all(&self.tree, &known, true);
            }
            SelectionMode::Single => {
                if let Some(last) = known.last() {
                    self.selection.toggle_row(&self.tree, last);
                }
            }
        }

        if expand_all {
            self.expansion = ExpansionState::all(&self.tree);
        } else {
            for id in &expanded {
                self.expansion.set(&self.tree, id, true);
            }
        }

        if let Some((column_id, direction)) = sort {
            if self.column_spec(&column_id).is_some_and(|s| s.is_sortable()) {
                self.sort.set(column_id, direction);
            } else {
                tracing::debug!(column_id = %column_id, "dropping initial sort on unknown column");
            }
        }
    }

    /// Re-resolves columns and recomputes the display order.
    fn refresh(&mut self) {
        self.resolve();
        self.display = self.derive_display();
        let total = self.display.len();
        self.pagination.clamp(total);
        self.window.set_total_row_count(total);
        self.sync_row_flags();
    }

    fn resolve(&mut self) {
        let mut overrides = self.overrides.clone();
        overrides.widths.extend(
            self.resize
                .column_widths
                .iter()
                .map(|(id, w)| (id.clone(), *w)),
        );
        self.columns = resolve_columns(&self.specs, &overrides);
        for column in self.columns.iter_mut() {
            column.sort_direction = self.sort.direction(&column.id);
        }
    }

    fn derive_display(&self) -> Vec<RowId> {
        let specs: HashMap<&ColumnId, &ColumnSpec<R>> =
            self.specs.iter().map(|s| (&s.id, s)).collect();

        let filtering = !self.config.manual_filters && self.filters.has_applied();
        let mut view = DisplayTree::from_tree(&self.tree, |row| {
            !filtering
                || self.filters.row_matches(|column_id| {
                    specs
                        .get(column_id)
                        .map(|s| s.value(&row.original))
                        .unwrap_or_default()
                })
        });

        let active = if self.bus.has_on_sort() {
            None
        } else {
            self.sort
                .active()
                .and_then(|(id, direction)| specs.get(id).map(|s| (*s, direction)))
        };
        let Some((spec, direction)) = active else {
            return view.flatten(&self.expansion);
        };

        match self.config.nested_sort {
            NestedSortPolicy::PerParent => {
                view.sort_siblings(|ids| sort_row_ids(ids, &self.tree, spec, direction));
                view.flatten(&self.expansion)
            }
            NestedSortPolicy::Flatten => {
                let mut ids = view.flatten(&self.expansion);
                sort_row_ids(&mut ids, &self.tree, spec, direction);
                ids
            }
        }
    }

    fn sync_row_flags(&mut self) {
        for row in self.tree.iter_mut() {
            row.is_selected = self.selection.is_selected(&row.id);
            row.is_expanded = self.expansion.is_expanded(&row.id);
        }
    }

    pub fn snapshot(&self) -> GridSnapshot {
        let range = self.rendered_range();
        let visible_columns: Vec<Column> = self.columns.visible().cloned().collect();
        let specs: Vec<Option<&ColumnSpec<R>>> = visible_columns
            .iter()
            .map(|c| self.column_spec(&c.id))
            .collect();

        let rows = self.display[range.clone()]
            .iter()
            .enumerate()
            .filter_map(|(offset, id)| {
                let row = self.tree.get(id)?;
                Some(RowView {
                    id: id.clone(),
                    display_index: range.start + offset,
                    depth: row.depth,
                    cells: specs
                        .iter()
                        .map(|s| s.map(|s| s.value(&row.original)).unwrap_or_default())
                        .collect(),
                    is_selected: row.is_selected,
                    is_selectable: !row.is_disabled_for_selection,
                    is_expanded: row.is_expanded,
                    can_expand: row.can_expand(),
                    visible_nested_rows: self.tree.visible_nested_row_count(id, &self.expansion),
                })
            })
            .collect();

        let total_rows = self.display.len();
        let page = (self.config.display_mode == DisplayMode::Paged).then(|| PageInfo {
            index: self.pagination.page_index(),
            size: self.pagination.page_size(),
            count: self.pagination.page_count(total_rows),
        });

        GridSnapshot {
            rows,
            columns: visible_columns,
            selection_mode: self.selection.mode(),
            select_all: self.select_all_state(SelectScope::CurrentPage),
            filter_buttons_enabled: self.filters.buttons_enabled(),
            applied_filters: self.filters.applied_filters(),
            visible_range: range,
            total_extent: self.window.total_extent(),
            column_widths: self
                .columns
                .iter()
                .map(|c| (c.id.clone(), c.width))
                .collect(),
            is_resizing: self.resize.is_resizing(),
            resizing_column: match &self.resize.phase {
                ResizePhase::Resizing { column_id } => Some(column_id.clone()),
                ResizePhase::Idle => None,
            },
            is_fetching_more: self.window.is_fetching_more(),
            page,
            total_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::filter::FilterKind;
    use crate::storage::DEFAULT_STORAGE_NAMESPACE;

    #[derive(Clone, Debug)]
    struct Task {
        id: u32,
        title: &'static str,
        points: i64,
        done: bool,
        subtasks: Vec<Task>,
    }

    fn task(id: u32, title: &'static str, points: i64) -> Task {
        Task {
            id,
            title,
            points,
            done: false,
            subtasks: Vec::new(),
        }
    }

    fn records() -> Vec<Task> {
        let mut parent = task(1, "plan", 5);
        parent.subtasks = vec![task(11, "draft", 3), task(12, "review", 1)];
        let mut closed = task(3, "ship", 2);
        closed.done = true;
        vec![parent, task(2, "build", 8), closed, task(4, "test", 8)]
    }

    fn columns() -> Vec<ColumnSpec<Task>> {
        vec![
            ColumnSpec::new("title", "Title", |t: &Task| CellValue::from(t.title)),
            ColumnSpec::new("points", "Points", |t: &Task| CellValue::from(t.points)),
            ColumnSpec::new("select", "", |_: &Task| CellValue::Null)
                .unsortable()
                .fixed_width(3),
        ]
    }

    fn row_options() -> RowOptions<Task> {
        RowOptions::new()
            .with_row_id(|t: &Task| t.id.to_string())
            .with_sub_rows(|t: &Task| t.subtasks.as_slice())
            .with_disabled(|t: &Task| t.done)
    }

    fn grid(config: GridConfig) -> DataGrid<Task> {
        DataGrid::builder(config)
            .records(records())
            .columns(columns())
            .row_options(row_options())
            .filters(vec![FilterDef::new(
                "title",
                "title",
                "Title",
                FilterKind::Text,
            )])
            .build()
    }

    fn ids(grid: &DataGrid<Task>) -> Vec<&str> {
        grid.display_rows().iter().map(|id| id.as_str()).collect()
    }

    fn recorder(grid: &mut DataGrid<Task>) -> Rc<RefCell<Vec<GridEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        grid.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn missing_input_degrades_to_empty_grid() {
        let grid: DataGrid<Task> = DataGrid::builder(GridConfig::default())
            .columns(columns())
            .build();
        assert!(matches!(
            grid.configuration_error(),
            Some(GridError::MissingInput { .. })
        ));
        let snap = grid.snapshot();
        assert!(snap.rows.is_empty());
        assert_eq!(snap.total_rows, 0);
    }

    #[test]
    fn sort_cycles_and_keeps_children_under_parents() {
        let mut grid = grid(GridConfig::default());
        grid.expand_all();
        assert_eq!(ids(&grid), vec!["1", "11", "12", "2", "3", "4"]);

        assert_eq!(grid.toggle_sort(&"points".into()), Some(SortDirection::Asc));
        assert_eq!(ids(&grid), vec!["3", "1", "12", "11", "2", "4"]);

        assert_eq!(grid.toggle_sort(&"points".into()), Some(SortDirection::Desc));
        assert_eq!(ids(&grid), vec!["2", "4", "1", "11", "12", "3"]);

        assert_eq!(grid.toggle_sort(&"points".into()), Some(SortDirection::None));
        assert_eq!(ids(&grid), vec!["1", "11", "12", "2", "3", "4"]);
        assert_eq!(grid.toggle_sort(&"select".into()), None);
    }

    #[test]
    fn flatten_policy_sorts_one_list() {
        let mut grid = grid(GridConfig {
            nested_sort: NestedSortPolicy::Flatten,
            ..Default::default()
        });
        grid.expand_all();
        grid.toggle_sort(&"points".into());
        assert_eq!(ids(&grid), vec!["12", "3", "11", "1", "2", "4"]);
    }

    #[test]
    fn manual_sort_emits_request_and_keeps_order() {
        let mut grid = grid(GridConfig::default());
        let asked = Rc::new(RefCell::new(Vec::new()));
        let sink = asked.clone();
        grid.on_sort(move |id, dir| sink.borrow_mut().push((id.clone(), dir)));

        grid.toggle_sort(&"points".into());
        assert_eq!(ids(&grid), vec!["1", "2", "3", "4"]);
        assert_eq!(
            *asked.borrow(),
            vec![(ColumnId::from("points"), SortDirection::Asc)]
        );
        assert_eq!(
            grid.columns().get(&"points".into()).unwrap().sort_direction,
            SortDirection::Asc
        );
    }

    #[test]
    fn selection_scope_is_explicit() {
        let mut grid = grid(GridConfig {
            display_mode: DisplayMode::Paged,
            page_size: 2,
            ..Default::default()
        });
        grid.toggle_all(true, SelectScope::CurrentPage);
        assert_eq!(
            grid.selected_ids(),
            vec![RowId::from("1"), RowId::from("2")]
        );
        assert_eq!(grid.snapshot().select_all, SelectAllState::All);

        grid.clear_selection();
        grid.toggle_all(true, SelectScope::AllPages);
        let selected: Vec<String> = grid.selected_ids().iter().map(|i| i.to_string()).collect();
        assert_eq!(selected, vec!["1", "11", "12", "2", "4"]);
    }

    #[test]
    fn selection_events_follow_transitions() {
        let mut grid = grid(GridConfig::default());
        let events = recorder(&mut grid);
        grid.toggle_row(&"3".into());
        assert!(events.borrow().is_empty());

        grid.toggle_row(&"2".into());
        assert_eq!(
            *events.borrow(),
            vec![GridEvent::SelectionChanged {
                selected: vec!["2".into()]
            }]
        );
        assert!(grid.rows().get(&"2".into()).unwrap().is_selected);
    }

    #[test]
    fn filters_apply_to_display_rows() {
        let mut grid = grid(GridConfig::default());
        let events = recorder(&mut grid);
        grid.set_filter_value("title", FilterValue::Text("s".into()))
            .unwrap();
        assert_eq!(ids(&grid), vec!["1", "2", "3", "4"]);
        assert!(grid.snapshot().filter_buttons_enabled);

        assert!(grid.apply_filters());
        assert_eq!(ids(&grid), vec!["3", "4"]);
        assert!(!grid.snapshot().filter_buttons_enabled);
        assert!(matches!(
            events.borrow().last(),
            Some(GridEvent::FiltersApplied { filters }) if filters.len() == 1
        ));

        grid.reset_filters();
        assert_eq!(ids(&grid), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn manual_filters_only_report() {
        let mut grid = grid(GridConfig {
            manual_filters: true,
            filter_update: crate::filter::UpdateMethod::Instant,
            ..Default::default()
        });
        let applied = Rc::new(RefCell::new(0));
        let sink = applied.clone();
        grid.on_apply_filters(move |f| *sink.borrow_mut() = f.len());
        grid.set_filter_value("title", FilterValue::Text("zzz".into()))
            .unwrap();
        assert_eq!(*applied.borrow(), 1);
        assert_eq!(grid.display_len(), 4);
    }

    #[test]
    fn resize_persists_and_survives_rebuild() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let mut grid = DataGrid::builder(GridConfig::default())
            .records(records())
            .columns(columns())
            .storage(backend.clone())
            .build();
        assert_eq!(grid.column_width(&"title".into()), Some(90));

        grid.start_resize(&"title".into()).unwrap();
        grid.resize_column(&"title".into(), 150).unwrap();
        assert!(grid.snapshot().is_resizing);
        assert_eq!(grid.snapshot().resizing_column, Some("title".into()));
        grid.end_resize().unwrap();
        assert_eq!(grid.column_width(&"title".into()), Some(150));

        let reopened = DataGrid::builder(GridConfig::default())
            .records(records())
            .columns(columns())
            .storage(backend)
            .build();
        assert_eq!(reopened.column_width(&"title".into()), Some(150));
    }

    #[test]
    fn resize_clamps_and_ignores_fixed_columns() {
        let mut grid = grid(GridConfig::default());
        grid.keyboard_resize(&"points".into(), 10).unwrap();
        assert_eq!(grid.column_width(&"points".into()), Some(90));

        grid.keyboard_resize(&"select".into(), 40).unwrap();
        assert_eq!(grid.column_width(&"select".into()), Some(3));

        assert!(matches!(
            grid.start_resize(&"nope".into()),
            Err(GridError::UnknownColumn(_))
        ));
    }

    #[test]
    fn keyboard_resize_of_fixed_column_leaves_drag_running() {
        let backend = Arc::new(MemoryStorage::new());
        let mut grid = DataGrid::builder(GridConfig::default())
            .records(records())
            .columns(columns())
            .row_options(row_options())
            .storage(backend.clone())
            .build();
        let events = recorder(&mut grid);

        grid.start_resize(&"title".into()).unwrap();
        grid.resize_column(&"title".into(), 140).unwrap();
        grid.keyboard_resize(&"select".into(), 40).unwrap();

        assert!(grid.resize_state().is_resizing());
        assert!(backend.get(DEFAULT_STORAGE_NAMESPACE).unwrap().is_none());
        assert!(events.borrow().is_empty());

        grid.resize_column(&"title".into(), 160).unwrap();
        grid.end_resize().unwrap();
        assert_eq!(grid.column_width(&"title".into()), Some(160));
        assert_eq!(grid.column_width(&"select".into()), Some(3));
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn expansion_of_unknown_row_is_an_error() {
        let mut grid = grid(GridConfig::default());
        let events = recorder(&mut grid);

        assert!(matches!(
            grid.toggle_expanded(&RowId::new("missing")),
            Err(GridError::UnknownRow(id)) if id == "missing"
        ));
        assert!(matches!(
            grid.set_expanded(&RowId::new("missing"), true),
            Err(GridError::UnknownRow(_))
        ));
        // Leaves are known rows that cannot expand.
        assert_eq!(grid.toggle_expanded(&RowId::new("2")).unwrap(), None);
        assert!(!grid.set_expanded(&RowId::new("2"), true).unwrap());
        assert!(events.borrow().is_empty());

        assert_eq!(grid.toggle_expanded(&RowId::new("1")).unwrap(), Some(true));
        assert!(!grid.set_expanded(&RowId::new("1"), true).unwrap());
        assert_eq!(ids(&grid), vec!["1", "11", "12", "2", "3", "4"]);
    }

    #[test]
    fn column_visibility_and_order() {
        let mut grid = grid(GridConfig::default());
        grid.set_column_visible(&"title".into(), false).unwrap();
        let visible: Vec<String> = grid.columns().visible().map(|c| c.id.to_string()).collect();
        assert_eq!(visible, vec!["points", "select"]);

        grid.set_column_visible(&"title".into(), true).unwrap();
        grid.move_column(&"points".into(), 0).unwrap();
        let order: Vec<String> = grid.columns().iter().map(|c| c.id.to_string()).collect();
        assert_eq!(order, vec!["points", "title", "select"]);
    }

    #[test]
    fn data_change_drops_stale_selection() {
        let mut grid = grid(GridConfig::default());
        grid.toggle_row(&"4".into());
        grid.toggle_row(&"2".into());
        grid.set_records(vec![task(2, "build", 8)]);
        assert_eq!(grid.selected_ids(), vec![RowId::from("2")]);
    }

    #[test]
    fn infinite_scroll_requests_once() {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let mut grid = grid(GridConfig {
            display_mode: DisplayMode::Virtual,
            infinite_scroll: true,
            viewport_height_px: 96,
            fetch_threshold: 1,
            ..Default::default()
        });
        let sink = requests.clone();
        grid.fetch_more(move |n| sink.borrow_mut().push(n));

        grid.set_scroll_offset(48);
        grid.set_scroll_offset(96);
        assert_eq!(*requests.borrow(), vec![4]);
        assert!(grid.is_fetching_more());

        grid.append_records(vec![task(5, "deploy", 1)]);
        assert!(!grid.is_fetching_more());
        assert_eq!(grid.display_len(), 5);
    }

    #[test]
    fn fetch_without_infinite_scroll_is_refused() {
        let mut grid = grid(GridConfig {
            display_mode: DisplayMode::Virtual,
            viewport_height_px: 480,
            ..Default::default()
        });
        let requests = Rc::new(RefCell::new(0));
        let sink = requests.clone();
        grid.fetch_more(move |_| *sink.borrow_mut() += 1);
        grid.set_scroll_offset(0);
        assert_eq!(*requests.borrow(), 0);
        assert!(!grid.is_fetching_more());
    }

    #[test]
    fn initial_state_is_pruned() {
        let mut filters = BTreeMap::new();
        filters.insert("gone".to_string(), FilterValue::Text("x".into()));
        let grid = DataGrid::builder(GridConfig::default())
            .records(records())
            .columns(columns())
            .row_options(row_options())
            .initial_state(InitialState {
                selected: vec!["2".into(), "3".into(), "99".into()],
                expanded: vec!["1".into(), "2".into()],
                sort: Some(("missing".into(), SortDirection::Asc)),
                filters,
                ..Default::default()
            })
            .build();
        assert_eq!(grid.selected_ids(), vec![RowId::from("2")]);
        assert_eq!(ids(&grid), vec!["1", "11", "12", "2", "3", "4"]);
        assert!(grid.sort_state().active().is_none());
        assert!(!grid.filter_state().has_applied());
    }
}

use std::sync::Arc;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui_datagrid_core::column::ColumnId;
use ratatui_datagrid_core::config::DisplayMode;
use ratatui_datagrid_core::grid::DataGrid;
use ratatui_datagrid_core::grid::GridSnapshot;
use ratatui_datagrid_core::grid::RowView;
use ratatui_datagrid_core::row::RowId;
use ratatui_datagrid_core::selection::SelectAllState;
use ratatui_datagrid_core::selection::SelectScope;
use ratatui_datagrid_core::selection::SelectionMode;
use ratatui_datagrid_core::sort::SortDirection;
use unicode_width::UnicodeWidthStr;
use virtualizer::Align;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

use crate::input::GridHit;
use crate::input::InputEvent;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;
use crate::keymap::GridBindings;
use crate::keymap::GridCommand;
use crate::render;
use crate::render::ScrollExtent;
use crate::theme::Theme;

const SELECT_COLUMN_WIDTH: u16 = 4;
const MOUSE_SCROLL_ROWS: isize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataGridAction {
    None,
    Redraw,
    SelectionChanged,
    SortChanged {
        column_id: ColumnId,
        direction: SortDirection,
    },
    ExpansionChanged {
        row_id: RowId,
        expanded: bool,
    },
    ColumnResized {
        column_id: ColumnId,
        width: u32,
    },
    PageChanged {
        page_index: usize,
    },
}

/// Options for [`DataGridView`].
///
/// Column widths in the engine are abstract units (pixels in a graphical host); the view divides
/// them by `units_per_cell` to get terminal cells.
#[derive(Clone, Debug)]
pub struct DataGridViewOptions {
    pub show_header: bool,
    pub show_scrollbar: bool,
    /// Leading `[x]`/`(•)` column. Hidden columns still work through the key bindings.
    pub show_select_column: bool,
    pub units_per_cell: u32,
    /// Width change per `<`/`>` press, in engine units.
    pub resize_step: u32,
    pub col_gap: u32,
    pub overscan_cols: usize,
    /// Base style; `Style::default()` falls back to the theme's primary text.
    pub style: Style,
    pub scrollbar_style: Style,
    pub bindings: GridBindings,
}

impl Default for DataGridViewOptions {
    fn default() -> Self {
        Self {
            show_header: true,
            show_scrollbar: true,
            show_select_column: true,
            units_per_cell: 8,
            resize_step: 10,
            col_gap: 1,
            overscan_cols: 2,
            style: Style::default(),
            scrollbar_style: Style::default(),
            bindings: GridBindings::default(),
        }
    }
}

/// Terminal presentation of a [`DataGrid`].
///
/// The view keeps only presentation state (cursor, first visible line, horizontal scroll); every
/// grid transition goes through the engine. Rows are virtualized by the engine's window, columns
/// by a local `virtualizer`.
pub struct DataGridView {
    options: DataGridViewOptions,
    cursor_row: usize,
    cursor_col: usize,
    top_row: usize,
    header: Rect,
    body: Rect,
    scroll_x: u64,
    drag: Option<ColumnDrag>,
    col_v: Virtualizer,
    col_items: Vec<virtualizer::VirtualItem>,
}

impl Default for DataGridView {
    fn default() -> Self {
        Self::with_options(DataGridViewOptions::default())
    }
}

/// A mouse resize in progress, started on a header edge.
#[derive(Clone, Debug)]
struct ColumnDrag {
    column_id: ColumnId,
    origin_x: u16,
    origin_width: u32,
}

struct HeaderContext<'a> {
    area: Rect,
    snapshot: &'a GridSnapshot,
    theme: &'a Theme,
}

impl DataGridView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DataGridViewOptions) -> Self {
        let mut col_opts = VirtualizerOptions::new(0, |_| 1);
        col_opts.gap = options.col_gap;
        col_opts.overscan = options.overscan_cols;
        Self {
            options,
            cursor_row: 0,
            cursor_col: 0,
            top_row: 0,
            header: Rect::default(),
            body: Rect::default(),
            scroll_x: 0,
            drag: None,
            col_v: Virtualizer::new(col_opts),
            col_items: Vec::new(),
        }
    }

    pub fn options(&self) -> &DataGridViewOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DataGridViewOptions) {
        self.options = options;
    }

    /// `(display row, visible column)` under the cursor.
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn top_row(&self) -> usize {
        self.top_row
    }

    pub fn set_cursor<R>(&mut self, grid: &mut DataGrid<R>, row: usize) {
        self.cursor_row = row;
        self.sync_rows(grid);
    }

    pub fn cursor_row_id<R>(&self, grid: &DataGrid<R>) -> Option<RowId> {
        grid.display_rows().get(self.cursor_row).cloned()
    }

    pub fn cursor_column_id<R>(&self, grid: &DataGrid<R>) -> Option<ColumnId> {
        grid.columns()
            .visible()
            .nth(self.cursor_col)
            .map(|c| c.id.clone())
    }

    pub fn handle_event<R>(&mut self, grid: &mut DataGrid<R>, event: InputEvent) -> DataGridAction {
        match event {
            InputEvent::Key(key) => match self.options.bindings.command_for(&key) {
                Some(command) => self.apply(grid, command),
                None => DataGridAction::None,
            },
            InputEvent::Mouse(mouse) => self.handle_mouse(grid, mouse),
        }
    }

    pub fn apply<R>(&mut self, grid: &mut DataGrid<R>, command: GridCommand) -> DataGridAction {
        if grid.display_len() == 0 {
            self.cursor_row = 0;
            self.top_row = 0;
            return DataGridAction::None;
        }
        let page_lines = (self.body.height as isize - 1).max(1);

        match command {
            GridCommand::Up => self.move_cursor(grid, -1),
            GridCommand::Down => self.move_cursor(grid, 1),
            GridCommand::Top => self.move_cursor(grid, isize::MIN),
            GridCommand::Bottom => self.move_cursor(grid, isize::MAX),
            GridCommand::PrevColumn => self.move_column(grid, -1),
            GridCommand::NextColumn => self.move_column(grid, 1),
            GridCommand::PageUp | GridCommand::PageDown
                if grid.config().display_mode == DisplayMode::Paged =>
            {
                let changed = if command == GridCommand::PageUp {
                    grid.prev_page()
                } else {
                    grid.next_page()
                };
                if !changed {
                    return DataGridAction::None;
                }
                self.cursor_row = grid.rendered_range().start;
                self.sync_rows(grid);
                DataGridAction::PageChanged {
                    page_index: grid.pagination().page_index(),
                }
            }
            GridCommand::PageUp => self.move_cursor(grid, -page_lines),
            GridCommand::PageDown => self.move_cursor(grid, page_lines),
            GridCommand::ToggleRow => {
                let Some(id) = self.cursor_row_id(grid) else {
                    return DataGridAction::None;
                };
                if grid.toggle_row(&id) {
                    DataGridAction::SelectionChanged
                } else {
                    DataGridAction::None
                }
            }
            GridCommand::ToggleAllOnPage => Self::toggle_all(grid, SelectScope::CurrentPage),
            GridCommand::ToggleAllPages => Self::toggle_all(grid, SelectScope::AllPages),
            GridCommand::CycleSort => self.cycle_sort(grid),
            GridCommand::ToggleExpand => self.set_expanded(grid, None),
            GridCommand::Expand => self.set_expanded(grid, Some(true)),
            GridCommand::Collapse => self.collapse_or_parent(grid),
            GridCommand::Narrow => self.resize_cursor_column(grid, false),
            GridCommand::Widen => self.resize_cursor_column(grid, true),
        }
    }

    /// Paints the grid. Syncs the engine's viewport to `area` first, so the snapshot covers
    /// exactly the lines on screen.
    pub fn render<R>(&mut self, grid: &mut DataGrid<R>, area: Rect, buf: &mut Buffer, theme: &Theme) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let base_style = if self.options.style == Style::default() {
            theme.text_primary
        } else {
            self.options.style
        };
        buf.set_style(area, base_style);

        let header_h = u16::from(self.options.show_header).min(area.height);
        let wants_footer = grid.config().display_mode == DisplayMode::Paged
            || grid.is_fetching_more();
        let footer_h = u16::from(wants_footer && area.height > header_h + 1);
        let (content_w, scrollbar_x) = if self.options.show_scrollbar && area.width >= 2 {
            (area.width - 1, Some(area.x + area.width - 1))
        } else {
            (area.width, None)
        };

        let header_area = Rect::new(area.x, area.y, content_w, header_h);
        self.header = header_area;
        self.body = Rect::new(
            area.x,
            area.y + header_h,
            content_w,
            area.height - header_h - footer_h,
        );

        if let Some(err) = grid.configuration_error() {
            render::render_str_clipped(
                self.body.x,
                self.body.y,
                0,
                self.body.width,
                buf,
                &err.to_string(),
                theme.danger,
            );
            return;
        }

        let row_h = grid.window().row_height();
        let viewport_px = u32::from(self.body.height).saturating_mul(row_h);
        if grid.window().viewport_height() != viewport_px {
            grid.set_viewport_height(viewport_px);
        }
        self.sync_rows(grid);

        let snapshot = grid.snapshot();
        self.sync_columns(&snapshot);

        if header_area.height > 0 {
            self.render_header(
                &HeaderContext {
                    area: header_area,
                    snapshot: &snapshot,
                    theme,
                },
                buf,
            );
        }
        self.render_body(&snapshot, buf, theme, base_style);

        if footer_h > 0 {
            let footer = Rect::new(area.x, self.body.bottom(), content_w, 1);
            self.render_footer(footer, &snapshot, buf, theme);
        }

        if let Some(sb_x) = scrollbar_x {
            let range = self.line_range(grid);
            render::render_scrollbar(
                Rect::new(sb_x, self.body.y, 1, self.body.height),
                buf,
                ScrollExtent {
                    offset: (self.top_row - range.start) as u64,
                    viewport: u64::from(self.body.height),
                    content: range.len() as u64,
                },
                self.options.scrollbar_style,
            );
        }
    }

    /// What the last rendered frame shows at `(x, y)`.
    pub fn hit_test<R>(&self, grid: &DataGrid<R>, x: u16, y: u16) -> GridHit {
        let in_select_column = self.options.show_select_column
            && x >= self.body.x
            && x < self.body.x + SELECT_COLUMN_WIDTH.min(self.body.width);

        if self.header.height > 0 && contains(self.header, x, y) {
            if in_select_column {
                return GridHit::SelectAll;
            }
            return match self.column_at(x) {
                Some((column, false)) => GridHit::Header { column },
                Some((column, true)) => GridHit::ColumnEdge { column },
                None => GridHit::Outside,
            };
        }

        if !contains(self.body, x, y) {
            return GridHit::Outside;
        }
        let row = self.top_row + usize::from(y - self.body.y);
        if row >= self.line_range(grid).end {
            return GridHit::Outside;
        }
        if in_select_column {
            return GridHit::Select { row };
        }
        match self.column_at(x) {
            Some((column, _)) => GridHit::Cell { row, column },
            None => GridHit::Outside,
        }
    }

    /// Visible column under terminal column `x`, and whether `x` is its right-hand separator.
    fn column_at(&self, x: u16) -> Option<(usize, bool)> {
        let data = self.data_area();
        if x < data.x || x >= data.right() {
            return None;
        }
        let content_x = u64::from(x - data.x) + self.scroll_x;
        self.col_items.iter().find_map(|item| {
            let end = item.start + u64::from(item.size);
            if (item.start..end).contains(&content_x) {
                Some((item.index, false))
            } else if self.options.col_gap > 0
                && (end..end + u64::from(self.options.col_gap)).contains(&content_x)
            {
                Some((item.index, true))
            } else {
                None
            }
        })
    }

    fn handle_mouse<R>(&mut self, grid: &mut DataGrid<R>, mouse: MouseEvent) -> DataGridAction {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.move_cursor(grid, -MOUSE_SCROLL_ROWS),
            MouseEventKind::ScrollDown => self.move_cursor(grid, MOUSE_SCROLL_ROWS),
            MouseEventKind::Down => match self.hit_test(grid, mouse.x, mouse.y) {
                GridHit::Outside => DataGridAction::None,
                GridHit::SelectAll => Self::toggle_all(grid, SelectScope::CurrentPage),
                GridHit::Header { column } => {
                    self.cursor_col = column;
                    self.cycle_sort(grid)
                }
                GridHit::ColumnEdge { column } => self.start_drag(grid, column, mouse.x),
                GridHit::Select { row } => {
                    self.cursor_row = row;
                    self.sync_rows(grid);
                    self.apply(grid, GridCommand::ToggleRow)
                }
                GridHit::Cell { row, column } => {
                    self.cursor_row = row;
                    self.cursor_col = column;
                    self.sync_rows(grid);
                    DataGridAction::Redraw
                }
            },
            MouseEventKind::Drag => {
                let Some(drag) = &self.drag else {
                    return DataGridAction::None;
                };
                let delta = i64::from(mouse.x) - i64::from(drag.origin_x);
                let units = i64::from(self.options.units_per_cell.max(1));
                let width = (i64::from(drag.origin_width) + delta * units)
                    .clamp(0, i64::from(u32::MAX));
                let column_id = drag.column_id.clone();
                if let Err(err) = grid.resize_column(&column_id, width as u32) {
                    tracing::warn!(column_id = %column_id, error = %err, "drag resize failed");
                    return DataGridAction::None;
                }
                DataGridAction::Redraw
            }
            MouseEventKind::Up => {
                let Some(drag) = self.drag.take() else {
                    return DataGridAction::None;
                };
                if let Err(err) = grid.end_resize() {
                    tracing::warn!(column_id = %drag.column_id, error = %err, "ending resize failed");
                    return DataGridAction::None;
                }
                match grid.column_width(&drag.column_id) {
                    Some(width) if width != drag.origin_width => DataGridAction::ColumnResized {
                        column_id: drag.column_id,
                        width,
                    },
                    _ => DataGridAction::Redraw,
                }
            }
        }
    }

    fn start_drag<R>(&mut self, grid: &mut DataGrid<R>, column: usize, x: u16) -> DataGridAction {
        let Some(column) = grid.columns().visible().nth(column) else {
            return DataGridAction::None;
        };
        let column_id = column.id.clone();
        let origin_width = column.width;
        if let Err(err) = grid.start_resize(&column_id) {
            tracing::warn!(column_id = %column_id, error = %err, "resize start failed");
            return DataGridAction::None;
        }
        // Fixed-width columns leave the reducer idle.
        if !grid.resize_state().is_resizing() {
            return DataGridAction::None;
        }
        self.drag = Some(ColumnDrag {
            column_id,
            origin_x: x,
            origin_width,
        });
        DataGridAction::Redraw
    }

    fn move_cursor<R>(&mut self, grid: &mut DataGrid<R>, delta: isize) -> DataGridAction {
        let last = grid.display_len().saturating_sub(1);
        let next = self.cursor_row.saturating_add_signed(delta).min(last);
        if next == self.cursor_row {
            return DataGridAction::None;
        }
        self.cursor_row = next;
        self.sync_rows(grid);
        DataGridAction::Redraw
    }

    fn move_column<R>(&mut self, grid: &DataGrid<R>, delta: isize) -> DataGridAction {
        let last = grid.columns().visible_count().saturating_sub(1);
        let next = self.cursor_col.saturating_add_signed(delta).min(last);
        if next == self.cursor_col {
            return DataGridAction::None;
        }
        self.cursor_col = next;
        DataGridAction::Redraw
    }

    fn toggle_all<R>(grid: &mut DataGrid<R>, scope: SelectScope) -> DataGridAction {
        let target = grid.select_all_state(scope) != SelectAllState::All;
        if grid.toggle_all(target, scope) {
            DataGridAction::SelectionChanged
        } else {
            DataGridAction::None
        }
    }

    fn cycle_sort<R>(&mut self, grid: &mut DataGrid<R>) -> DataGridAction {
        let Some(column_id) = self.cursor_column_id(grid) else {
            return DataGridAction::None;
        };
        let row_id = self.cursor_row_id(grid);
        let Some(direction) = grid.toggle_sort(&column_id) else {
            return DataGridAction::None;
        };
        self.follow_row(grid, row_id);
        DataGridAction::SortChanged {
            column_id,
            direction,
        }
    }

    fn set_expanded<R>(&mut self, grid: &mut DataGrid<R>, to: Option<bool>) -> DataGridAction {
        let Some(row_id) = self.cursor_row_id(grid) else {
            return DataGridAction::None;
        };
        let result = match to {
            None => grid.toggle_expanded(&row_id),
            Some(expanded) => grid
                .set_expanded(&row_id, expanded)
                .map(|changed| changed.then_some(expanded)),
        };
        let expanded = match result {
            Ok(Some(expanded)) => expanded,
            Ok(None) => return DataGridAction::None,
            Err(err) => {
                tracing::warn!(row_id = %row_id, error = %err, "expansion failed");
                return DataGridAction::None;
            }
        };
        self.follow_row(grid, Some(row_id.clone()));
        DataGridAction::ExpansionChanged { row_id, expanded }
    }

    /// Collapses an expanded row; on a collapsed or leaf row, jumps to its parent.
    fn collapse_or_parent<R>(&mut self, grid: &mut DataGrid<R>) -> DataGridAction {
        let Some(row_id) = self.cursor_row_id(grid) else {
            return DataGridAction::None;
        };
        let Some((is_expanded, parent)) = grid
            .rows()
            .get(&row_id)
            .map(|row| (row.is_expanded, row.parent_id.clone()))
        else {
            return DataGridAction::None;
        };
        if is_expanded {
            return self.set_expanded(grid, Some(false));
        }
        let Some(parent) = parent else {
            return DataGridAction::None;
        };
        let Some(index) = grid.display_rows().iter().position(|id| *id == parent) else {
            return DataGridAction::None;
        };
        self.cursor_row = index;
        self.sync_rows(grid);
        DataGridAction::Redraw
    }

    fn resize_cursor_column<R>(&mut self, grid: &mut DataGrid<R>, widen: bool) -> DataGridAction {
        let Some(column_id) = self.cursor_column_id(grid) else {
            return DataGridAction::None;
        };
        let Some(current) = grid.column_width(&column_id) else {
            return DataGridAction::None;
        };
        let requested = if widen {
            current.saturating_add(self.options.resize_step)
        } else {
            current.saturating_sub(self.options.resize_step)
        };
        if let Err(err) = grid.keyboard_resize(&column_id, requested) {
            tracing::warn!(column_id = %column_id, error = %err, "keyboard resize failed");
            return DataGridAction::None;
        }
        match grid.column_width(&column_id) {
            Some(width) if width != current => DataGridAction::ColumnResized { column_id, width },
            _ => DataGridAction::None,
        }
    }

    /// Keeps the cursor on `row_id` after the display order changed.
    fn follow_row<R>(&mut self, grid: &mut DataGrid<R>, row_id: Option<RowId>) {
        if let Some(row_id) = row_id {
            if let Some(index) = grid.display_rows().iter().position(|id| *id == row_id) {
                self.cursor_row = index;
            }
        }
        self.sync_rows(grid);
    }

    /// Display rows the view may scroll through: the current page in paged mode, all rows
    /// otherwise.
    fn line_range<R>(&self, grid: &DataGrid<R>) -> std::ops::Range<usize> {
        match grid.config().display_mode {
            DisplayMode::Paged => grid.rendered_range(),
            DisplayMode::All | DisplayMode::Virtual => 0..grid.display_len(),
        }
    }

    fn sync_rows<R>(&mut self, grid: &mut DataGrid<R>) {
        let total = grid.display_len();
        if total == 0 {
            self.cursor_row = 0;
            self.top_row = 0;
            return;
        }
        self.cursor_row = self.cursor_row.min(total - 1);
        self.cursor_col = self
            .cursor_col
            .min(grid.columns().visible_count().saturating_sub(1));

        if grid.config().display_mode == DisplayMode::Paged
            && !grid.rendered_range().contains(&self.cursor_row)
        {
            grid.scroll_to_row(self.cursor_row);
        }

        let range = self.line_range(grid);
        let lines = usize::from(self.body.height).max(1);
        if self.cursor_row < self.top_row {
            self.top_row = self.cursor_row;
        }
        if self.cursor_row >= self.top_row + lines {
            self.top_row = self.cursor_row + 1 - lines;
        }
        let max_top = range.end.saturating_sub(lines).max(range.start);
        self.top_row = self.top_row.clamp(range.start, max_top);

        if grid.config().display_mode == DisplayMode::Virtual {
            let offset = self.top_row as u64 * u64::from(grid.window().row_height());
            if grid.window().scroll_offset() != offset {
                grid.set_scroll_offset(offset);
            }
        }
    }

    fn sync_columns(&mut self, snapshot: &GridSnapshot) {
        let units = self.options.units_per_cell.max(1);
        let widths: Arc<Vec<u32>> = Arc::new(
            snapshot
                .columns
                .iter()
                .map(|c| (c.width / units).max(1))
                .collect(),
        );
        let count = widths.len();
        let mut opts = VirtualizerOptions::new(count, move |i| widths.get(i).copied().unwrap_or(1));
        opts.gap = self.options.col_gap;
        opts.overscan = self.options.overscan_cols;
        self.col_v = Virtualizer::new(opts);
        self.col_v
            .set_viewport_size(u32::from(self.data_area().width));
        self.col_v.set_scroll_offset(self.scroll_x);
        if count > 0 {
            self.col_v.scroll_to_index(self.cursor_col, Align::Auto);
        }
        self.scroll_x = self.col_v.scroll_offset();
        self.col_v.collect_virtual_items(&mut self.col_items);
    }

    /// The body minus the selection column.
    fn data_area(&self) -> Rect {
        if !self.options.show_select_column {
            return self.body;
        }
        let w = SELECT_COLUMN_WIDTH.min(self.body.width);
        Rect::new(self.body.x + w, self.body.y, self.body.width - w, self.body.height)
    }

    fn render_header(&self, ctx: &HeaderContext<'_>, buf: &mut Buffer) {
        let header_style = ctx.theme.header;
        buf.set_style(ctx.area, header_style);

        if self.options.show_select_column
            && ctx.snapshot.selection_mode == SelectionMode::Multi
        {
            let glyph = match ctx.snapshot.select_all {
                SelectAllState::All => "[x]",
                SelectAllState::Partial => "[-]",
                SelectAllState::None => "[ ]",
            };
            render::render_str_clipped(
                ctx.area.x,
                ctx.area.y,
                0,
                SELECT_COLUMN_WIDTH.min(ctx.area.width),
                buf,
                glyph,
                header_style,
            );
        }

        let data = Rect::new(
            ctx.area.x + (self.data_area().x - self.body.x),
            ctx.area.y,
            self.data_area().width,
            ctx.area.height,
        );
        for item in self.col_items.iter().copied() {
            let Some(column) = ctx.snapshot.columns.get(item.index) else {
                continue;
            };
            let (rect, clip_left) = clipped_rect_x(data, self.scroll_x, item.start, item.size);
            if rect.width == 0 {
                continue;
            }
            let indicator = match column.sort_direction {
                SortDirection::Asc => "▲",
                SortDirection::Desc => "▼",
                SortDirection::None => "",
            };
            let reserved = if indicator.is_empty() { 0 } else { 2 };
            let name = render::truncate_with_ellipsis(
                &column.header,
                (item.size as usize).saturating_sub(reserved),
            );
            let style = if item.index == self.cursor_col {
                header_style.patch(ctx.theme.header_cursor)
            } else {
                header_style
            };
            let title = if indicator.is_empty() {
                name.clone()
            } else {
                format!("{name} {indicator}")
            };
            render::render_str_clipped(rect.x, rect.y, clip_left, rect.width, buf, &title, style);
            if !indicator.is_empty() {
                // Indicator cell, relative to the column start.
                let at = name.width() as u32 + 1;
                if at >= clip_left && at - clip_left < u32::from(rect.width) {
                    let x = rect.x + (at - clip_left) as u16;
                    buf.set_style(
                        Rect::new(x, rect.y, 1, 1),
                        style.patch(ctx.theme.sort_indicator),
                    );
                }
            }
            let line_style = self.separator_style(ctx.snapshot, item.index, ctx.theme);
            self.draw_separator(data, buf, item, ctx.snapshot.columns.len(), line_style);
        }
    }

    fn render_body(&self, snapshot: &GridSnapshot, buf: &mut Buffer, theme: &Theme, base: Style) {
        if self.body.height == 0 {
            return;
        }
        if snapshot.total_rows == 0 {
            render::render_str_clipped(
                self.body.x,
                self.body.y,
                0,
                self.body.width,
                buf,
                "No rows",
                theme.text_muted,
            );
            return;
        }

        let lines = usize::from(self.body.height);
        let data = self.data_area();
        for row in &snapshot.rows {
            if row.display_index < self.top_row || row.display_index >= self.top_row + lines {
                continue;
            }
            let y = self.body.y + (row.display_index - self.top_row) as u16;
            let line = Rect::new(self.body.x, y, self.body.width, 1);

            let mut style = base;
            if !row.is_selectable {
                style = style.patch(theme.disabled);
            }
            if row.is_selected {
                style = style.patch(theme.selected);
            }
            if row.display_index == self.cursor_row {
                style = style.patch(theme.cursor);
            }
            buf.set_style(line, style);

            if self.options.show_select_column {
                render::render_str_clipped(
                    line.x,
                    y,
                    0,
                    SELECT_COLUMN_WIDTH.min(line.width),
                    buf,
                    selection_glyph(snapshot.selection_mode, row),
                    style,
                );
            }

            let data_line = Rect::new(data.x, y, data.width, 1);
            for item in self.col_items.iter().copied() {
                let Some(value) = row.cells.get(item.index) else {
                    continue;
                };
                let (rect, clip_left) =
                    clipped_rect_x(data_line, self.scroll_x, item.start, item.size);
                if rect.width == 0 {
                    continue;
                }
                let text = if item.index == 0 {
                    format!("{}{value}", tree_prefix(row))
                } else {
                    value.to_string()
                };
                let text = render::truncate_with_ellipsis(&text, item.size as usize);
                render::render_str_clipped(rect.x, y, clip_left, rect.width, buf, &text, style);
                self.draw_separator(
                    data_line,
                    buf,
                    item,
                    snapshot.columns.len(),
                    self.separator_style(snapshot, item.index, theme),
                );
            }
        }
    }

    fn render_footer(&self, area: Rect, snapshot: &GridSnapshot, buf: &mut Buffer, theme: &Theme) {
        let mut text = match snapshot.page {
            Some(page) => format!(
                "Page {}/{} · {} rows",
                page.index + 1,
                page.count,
                snapshot.total_rows
            ),
            None => format!("{} rows", snapshot.total_rows),
        };
        if snapshot.is_fetching_more {
            text.push_str(" · loading more…");
        }
        render::render_str_clipped(area.x, area.y, 0, area.width, buf, &text, theme.text_muted);
    }

    fn separator_style(&self, snapshot: &GridSnapshot, column: usize, theme: &Theme) -> Style {
        let resizing = snapshot.resizing_column.as_ref().is_some_and(|id| {
            snapshot.columns.get(column).is_some_and(|c| c.id == *id)
        });
        if resizing {
            theme.resize_edge
        } else {
            theme.grid_line
        }
    }

    fn draw_separator(
        &self,
        area: Rect,
        buf: &mut Buffer,
        item: virtualizer::VirtualItem,
        col_count: usize,
        style: Style,
    ) {
        if self.options.col_gap == 0 || item.index + 1 >= col_count {
            return;
        }
        let rel = (item.start + u64::from(item.size)) as i64 - self.scroll_x as i64;
        if rel < 0 || rel >= i64::from(area.width) {
            return;
        }
        for dy in 0..area.height {
            buf.set_span(area.x + rel as u16, area.y + dy, &Span::styled("│", style), 1);
        }
    }
}

fn contains(area: Rect, x: u16, y: u16) -> bool {
    x >= area.x && x < area.right() && y >= area.y && y < area.bottom()
}

fn selection_glyph(mode: SelectionMode, row: &RowView) -> &'static str {
    match (mode, row.is_selected) {
        (SelectionMode::Single, true) => "(•)",
        (SelectionMode::Single, false) => "( )",
        (SelectionMode::Multi, true) => "[x]",
        (SelectionMode::Multi, false) => "[ ]",
    }
}

fn tree_prefix(row: &RowView) -> String {
    let marker = if row.can_expand {
        if row.is_expanded { "▾ " } else { "▸ " }
    } else if row.depth > 0 {
        "  "
    } else {
        ""
    };
    format!("{}{marker}", "  ".repeat(row.depth))
}

fn clipped_rect_x(area: Rect, scroll_x: u64, start: u64, size: u32) -> (Rect, u32) {
    let rel = start as i64 - scroll_x as i64;
    let clip_left = (-rel).max(0) as u32;
    let x = rel.clamp(0, i64::from(area.width)) as u16;
    let max_w = area.width.saturating_sub(x);
    let visible_w = size.saturating_sub(clip_left).min(u32::from(max_w)) as u16;
    (
        Rect::new(area.x + x, area.y, visible_w, area.height),
        clip_left,
    )
}

#[cfg(test)]
mod tests {
    use ratatui_datagrid_core::column::ColumnSpec;
    use ratatui_datagrid_core::config::GridConfig;
    use ratatui_datagrid_core::row::RowOptions;
    use ratatui_datagrid_core::value::CellValue;

    use super::*;
    use crate::input::KeyCode;
    use crate::input::KeyEvent;
    use crate::keymap::key_char;

    #[derive(Clone, Debug)]
    struct Item {
        id: u32,
        name: &'static str,
        children: Vec<Item>,
    }

    fn item(id: u32, name: &'static str) -> Item {
        Item {
            id,
            name,
            children: Vec::new(),
        }
    }

    fn grid(records: Vec<Item>, config: GridConfig) -> DataGrid<Item> {
        DataGrid::builder(config)
            .records(records)
            .columns(vec![
                ColumnSpec::new("name", "Name", |i: &Item| CellValue::from(i.name)),
                ColumnSpec::new("id", "Id", |i: &Item| CellValue::from(i64::from(i.id))),
            ])
            .row_options(
                RowOptions::new()
                    .with_row_id(|i: &Item| i.id.to_string())
                    .with_sub_rows(|i: &Item| i.children.as_slice()),
            )
            .build()
    }

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code))
    }

    fn line(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "))
            .collect()
    }

    #[test]
    fn cursor_scrolls_body() {
        let records = (0..100).map(|i| item(i, "row")).collect();
        let mut g = grid(records, GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 6));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());

        for _ in 0..10 {
            view.handle_event(&mut g, key(KeyCode::Down));
        }
        assert_eq!(view.cursor(), (10, 0));
        assert_eq!(view.top_row(), 6);
    }

    #[test]
    fn space_selects_and_header_reflects_it() {
        let mut g = grid(vec![item(1, "a"), item(2, "b")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 4));

        assert_eq!(
            view.handle_event(&mut g, InputEvent::Key(key_char(' '))),
            DataGridAction::SelectionChanged
        );
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 0).starts_with("[-]"));
        assert!(line(&buf, 1).starts_with("[x]"));
        assert!(line(&buf, 2).starts_with("[ ]"));

        view.handle_event(&mut g, InputEvent::Key(key_char('a')));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 0).starts_with("[x]"));
    }

    #[test]
    fn sort_key_cycles_and_shows_indicator() {
        let mut g = grid(vec![item(2, "b"), item(1, "a")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 4));

        let action = view.handle_event(&mut g, InputEvent::Key(key_char('s')));
        assert_eq!(
            action,
            DataGridAction::SortChanged {
                column_id: "name".into(),
                direction: SortDirection::Asc,
            }
        );
        // The cursor follows the row it was on.
        assert_eq!(view.cursor_row_id(&g), Some(RowId::new("2")));

        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 0).contains("Name ▲"));
        assert!(line(&buf, 1).contains("a"));
    }

    #[test]
    fn enter_expands_and_left_returns_to_parent() {
        let parent = Item {
            id: 1,
            name: "parent",
            children: vec![item(11, "child")],
        };
        let mut g = grid(vec![parent, item(2, "other")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 5));

        let action = view.handle_event(&mut g, key(KeyCode::Enter));
        assert_eq!(
            action,
            DataGridAction::ExpansionChanged {
                row_id: RowId::new("1"),
                expanded: true,
            }
        );
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 1).contains("▾ parent"));
        assert!(line(&buf, 2).contains("    child"));

        view.handle_event(&mut g, key(KeyCode::Down));
        assert_eq!(view.cursor_row_id(&g), Some(RowId::new("11")));
        view.handle_event(&mut g, key(KeyCode::Left));
        assert_eq!(view.cursor_row_id(&g), Some(RowId::new("1")));
        view.handle_event(&mut g, key(KeyCode::Left));
        assert_eq!(g.display_len(), 2);
    }

    #[test]
    fn widen_key_resizes_cursor_column() {
        let mut g = grid(vec![item(1, "a")], GridConfig::default());
        let mut view = DataGridView::new();
        let before = g.column_width(&"name".into());
        assert_eq!(before, Some(90));

        let action = view.handle_event(&mut g, InputEvent::Key(key_char('>')));
        assert_eq!(
            action,
            DataGridAction::ColumnResized {
                column_id: "name".into(),
                width: 100,
            }
        );
        assert!(!g.resize_state().is_resizing());
        // Cannot shrink below the minimum width.
        view.handle_event(&mut g, InputEvent::Key(key_char('<')));
        assert_eq!(
            view.handle_event(&mut g, InputEvent::Key(key_char('<'))),
            DataGridAction::None
        );
        assert_eq!(g.column_width(&"name".into()), Some(90));
    }

    fn click(x: u16, y: u16, kind: MouseEventKind) -> InputEvent {
        InputEvent::Mouse(MouseEvent::new(x, y, kind))
    }

    #[test]
    fn hit_test_maps_header_edges_and_cells() {
        let mut g = grid(vec![item(1, "a"), item(2, "b")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 4));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());

        // Select column is 4 cells; each 90-unit column is 11 cells plus a 1-cell separator.
        assert_eq!(view.hit_test(&g, 1, 0), GridHit::SelectAll);
        assert_eq!(view.hit_test(&g, 4, 0), GridHit::Header { column: 0 });
        assert_eq!(view.hit_test(&g, 15, 0), GridHit::ColumnEdge { column: 0 });
        assert_eq!(view.hit_test(&g, 16, 0), GridHit::Header { column: 1 });
        assert_eq!(view.hit_test(&g, 2, 2), GridHit::Select { row: 1 });
        assert_eq!(view.hit_test(&g, 18, 1), GridHit::Cell { row: 0, column: 1 });
        // Below the last row.
        assert_eq!(view.hit_test(&g, 6, 3), GridHit::Outside);
    }

    #[test]
    fn clicks_sort_select_and_move_cursor() {
        let mut g = grid(vec![item(2, "b"), item(1, "a")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 4));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());

        assert_eq!(
            view.handle_event(&mut g, click(17, 0, MouseEventKind::Down)),
            DataGridAction::SortChanged {
                column_id: "id".into(),
                direction: SortDirection::Asc,
            }
        );
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 0).contains("Id ▲"));

        assert_eq!(
            view.handle_event(&mut g, click(1, 2, MouseEventKind::Down)),
            DataGridAction::SelectionChanged
        );
        assert_eq!(g.selected_ids(), vec![RowId::new("2")]);

        assert_eq!(
            view.handle_event(&mut g, click(6, 1, MouseEventKind::Down)),
            DataGridAction::Redraw
        );
        assert_eq!(view.cursor(), (0, 0));
    }

    #[test]
    fn dragging_a_header_edge_resizes_the_column() {
        let mut g = grid(vec![item(1, "a")], GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 4));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());

        assert_eq!(
            view.handle_event(&mut g, click(15, 0, MouseEventKind::Down)),
            DataGridAction::Redraw
        );
        assert!(g.resize_state().is_resizing());
        view.handle_event(&mut g, click(20, 0, MouseEventKind::Drag));
        assert_eq!(g.column_width(&"name".into()), Some(130));

        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        let edge = buf.cell((4 + 16, 0)).map(|c| (c.symbol().to_string(), c.fg));
        assert_eq!(edge, Some(("│".to_string(), Theme::default().resize_edge.fg.unwrap())));

        assert_eq!(
            view.handle_event(&mut g, click(20, 0, MouseEventKind::Up)),
            DataGridAction::ColumnResized {
                column_id: "name".into(),
                width: 130,
            }
        );
        assert!(!g.resize_state().is_resizing());
        // A stray release without a drag does nothing.
        assert_eq!(
            view.handle_event(&mut g, click(20, 0, MouseEventKind::Up)),
            DataGridAction::None
        );
    }

    #[test]
    fn paged_grid_turns_pages_from_keys() {
        let records = (0..25).map(|i| item(i, "row")).collect();
        let mut g = grid(
            records,
            GridConfig {
                display_mode: DisplayMode::Paged,
                page_size: 10,
                ..Default::default()
            },
        );
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 8));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 7).contains("Page 1/3"));

        assert_eq!(
            view.handle_event(&mut g, key(KeyCode::PageDown)),
            DataGridAction::PageChanged { page_index: 1 }
        );
        assert_eq!(view.cursor(), (10, 0));

        view.handle_event(&mut g, key(KeyCode::End));
        assert_eq!(g.pagination().page_index(), 2);
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 7).contains("Page 3/3"));
    }

    #[test]
    fn empty_grid_renders_placeholder() {
        let mut g = grid(Vec::new(), GridConfig::default());
        let mut view = DataGridView::new();
        let mut buf = Buffer::empty(Rect::new(0, 0, 20, 3));
        view.render(&mut g, buf.area, &mut buf, &Theme::default());
        assert!(line(&buf, 1).starts_with("No rows"));
        assert_eq!(
            view.handle_event(&mut g, key(KeyCode::Down)),
            DataGridAction::None
        );
    }
}

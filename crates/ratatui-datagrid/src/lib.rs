//! `ratatui-datagrid` paints a [`ratatui_datagrid_core::DataGrid`] in a terminal.
//!
//! The widget is a thin adapter: it owns presentation state only (cursor, scroll position) and
//! turns key presses and mouse clicks into engine transitions. Selection, sorting, filters, column widths and row
//! virtualization all live in the engine.
//!
//! ## Design goals
//!
//! - Event-loop agnostic: you drive input and rendering from your app.
//! - No async runtime: collaborators such as `fetch_more` are plain callbacks on the engine.
//! - Backend-neutral input: enable the `crossterm` feature to convert crossterm events.
//!
//! ## Getting started
//!
//! - [`view::DataGridView`]: the widget; call `handle_event` then `render` with your grid.
//! - [`keymap::GridBindings`]: default key bindings, replaceable through
//!   [`view::DataGridViewOptions`].
//! - [`input::GridHit`]: what lies under a terminal cell, from `DataGridView::hit_test`. Clicking
//!   a header sorts, clicking a selection box toggles the row, and dragging a header separator
//!   resizes the column.
//! - [`theme::Theme`]: the style palette used for rendering.
pub mod theme;

#[cfg(feature = "crossterm")]
pub mod crossterm_input;

pub mod input;
pub mod keymap;
pub mod render;
pub mod view;

pub use ratatui_datagrid_core as core;
pub use view::DataGridAction;
pub use view::DataGridView;
pub use view::DataGridViewOptions;

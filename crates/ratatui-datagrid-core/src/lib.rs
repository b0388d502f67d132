//! `ratatui-datagrid-core` is a headless data-grid state engine.
//!
//! It owns the state a data grid needs (rows, columns, selection, sorting, filters, column widths
//! and the scroll window) and derives plain data for a presentation layer to draw. It has no
//! rendering dependency; `ratatui-datagrid` paints its snapshots in a terminal.
//!
//! ## Design goals
//!
//! - Generic over the host record type: columns read records through accessor closures.
//! - Synchronous transitions: every operation completes before observers are notified, and
//!   observers always see a consistent [`grid::GridSnapshot`].
//! - Never crash the render tree: missing input degrades to an empty grid, stale saved state is
//!   pruned, and unsupported requests are refused with a log message.
//!
//! ## Getting started
//!
//! Useful entry points:
//! - [`grid::DataGrid`]: the engine, built with [`grid::DataGrid::builder`].
//! - [`column::ColumnSpec`]: declarative columns.
//! - [`filter::FilterDef`]: filter definitions for the filter panel.
//! - [`storage::ColumnWidthStore`]: where column widths are persisted.
//!
//! ```
//! use ratatui_datagrid_core::column::ColumnSpec;
//! use ratatui_datagrid_core::config::GridConfig;
//! use ratatui_datagrid_core::grid::DataGrid;
//! use ratatui_datagrid_core::value::CellValue;
//!
//! let mut grid = DataGrid::builder(GridConfig::default())
//!     .records(vec![("ada", 36), ("grace", 45)])
//!     .columns(vec![
//!         ColumnSpec::new("name", "Name", |r: &(&str, i64)| CellValue::from(r.0)),
//!         ColumnSpec::new("age", "Age", |r: &(&str, i64)| CellValue::from(r.1)),
//!     ])
//!     .build();
//! grid.toggle_sort(&"age".into());
//! assert_eq!(grid.snapshot().rows.len(), 2);
//! ```

pub mod error;
pub mod value;

pub mod column;
pub mod expansion;
pub mod row;

pub mod filter;
pub mod pagination;
pub mod resize;
pub mod selection;
pub mod sort;
pub mod storage;
pub mod window;

pub mod config;
pub mod event;
pub mod grid;

pub use error::GridError;
pub use error::GridResult;
pub use grid::DataGrid;
pub use grid::GridSnapshot;

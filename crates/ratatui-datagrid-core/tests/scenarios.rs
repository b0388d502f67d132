//! End-to-end scenarios driving the engine the way a host application would.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ratatui_datagrid_core::column::ColumnId;
use ratatui_datagrid_core::column::ColumnSpec;
use ratatui_datagrid_core::config::DisplayMode;
use ratatui_datagrid_core::config::GridConfig;
use ratatui_datagrid_core::event::GridEvent;
use ratatui_datagrid_core::filter::FilterDef;
use ratatui_datagrid_core::filter::FilterKind;
use ratatui_datagrid_core::filter::FilterValue;
use ratatui_datagrid_core::filter::UpdateMethod;
use ratatui_datagrid_core::grid::DataGrid;
use ratatui_datagrid_core::row::RowOptions;
use ratatui_datagrid_core::storage::ColumnWidthStore;
use ratatui_datagrid_core::storage::DEFAULT_STORAGE_NAMESPACE;
use ratatui_datagrid_core::storage::MemoryStorage;
use ratatui_datagrid_core::storage::StorageBackend;
use ratatui_datagrid_core::window::RowSize;
use serde_json::Value;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn people(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("p{i}"),
                "name": format!("Person {i}"),
                "age": 20 + (i % 50),
                "team": if i % 3 == 0 { "red" } else { "blue" },
                "address": { "city": if i % 2 == 0 { "Oslo" } else { "Lima" } },
            })
        })
        .collect()
}

fn columns() -> Vec<ColumnSpec<Value>> {
    vec![
        ColumnSpec::path("name", "Name", "name"),
        ColumnSpec::path("age", "Age", "age"),
        ColumnSpec::path("team", "Team", "team"),
        ColumnSpec::path("city", "City", "address.city"),
    ]
}

fn row_options() -> RowOptions<Value> {
    RowOptions::new().with_row_id(|v: &Value| v["id"].as_str().unwrap_or_default().to_string())
}

#[test]
fn ten_thousand_rows_virtualized() {
    init_tracing();
    let mut grid = DataGrid::builder(GridConfig {
        display_mode: DisplayMode::Virtual,
        row_size: RowSize::Lg,
        viewport_height_px: 480,
        ..Default::default()
    })
    .records(people(10_000))
    .columns(columns())
    .row_options(row_options())
    .build();

    assert_eq!(grid.window().viewport_range(), 0..10);
    let snap = grid.snapshot();
    assert!(snap.rows.len() >= 10 && snap.rows.len() <= 10 + grid.window().overscan());
    assert_eq!(snap.total_extent, 480_000);

    grid.set_scroll_offset(479_500);
    let snap = grid.snapshot();
    assert_eq!(snap.visible_range.end, 10_000);
    assert_eq!(snap.rows.last().map(|r| r.display_index), Some(9_999));
}

#[test]
fn resize_from_default_to_150_is_persisted() {
    init_tracing();
    let backend = Arc::new(MemoryStorage::new());
    let mut grid = DataGrid::builder(GridConfig::default())
        .records(people(3))
        .columns(columns())
        .storage(backend.clone())
        .build();
    assert_eq!(grid.column_width(&"age".into()), Some(90));

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    grid.subscribe(move |e| sink.borrow_mut().push(e.clone()));

    grid.start_resize(&"age".into()).unwrap();
    grid.resize_column(&"age".into(), 120).unwrap();
    grid.resize_column(&"age".into(), 150).unwrap();
    assert!(events.borrow().is_empty());
    grid.end_resize().unwrap();

    let raw = backend.get(DEFAULT_STORAGE_NAMESPACE).unwrap().unwrap();
    let saved: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(saved["columnWidths"]["age"], json!(150));
    assert_eq!(saved["isResizing"], json!(false));
    assert!(matches!(
        events.borrow().as_slice(),
        [GridEvent::ColumnWidthsPersisted { widths }] if widths.get(&ColumnId::from("age")) == Some(&150)
    ));
}

#[test]
fn stale_saved_widths_are_pruned_on_load() {
    init_tracing();
    let backend = Arc::new(MemoryStorage::new());
    backend
        .set(
            DEFAULT_STORAGE_NAMESPACE,
            r#"{"columnWidths":{"name":200,"age":null,"removed":300,"city":40},"isResizing":true}"#
                .to_string(),
        )
        .unwrap();
    let grid = DataGrid::builder(GridConfig::default())
        .records(people(2))
        .columns(columns())
        .storage(backend)
        .build();

    let snap = grid.snapshot();
    assert_eq!(snap.column_widths.get(&ColumnId::from("name")), Some(&200));
    assert_eq!(snap.column_widths.get(&ColumnId::from("age")), Some(&90));
    assert_eq!(snap.column_widths.get(&ColumnId::from("city")), Some(&90));
    assert!(!snap.column_widths.contains_key(&ColumnId::from("removed")));
    assert!(!snap.is_resizing);
}

#[test]
fn shared_namespace_is_last_write_wins() {
    let backend = Arc::new(MemoryStorage::new());
    let build = || {
        DataGrid::builder(GridConfig::default())
            .records(people(1))
            .columns(columns())
            .storage(backend.clone())
            .build()
    };
    let mut a = build();
    let mut b = build();
    a.keyboard_resize(&"name".into(), 120).unwrap();
    b.keyboard_resize(&"name".into(), 180).unwrap();

    let store = ColumnWidthStore::new(backend, DEFAULT_STORAGE_NAMESPACE);
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.column_widths.get(&ColumnId::from("name")), Some(&180));
}

#[test]
fn batch_filter_panel_flow() {
    init_tracing();
    let mut grid = DataGrid::builder(GridConfig {
        filter_update: UpdateMethod::Batch,
        ..Default::default()
    })
    .records(people(9))
    .columns(columns())
    .row_options(row_options())
    .filters(vec![
        FilterDef::new(
            "team",
            "team",
            "Team",
            FilterKind::Checkbox {
                options: vec!["red".into(), "blue".into()],
            },
        ),
        FilterDef::new(
            "city",
            "city",
            "City",
            FilterKind::Dropdown {
                options: vec!["Oslo".into(), "Lima".into()],
            },
        ),
    ])
    .build();

    let applied = Rc::new(RefCell::new(Vec::new()));
    let sink = applied.clone();
    grid.on_apply_filters(move |f| sink.borrow_mut().push(f.to_vec()));

    grid.open_filter_panel();
    grid.set_filter_value("team", FilterValue::options(["red"]))
        .unwrap();
    assert!(grid.snapshot().filter_buttons_enabled);
    assert_eq!(grid.display_len(), 9);

    grid.apply_filters();
    // p0, p3, p6
    assert_eq!(grid.display_len(), 3);

    grid.set_filter_value("city", FilterValue::Choice("Oslo".into()))
        .unwrap();
    assert!(grid.close_filter_panel());
    assert!(grid.filter_state().pending_value("city").is_none());
    assert_eq!(grid.display_len(), 3);

    grid.set_filter_value("city", FilterValue::Choice("Oslo".into()))
        .unwrap();
    grid.apply_filters();
    // p0, p6
    assert_eq!(grid.display_len(), 2);
    let tags: Vec<String> = grid
        .snapshot()
        .applied_filters
        .into_iter()
        .map(|f| f.label)
        .collect();
    assert_eq!(tags, vec!["Team", "City"]);

    assert!(grid.remove_filter("team"));
    // p0, p2, p4, p6, p8
    assert_eq!(grid.display_len(), 5);

    grid.reset_filters();
    assert_eq!(grid.display_len(), 9);
    assert_eq!(applied.borrow().len(), 4);
    assert!(applied.borrow().last().is_some_and(|f| f.is_empty()));
}

#[test]
fn paged_grid_turns_pages() {
    let mut grid = DataGrid::builder(GridConfig {
        display_mode: DisplayMode::Paged,
        page_size: 10,
        ..Default::default()
    })
    .records(people(25))
    .columns(columns())
    .build();

    let page = grid.snapshot().page.unwrap();
    assert_eq!((page.index, page.count), (0, 3));

    grid.scroll_to_row(22);
    let snap = grid.snapshot();
    assert_eq!(snap.page.unwrap().index, 2);
    assert_eq!(snap.rows.len(), 5);

    grid.set_page_size(20);
    assert_eq!(grid.snapshot().page.unwrap().index, 0);
    assert_eq!(grid.snapshot().rows.len(), 20);
}

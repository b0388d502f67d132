use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui_datagrid::DataGridView;
use ratatui_datagrid::core::column::ColumnSpec;
use ratatui_datagrid::core::config::DisplayMode;
use ratatui_datagrid::core::config::GridConfig;
use ratatui_datagrid::core::filter::FilterDef;
use ratatui_datagrid::core::filter::FilterKind;
use ratatui_datagrid::core::filter::FilterValue;
use ratatui_datagrid::core::grid::DataGrid;
use ratatui_datagrid::core::row::RowOptions;
use ratatui_datagrid::core::storage::FileStorage;
use ratatui_datagrid::core::value::CellValue;
use ratatui_datagrid::crossterm_input::input_event_from_crossterm;
use ratatui_datagrid::theme::Theme;

const BATCH: usize = 1_000;

#[derive(Clone, Debug)]
struct Order {
    id: usize,
    customer: String,
    region: &'static str,
    total: f64,
    lines: Vec<Order>,
}

fn orders(range: std::ops::Range<usize>) -> Vec<Order> {
    const REGIONS: [&str; 3] = ["north", "south", "west"];
    range
        .map(|id| Order {
            id,
            customer: format!("Customer {id:05}"),
            region: REGIONS[id % REGIONS.len()],
            total: (id * 37 % 1000) as f64 / 4.0,
            lines: (0..id % 3)
                .map(|n| Order {
                    id: id * 10 + n,
                    customer: format!("line {n}"),
                    region: REGIONS[id % REGIONS.len()],
                    total: (n + 1) as f64,
                    lines: Vec::new(),
                })
                .collect(),
        })
        .collect()
}

fn main() -> io::Result<()> {
    let storage = FileStorage::new(std::env::temp_dir().join("ratatui-datagrid-demo.json"));
    let mut grid = DataGrid::builder(GridConfig {
        display_mode: DisplayMode::Virtual,
        infinite_scroll: true,
        ..Default::default()
    })
    .records(orders(0..BATCH))
    .columns(vec![
        ColumnSpec::new("customer", "Customer", |o: &Order| {
            CellValue::from(o.customer.as_str())
        })
        .with_width(160),
        ColumnSpec::new("region", "Region", |o: &Order| CellValue::from(o.region)),
        ColumnSpec::new("total", "Total", |o: &Order| CellValue::from(o.total)),
    ])
    .row_options(
        RowOptions::new()
            .with_row_id(|o: &Order| format!("o{}", o.id))
            .with_sub_rows(|o: &Order| o.lines.as_slice()),
    )
    .filters(vec![FilterDef::new(
        "region",
        "region",
        "Region",
        FilterKind::Checkbox {
            options: vec!["north".into(), "south".into(), "west".into()],
        },
    )])
    .storage(Arc::new(storage))
    .build();

    let wanted = Rc::new(Cell::new(None));
    let sink = wanted.clone();
    grid.fetch_more(move |loaded| sink.set(Some(loaded)));

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut grid, &wanted);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    grid: &mut DataGrid<Order>,
    wanted: &Cell<Option<usize>>,
) -> io::Result<()> {
    let theme = Theme::default();
    let mut view = DataGridView::new();

    loop {
        // Pretend the next batch arrived from a server.
        if let Some(loaded) = wanted.take() {
            grid.append_records(orders(loaded..loaded + BATCH));
        }

        terminal.draw(|f| {
            let area = f.area();
            let block = Block::default()
                .title("DataGrid (j/k, space, a/A, s, enter, </>, f filter, q)")
                .borders(Borders::ALL);
            let inner = block.inner(area);
            f.render_widget(block, area);

            let buf = f.buffer_mut();
            let grid_area = Rect::new(
                inner.x,
                inner.y,
                inner.width,
                inner.height.saturating_sub(1),
            );
            view.render(grid, grid_area, buf, &theme);

            let filters: Vec<String> = grid
                .filter_state()
                .applied_filters()
                .iter()
                .map(|f| format!("{}: {}", f.label, f.value))
                .collect();
            let status = format!(
                "{} selected  {} rows  filters [{}]",
                grid.selection().len(),
                grid.display_len(),
                filters.join(", ")
            );
            buf.set_span(
                inner.x,
                inner.y + grid_area.height,
                &Span::styled(status, theme.text_muted),
                inner.width,
            );
        })?;

        if !crossterm::event::poll(Duration::from_millis(50))? {
            continue;
        }
        let event = crossterm::event::read()?;
        if let Event::Key(key) = &event {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('f') => {
                    if grid.filter_state().has_applied() {
                        grid.reset_filters();
                    } else {
                        let _ = grid.set_filter_value("region", FilterValue::options(["north"]));
                        grid.apply_filters();
                    }
                    continue;
                }
                _ => {}
            }
        }
        if let Some(input) = input_event_from_crossterm(event) {
            view.handle_event(grid, input);
        }
    }
}

use ratatui::style::Modifier;
use ratatui::style::Style;

/// Styles used by [`crate::view::DataGridView`].
///
/// Row styles stack in order: base, `disabled`, `selected`, `cursor`.
#[derive(Clone, Debug)]
pub struct Theme {
    pub text_primary: Style,
    pub text_muted: Style,
    pub danger: Style,
    pub header: Style,
    /// Header of the cursor column.
    pub header_cursor: Style,
    /// `▲`/`▼` after a sorted column's title.
    pub sort_indicator: Style,
    /// Rows that cannot be selected.
    pub disabled: Style,
    pub selected: Style,
    pub cursor: Style,
    pub grid_line: Style,
    /// Separator of the column being resized.
    pub resize_edge: Style,
}

impl Default for Theme {
    fn default() -> Self {
        use ratatui::style::Stylize;

        Self {
            text_primary: Style::default(),
            text_muted: Style::default().dark_gray(),
            danger: Style::default().red(),
            header: Style::default().add_modifier(Modifier::BOLD),
            header_cursor: Style::default().cyan(),
            sort_indicator: Style::default().yellow(),
            disabled: Style::default().dark_gray(),
            selected: Style::default().add_modifier(Modifier::BOLD),
            cursor: Style::default().add_modifier(Modifier::REVERSED),
            grid_line: Style::default().add_modifier(Modifier::DIM),
            resize_edge: Style::default().cyan().add_modifier(Modifier::BOLD),
        }
    }
}

use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub keys: Vec<KeyEvent>,
    pub help_key: String,
    pub help_desc: String,
}

impl Binding {
    pub fn new(
        help_key: impl Into<String>,
        help_desc: impl Into<String>,
        keys: Vec<KeyEvent>,
    ) -> Self {
        Self {
            keys,
            help_key: help_key.into(),
            help_desc: help_desc.into(),
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys.iter().any(|k| key_event_matches(k, event))
    }
}

pub fn key_event_matches(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code && pattern.modifiers == event.modifiers
}

pub fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code)
}

pub fn key_char(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c))
}

pub fn key_ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c)).with_modifiers(KeyModifiers::ctrl())
}

/// Engine transitions a key can trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridCommand {
    Up,
    Down,
    PrevColumn,
    NextColumn,
    PageUp,
    PageDown,
    Top,
    Bottom,
    ToggleRow,
    ToggleAllOnPage,
    ToggleAllPages,
    CycleSort,
    ToggleExpand,
    Expand,
    Collapse,
    Narrow,
    Widen,
}

#[derive(Clone, Debug)]
pub struct GridBindings {
    pub up: Binding,
    pub down: Binding,
    pub prev_column: Binding,
    pub next_column: Binding,
    pub page_up: Binding,
    pub page_down: Binding,
    pub top: Binding,
    pub bottom: Binding,
    pub toggle_row: Binding,
    pub toggle_all_on_page: Binding,
    pub toggle_all_pages: Binding,
    pub cycle_sort: Binding,
    pub toggle_expand: Binding,
    pub expand: Binding,
    pub collapse: Binding,
    pub narrow: Binding,
    pub widen: Binding,
}

impl Default for GridBindings {
    fn default() -> Self {
        Self {
            up: Binding::new("↑/k", "up", vec![key(KeyCode::Up), key_char('k')]),
            down: Binding::new("↓/j", "down", vec![key(KeyCode::Down), key_char('j')]),
            prev_column: Binding::new("h", "prev column", vec![key_char('h')]),
            next_column: Binding::new("l", "next column", vec![key_char('l'), key(KeyCode::Tab)]),
            page_up: Binding::new("pgup", "page up", vec![key(KeyCode::PageUp), key_ctrl('u')]),
            page_down: Binding::new(
                "pgdn",
                "page down",
                vec![key(KeyCode::PageDown), key_ctrl('d')],
            ),
            top: Binding::new("g", "top", vec![key(KeyCode::Home), key_char('g')]),
            bottom: Binding::new("G", "bottom", vec![key(KeyCode::End), key_char('G')]),
            toggle_row: Binding::new("space", "select", vec![key_char(' ')]),
            toggle_all_on_page: Binding::new("a", "select page", vec![key_char('a')]),
            toggle_all_pages: Binding::new("A", "select all", vec![key_char('A')]),
            cycle_sort: Binding::new("s", "sort", vec![key_char('s')]),
            toggle_expand: Binding::new("enter", "expand", vec![key(KeyCode::Enter)]),
            expand: Binding::new("→", "open", vec![key(KeyCode::Right)]),
            collapse: Binding::new("←", "close", vec![key(KeyCode::Left)]),
            narrow: Binding::new("<", "narrow", vec![key_char('<')]),
            widen: Binding::new(">", "widen", vec![key_char('>')]),
        }
    }
}

impl GridBindings {
    pub fn command_for(&self, event: &KeyEvent) -> Option<GridCommand> {
        self.table()
            .into_iter()
            .find(|(b, _)| b.matches(event))
            .map(|(_, c)| c)
    }

    /// Bindings in display order, for a help line.
    pub fn help(&self) -> Vec<Binding> {
        [
            &self.up,
            &self.down,
            &self.toggle_row,
            &self.toggle_all_on_page,
            &self.cycle_sort,
            &self.toggle_expand,
            &self.narrow,
            &self.widen,
        ]
        .into_iter()
        .cloned()
        .collect()
    }

    fn table(&self) -> [(&Binding, GridCommand); 17] {
        [
            (&self.up, GridCommand::Up),
            (&self.down, GridCommand::Down),
            (&self.prev_column, GridCommand::PrevColumn),
            (&self.next_column, GridCommand::NextColumn),
            (&self.page_up, GridCommand::PageUp),
            (&self.page_down, GridCommand::PageDown),
            (&self.top, GridCommand::Top),
            (&self.bottom, GridCommand::Bottom),
            (&self.toggle_row, GridCommand::ToggleRow),
            (&self.toggle_all_on_page, GridCommand::ToggleAllOnPage),
            (&self.toggle_all_pages, GridCommand::ToggleAllPages),
            (&self.cycle_sort, GridCommand::CycleSort),
            (&self.toggle_expand, GridCommand::ToggleExpand),
            (&self.expand, GridCommand::Expand),
            (&self.collapse, GridCommand::Collapse),
            (&self.narrow, GridCommand::Narrow),
            (&self.widen, GridCommand::Widen),
        ]
    }
}

//! Backend-neutral input events understood by [`crate::view::DataGridView`].

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyModifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::none(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

/// Left-button and wheel events. Other buttons never reach the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    Down,
    /// Pointer moved with the button held; drives column resizing from a header edge.
    Drag,
    Up,
    ScrollUp,
    ScrollDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub kind: MouseEventKind,
}

impl MouseEvent {
    pub fn new(x: u16, y: u16, kind: MouseEventKind) -> Self {
        Self { x, y, kind }
    }
}

/// The part of a rendered grid under a terminal cell.
///
/// Rows are display indices and columns are indices into the visible columns, as in
/// [`crate::view::DataGridView::cursor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridHit {
    Outside,
    /// The select-all box in the header.
    SelectAll,
    Header { column: usize },
    /// The separator right of a header cell; dragging it resizes `column`.
    ColumnEdge { column: usize },
    /// A row's selection box.
    Select { row: usize },
    Cell { row: usize, column: usize },
}

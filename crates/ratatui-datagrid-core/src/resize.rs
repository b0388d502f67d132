//! Column-resize reducer.
//!
//! Every event produces a new [`ResizeState`] snapshot plus an optional effect for the caller to
//! execute; the previous snapshot is never touched.

use std::collections::BTreeMap;

use crate::column::ColumnId;
use crate::storage::PersistedWidths;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResizePhase {
    #[default]
    Idle,
    Resizing {
        column_id: ColumnId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResizeEvent {
    Start {
        column_id: ColumnId,
    },
    /// Ignored unless a resize is in progress.
    Resizing {
        column_id: ColumnId,
        width: u32,
    },
    /// Keyboard resizes have no drag start; this is `Start` followed by `Resizing`.
    KeyboardResize {
        column_id: ColumnId,
        width: u32,
    },
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResizeEffect {
    /// Write this snapshot to the width store.
    Persist(PersistedWidths),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResizeTransition {
    pub state: ResizeState,
    pub effect: Option<ResizeEffect>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResizeState {
    pub phase: ResizePhase,
    pub column_widths: BTreeMap<ColumnId, u32>,
    pub last_resized_column_id: Option<ColumnId>,
}

impl ResizeState {
    /// Initial state from saved widths. Widths are taken as-is; pruning happens on load.
    pub fn from_persisted(persisted: PersistedWidths) -> Self {
        Self {
            phase: ResizePhase::Idle,
            column_widths: persisted.column_widths,
            last_resized_column_id: None,
        }
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self.phase, ResizePhase::Resizing { .. })
    }

    pub fn width(&self, column_id: &ColumnId) -> Option<u32> {
        self.column_widths.get(column_id).copied()
    }

    pub fn persisted(&self) -> PersistedWidths {
        PersistedWidths {
            column_widths: self.column_widths.clone(),
            is_resizing: self.is_resizing(),
        }
    }

    pub fn reduce(&self, event: ResizeEvent) -> ResizeTransition {
        let mut next = self.clone();
        let effect = match event {
            ResizeEvent::Start { column_id } => {
                next.phase = ResizePhase::Resizing { column_id };
                None
            }
            ResizeEvent::Resizing { column_id, width } => {
                if self.is_resizing() {
                    next.set_width(column_id, width);
                } else {
                    tracing::trace!(column_id = %column_id, "resize event while idle ignored");
                }
                None
            }
            ResizeEvent::KeyboardResize { column_id, width } => {
                next.phase = ResizePhase::Resizing {
                    column_id: column_id.clone(),
                };
                next.set_width(column_id, width);
                None
            }
            ResizeEvent::End => {
                if self.is_resizing() {
                    next.phase = ResizePhase::Idle;
                    Some(ResizeEffect::Persist(next.persisted()))
                } else {
                    None
                }
            }
        };
        ResizeTransition {
            state: next,
            effect,
        }
    }

    fn set_width(&mut self, column_id: ColumnId, width: u32) {
        self.phase = ResizePhase::Resizing {
            column_id: column_id.clone(),
        };
        self.column_widths.insert(column_id.clone(), width);
        self.last_resized_column_id = Some(column_id);
    }
}

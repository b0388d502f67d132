//! Grid events and the subscriptions that receive them.
//!
//! Transitions push events onto a queue; the queue is flushed once the transition has finished,
//! so listeners only ever see consistent post-transition state.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;

use crate::column::ColumnId;
use crate::filter::AppliedFilter;
use crate::row::RowId;
use crate::sort::SortDirection;

#[derive(Clone, Debug, PartialEq)]
pub enum GridEvent {
    /// The grid re-sorted its rows.
    SortChanged {
        column_id: ColumnId,
        direction: SortDirection,
    },
    /// Manual sort mode: the host is asked to reorder its records.
    SortRequested {
        column_id: ColumnId,
        direction: SortDirection,
    },
    SelectionChanged {
        selected: Vec<RowId>,
    },
    ExpansionChanged {
        row_id: RowId,
        expanded: bool,
    },
    FiltersApplied {
        filters: Vec<AppliedFilter>,
    },
    FetchMoreRequested {
        loaded_rows: usize,
    },
    ColumnWidthsPersisted {
        widths: BTreeMap<ColumnId, u32>,
    },
    ColumnsChanged,
    PageChanged {
        page_index: usize,
        page_size: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GridEvent)>;
type OnSort = Box<dyn FnMut(&ColumnId, SortDirection)>;
type OnSelectionChange = Box<dyn FnMut(&[RowId])>;
type FetchMore = Box<dyn FnMut(usize)>;
type OnApplyFilters = Box<dyn FnMut(&[AppliedFilter])>;

/// Host collaborators plus generic listeners.
#[derive(Default)]
pub struct EventBus {
    queue: VecDeque<GridEvent>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    on_sort: Option<OnSort>,
    on_selection_change: Option<OnSelectionChange>,
    fetch_more: Option<FetchMore>,
    on_apply_filters: Option<OnApplyFilters>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("queued", &self.queue.len())
            .field("listeners", &self.listeners.len())
            .field("on_sort", &self.on_sort.is_some())
            .field("on_selection_change", &self.on_selection_change.is_some())
            .field("fetch_more", &self.fetch_more.is_some())
            .field("on_apply_filters", &self.on_apply_filters.is_some())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&GridEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        before != self.listeners.len()
    }

    /// Registering `on_sort` switches the grid to manual sorting.
    pub fn set_on_sort(&mut self, f: impl FnMut(&ColumnId, SortDirection) + 'static) {
        self.on_sort = Some(Box::new(f));
    }

    pub fn set_on_selection_change(&mut self, f: impl FnMut(&[RowId]) + 'static) {
        self.on_selection_change = Some(Box::new(f));
    }

    pub fn set_fetch_more(&mut self, f: impl FnMut(usize) + 'static) {
        self.fetch_more = Some(Box::new(f));
    }

    pub fn set_on_apply_filters(&mut self, f: impl FnMut(&[AppliedFilter]) + 'static) {
        self.on_apply_filters = Some(Box::new(f));
    }

    pub fn has_on_sort(&self) -> bool {
        self.on_sort.is_some()
    }

    pub fn has_fetch_more(&self) -> bool {
        self.fetch_more.is_some()
    }

    pub(crate) fn push(&mut self, event: GridEvent) {
        tracing::trace!(?event, "queued grid event");
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Delivers every queued event, collaborators first, then listeners in subscription order.
    pub(crate) fn flush(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            match &event {
                GridEvent::SortRequested {
                    column_id,
                    direction,
                } => {
                    if let Some(f) = self.on_sort.as_mut() {
                        f(column_id, *direction);
                    }
                }
                GridEvent::SelectionChanged { selected } => {
                    if let Some(f) = self.on_selection_change.as_mut() {
                        f(selected);
                    }
                }
                GridEvent::FetchMoreRequested { loaded_rows } => {
                    if let Some(f) = self.fetch_more.as_mut() {
                        f(*loaded_rows);
                    }
                }
                GridEvent::FiltersApplied { filters } => {
                    if let Some(f) = self.on_apply_filters.as_mut() {
                        f(filters);
                    }
                }
                _ => {}
            }
            for (_, listener) in &mut self.listeners {
                listener(&event);
            }
        }
    }
}

//! Tri-state, single-column sort.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::column::ColumnId;
use crate::column::ColumnSpec;
use crate::row::RowId;
use crate::row::RowTree;
use crate::value::CellValue;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    None,
    Asc,
    Desc,
}

impl SortDirection {
    /// `None -> Asc -> Desc -> None`.
    pub fn next(self) -> Self {
        match self {
            SortDirection::None => SortDirection::Asc,
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::None,
        }
    }
}

/// How nested rows are ordered when a sort is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NestedSortPolicy {
    /// Each sibling group is sorted on its own; children stay under their parent.
    #[default]
    PerParent,
    /// Visible rows are flattened and sorted as one list.
    Flatten,
}

/// The sort indicator state. At most one column is sorted at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(ColumnId, SortDirection)>,
}

impl SortState {
    pub fn new(column_id: ColumnId, direction: SortDirection) -> Self {
        let mut s = Self::default();
        s.set(column_id, direction);
        s
    }

    pub fn active(&self) -> Option<(&ColumnId, SortDirection)> {
        self.active.as_ref().map(|(id, d)| (id, *d))
    }

    pub fn direction(&self, column_id: &ColumnId) -> SortDirection {
        match &self.active {
            Some((id, d)) if id == column_id => *d,
            _ => SortDirection::None,
        }
    }

    /// Advances the cycle for `column_id`. Any other sorted column resets to `None`.
    pub fn toggle(&mut self, column_id: &ColumnId) -> SortDirection {
        let next = self.direction(column_id).next();
        self.set(column_id.clone(), next);
        next
    }

    pub fn set(&mut self, column_id: ColumnId, direction: SortDirection) {
        self.active = match direction {
            SortDirection::None => None,
            d => Some((column_id, d)),
        };
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Stable sort of `ids` by the column's value.
///
/// Ties keep their incoming order, in both directions.
pub fn sort_row_ids<R>(
    ids: &mut Vec<RowId>,
    tree: &RowTree<R>,
    spec: &ColumnSpec<R>,
    direction: SortDirection,
) {
    if direction == SortDirection::None || ids.len() < 2 {
        return;
    }
    let mut keyed: Vec<(CellValue, usize, RowId)> = ids
        .drain(..)
        .enumerate()
        .map(|(i, id)| {
            let v = tree
                .get(&id)
                .map(|r| spec.value(&r.original))
                .unwrap_or_default();
            (v, i, id)
        })
        .collect();
    keyed.sort_by(|a, b| {
        let ord = a.0.total_cmp(&b.0);
        let ord = if direction == SortDirection::Desc {
            ord.reverse()
        } else {
            ord
        };
        match ord {
            Ordering::Equal => a.1.cmp(&b.1),
            o => o,
        }
    });
    ids.extend(keyed.into_iter().map(|(_, _, id)| id));
}

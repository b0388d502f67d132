//! Column model: declarative column specs resolved against persisted overrides.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::sort::SortDirection;
use crate::value::CellLookup;
use crate::value::CellValue;

/// Width used for sortable columns that specify neither a width nor a minimum width.
pub const DEFAULT_MIN_COLUMN_WIDTH: u32 = 90;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for ColumnId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Columns pinned to an edge of the grid regardless of ordering overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sticky {
    Left,
    Right,
}

pub type Accessor<R> = Arc<dyn Fn(&R) -> CellValue + Send + Sync>;

/// Declarative column specification supplied by the host.
pub struct ColumnSpec<R> {
    pub id: ColumnId,
    pub header: String,
    /// Dotted path the accessor reads, when built from a path.
    pub accessor_path: Option<String>,
    pub accessor: Accessor<R>,
    pub width: Option<u32>,
    pub min_width: Option<u32>,
    pub hidden: bool,
    pub sticky: Option<Sticky>,
    pub disable_sort: bool,
    /// `false` for fixed-width columns.
    pub resizable: bool,
}

impl<R> Clone for ColumnSpec<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            header: self.header.clone(),
            accessor_path: self.accessor_path.clone(),
            accessor: self.accessor.clone(),
            width: self.width,
            min_width: self.min_width,
            hidden: self.hidden,
            sticky: self.sticky,
            disable_sort: self.disable_sort,
            resizable: self.resizable,
        }
    }
}

impl<R> fmt::Debug for ColumnSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("accessor_path", &self.accessor_path)
            .field("width", &self.width)
            .field("min_width", &self.min_width)
            .field("hidden", &self.hidden)
            .field("sticky", &self.sticky)
            .field("disable_sort", &self.disable_sort)
            .field("resizable", &self.resizable)
            .finish_non_exhaustive()
    }
}

impl<R> ColumnSpec<R> {
    pub fn new(
        id: impl Into<ColumnId>,
        header: impl Into<String>,
        accessor: impl Fn(&R) -> CellValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            accessor_path: None,
            accessor: Arc::new(accessor),
            width: None,
            min_width: None,
            hidden: false,
            sticky: None,
            disable_sort: false,
            resizable: true,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_min_width(mut self, min_width: u32) -> Self {
        self.min_width = Some(min_width);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn sticky(mut self, sticky: Sticky) -> Self {
        self.sticky = Some(sticky);
        self
    }

    pub fn unsortable(mut self) -> Self {
        self.disable_sort = true;
        self
    }

    pub fn fixed_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self.resizable = false;
        self
    }

    pub fn value(&self, record: &R) -> CellValue {
        (self.accessor)(record)
    }

    pub fn is_sortable(&self) -> bool {
        !self.disable_sort
    }

    /// Minimum width: explicit, else [`DEFAULT_MIN_COLUMN_WIDTH`] for sortable columns and `0`
    /// for unsortable decorative columns.
    pub fn effective_min_width(&self) -> u32 {
        if self.disable_sort {
            return self.min_width.unwrap_or(0);
        }
        self.min_width.unwrap_or(DEFAULT_MIN_COLUMN_WIDTH)
    }
}

impl<R: CellLookup + 'static> ColumnSpec<R> {
    /// Column reading `path` through [`CellLookup`].
    pub fn path(id: impl Into<ColumnId>, header: impl Into<String>, path: &str) -> Self {
        let owned = path.to_string();
        let mut spec = Self::new(id, header, move |r: &R| r.lookup(&owned));
        spec.accessor_path = Some(path.to_string());
        spec
    }
}

/// Persisted or user-chosen overrides applied on top of the specs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnOverrides {
    pub order: Vec<ColumnId>,
    pub visibility: BTreeMap<ColumnId, bool>,
    pub widths: BTreeMap<ColumnId, u32>,
}

/// A resolved column, ready for presentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnId,
    pub header: String,
    pub accessor_path: Option<String>,
    pub width: u32,
    pub min_width: u32,
    pub is_visible: bool,
    pub sort_direction: SortDirection,
    pub is_sortable: bool,
    pub resizable: bool,
    pub sticky: Option<Sticky>,
    /// Unique; contiguous from 0 among visible columns, hidden columns follow.
    pub order: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnList {
    columns: Vec<Column>,
}

impl ColumnList {
    /// All columns in order (visible first).
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub fn as_slice(&self) -> &[Column] {
        &self.columns
    }
}

/// Merges `specs` with `overrides`.
///
/// Ids in `overrides.order` without a matching spec are dropped; stale persisted state never
/// fails resolution.
pub fn resolve_columns<R>(specs: &[ColumnSpec<R>], overrides: &ColumnOverrides) -> ColumnList {
    let by_id: HashMap<&ColumnId, usize> =
        specs.iter().enumerate().map(|(i, s)| (&s.id, i)).collect();

    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(specs.len());
    for id in &overrides.order {
        match by_id.get(id) {
            Some(&i) => {
                if seen.insert(i) {
                    ordered.push(i);
                }
            }
            None => tracing::debug!(column_id = %id, "dropping unknown column from saved order"),
        }
    }
    for i in 0..specs.len() {
        if seen.insert(i) {
            ordered.push(i);
        }
    }

    let pinned = |s: Option<Sticky>| match s {
        Some(Sticky::Left) => 0,
        None => 1,
        Some(Sticky::Right) => 2,
    };
    ordered.sort_by_key(|&i| pinned(specs[i].sticky));

    let visible_of = |spec: &ColumnSpec<R>| {
        overrides
            .visibility
            .get(&spec.id)
            .copied()
            .unwrap_or(!spec.hidden)
    };

    let mut columns: Vec<Column> = ordered
        .iter()
        .map(|&i| {
            let spec = &specs[i];
            let min_width = spec.effective_min_width();
            let width = match overrides.widths.get(&spec.id) {
                Some(&w) if spec.resizable => w.max(min_width),
                _ => spec.width.unwrap_or(min_width),
            };
            Column {
                id: spec.id.clone(),
                header: spec.header.clone(),
                accessor_path: spec.accessor_path.clone(),
                width,
                min_width,
                is_visible: visible_of(spec),
                sort_direction: SortDirection::None,
                is_sortable: spec.is_sortable(),
                resizable: spec.resizable,
                sticky: spec.sticky,
                order: 0,
            }
        })
        .collect();

    columns.sort_by_key(|c| !c.is_visible);
    for (order, col) in columns.iter_mut().enumerate() {
        col.order = order;
    }

    ColumnList { columns }
}

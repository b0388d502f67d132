//! Filter definitions and the pending/applied filter state machine.
//!
//! Edits accumulate in `pending`; `apply` copies them to `applied`, which is what row filtering
//! and the host observe. The batch and instant UI variants share this machine: the instant
//! variant applies on every edit.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use crate::column::ColumnId;
use crate::error::GridError;
use crate::error::GridResult;
use crate::value::CellValue;

/// A filter's value. Empty values (no options, empty text, open date range) mean "no filter".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Options(BTreeSet<String>),
    Choice(String),
    Number(f64),
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Text(String),
}

impl FilterValue {
    pub fn options<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Options(items.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Options(set) => set.is_empty(),
            FilterValue::Choice(s) | FilterValue::Text(s) => s.is_empty(),
            FilterValue::Number(n) => n.is_nan(),
            FilterValue::DateRange { from, to } => from.is_none() && to.is_none(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            FilterValue::Options(_) => "options",
            FilterValue::Choice(_) => "choice",
            FilterValue::Number(_) => "number",
            FilterValue::DateRange { .. } => "date range",
            FilterValue::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Options(set) => {
                let parts: Vec<&str> = set.iter().map(String::as_str).collect();
                f.write_str(&parts.join(", "))
            }
            FilterValue::Choice(s) | FilterValue::Text(s) => f.write_str(s),
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::DateRange { from, to } => {
                let fmt = |d: &Option<NaiveDate>| {
                    d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
                };
                write!(f, "{}..{}", fmt(from), fmt(to))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Any of several options.
    Checkbox { options: Vec<String> },
    /// Exactly one option.
    Radio { options: Vec<String> },
    Dropdown { options: Vec<String> },
    Number,
    /// Inclusive date range.
    Date,
    /// Case-insensitive substring.
    Text,
}

impl FilterKind {
    fn expected(&self) -> &'static str {
        match self {
            FilterKind::Checkbox { .. } => "options",
            FilterKind::Radio { .. } | FilterKind::Dropdown { .. } => "choice",
            FilterKind::Number => "number",
            FilterKind::Date => "date range",
            FilterKind::Text => "text",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterDef {
    pub id: String,
    pub column_id: ColumnId,
    pub label: String,
    pub kind: FilterKind,
}

impl FilterDef {
    pub fn new(
        id: impl Into<String>,
        column_id: impl Into<ColumnId>,
        label: impl Into<String>,
        kind: FilterKind,
    ) -> Self {
        Self {
            id: id.into(),
            column_id: column_id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Whether `value` has the shape this filter's kind expects.
    pub fn accepts(&self, value: &FilterValue) -> bool {
        self.kind.expected() == value.kind_name()
    }

    pub fn matches(&self, cell: &CellValue, value: &FilterValue) -> bool {
        if value.is_empty() {
            return true;
        }
        match value {
            FilterValue::Options(set) => match cell {
                CellValue::List(items) => items.iter().any(|v| set.contains(&v.to_string())),
                other => set.contains(&other.to_string()),
            },
            FilterValue::Choice(s) => match cell {
                CellValue::List(items) => items.iter().any(|v| &v.to_string() == s),
                other => &other.to_string() == s,
            },
            FilterValue::Number(n) => cell.as_f64().is_some_and(|v| v == *n),
            FilterValue::DateRange { from, to } => cell.as_date().is_some_and(|d| {
                from.is_none_or(|from| d >= from) && to.is_none_or(|to| d <= to)
            }),
            FilterValue::Text(needle) => cell
                .to_string()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

/// Observable phases are `Idle` and `Editing`; the other two only exist inside a transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterPhase {
    #[default]
    Idle,
    Editing,
    Applying,
    Cancelling,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Edits wait for an explicit apply (action buttons).
    #[default]
    Batch,
    /// Every edit is applied immediately.
    Instant,
}

/// A filter summary tag.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedFilter {
    pub filter_id: String,
    pub column_id: ColumnId,
    pub label: String,
    pub value: FilterValue,
}

/// Outcome of a pending-value edit.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterChange {
    Pending,
    Applied(Vec<AppliedFilter>),
}

#[derive(Clone, Debug, Default)]
pub struct FilterState {
    defs: Vec<FilterDef>,
    update_method: UpdateMethod,
    pending: BTreeMap<String, FilterValue>,
    applied: BTreeMap<String, FilterValue>,
    phase: FilterPhase,
    panel_open: bool,
}

impl FilterState {
    pub fn new(defs: Vec<FilterDef>, update_method: UpdateMethod) -> Self {
        Self {
            defs,
            update_method,
            ..Default::default()
        }
    }

    /// Seeds both maps from saved state. Unknown ids, empty values and values of the wrong shape
    /// are dropped.
    pub fn with_applied(mut self, applied: BTreeMap<String, FilterValue>) -> Self {
        for (id, value) in applied {
            match self.def(&id) {
                Some(def) if def.accepts(&value) && !value.is_empty() => {
                    self.applied.insert(id, value);
                }
                Some(_) => tracing::debug!(filter_id = %id, "dropping invalid saved filter value"),
                None => tracing::debug!(filter_id = %id, "dropping unknown saved filter"),
            }
        }
        self.pending = self.applied.clone();
        self.phase = FilterPhase::Idle;
        self
    }

    pub fn defs(&self) -> &[FilterDef] {
        &self.defs
    }

    pub fn def(&self, id: &str) -> Option<&FilterDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    pub fn update_method(&self) -> UpdateMethod {
        self.update_method
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn pending_value(&self, id: &str) -> Option<&FilterValue> {
        self.pending.get(id)
    }

    pub fn applied_value(&self, id: &str) -> Option<&FilterValue> {
        self.applied.get(id)
    }

    pub fn is_dirty(&self) -> bool {
        self.pending != self.applied
    }

    /// Apply/cancel buttons of the batch variant.
    pub fn buttons_enabled(&self) -> bool {
        self.is_dirty()
    }

    pub fn has_applied(&self) -> bool {
        !self.applied.is_empty()
    }

    fn settle(&mut self) {
        self.phase = if self.is_dirty() {
            FilterPhase::Editing
        } else {
            FilterPhase::Idle
        };
    }

    pub fn set_pending_value(&mut self, id: &str, value: FilterValue) -> GridResult<FilterChange> {
        let def = self
            .def(id)
            .ok_or_else(|| GridError::UnknownFilter(id.to_string()))?;
        if !def.accepts(&value) {
            return Err(GridError::FilterValueMismatch {
                filter: id.to_string(),
                expected: def.kind.expected(),
            });
        }
        if value.is_empty() {
            self.pending.remove(id);
        } else {
            self.pending.insert(id.to_string(), value);
        }
        self.settle();
        tracing::trace!(filter_id = id, phase = ?self.phase, "pending filter value set");

        match self.update_method {
            UpdateMethod::Instant if self.is_dirty() => Ok(FilterChange::Applied(self.commit())),
            _ => Ok(FilterChange::Pending),
        }
    }

    pub fn clear_pending_value(&mut self, id: &str) -> GridResult<FilterChange> {
        if self.def(id).is_none() {
            return Err(GridError::UnknownFilter(id.to_string()));
        }
        self.pending.remove(id);
        self.settle();
        match self.update_method {
            UpdateMethod::Instant if self.is_dirty() => Ok(FilterChange::Applied(self.commit())),
            _ => Ok(FilterChange::Pending),
        }
    }

    /// `applied := pending`. Returns the new applied list, or `None` when nothing was pending.
    pub fn apply(&mut self) -> Option<Vec<AppliedFilter>> {
        if self.phase != FilterPhase::Editing {
            return None;
        }
        Some(self.commit())
    }

    fn commit(&mut self) -> Vec<AppliedFilter> {
        self.phase = FilterPhase::Applying;
        tracing::trace!(phase = ?self.phase, "applying filters");
        self.applied = self.pending.clone();
        self.phase = FilterPhase::Idle;
        self.applied_filters()
    }

    /// `pending := applied`. Returns whether any edit was discarded.
    pub fn cancel(&mut self) -> bool {
        if self.phase != FilterPhase::Editing {
            return false;
        }
        self.phase = FilterPhase::Cancelling;
        tracing::trace!(phase = ?self.phase, "cancelling filter edits");
        self.pending = self.applied.clone();
        self.phase = FilterPhase::Idle;
        true
    }

    /// Clears everything. Returns whether the applied set changed.
    pub fn reset(&mut self) -> bool {
        let had_applied = !self.applied.is_empty();
        self.pending.clear();
        self.applied.clear();
        self.phase = FilterPhase::Idle;
        had_applied
    }

    /// Removes one summary tag from both maps, keeping other pending edits.
    pub fn remove_applied(&mut self, id: &str) -> Option<Vec<AppliedFilter>> {
        self.applied.remove(id)?;
        self.pending.remove(id);
        self.settle();
        Some(self.applied_filters())
    }

    pub fn open_panel(&mut self) {
        self.panel_open = true;
    }

    /// Closing the panel discards pending edits.
    pub fn close_panel(&mut self) -> bool {
        self.panel_open = false;
        self.cancel()
    }

    /// Applied filters in definition order.
    pub fn applied_filters(&self) -> Vec<AppliedFilter> {
        self.defs
            .iter()
            .filter_map(|def| {
                self.applied.get(&def.id).map(|value| AppliedFilter {
                    filter_id: def.id.clone(),
                    column_id: def.column_id.clone(),
                    label: def.label.clone(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Whether a row passes every applied filter. `cell` projects the row onto a column.
    pub fn row_matches(&self, mut cell: impl FnMut(&ColumnId) -> CellValue) -> bool {
        self.applied.iter().all(|(id, value)| match self.def(id) {
            Some(def) => def.matches(&cell(&def.column_id), value),
            None => true,
        })
    }
}

//! Row selection: multi (checkbox) and single (radio) modes.

use std::collections::BTreeSet;

use crate::row::RowId;
use crate::row::RowTree;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    #[default]
    Multi,
    Single,
}

/// Which rows a select-all affects. Always explicit, never inferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectScope {
    /// The rows of the current page (paged mode) or materialized window (virtual mode).
    CurrentPage,
    /// Every selectable row in the dataset.
    AllPages,
}

/// Header checkbox state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectAllState {
    None,
    Partial,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionOptions {
    pub mode: SelectionMode,
    /// Single mode only: clicking the selected row deselects it.
    pub allow_deselect_single: bool,
    /// Multi mode only: toggling a parent toggles its selectable descendants.
    pub select_sub_rows: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Multi,
            allow_deselect_single: false,
            select_sub_rows: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    options: SelectionOptions,
    selected: BTreeSet<RowId>,
    last_selected: Option<RowId>,
}

impl SelectionState {
    pub fn new(options: SelectionOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.options.mode
    }

    pub fn options(&self) -> SelectionOptions {
        self.options
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected ids in tree (pre-)order.
    pub fn selected_ids<R>(&self, tree: &RowTree<R>) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.selected.iter().cloned().collect();
        ids.sort_by_key(|id| tree.position(id).unwrap_or(usize::MAX));
        ids
    }

    pub fn is_row_selectable<R>(&self, tree: &RowTree<R>, id: &RowId) -> bool {
        tree.get(id).is_some_and(|r| !r.is_disabled_for_selection)
    }

    /// Toggles `id`. Disabled or unknown rows are ignored. Returns whether anything changed.
    pub fn toggle_row<R>(&mut self, tree: &RowTree<R>, id: &RowId) -> bool {
        if !self.is_row_selectable(tree, id) {
            return false;
        }
        let changed = match self.options.mode {
            SelectionMode::Single => {
                if self.selected.contains(id) {
                    if self.options.allow_deselect_single {
                        self.selected.clear();
                        self.last_selected = None;
                        true
                    } else {
                        false
                    }
                } else {
                    self.selected.clear();
                    self.selected.insert(id.clone());
                    self.last_selected = Some(id.clone());
                    true
                }
            }
            SelectionMode::Multi => {
                let target = !self.selected.contains(id);
                let mut ids = vec![id.clone()];
                if self.options.select_sub_rows {
                    ids.extend(tree.descendant_ids(id));
                }
                let mut changed = false;
                for row_id in ids {
                    if !self.is_row_selectable(tree, &row_id) {
                        continue;
                    }
                    changed |= self.apply(row_id, target);
                }
                changed
            }
        };
        self.debug_check();
        changed
    }

    /// Selects (`target == true`) or deselects every selectable row in `candidates`.
    ///
    /// No-op in single mode.
    pub fn set_all<'a, R>(
        &mut self,
        tree: &RowTree<R>,
        candidates: impl IntoIterator<Item = &'a RowId>,
        target: bool,
    ) -> bool {
        if self.options.mode == SelectionMode::Single {
            tracing::debug!("select-all ignored in single selection mode");
            return false;
        }
        let mut changed = false;
        for id in candidates {
            if self.is_row_selectable(tree, id) {
                changed |= self.apply(id.clone(), target);
            }
        }
        changed
    }

    fn apply(&mut self, id: RowId, target: bool) -> bool {
        if target {
            self.last_selected = Some(id.clone());
            self.selected.insert(id)
        } else {
            if self.last_selected.as_ref() == Some(&id) {
                self.last_selected = None;
            }
            self.selected.remove(&id)
        }
    }

    /// Switching to single mode keeps only the most recently selected row.
    pub fn set_mode(&mut self, mode: SelectionMode) -> bool {
        if self.options.mode == mode {
            return false;
        }
        self.options.mode = mode;
        let mut changed = false;
        if mode == SelectionMode::Single && self.selected.len() > 1 {
            let keep = self
                .last_selected
                .clone()
                .filter(|id| self.selected.contains(id))
                .or_else(|| self.selected.iter().next().cloned());
            self.selected.clear();
            if let Some(id) = keep {
                self.selected.insert(id.clone());
                self.last_selected = Some(id);
            }
            changed = true;
        }
        self.debug_check();
        changed
    }

    pub fn clear(&mut self) -> bool {
        self.last_selected = None;
        let had = !self.selected.is_empty();
        self.selected.clear();
        had
    }

    pub fn select_all_state<'a, R>(
        &self,
        tree: &RowTree<R>,
        candidates: impl IntoIterator<Item = &'a RowId>,
    ) -> SelectAllState {
        let mut selectable = 0usize;
        let mut selected = 0usize;
        for id in candidates {
            if self.is_row_selectable(tree, id) {
                selectable += 1;
                if self.selected.contains(id) {
                    selected += 1;
                }
            }
        }
        if selected == 0 {
            SelectAllState::None
        } else if selected == selectable {
            SelectAllState::All
        } else {
            SelectAllState::Partial
        }
    }

    /// Drops ids that no longer exist after a data change. Returns whether anything was dropped.
    pub fn retain_known<R>(&mut self, tree: &RowTree<R>) -> bool {
        let before = self.selected.len();
        self.selected.retain(|id| tree.contains(id));
        if self
            .last_selected
            .as_ref()
            .is_some_and(|id| !tree.contains(id))
        {
            self.last_selected = None;
        }
        before != self.selected.len()
    }

    fn debug_check(&self) {
        debug_assert!(
            self.options.mode == SelectionMode::Multi || self.selected.len() <= 1,
            "single selection mode holds more than one row"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::build_row_tree;
    use crate::row::RowOptions;

    #[derive(Clone)]
    struct Rec {
        disabled: bool,
        kids: Vec<Rec>,
    }

    fn rec(disabled: bool) -> Rec {
        Rec {
            disabled,
            kids: Vec::new(),
        }
    }

    fn tree() -> RowTree<Rec> {
        let records = vec![
            Rec {
                disabled: false,
                kids: vec![rec(false), rec(true)],
            },
            rec(false),
            rec(true),
            rec(false),
        ];
        let opts = RowOptions::new()
            .with_sub_rows(|r: &Rec| r.kids.as_slice())
            .with_disabled(|r: &Rec| r.disabled);
        build_row_tree(&records, &opts)
    }

    #[test]
    fn disabled_rows_never_toggle() {
        let t = tree();
        let mut s = SelectionState::default();
        assert!(!s.toggle_row(&t, &"2".into()));
        assert!(!s.is_selected(&"2".into()));
        assert!(!s.toggle_row(&t, &"missing".into()));
    }

    #[test]
    fn parent_toggle_selects_selectable_children() {
        let t = tree();
        let mut s = SelectionState::default();
        s.toggle_row(&t, &"0".into());
        assert!(s.is_selected(&"0".into()));
        assert!(s.is_selected(&"0.0".into()));
        assert!(!s.is_selected(&"0.1".into()));

        s.toggle_row(&t, &"0".into());
        assert!(s.is_empty());
    }

    #[test]
    fn single_mode_is_radio() {
        let t = tree();
        let mut s = SelectionState::new(SelectionOptions {
            mode: SelectionMode::Single,
            ..Default::default()
        });
        s.toggle_row(&t, &"1".into());
        s.toggle_row(&t, &"3".into());
        assert_eq!(s.selected_ids(&t), vec![RowId::from("3")]);

        assert!(!s.toggle_row(&t, &"3".into()));
        assert!(s.is_selected(&"3".into()));
    }

    #[test]
    fn single_mode_can_allow_deselect() {
        let t = tree();
        let mut s = SelectionState::new(SelectionOptions {
            mode: SelectionMode::Single,
            allow_deselect_single: true,
            ..Default::default()
        });
        s.toggle_row(&t, &"1".into());
        assert!(s.toggle_row(&t, &"1".into()));
        assert!(s.is_empty());
    }

    #[test]
    fn switching_to_single_keeps_last_selected() {
        let t = tree();
        let mut s = SelectionState::default();
        s.toggle_row(&t, &"1".into());
        s.toggle_row(&t, &"3".into());
        s.set_mode(SelectionMode::Single);
        assert_eq!(s.selected_ids(&t), vec![RowId::from("3")]);
    }

    #[test]
    fn select_all_skips_disabled_and_reports_state() {
        let t = tree();
        let mut s = SelectionState::default();
        let all: Vec<RowId> = t.iter().map(|r| r.id.clone()).collect();
        assert_eq!(s.select_all_state(&t, &all), SelectAllState::None);

        s.toggle_row(&t, &"1".into());
        assert_eq!(s.select_all_state(&t, &all), SelectAllState::Partial);

        s.set_all(&t, &all, true);
        assert_eq!(s.select_all_state(&t, &all), SelectAllState::All);
        assert!(!s.is_selected(&"2".into()));
        assert!(!s.is_selected(&"0.1".into()));
    }
}

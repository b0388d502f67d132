use std::collections::BTreeSet;

use crate::row::RowId;
use crate::row::RowTree;

/// Expanded-row bookkeeping for nested rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: BTreeSet<RowId>,
}

impl ExpansionState {
    /// Every expandable row expanded.
    pub fn all<R>(tree: &RowTree<R>) -> Self {
        Self {
            expanded: tree
                .iter()
                .filter(|r| r.can_expand())
                .map(|r| r.id.clone())
                .collect(),
        }
    }

    pub fn is_expanded(&self, id: &RowId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded_ids(&self) -> impl Iterator<Item = &RowId> {
        self.expanded.iter()
    }

    /// Flips the expansion of `id`. Rows without children never expand.
    ///
    /// Returns the new expansion flag, or `None` if the row cannot expand.
    pub fn toggle<R>(&mut self, tree: &RowTree<R>, id: &RowId) -> Option<bool> {
        let row = tree.get(id)?;
        if !row.can_expand() {
            return None;
        }
        if self.expanded.remove(id) {
            Some(false)
        } else {
            self.expanded.insert(id.clone());
            Some(true)
        }
    }

    pub fn set<R>(&mut self, tree: &RowTree<R>, id: &RowId, expanded: bool) -> bool {
        if !tree.get(id).is_some_and(|r| r.can_expand()) {
            return false;
        }
        if expanded {
            self.expanded.insert(id.clone())
        } else {
            self.expanded.remove(id)
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Drops ids that no longer exist (or no longer have children) after a data change.
    pub fn retain_known<R>(&mut self, tree: &RowTree<R>) {
        self.expanded
            .retain(|id| tree.get(id).is_some_and(|r| r.can_expand()));
    }
}

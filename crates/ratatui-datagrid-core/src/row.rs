//! Row model: normalizes (possibly nested) host records into a row tree with stable ids.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::expansion::ExpansionState;

/// Stable row identifier.
///
/// Positional ids are dotted index paths (`"3"`, `"3.0"`). They are only stable while sibling
/// order and count are unchanged; hosts that mutate data should supply explicit ids through
/// [`RowOptions::with_row_id`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for RowId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

type GetRowId<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;
type GetSubRows<R> = Arc<dyn Fn(&R) -> &[R] + Send + Sync>;
type IsDisabled<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Accessor capabilities used to derive the row tree from opaque host records.
pub struct RowOptions<R> {
    get_row_id: Option<GetRowId<R>>,
    get_sub_rows: Option<GetSubRows<R>>,
    is_disabled: Option<IsDisabled<R>>,
}

impl<R> Default for RowOptions<R> {
    fn default() -> Self {
        Self {
            get_row_id: None,
            get_sub_rows: None,
            is_disabled: None,
        }
    }
}

impl<R> Clone for RowOptions<R> {
    fn clone(&self) -> Self {
        Self {
            get_row_id: self.get_row_id.clone(),
            get_sub_rows: self.get_sub_rows.clone(),
            is_disabled: self.is_disabled.clone(),
        }
    }
}

impl<R> fmt::Debug for RowOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowOptions")
            .field("get_row_id", &self.get_row_id.is_some())
            .field("get_sub_rows", &self.get_sub_rows.is_some())
            .field("is_disabled", &self.is_disabled.is_some())
            .finish()
    }
}

impl<R> RowOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_id(mut self, f: impl Fn(&R) -> String + Send + Sync + 'static) -> Self {
        self.get_row_id = Some(Arc::new(f));
        self
    }

    pub fn with_sub_rows(mut self, f: impl Fn(&R) -> &[R] + Send + Sync + 'static) -> Self {
        self.get_sub_rows = Some(Arc::new(f));
        self
    }

    /// Predicate marking rows that can never be selected.
    pub fn with_disabled(mut self, f: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.is_disabled = Some(Arc::new(f));
        self
    }
}

#[derive(Clone, Debug)]
pub struct Row<R> {
    pub id: RowId,
    pub original: R,
    /// Position among siblings in the host data.
    pub index: usize,
    pub depth: usize,
    pub parent_id: Option<RowId>,
    pub sub_row_ids: Vec<RowId>,
    pub is_selected: bool,
    pub is_expanded: bool,
    pub is_disabled_for_selection: bool,
}

impl<R> Row<R> {
    pub fn can_expand(&self) -> bool {
        !self.sub_row_ids.is_empty()
    }
}

/// A fully materialized row tree, stored in pre-order.
#[derive(Clone, Debug)]
pub struct RowTree<R> {
    rows: Vec<Row<R>>,
    by_id: HashMap<RowId, usize>,
    root_ids: Vec<RowId>,
}

impl<R> Default for RowTree<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            by_id: HashMap::new(),
            root_ids: Vec::new(),
        }
    }
}

/// Builds the row tree for `records`. Never fails; empty input yields an empty tree.
pub fn build_row_tree<R: Clone>(records: &[R], options: &RowOptions<R>) -> RowTree<R> {
    let mut tree = RowTree::default();
    tree.root_ids = insert_level(&mut tree, records, options, None, 0);
    tree
}

fn insert_level<R: Clone>(
    tree: &mut RowTree<R>,
    records: &[R],
    options: &RowOptions<R>,
    parent: Option<&RowId>,
    depth: usize,
) -> Vec<RowId> {
    let mut ids = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let positional = match parent {
            Some(p) => format!("{p}.{index}"),
            None => index.to_string(),
        };
        let id = match &options.get_row_id {
            Some(get_id) => {
                let explicit = RowId::new(get_id(record));
                if tree.by_id.contains_key(&explicit) {
                    tracing::warn!(row_id = %explicit, "duplicate row id, falling back to positional id");
                    tree.unique_id(positional)
                } else {
                    explicit
                }
            }
            None => tree.unique_id(positional),
        };

        let slot = tree.rows.len();
        tree.rows.push(Row {
            id: id.clone(),
            original: record.clone(),
            index,
            depth,
            parent_id: parent.cloned(),
            sub_row_ids: Vec::new(),
            is_selected: false,
            is_expanded: false,
            is_disabled_for_selection: options.is_disabled.as_ref().is_some_and(|f| f(record)),
        });
        tree.by_id.insert(id.clone(), slot);

        if let Some(get_sub_rows) = &options.get_sub_rows {
            let children = get_sub_rows(record);
            if !children.is_empty() {
                let child_ids = insert_level(tree, children, options, Some(&id), depth + 1);
                tree.rows[slot].sub_row_ids = child_ids;
            }
        }
        ids.push(id);
    }
    ids
}

impl<R> RowTree<R> {
    fn unique_id(&self, base: String) -> RowId {
        let mut candidate = RowId::new(base.clone());
        let mut n = 1usize;
        while self.by_id.contains_key(&candidate) {
            candidate = RowId::new(format!("{base}~{n}"));
            n += 1;
        }
        candidate
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &RowId) -> Option<&Row<R>> {
        self.by_id.get(id).map(|&i| &self.rows[i])
    }

    pub(crate) fn get_mut(&mut self, id: &RowId) -> Option<&mut Row<R>> {
        self.by_id.get(id).map(|&i| &mut self.rows[i])
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Pre-order position of `id`, used to report ids in tree order.
    pub fn position(&self, id: &RowId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn root_ids(&self) -> &[RowId] {
        &self.root_ids
    }

    pub fn children(&self, id: &RowId) -> &[RowId] {
        self.get(id).map(|r| r.sub_row_ids.as_slice()).unwrap_or(&[])
    }

    /// Rows in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Row<R>> {
        self.rows.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Row<R>> {
        self.rows.iter_mut()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &RowId) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut cur = self.get(id).and_then(|r| r.parent_id.clone());
        while let Some(p) = cur {
            cur = self.get(&p).and_then(|r| r.parent_id.clone());
            out.push(p);
        }
        out
    }

    /// All descendants of `id` in pre-order (excluding `id`).
    pub fn descendant_ids(&self, id: &RowId) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut stack: Vec<&RowId> = self.children(id).iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Rows visible under `expansion`, in display order.
    pub fn visible_rows(&self, expansion: &ExpansionState) -> Vec<RowId> {
        DisplayTree::from_tree(self, |_| true).flatten(expansion)
    }

    /// Number of descendant rows shown below `id` given the current expansion.
    pub fn visible_nested_row_count(&self, id: &RowId, expansion: &ExpansionState) -> usize {
        if !expansion.is_expanded(id) {
            return 0;
        }
        self.children(id)
            .iter()
            .map(|child| 1 + self.visible_nested_row_count(child, expansion))
            .sum()
    }
}

/// A filtered and reordered view over a [`RowTree`].
///
/// The underlying tree is never reordered; sorting and filtering only change this view.
#[derive(Clone, Debug, Default)]
pub struct DisplayTree {
    roots: Vec<RowId>,
    children: HashMap<RowId, Vec<RowId>>,
}

impl DisplayTree {
    /// Keeps rows for which `keep` holds. Children of a dropped row are dropped with it.
    pub fn from_tree<R>(tree: &RowTree<R>, keep: impl Fn(&Row<R>) -> bool) -> Self {
        let mut children = HashMap::new();
        let roots = Self::keep_level(tree, tree.root_ids(), &keep, &mut children);
        Self { roots, children }
    }

    fn keep_level<R>(
        tree: &RowTree<R>,
        ids: &[RowId],
        keep: &impl Fn(&Row<R>) -> bool,
        children: &mut HashMap<RowId, Vec<RowId>>,
    ) -> Vec<RowId> {
        let mut kept = Vec::new();
        for id in ids {
            let Some(row) = tree.get(id) else {
                continue;
            };
            if !keep(row) {
                continue;
            }
            if row.can_expand() {
                let sub = Self::keep_level(tree, &row.sub_row_ids, keep, children);
                children.insert(id.clone(), sub);
            }
            kept.push(id.clone());
        }
        kept
    }

    pub fn roots(&self) -> &[RowId] {
        &self.roots
    }

    pub fn children(&self, id: &RowId) -> &[RowId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reorders every sibling group (roots and each child list) with `order`.
    pub fn sort_siblings(&mut self, mut order: impl FnMut(&mut Vec<RowId>)) {
        order(&mut self.roots);
        for ids in self.children.values_mut() {
            order(ids);
        }
    }

    /// Flattens the view in display order, descending only into expanded rows.
    pub fn flatten(&self, expansion: &ExpansionState) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut stack: Vec<&RowId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id.clone());
            if expansion.is_expanded(id) {
                stack.extend(self.children(id).iter().rev());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Person {
        name: &'static str,
        children: Vec<Person>,
    }

    fn person(name: &'static str, children: Vec<Person>) -> Person {
        Person { name, children }
    }

    fn nested() -> Vec<Person> {
        vec![
            person("a", vec![person("a0", vec![person("a00", vec![])]), person("a1", vec![])]),
            person("b", vec![]),
        ]
    }

    fn options() -> RowOptions<Person> {
        RowOptions::new().with_sub_rows(|p: &Person| p.children.as_slice())
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        let tree = build_row_tree::<Person>(&[], &options());
        assert!(tree.is_empty());
        assert!(tree.root_ids().is_empty());
    }

    #[test]
    fn positional_ids_follow_nesting() {
        let tree = build_row_tree(&nested(), &options());
        let ids: Vec<&str> = tree.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "0.0", "0.0.0", "0.1", "1"]);
        assert_eq!(tree.root_ids(), &[RowId::from("0"), RowId::from("1")]);
    }

    #[test]
    fn child_depth_is_parent_depth_plus_one() {
        let tree = build_row_tree(&nested(), &options());
        for row in tree.iter() {
            match &row.parent_id {
                Some(p) => assert_eq!(row.depth, tree.get(p).unwrap().depth + 1),
                None => assert_eq!(row.depth, 0),
            }
        }
        assert_eq!(tree.get(&"0.0.0".into()).unwrap().depth, 2);
    }

    #[test]
    fn explicit_ids_are_used_and_duplicates_rekeyed() {
        let records = vec![person("x", vec![]), person("x", vec![]), person("y", vec![])];
        let opts = RowOptions::new().with_row_id(|p: &Person| p.name.to_string());
        let tree = build_row_tree(&records, &opts);
        let ids: Vec<&str> = tree.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "1", "y"]);
    }

    #[test]
    fn disabled_predicate_marks_rows() {
        let opts = options().with_disabled(|p: &Person| p.name == "b");
        let tree = build_row_tree(&nested(), &opts);
        assert!(tree.get(&"1".into()).unwrap().is_disabled_for_selection);
        assert!(!tree.get(&"0".into()).unwrap().is_disabled_for_selection);
    }

    #[test]
    fn visible_rows_respect_expansion() {
        let tree = build_row_tree(&nested(), &options());
        let mut exp = ExpansionState::default();
        assert_eq!(tree.visible_rows(&exp).len(), 2);

        exp.toggle(&tree, &"0".into());
        let visible: Vec<String> = tree
            .visible_rows(&exp)
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(visible, vec!["0", "0.0", "0.1", "1"]);
        assert_eq!(tree.visible_nested_row_count(&"0".into(), &exp), 2);

        exp.toggle(&tree, &"0.0".into());
        assert_eq!(tree.visible_nested_row_count(&"0".into(), &exp), 3);
    }

    #[test]
    fn ancestors_and_descendants() {
        let tree = build_row_tree(&nested(), &options());
        assert_eq!(
            tree.ancestors(&"0.0.0".into()),
            vec![RowId::from("0.0"), RowId::from("0")]
        );
        assert_eq!(
            tree.descendant_ids(&"0".into()),
            vec![RowId::from("0.0"), RowId::from("0.0.0"), RowId::from("0.1")]
        );
    }

    #[test]
    fn display_tree_drops_filtered_subtrees() {
        let tree = build_row_tree(&nested(), &options());
        let view = DisplayTree::from_tree(&tree, |r| r.original.name != "a0");
        let exp = ExpansionState::all(&tree);
        let ids: Vec<String> = view.flatten(&exp).iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["0", "0.1", "1"]);
    }
}

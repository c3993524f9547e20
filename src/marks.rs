//! Per-cycle dirty marks.
//!
//! Marks live on one [`StructView`](crate::view::StructView) and are cleared
//! by its update cycle; two views never share them.

use std::collections::{BTreeMap, BTreeSet};

use crate::item::{EntityKind, ItemId};
use crate::mol::{AtomId, BondId};

/// How deep an edit reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Geometry only: the entity moved, adjacency is unchanged.
    Moved = 0,
    /// Topology or attributes changed. Ring removal marks bonds at this level.
    Changed = 1,
}

#[derive(Debug, Default, Clone)]
pub struct DirtyMarks {
    items: BTreeMap<ItemId, Severity>,
    item_removed: bool,
    // items a caller marked this cycle
    external: BTreeSet<ItemId>,
    structure_changed: bool,
}

impl DirtyMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edit reported by a caller. The higher severity wins when an
    /// item is marked twice.
    pub fn mark(&mut self, item: ItemId, severity: Severity) {
        self.external.insert(item);
        self.merge(item, severity);
    }

    /// Records a mark the engine derived itself. Does not by itself make the
    /// cycle report a change.
    pub(crate) fn mark_derived(&mut self, item: ItemId, severity: Severity) -> bool {
        self.merge(item, severity)
    }

    fn merge(&mut self, item: ItemId, severity: Severity) -> bool {
        match self.items.get_mut(&item) {
            Some(prev) if *prev >= severity => false,
            Some(prev) => {
                *prev = severity;
                true
            }
            None => {
                self.items.insert(item, severity);
                true
            }
        }
    }

    /// Notes that some entity was deleted outright.
    pub fn mark_item_removed(&mut self) {
        self.item_removed = true;
    }

    pub fn get(&self, item: ItemId) -> Option<Severity> {
        self.items.get(&item).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, Severity)> + '_ {
        self.items.iter().map(|(&item, &sev)| (item, sev))
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = (ItemId, Severity)> + '_ {
        self.iter().filter(move |(item, _)| item.kind() == kind)
    }

    pub fn atoms(&self) -> impl Iterator<Item = (AtomId, Severity)> + '_ {
        self.iter().filter_map(|(item, sev)| match item {
            ItemId::Atom(idx) => Some((idx, sev)),
            _ => None,
        })
    }

    pub fn bonds(&self) -> impl Iterator<Item = (BondId, Severity)> + '_ {
        self.iter().filter_map(|(item, sev)| match item {
            ItemId::Bond(idx) => Some((idx, sev)),
            _ => None,
        })
    }

    /// Atoms marked at `min` or above.
    pub fn atoms_at_least(&self, min: Severity) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms()
            .filter(move |&(_, sev)| sev >= min)
            .map(|(idx, _)| idx)
    }

    /// Drops every mark, caller or derived, on an item `keep` rejects.
    pub(crate) fn retain<F: FnMut(ItemId) -> bool>(&mut self, mut keep: F) {
        self.items.retain(|&item, _| keep(item));
        let items = &self.items;
        self.external.retain(|item| items.contains_key(item));
    }

    /// Whether a caller removed an item, or marked one that is still marked,
    /// since the last cycle.
    pub fn touched_by_caller(&self) -> bool {
        !self.external.is_empty() || self.item_removed
    }

    pub fn item_removed(&self) -> bool {
        self.item_removed
    }

    pub(crate) fn begin_cycle(&mut self) {
        self.structure_changed = self.item_removed;
    }

    /// Folds one mark into the structure-changed flag.
    pub(crate) fn note_severity(&mut self, severity: Severity) {
        self.structure_changed |= severity > Severity::Moved;
    }

    pub fn structure_changed(&self) -> bool {
        self.structure_changed
    }

    pub(crate) fn end_cycle(&mut self) {
        self.items.clear();
        self.item_removed = false;
        self.external.clear();
        self.structure_changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::stable_graph::NodeIndex;

    fn atom(i: usize) -> ItemId {
        ItemId::Atom(NodeIndex::new(i))
    }

    #[test]
    fn max_severity_wins() {
        let mut marks = DirtyMarks::new();
        marks.mark(atom(0), Severity::Changed);
        marks.mark(atom(0), Severity::Moved);
        assert_eq!(marks.get(atom(0)), Some(Severity::Changed));

        marks.mark(atom(1), Severity::Moved);
        marks.mark(atom(1), Severity::Changed);
        assert_eq!(marks.get(atom(1)), Some(Severity::Changed));
        assert_eq!(marks.len(), 2);
    }

    #[test]
    fn derived_marks_are_not_caller_edits() {
        let mut marks = DirtyMarks::new();
        assert!(marks.mark_derived(atom(3), Severity::Moved));
        assert!(!marks.mark_derived(atom(3), Severity::Moved));
        assert!(marks.mark_derived(atom(3), Severity::Changed));
        assert!(!marks.touched_by_caller());

        marks.mark(atom(4), Severity::Moved);
        assert!(marks.touched_by_caller());
    }

    #[test]
    fn pruned_caller_marks_no_longer_count() {
        let mut marks = DirtyMarks::new();
        marks.mark(atom(9), Severity::Changed);
        marks.mark_derived(atom(2), Severity::Moved);
        assert!(marks.touched_by_caller());

        marks.retain(|item| item != atom(9));
        assert!(!marks.touched_by_caller());
        assert_eq!(marks.get(atom(2)), Some(Severity::Moved));
    }

    #[test]
    fn structure_flag_follows_severity_and_removal() {
        let mut marks = DirtyMarks::new();
        marks.begin_cycle();
        marks.note_severity(Severity::Moved);
        assert!(!marks.structure_changed());
        marks.note_severity(Severity::Changed);
        assert!(marks.structure_changed());
        marks.end_cycle();

        marks.mark_item_removed();
        marks.begin_cycle();
        assert!(marks.structure_changed());
        marks.end_cycle();
        assert!(!marks.structure_changed());
        assert!(!marks.touched_by_caller());
    }

    #[test]
    fn atoms_at_least_filters() {
        let mut marks = DirtyMarks::new();
        marks.mark(atom(0), Severity::Moved);
        marks.mark(atom(1), Severity::Changed);
        marks.mark(ItemId::ChiralFlag, Severity::Changed);
        let moved: Vec<_> = marks.atoms_at_least(Severity::Moved).collect();
        let changed: Vec<_> = marks.atoms_at_least(Severity::Changed).collect();
        assert_eq!(moved, vec![NodeIndex::new(0), NodeIndex::new(1)]);
        assert_eq!(changed, vec![NodeIndex::new(1)]);
    }
}

//! Connected-component partition of the atoms.
//!
//! Components are never patched in place. Atoms touched by an edit are
//! evicted, and [`ComponentTracker::reconcile`] refloods every unassigned
//! atom, dissolving each existing component the flood runs into. That single
//! rule handles both merges (the flood reaches two old components) and
//! splits (the evicted bridge atoms flood only their own side, the other side
//! is reached from its own unassigned members). A union-find with explicit
//! split detection would reflood less on very large graphs.

use std::collections::{BTreeMap, BTreeSet};

use crate::atom::ReactionRole;
use crate::half_bond::HalfBondIndex;
use crate::mol::{AtomId, Mol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    atoms: BTreeSet<AtomId>,
    fragment_type: Option<ReactionRole>,
}

impl Component {
    pub fn atoms(&self) -> &BTreeSet<AtomId> {
        &self.atoms
    }

    /// Reaction role of the first marked atom met by the flood that built
    /// this component, if any atom carries one.
    pub fn fragment_type(&self) -> Option<ReactionRole> {
        self.fragment_type
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// Result of one flood fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flood {
    /// Reached atoms, in visiting order.
    pub atoms: Vec<AtomId>,
    /// Components that already owned one of the reached atoms.
    pub touched: BTreeSet<ComponentId>,
}

// Member sets of components as they were before this cycle first changed
// them, plus ids created this cycle.
#[derive(Debug, Clone, Default)]
struct Journal {
    before: BTreeMap<ComponentId, BTreeSet<AtomId>>,
    created: BTreeSet<ComponentId>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentTracker {
    components: BTreeMap<ComponentId, Component>,
    owner: BTreeMap<AtomId, ComponentId>,
    next_id: u32,
    journal: Journal,
}

impl ComponentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_of(&self, atom: AtomId) -> Option<ComponentId> {
        self.owner.get(&atom).copied()
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.components.iter().map(|(&id, c)| (id, c))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components whose fragment type matches `role`; `None` matches every component.
    pub fn with_role(
        &self,
        role: Option<ReactionRole>,
    ) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.iter()
            .filter(move |(_, c)| role.is_none() || c.fragment_type == role)
    }

    fn journal_touch(&mut self, id: ComponentId) {
        if self.journal.created.contains(&id) || self.journal.before.contains_key(&id) {
            return;
        }
        if let Some(c) = self.components.get(&id) {
            self.journal.before.insert(id, c.atoms.clone());
        }
    }

    /// Evicts an atom from its component, destroying the component once it is
    /// empty. Unassigned atoms are left alone.
    pub fn remove_atom(&mut self, atom: AtomId) {
        let Some(id) = self.owner.get(&atom).copied() else {
            return;
        };
        self.journal_touch(id);
        self.owner.remove(&atom);
        if let Some(c) = self.components.get_mut(&id) {
            c.atoms.remove(&atom);
            if c.atoms.is_empty() {
                self.components.remove(&id);
            }
        }
    }

    /// Dissolves a component; its members become unassigned.
    pub fn remove_component(&mut self, id: ComponentId) -> Option<Component> {
        self.journal_touch(id);
        let c = self.components.remove(&id)?;
        for atom in &c.atoms {
            self.owner.remove(atom);
        }
        Some(c)
    }

    /// Drops every component and unassigns every atom.
    pub fn clear(&mut self) {
        let ids: Vec<ComponentId> = self.components.keys().copied().collect();
        for id in ids {
            self.remove_component(id);
        }
    }

    /// Depth-first flood over half-bond adjacency, treating half-bonds as
    /// undirected through their bond.
    pub fn flood_from<I: IntoIterator<Item = AtomId>>(
        &self,
        seeds: I,
        hbs: &HalfBondIndex,
    ) -> Flood {
        let mut stack: Vec<AtomId> = seeds.into_iter().collect();
        stack.reverse();
        let mut seen = BTreeSet::new();
        let mut flood = Flood::default();
        while let Some(atom) = stack.pop() {
            if !seen.insert(atom) {
                continue;
            }
            flood.atoms.push(atom);
            if let Some(id) = self.component_of(atom) {
                flood.touched.insert(id);
            }
            for &h in hbs.neighbors(atom).iter().rev() {
                if let Some(hb) = hbs.get(h) {
                    if !seen.contains(&hb.end) {
                        stack.push(hb.end);
                    }
                }
            }
        }
        flood
    }

    /// Allocates a fresh component owning `atoms`, taken in visiting order.
    ///
    /// The fragment type is the reaction role of the first atom (in that
    /// order) that carries one. Atoms missing from `mol` are skipped.
    pub fn add_component(&mut self, atoms: &[AtomId], mol: &Mol) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        let mut members = BTreeSet::new();
        let mut fragment_type = None;
        for &atom in atoms {
            let Some(record) = mol.atom(atom) else {
                continue;
            };
            if fragment_type.is_none() {
                fragment_type = record.rxn_role;
            }
            if let Some(prev) = self.owner.insert(atom, id) {
                if let Some(c) = self.components.get_mut(&prev) {
                    c.atoms.remove(&atom);
                }
            }
            members.insert(atom);
        }
        self.journal.created.insert(id);
        self.components.insert(
            id,
            Component {
                atoms: members,
                fragment_type,
            },
        );
        id
    }

    /// Assigns every unassigned atom of `mol`, merging whatever components the
    /// floods run into. Returns the components created, in creation order.
    pub fn reconcile(&mut self, mol: &Mol, hbs: &HalfBondIndex) -> Vec<ComponentId> {
        let mut created = Vec::new();
        let atoms: Vec<AtomId> = mol.atoms().collect();
        for atom in atoms {
            if self.owner.contains_key(&atom) {
                continue;
            }
            let flood = self.flood_from([atom], hbs);
            for &id in &flood.touched {
                self.remove_component(id);
            }
            created.push(self.add_component(&flood.atoms, mol));
        }
        created
    }

    /// Whether the partition, as sets of atoms, differs from what it was
    /// when the current journal started. Resets the journal.
    pub fn take_partition_change(&mut self) -> bool {
        let journal = std::mem::take(&mut self.journal);
        let before: BTreeSet<BTreeSet<AtomId>> = journal.before.into_values().collect();
        let after: BTreeSet<BTreeSet<AtomId>> = journal
            .created
            .iter()
            .filter_map(|id| self.components.get(id))
            .map(|c| c.atoms.clone())
            .collect();
        before != after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;

    fn chain(n: usize) -> (Mol, Vec<AtomId>) {
        let mut mol = Mol::new();
        let atoms: Vec<AtomId> = (0..n)
            .map(|i| mol.add_atom(Atom::new("C", [i as f64, 0.0])).unwrap())
            .collect();
        for w in atoms.windows(2) {
            mol.add_bond(w[0], w[1], Bond::default()).unwrap();
        }
        (mol, atoms)
    }

    fn indexed(mol: &Mol) -> HalfBondIndex {
        let mut hbs = HalfBondIndex::new();
        hbs.init_all(mol);
        hbs
    }

    #[test]
    fn flood_collects_reachable_atoms_in_order() {
        let (mol, atoms) = chain(4);
        let hbs = indexed(&mol);
        let cc = ComponentTracker::new();
        let flood = cc.flood_from([atoms[1]], &hbs);
        let mut reached = flood.atoms.clone();
        reached.sort();
        assert_eq!(reached, atoms);
        assert_eq!(flood.atoms[0], atoms[1]);
        assert!(flood.touched.is_empty());
    }

    #[test]
    fn reconcile_assigns_everything() {
        let (mut mol, atoms) = chain(3);
        let lone = mol.add_atom(Atom::new("O", [9.0, 9.0])).unwrap();
        let hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        let created = cc.reconcile(&mol, &hbs);

        assert_eq!(created.len(), 2);
        assert_eq!(cc.len(), 2);
        let first = cc.component_of(atoms[0]).unwrap();
        assert!(atoms.iter().all(|&a| cc.component_of(a) == Some(first)));
        assert_ne!(cc.component_of(lone), Some(first));
        assert!(cc.take_partition_change());
    }

    #[test]
    fn clearing_and_reflooding_keeps_the_partition() {
        let (mut mol, atoms) = chain(3);
        mol.add_atom(Atom::new("O", [9.0, 9.0])).unwrap();
        let hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);
        cc.take_partition_change();

        cc.clear();
        assert!(cc.is_empty());
        assert_eq!(cc.component_of(atoms[0]), None);
        assert_eq!(cc.reconcile(&mol, &hbs).len(), 2);
        assert!(!cc.take_partition_change());
    }

    #[test]
    fn removing_last_member_destroys_component() {
        let mut mol = Mol::new();
        let a = mol.add_atom(Atom::default()).unwrap();
        let hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);
        assert_eq!(cc.len(), 1);

        cc.remove_atom(a);
        assert!(cc.is_empty());
        assert_eq!(cc.component_of(a), None);
        // unassigned atoms are a no-op
        cc.remove_atom(a);
    }

    #[test]
    fn evict_and_reflood_merges() {
        let mut mol = Mol::new();
        let a = mol.add_atom(Atom::new("C", [0.0, 0.0])).unwrap();
        let b = mol.add_atom(Atom::new("C", [1.0, 0.0])).unwrap();
        let mut hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);
        cc.take_partition_change();
        let old_b = cc.component_of(b).unwrap();

        let bond = mol.add_bond(a, b, Bond::default()).unwrap();
        hbs.insert_bond(bond, a, b);
        hbs.rebuild(&mol, [a, b]);
        cc.remove_atom(a);
        let created = cc.reconcile(&mol, &hbs);

        assert_eq!(created.len(), 1);
        assert_eq!(cc.len(), 1);
        assert_eq!(cc.component_of(a), cc.component_of(b));
        assert_ne!(cc.component_of(b), Some(old_b));
        assert!(cc.take_partition_change());
    }

    #[test]
    fn evict_and_reflood_splits() {
        let (mut mol, atoms) = chain(4);
        let mut hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);
        cc.take_partition_change();

        let middle = mol.bond_between(atoms[1], atoms[2]).unwrap();
        hbs.remove_bond(middle);
        mol.remove_bond(middle);
        hbs.rebuild(&mol, [atoms[1], atoms[2]]);
        cc.remove_atom(atoms[1]);
        cc.remove_atom(atoms[2]);
        cc.reconcile(&mol, &hbs);

        assert_eq!(cc.len(), 2);
        assert_eq!(cc.component_of(atoms[0]), cc.component_of(atoms[1]));
        assert_eq!(cc.component_of(atoms[2]), cc.component_of(atoms[3]));
        assert_ne!(cc.component_of(atoms[0]), cc.component_of(atoms[3]));
        assert!(cc.take_partition_change());
    }

    #[test]
    fn reflooding_same_partition_is_not_a_change() {
        let (mol, atoms) = chain(3);
        let hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);
        cc.take_partition_change();

        cc.remove_atom(atoms[1]);
        cc.reconcile(&mol, &hbs);
        assert_eq!(cc.len(), 1);
        assert!(!cc.take_partition_change());
    }

    #[test]
    fn first_marked_atom_sets_fragment_type() {
        let mut mol = Mol::new();
        let a = mol.add_atom(Atom::new("C", [0.0, 0.0])).unwrap();
        let b = mol
            .add_atom(Atom::new("C", [1.0, 0.0]).with_role(ReactionRole::Product))
            .unwrap();
        let c = mol
            .add_atom(Atom::new("C", [2.0, 0.0]).with_role(ReactionRole::Reactant))
            .unwrap();
        mol.add_bond(a, b, Bond::default()).unwrap();
        mol.add_bond(b, c, Bond::default()).unwrap();
        let hbs = indexed(&mol);
        let mut cc = ComponentTracker::new();
        cc.reconcile(&mol, &hbs);

        let id = cc.component_of(a).unwrap();
        assert_eq!(cc.get(id).unwrap().fragment_type(), Some(ReactionRole::Product));
        assert_eq!(cc.with_role(Some(ReactionRole::Product)).count(), 1);
        assert_eq!(cc.with_role(Some(ReactionRole::Reactant)).count(), 0);
        assert_eq!(cc.with_role(None).count(), 1);
    }
}

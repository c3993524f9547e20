use std::collections::{BTreeMap, BTreeSet};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::bond::Bond;
use crate::error::GraphError;
use crate::geometry::{BBox, Point};

/// Stable atom id. Valid for the lifetime of the atom; may be reused after removal.
pub type AtomId = NodeIndex;
/// Stable bond id. Valid for the lifetime of the bond; may be reused after removal.
pub type BondId = EdgeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SGroupId(pub u32);

/// Rendering-level group of atoms sharing a bounding box.
///
/// Membership is stored on the atoms ([`Atom::fragment`]); a fragment
/// nobody points at is dropped by the next update cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fragment {
    pub name: Option<String>,
}

/// R-group definition: a numbered set of fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RGroup {
    pub fragments: BTreeSet<FragmentId>,
    /// Occurrence range as typed by the user (`">0"`, `"1-3"`, ...).
    pub range: String,
    pub rest_h: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SGroupKind {
    #[default]
    Generic,
    Superatom,
    Multiple,
    Sru,
    Data,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SGroup {
    pub kind: SGroupKind,
    pub atoms: Vec<AtomId>,
    /// Superatom label, SRU subscript or data field value depending on `kind`.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RxnArrow {
    pub tail: Point,
    pub head: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RxnPlus {
    pub position: Point,
}

/// The canonical molecular graph and its satellite entities.
///
/// Atoms and bonds live in a [`StableUnGraph`] so ids survive removals of
/// other entities. Everything else is an ordered map from a small integer id,
/// which keeps every iteration deterministic.
#[derive(Debug, Clone, Default)]
pub struct Mol {
    graph: StableUnGraph<Atom, Bond>,
    fragments: BTreeMap<FragmentId, Fragment>,
    rgroups: BTreeMap<u32, RGroup>,
    sgroups: BTreeMap<SGroupId, SGroup>,
    rxn_arrows: BTreeMap<u32, RxnArrow>,
    rxn_pluses: BTreeMap<u32, RxnPlus>,
    chiral: bool,
    next_fragment: u32,
    next_sgroup: u32,
    next_arrow: u32,
    next_plus: u32,
}

impl Mol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &StableUnGraph<Atom, Bond> {
        &self.graph
    }

    pub fn atom(&self, idx: AtomId) -> Option<&Atom> {
        self.graph.node_weight(idx)
    }

    pub fn atom_mut(&mut self, idx: AtomId) -> Option<&mut Atom> {
        self.graph.node_weight_mut(idx)
    }

    pub fn bond(&self, idx: BondId) -> Option<&Bond> {
        self.graph.edge_weight(idx)
    }

    pub fn bond_mut(&mut self, idx: BondId) -> Option<&mut Bond> {
        self.graph.edge_weight_mut(idx)
    }

    pub fn contains_atom(&self, idx: AtomId) -> bool {
        self.graph.contains_node(idx)
    }

    pub fn contains_bond(&self, idx: BondId) -> bool {
        self.graph.edge_weight(idx).is_some()
    }

    pub fn add_atom(&mut self, atom: Atom) -> Result<AtomId, GraphError> {
        if let Some(fid) = atom.fragment {
            if !self.fragments.contains_key(&fid) {
                return Err(GraphError::MissingFragment(fid.0));
            }
        }
        Ok(self.graph.add_node(atom))
    }

    /// Removes the atom, its incident bonds and its s-group memberships.
    pub fn remove_atom(&mut self, idx: AtomId) -> Option<Atom> {
        let atom = self.graph.remove_node(idx)?;
        for sgroup in self.sgroups.values_mut() {
            sgroup.atoms.retain(|&a| a != idx);
        }
        Some(atom)
    }

    pub fn add_bond(&mut self, a: AtomId, b: AtomId, bond: Bond) -> Result<BondId, GraphError> {
        for idx in [a, b] {
            if !self.contains_atom(idx) {
                return Err(GraphError::MissingAtom(idx.index()));
            }
        }
        if a == b {
            return Err(GraphError::SelfBond(a.index()));
        }
        if self.bond_between(a, b).is_some() {
            return Err(GraphError::DuplicateBond(a.index(), b.index()));
        }
        Ok(self.graph.add_edge(a, b, bond))
    }

    pub fn remove_bond(&mut self, idx: BondId) -> Option<Bond> {
        self.graph.remove_edge(idx)
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = BondId> + '_ {
        self.graph.edge_indices()
    }

    pub fn neighbors(&self, idx: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        self.graph.neighbors(idx)
    }

    pub fn bonds_of(&self, idx: AtomId) -> impl Iterator<Item = BondId> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    /// `(begin, end)` in the orientation the bond was created with.
    pub fn bond_endpoints(&self, idx: BondId) -> Option<(AtomId, AtomId)> {
        self.graph.edge_endpoints(idx)
    }

    pub fn bond_between(&self, a: AtomId, b: AtomId) -> Option<BondId> {
        self.graph.find_edge(a, b)
    }

    pub fn add_fragment(&mut self, fragment: Fragment) -> FragmentId {
        let id = FragmentId(self.next_fragment);
        self.next_fragment += 1;
        self.fragments.insert(id, fragment);
        id
    }

    /// Drops the fragment, detaching any atoms still drawn in it and
    /// removing it from every r-group.
    pub fn remove_fragment(&mut self, id: FragmentId) -> Option<Fragment> {
        let fragment = self.fragments.remove(&id)?;
        for idx in self.graph.node_indices().collect::<Vec<_>>() {
            let atom = &mut self.graph[idx];
            if atom.fragment == Some(id) {
                atom.fragment = None;
            }
        }
        for rgroup in self.rgroups.values_mut() {
            rgroup.fragments.remove(&id);
        }
        Some(fragment)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(&id)
    }

    pub fn fragments(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> + '_ {
        self.fragments.iter().map(|(&id, f)| (id, f))
    }

    pub fn fragment_atoms(&self, id: FragmentId) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms()
            .filter(move |&idx| self.graph[idx].fragment == Some(id))
    }

    pub fn rgroup_of(&self, fragment: FragmentId) -> Option<u32> {
        self.rgroups
            .iter()
            .find(|(_, rg)| rg.fragments.contains(&fragment))
            .map(|(&label, _)| label)
    }

    /// Inserts or replaces r-group `label`.
    pub fn set_rgroup(&mut self, label: u32, rgroup: RGroup) -> Result<Option<RGroup>, GraphError> {
        if let Some(missing) = rgroup
            .fragments
            .iter()
            .find(|fid| !self.fragments.contains_key(fid))
        {
            return Err(GraphError::MissingFragment(missing.0));
        }
        Ok(self.rgroups.insert(label, rgroup))
    }

    pub fn remove_rgroup(&mut self, label: u32) -> Option<RGroup> {
        self.rgroups.remove(&label)
    }

    pub fn rgroup(&self, label: u32) -> Option<&RGroup> {
        self.rgroups.get(&label)
    }

    pub fn rgroups(&self) -> impl Iterator<Item = (u32, &RGroup)> + '_ {
        self.rgroups.iter().map(|(&label, rg)| (label, rg))
    }

    pub fn add_sgroup(&mut self, sgroup: SGroup) -> Result<SGroupId, GraphError> {
        if let Some(missing) = sgroup.atoms.iter().find(|&&a| !self.contains_atom(a)) {
            return Err(GraphError::MissingAtom(missing.index()));
        }
        let id = SGroupId(self.next_sgroup);
        self.next_sgroup += 1;
        self.sgroups.insert(id, sgroup);
        Ok(id)
    }

    pub fn remove_sgroup(&mut self, id: SGroupId) -> Option<SGroup> {
        self.sgroups.remove(&id)
    }

    pub fn sgroup(&self, id: SGroupId) -> Option<&SGroup> {
        self.sgroups.get(&id)
    }

    pub fn sgroups(&self) -> impl Iterator<Item = (SGroupId, &SGroup)> + '_ {
        self.sgroups.iter().map(|(&id, sg)| (id, sg))
    }

    pub fn sgroups_with_atom(&self, atom: AtomId) -> impl Iterator<Item = SGroupId> + '_ {
        self.sgroups
            .iter()
            .filter(move |(_, sg)| sg.atoms.contains(&atom))
            .map(|(&id, _)| id)
    }

    pub fn add_rxn_arrow(&mut self, arrow: RxnArrow) -> u32 {
        let id = self.next_arrow;
        self.next_arrow += 1;
        self.rxn_arrows.insert(id, arrow);
        id
    }

    pub fn remove_rxn_arrow(&mut self, id: u32) -> Option<RxnArrow> {
        self.rxn_arrows.remove(&id)
    }

    pub fn rxn_arrow(&self, id: u32) -> Option<&RxnArrow> {
        self.rxn_arrows.get(&id)
    }

    pub fn rxn_arrows(&self) -> impl Iterator<Item = (u32, &RxnArrow)> + '_ {
        self.rxn_arrows.iter().map(|(&id, a)| (id, a))
    }

    pub fn add_rxn_plus(&mut self, plus: RxnPlus) -> u32 {
        let id = self.next_plus;
        self.next_plus += 1;
        self.rxn_pluses.insert(id, plus);
        id
    }

    pub fn remove_rxn_plus(&mut self, id: u32) -> Option<RxnPlus> {
        self.rxn_pluses.remove(&id)
    }

    pub fn rxn_plus(&self, id: u32) -> Option<&RxnPlus> {
        self.rxn_pluses.get(&id)
    }

    pub fn rxn_pluses(&self) -> impl Iterator<Item = (u32, &RxnPlus)> + '_ {
        self.rxn_pluses.iter().map(|(&id, p)| (id, p))
    }

    pub fn is_chiral(&self) -> bool {
        self.chiral
    }

    pub fn set_chiral(&mut self, chiral: bool) {
        self.chiral = chiral;
    }

    /// Bounding box of the given atoms' positions; stale ids are skipped.
    pub fn atoms_bbox<I: IntoIterator<Item = AtomId>>(&self, atoms: I) -> Option<BBox> {
        BBox::from_points(
            atoms
                .into_iter()
                .filter_map(|idx| self.atom(idx).map(|a| a.position)),
        )
    }
}

//! Directed half-bonds and the rotation order around each atom.
//!
//! Every bond owns two half-bonds stored in a flat arena at `2·bond` and
//! `2·bond + 1`. Rotation links (`next`/`prev`) are arena ids, never
//! references. The order around an atom sorts outgoing half-bonds by angle,
//! counter-clockwise; it is only as fresh as the last [`sort_neighbors`] call
//! that included the atom.
//!
//! Walking `next(contra(h))` from any half-bond traces one face of the
//! drawing. Bounded faces come out clockwise (negative signed area), the
//! unbounded face counter-clockwise.
//!
//! [`sort_neighbors`]: HalfBondIndex::sort_neighbors

use std::collections::{BTreeMap, BTreeSet};

use petgraph::stable_graph::EdgeIndex;
use tracing::trace;

use crate::geometry::{direction, Point};
use crate::loops::RingId;
use crate::mol::{AtomId, BondId, Mol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfBondId(pub u32);

impl HalfBondId {
    /// `(begin → end, end → begin)` half-bonds of a bond.
    pub fn of_bond(bond: BondId) -> (HalfBondId, HalfBondId) {
        let base = bond.index() as u32 * 2;
        (HalfBondId(base), HalfBondId(base + 1))
    }

    pub fn bond(self) -> BondId {
        EdgeIndex::new(self.0 as usize / 2)
    }

    /// The half-bond running the other way along the same bond.
    pub fn contra(self) -> HalfBondId {
        HalfBondId(self.0 ^ 1)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which face walk, if any, has claimed a half-bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopMark {
    /// Not walked since it was created or last released.
    #[default]
    Unvisited,
    /// Walked; lies on the unbounded face, a tree excursion, or a rejected walk.
    Outer,
    /// Part of this ring.
    Ring(RingId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HalfBond {
    pub begin: AtomId,
    pub end: AtomId,
    pub bond: BondId,
    /// Next outgoing half-bond counter-clockwise around `begin`.
    pub next: HalfBondId,
    /// Previous outgoing half-bond around `begin`.
    pub prev: HalfBondId,
    /// Unit vector from `begin` towards `end`.
    pub dir: Point,
    /// `atan2` of `dir`, in `(-π, π]`.
    pub angle: f64,
    pub loop_mark: LoopMark,
}

impl HalfBond {
    fn new(id: HalfBondId, bond: BondId, begin: AtomId, end: AtomId) -> Self {
        Self {
            begin,
            end,
            bond,
            next: id,
            prev: id,
            dir: [0.0, 0.0],
            angle: 0.0,
            loop_mark: LoopMark::Unvisited,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HalfBondIndex {
    slots: Vec<Option<HalfBond>>,
    live: usize,
    neighbors: BTreeMap<AtomId, Vec<HalfBondId>>,
    // atoms whose outgoing set changed since they were last sorted
    unsorted: BTreeSet<AtomId>,
}

impl HalfBondIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: HalfBondId) -> Option<&HalfBond> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: HalfBondId) -> Option<&mut HalfBond> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: HalfBondId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live half-bonds.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (HalfBondId, &HalfBond)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|hb| (HalfBondId(i as u32), hb)))
    }

    /// Outgoing half-bonds of `atom` in rotation order. Empty for isolated
    /// or unknown atoms.
    pub fn neighbors(&self, atom: AtomId) -> &[HalfBondId] {
        self.neighbors.get(&atom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Successor of `id` along its face: the half-bond after `contra(id)`
    /// around `id.end`.
    pub fn face_next(&self, id: HalfBondId) -> Option<HalfBondId> {
        self.get(id.contra()).map(|hb| hb.next)
    }

    pub(crate) fn set_loop_mark(&mut self, id: HalfBondId, mark: LoopMark) {
        if let Some(hb) = self.get_mut(id) {
            hb.loop_mark = mark;
        }
    }

    /// Creates both half-bonds of a new bond. They stay unlinked until both
    /// endpoints are sorted again.
    pub fn insert_bond(&mut self, bond: BondId, begin: AtomId, end: AtomId) {
        let (fwd, back) = HalfBondId::of_bond(bond);
        if self.contains(fwd) || self.contains(back) {
            self.remove_bond(bond);
        }
        if self.slots.len() <= back.index() {
            self.slots.resize(back.index() + 1, None);
        }
        self.slots[fwd.index()] = Some(HalfBond::new(fwd, bond, begin, end));
        self.slots[back.index()] = Some(HalfBond::new(back, bond, end, begin));
        self.live += 2;
        self.neighbors.entry(begin).or_default().push(fwd);
        self.neighbors.entry(end).or_default().push(back);
        self.unsorted.insert(begin);
        self.unsorted.insert(end);
    }

    /// Destroys both half-bonds of a bond. Unknown bonds are ignored.
    pub fn remove_bond(&mut self, bond: BondId) {
        let (fwd, back) = HalfBondId::of_bond(bond);
        for id in [fwd, back] {
            let Some(hb) = self.slots.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            self.live -= 1;
            if let Some(list) = self.neighbors.get_mut(&hb.begin) {
                list.retain(|&h| h != id);
            }
            self.unsorted.insert(hb.begin);
        }
    }

    /// Forgets an atom's (already empty) rotation.
    pub fn remove_atom(&mut self, atom: AtomId) {
        self.neighbors.remove(&atom);
        self.unsorted.remove(&atom);
    }

    /// Atoms whose outgoing half-bond set changed since their last sort.
    pub fn unsorted(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.unsorted.iter().copied()
    }

    /// Discards every half-bond and recreates them from the bond list, then
    /// refreshes geometry and rotation order for every atom.
    ///
    /// A recreated half-bond keeps its loop mark when its bond still joins
    /// the same begin and end atoms, so valid rings survive the rebuild.
    pub fn init_all(&mut self, mol: &Mol) {
        let old = std::mem::take(&mut self.slots);
        self.live = 0;
        self.neighbors.clear();
        self.unsorted.clear();

        for bond in mol.bonds() {
            let Some((begin, end)) = mol.bond_endpoints(bond) else {
                continue;
            };
            self.insert_bond(bond, begin, end);
            let (fwd, back) = HalfBondId::of_bond(bond);
            for id in [fwd, back] {
                let kept = old
                    .get(id.index())
                    .and_then(Option::as_ref)
                    .filter(|prev| {
                        let hb = &self.slots[id.index()];
                        hb.as_ref()
                            .is_some_and(|hb| hb.begin == prev.begin && hb.end == prev.end)
                    })
                    .map(|prev| prev.loop_mark);
                if let Some(mark) = kept {
                    self.set_loop_mark(id, mark);
                }
            }
        }

        let atoms: Vec<AtomId> = mol.atoms().collect();
        for &atom in &atoms {
            self.neighbors.entry(atom).or_default();
        }
        self.refresh_geometry(mol, atoms.iter().copied());
        self.sort_neighbors(atoms.iter().copied());
    }

    /// Recomputes direction and angle of every half-bond leaving the given
    /// atoms, and of their contras.
    pub fn refresh_geometry<I: IntoIterator<Item = AtomId>>(&mut self, mol: &Mol, atoms: I) {
        for atom in atoms {
            let Some(origin) = mol.atom(atom).map(|a| a.position) else {
                trace!(atom = atom.index(), "skipping geometry of missing atom");
                continue;
            };
            let outgoing = self.neighbors(atom).to_vec();
            for id in outgoing {
                let Some(end) = self.get(id).map(|hb| hb.end) else {
                    continue;
                };
                let target = mol.atom(end).map(|a| a.position).unwrap_or(origin);
                let dir = direction(origin, target);
                let angle = angle_of(dir);
                if let Some(hb) = self.get_mut(id) {
                    debug_assert_eq!(
                        hb.begin, atom,
                        "half-bond {} listed under atom {} begins at {}",
                        id.0,
                        atom.index(),
                        hb.begin.index()
                    );
                    hb.dir = dir;
                    hb.angle = angle;
                }
                if let Some(contra) = self.get_mut(id.contra()) {
                    contra.dir = direction(target, origin);
                    contra.angle = angle_of(contra.dir);
                }
            }
        }
    }

    /// Sorts each atom's outgoing half-bonds by angle and relinks the circular
    /// `next`/`prev` order.
    ///
    /// Face walks through a re-sorted atom may have changed, so `Outer` marks
    /// on its half-bonds (both directions) are released. Ring marks are left
    /// for ring validation to judge.
    pub fn sort_neighbors<I: IntoIterator<Item = AtomId>>(&mut self, atoms: I) {
        for atom in atoms {
            self.unsorted.remove(&atom);
            let Some(mut list) = self.neighbors.get(&atom).cloned() else {
                continue;
            };
            list.sort_by(|&a, &b| {
                let ang = |id: HalfBondId| self.get(id).map_or(0.0, |hb| hb.angle);
                ang(a).total_cmp(&ang(b)).then(a.cmp(&b))
            });
            let n = list.len();
            for i in 0..n {
                let cur = list[i];
                let nxt = list[(i + 1) % n];
                if let Some(hb) = self.get_mut(cur) {
                    hb.next = nxt;
                }
                if let Some(hb) = self.get_mut(nxt) {
                    hb.prev = cur;
                }
                for id in [cur, cur.contra()] {
                    if let Some(hb) = self.get_mut(id) {
                        if hb.loop_mark == LoopMark::Outer {
                            hb.loop_mark = LoopMark::Unvisited;
                        }
                    }
                }
            }
            self.neighbors.insert(atom, list);
        }
    }

    /// Geometry refresh followed by a re-sort, for the given atoms.
    pub fn rebuild<I: IntoIterator<Item = AtomId>>(&mut self, mol: &Mol, atoms: I) {
        let atoms: Vec<AtomId> = atoms.into_iter().collect();
        self.refresh_geometry(mol, atoms.iter().copied());
        self.sort_neighbors(atoms);
    }
}

/// `atan2` of a direction folded into `(-π, π]`. A negative-zero `y`
/// would otherwise put due west at `-π`.
fn angle_of(dir: Point) -> f64 {
    let angle = dir[1].atan2(dir[0]);
    if angle <= -std::f64::consts::PI {
        std::f64::consts::PI
    } else {
        angle
    }
}

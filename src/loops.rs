//! Ring perception over the planar embedding given by the half-bond index.
//!
//! A ring is a bounded face of the drawing: a closed `face_next` walk with
//! negative signed area and no crossing bond segments. Rings are created by
//! [`LoopEngine::find_loops`] and destroyed by [`LoopEngine::validate`] once
//! any of their half-bonds changes; they are never repaired.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::bond::BondOrder;
use crate::geometry::{cross, segments_cross, signed_area, Point};
use crate::half_bond::{HalfBondId, HalfBondIndex, LoopMark};
use crate::mol::{AtomId, BondId, Mol};

/// Faces with a signed area above this (i.e. not clearly clockwise) are outer.
const AREA_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RingId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    half_bonds: Vec<HalfBondId>,
    atoms: Vec<AtomId>,
    bonds: Vec<BondId>,
    convex: bool,
    aromatic: bool,
}

impl Ring {
    /// Half-bonds in walk order; each ends where the next begins.
    pub fn half_bonds(&self) -> &[HalfBondId] {
        &self.half_bonds
    }

    /// Begin atom of each half-bond, in walk order.
    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[BondId] {
        &self.bonds
    }

    pub fn len(&self) -> usize {
        self.half_bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.half_bonds.is_empty()
    }

    /// No reflex corner, as of the last cycle that marked the ring.
    pub fn is_convex(&self) -> bool {
        self.convex
    }

    /// Every bond of the ring is aromatic, as of the last cycle that marked
    /// the ring.
    pub fn is_aromatic(&self) -> bool {
        self.aromatic
    }
}

/// A ring taken out of the engine, returned so the caller can clean up after it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedRing {
    pub id: RingId,
    pub ring: Ring,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoundLoops {
    /// Rings created by this pass, in discovery order.
    pub new_rings: Vec<RingId>,
    /// Pre-existing rings whose face was overwritten by this pass.
    pub displaced: Vec<RemovedRing>,
    /// Bonds of the new rings.
    pub bonds_to_mark: BTreeSet<BondId>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopEngine {
    rings: BTreeMap<RingId, Ring>,
    next_id: u32,
}

impl LoopEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RingId) -> Option<&Ring> {
        self.rings.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RingId, &Ring)> + '_ {
        self.rings.iter().map(|(&id, r)| (id, r))
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Rings running through any half-bond leaving `atom`, in either direction.
    pub fn rings_at(&self, atom: AtomId, hbs: &HalfBondIndex) -> BTreeSet<RingId> {
        hbs.neighbors(atom)
            .iter()
            .flat_map(|&h| [h, h.contra()])
            .filter_map(|h| match hbs.get(h)?.loop_mark {
                LoopMark::Ring(id) if self.rings.contains_key(&id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Drops a ring and releases the loop marks that still point at it.
    pub fn remove_ring(&mut self, id: RingId, hbs: &mut HalfBondIndex) -> Option<RemovedRing> {
        let ring = self.rings.remove(&id)?;
        for &h in &ring.half_bonds {
            if hbs.get(h).is_some_and(|hb| hb.loop_mark == LoopMark::Ring(id)) {
                hbs.set_loop_mark(h, LoopMark::Unvisited);
            }
        }
        trace!(ring = id.0, "ring removed");
        Some(RemovedRing { id, ring })
    }

    /// Recomputes the cached shape and bond flags of a ring after its atoms
    /// moved or its bonds were edited.
    pub fn refresh(&mut self, id: RingId, mol: &Mol, hbs: &HalfBondIndex) {
        if let Some(ring) = self.rings.get_mut(&id) {
            (ring.convex, ring.aromatic) = ring_flags(mol, hbs, &ring.half_bonds);
        }
    }

    /// Removes every ring that no longer matches the half-bond index.
    pub fn validate(&mut self, hbs: &mut HalfBondIndex) -> Vec<RemovedRing> {
        let stale: Vec<RingId> = self
            .rings
            .iter()
            .filter(|(&id, ring)| !ring_is_valid(id, ring, hbs))
            .map(|(&id, _)| id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.remove_ring(id, hbs))
            .collect()
    }

    /// Walks the face of every unvisited half-bond and records the bounded
    /// faces not yet known as rings.
    ///
    /// Atoms are visited by ascending id, and each atom's half-bonds in
    /// rotation order. Rings that are still valid are left untouched.
    pub fn find_loops(&mut self, mol: &Mol, hbs: &mut HalfBondIndex) -> FoundLoops {
        let mut found = FoundLoops::default();
        let limit = hbs.len() + 1;
        for atom in mol.atoms() {
            let outgoing = hbs.neighbors(atom).to_vec();
            for start in outgoing {
                if hbs.get(start).map(|hb| hb.loop_mark) != Some(LoopMark::Unvisited) {
                    continue;
                }
                let Some(walk) = walk_face(hbs, start, limit) else {
                    warn!(
                        half_bond = start.0,
                        atom = atom.index(),
                        "face walk did not close; marking it outer"
                    );
                    continue;
                };
                for sub in partition(hbs, walk) {
                    self.claim(mol, hbs, sub, &mut found);
                }
            }
        }
        found
    }

    fn claim(
        &mut self,
        mol: &Mol,
        hbs: &mut HalfBondIndex,
        sub: Vec<HalfBondId>,
        found: &mut FoundLoops,
    ) {
        if sub.is_empty() || self.is_known_ring(hbs, &sub) {
            return;
        }
        let owners: BTreeSet<RingId> = sub
            .iter()
            .filter_map(|&h| match hbs.get(h)?.loop_mark {
                LoopMark::Ring(id) => Some(id),
                _ => None,
            })
            .collect();
        for id in owners {
            let Some(removed) = self.remove_ring(id, hbs) else {
                continue;
            };
            if let Some(pos) = found.new_rings.iter().position(|&r| r == id) {
                found.new_rings.remove(pos);
            } else {
                found.displaced.push(removed);
            }
        }

        let points = positions(mol, hbs, &sub);
        if signed_area(&points) < -AREA_EPS && !self_intersects(&points) {
            let id = RingId(self.next_id);
            self.next_id += 1;
            for &h in &sub {
                hbs.set_loop_mark(h, LoopMark::Ring(id));
            }
            let ring = build_ring(mol, hbs, sub);
            found.bonds_to_mark.extend(ring.bonds.iter().copied());
            trace!(ring = id.0, size = ring.len(), "ring found");
            self.rings.insert(id, ring);
            found.new_rings.push(id);
        } else {
            for &h in &sub {
                hbs.set_loop_mark(h, LoopMark::Outer);
            }
        }
    }

    fn is_known_ring(&self, hbs: &HalfBondIndex, sub: &[HalfBondId]) -> bool {
        let Some(LoopMark::Ring(id)) = hbs.get(sub[0]).map(|hb| hb.loop_mark) else {
            return false;
        };
        self.rings.get(&id).is_some_and(|ring| ring.len() == sub.len())
            && sub
                .iter()
                .all(|&h| hbs.get(h).is_some_and(|hb| hb.loop_mark == LoopMark::Ring(id)))
    }
}

fn ring_is_valid(id: RingId, ring: &Ring, hbs: &HalfBondIndex) -> bool {
    let n = ring.half_bonds.len();
    let limit = hbs.len() + 1;
    for i in 0..n {
        let h = ring.half_bonds[i];
        let next = ring.half_bonds[(i + 1) % n];
        let Some(hb) = hbs.get(h) else {
            return false;
        };
        if hb.bond != ring.bonds[i]
            || hb.begin != ring.atoms[i]
            || hb.end != ring.atoms[(i + 1) % n]
            || hb.loop_mark != LoopMark::Ring(id)
        {
            return false;
        }
        // the face may leave the ring for pendant excursions, never through another ring
        let mut cur = h;
        let mut steps = 0;
        loop {
            let Some(succ) = hbs.face_next(cur) else {
                return false;
            };
            if succ == next {
                break;
            }
            match hbs.get(succ).map(|hb| hb.loop_mark) {
                Some(LoopMark::Outer | LoopMark::Unvisited) => {}
                _ => return false,
            }
            steps += 1;
            if steps > limit {
                return false;
            }
            cur = succ;
        }
    }
    true
}

fn walk_face(hbs: &mut HalfBondIndex, start: HalfBondId, limit: usize) -> Option<Vec<HalfBondId>> {
    let mut walk = vec![start];
    let mut cur = start;
    loop {
        match hbs.face_next(cur).filter(|&h| hbs.contains(h)) {
            Some(next) if next == start => return Some(walk),
            Some(next) if walk.len() <= limit => {
                walk.push(next);
                cur = next;
            }
            _ => break,
        }
    }
    for h in walk {
        if hbs.get(h).is_some_and(|hb| hb.loop_mark == LoopMark::Unvisited) {
            hbs.set_loop_mark(h, LoopMark::Outer);
        }
    }
    None
}

/// Splits a closed walk into simple sub-walks at every repeated atom.
fn partition(hbs: &HalfBondIndex, mut walk: Vec<HalfBondId>) -> Vec<Vec<HalfBondId>> {
    let mut subs = Vec::new();
    'search: loop {
        let mut seen: BTreeMap<AtomId, usize> = BTreeMap::new();
        for l in 0..walk.len() {
            let Some(hb) = hbs.get(walk[l]) else {
                continue;
            };
            if let Some(&first) = seen.get(&hb.end) {
                subs.push(walk.drain(first..=l).collect());
                continue 'search;
            }
            seen.insert(hb.begin, l);
        }
        break;
    }
    if !walk.is_empty() {
        subs.push(walk);
    }
    subs
}

fn positions(mol: &Mol, hbs: &HalfBondIndex, sub: &[HalfBondId]) -> Vec<Point> {
    sub.iter()
        .filter_map(|&h| hbs.get(h))
        .filter_map(|hb| mol.atom(hb.begin).map(|a| a.position))
        .collect()
}

fn self_intersects(points: &[Point]) -> bool {
    let n = points.len();
    (0..n).any(|i| {
        (i + 2..n)
            .filter(|&j| (j + 1) % n != i)
            .any(|j| segments_cross(points[i], points[(i + 1) % n], points[j], points[(j + 1) % n]))
    })
}

fn build_ring(mol: &Mol, hbs: &HalfBondIndex, half_bonds: Vec<HalfBondId>) -> Ring {
    let records: Vec<_> = half_bonds.iter().filter_map(|&h| hbs.get(h)).collect();
    let atoms = records.iter().map(|hb| hb.begin).collect();
    let bonds = records.iter().map(|hb| hb.bond).collect();
    let (convex, aromatic) = ring_flags(mol, hbs, &half_bonds);
    Ring {
        half_bonds,
        atoms,
        bonds,
        convex,
        aromatic,
    }
}

// (convex, aromatic)
fn ring_flags(mol: &Mol, hbs: &HalfBondIndex, half_bonds: &[HalfBondId]) -> (bool, bool) {
    let records: Vec<_> = half_bonds.iter().filter_map(|&h| hbs.get(h)).collect();
    let n = records.len();
    // inner faces turn clockwise at every convex corner
    let convex = (0..n).all(|k| cross(records[k].dir, records[(k + 1) % n].dir) <= AREA_EPS);
    let aromatic = records
        .iter()
        .all(|hb| mol.bond(hb.bond).is_some_and(|bond| bond.order == BondOrder::Aromatic));
    (convex, aromatic)
}

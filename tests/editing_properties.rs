//! Random edit sequences on a square grid. Bonds only join grid neighbours,
//! so every drawing stays planar and fresh perception is well defined.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use proptest::prelude::*;
use restruct::{Atom, AtomId, Bond, BondId, LoopMark, StructView};

const SIDE: usize = 4;

fn cell_position(cell: usize) -> [f64; 2] {
    [(cell % SIDE) as f64, (cell / SIDE) as f64]
}

fn neighbour(cell: usize, up: bool) -> Option<usize> {
    let (x, y) = (cell % SIDE, cell / SIDE);
    match up {
        false if x + 1 < SIDE => Some(cell + 1),
        true if y + 1 < SIDE => Some(cell + SIDE),
        _ => None,
    }
}

struct Grid {
    view: StructView,
    cells: BTreeMap<usize, AtomId>,
}

impl Grid {
    fn full() -> Self {
        let mut view = StructView::headless(Default::default());
        let cells: BTreeMap<usize, AtomId> = (0..SIDE * SIDE)
            .map(|c| (c, view.add_atom(Atom::new("C", cell_position(c))).unwrap()))
            .collect();
        for c in 0..SIDE * SIDE {
            for up in [false, true] {
                if let Some(n) = neighbour(c, up) {
                    view.add_bond(cells[&c], cells[&n], Bond::default()).unwrap();
                }
            }
        }
        view.update(false);
        Self { view, cells }
    }

    fn toggle_atom(&mut self, cell: usize) {
        match self.cells.remove(&cell) {
            Some(atom) => {
                self.view.remove_atom(atom);
            }
            None => {
                let atom = self.view.add_atom(Atom::new("C", cell_position(cell))).unwrap();
                self.cells.insert(cell, atom);
            }
        }
    }

    fn toggle_bond(&mut self, cell: usize, up: bool) {
        let Some(other) = neighbour(cell, up) else {
            return;
        };
        let (Some(&a), Some(&b)) = (self.cells.get(&cell), self.cells.get(&other)) else {
            return;
        };
        match self.view.mol().bond_between(a, b) {
            Some(bond) => {
                self.view.remove_bond(bond);
            }
            None => {
                self.view.add_bond(a, b, Bond::default()).unwrap();
            }
        }
    }
}

fn bfs_partition(view: &StructView) -> BTreeSet<BTreeSet<AtomId>> {
    let mol = view.mol();
    let mut seen = BTreeSet::new();
    let mut parts = BTreeSet::new();
    for start in mol.atoms() {
        if !seen.insert(start) {
            continue;
        }
        let mut part = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(a) = queue.pop_front() {
            for n in mol.neighbors(a) {
                if seen.insert(n) {
                    part.insert(n);
                    queue.push_back(n);
                }
            }
        }
        parts.insert(part);
    }
    parts
}

fn tracked_partition(view: &StructView) -> BTreeSet<BTreeSet<AtomId>> {
    view.scene()
        .components()
        .map(|(_, c)| c.atoms().clone())
        .collect()
}

fn ring_bond_sets(view: &StructView) -> BTreeSet<BTreeSet<BondId>> {
    view.scene()
        .rings()
        .map(|(_, r)| r.bonds().iter().copied().collect())
        .collect()
}

fn check_rings(view: &StructView) -> Result<(), TestCaseError> {
    let scene = view.scene();
    for (id, ring) in scene.rings() {
        let n = ring.len();
        prop_assert!(n >= 4, "grid ring {id:?} has {n} half-bonds");
        let atoms: BTreeSet<AtomId> = ring.atoms().iter().copied().collect();
        prop_assert_eq!(atoms.len(), n);
        for i in 0..n {
            let hb = scene.half_bond(ring.half_bonds()[i]);
            prop_assert!(hb.is_some());
            let hb = hb.unwrap();
            prop_assert_eq!(hb.loop_mark, LoopMark::Ring(id));
            prop_assert!(view.mol().contains_bond(hb.bond));
            let next = scene.half_bond(ring.half_bonds()[(i + 1) % n]).unwrap();
            prop_assert_eq!(hb.end, next.begin);
        }
    }
    Ok(())
}

fn edit() -> impl Strategy<Value = (bool, usize, bool)> {
    (prop::bool::weighted(0.25), 0..SIDE * SIDE, any::<bool>())
}

proptest! {
    #[test]
    fn incremental_state_matches_the_graph(edits in prop::collection::vec(edit(), 1..40)) {
        let mut grid = Grid::full();
        prop_assert_eq!(grid.view.scene().rings().count(), (SIDE - 1) * (SIDE - 1));

        for (atom_edit, cell, up) in edits {
            if atom_edit {
                grid.toggle_atom(cell);
            } else {
                grid.toggle_bond(cell, up);
            }
            grid.view.update(false);

            prop_assert_eq!(tracked_partition(&grid.view), bfs_partition(&grid.view));
            check_rings(&grid.view)?;

            let mut fresh = StructView::headless(grid.view.mol().clone());
            fresh.update(true);
            prop_assert_eq!(ring_bond_sets(&grid.view), ring_bond_sets(&fresh));

            prop_assert!(!grid.view.update(false), "an empty cycle reported a change");
        }
    }

    #[test]
    fn forcing_after_edits_changes_nothing(edits in prop::collection::vec(edit(), 1..25)) {
        let mut grid = Grid::full();
        for (atom_edit, cell, up) in edits {
            if atom_edit {
                grid.toggle_atom(cell);
            } else {
                grid.toggle_bond(cell, up);
            }
        }
        grid.view.update(false);
        let rings: Vec<_> = grid.view.scene().rings().map(|(id, _)| id).collect();

        prop_assert!(!grid.view.update(true));
        let again: Vec<_> = grid.view.scene().rings().map(|(id, _)| id).collect();
        prop_assert_eq!(again, rings);
        prop_assert_eq!(tracked_partition(&grid.view), bfs_partition(&grid.view));
    }
}

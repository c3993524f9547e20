//! The update orchestrator.
//!
//! [`StructView`] owns a [`Scene`] (the graph store plus every derived index)
//! and the dirty marks of the current cycle. Editing code mutates the store
//! through the view, marks what it touched, and calls
//! [`update`](StructView::update) once per gesture step. The cycle runs its
//! phases in a fixed order:
//!
//! 1. prune marks on entities that are gone, then force-mark everything if forced
//! 2. spread marks to the aggregates that depend on marked entities
//! 3. evict marked atoms from their components (all components when forced)
//! 4. drop fragments that lost all their atoms
//! 5. discard stale visuals
//! 6. refresh half-bond geometry and rotation order
//! 7. reflood unassigned atoms into components
//! 8. validate rings, then look for new ones if topology may have changed
//! 9. recount implicit hydrogens
//! 10. refresh flags of marked rings and draw the marked entities, kind by kind

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, debug_span, trace};

use crate::atom::{Atom, ReactionRole};
use crate::bond::Bond;
use crate::components::{Component, ComponentId, ComponentTracker};
use crate::config::ViewConfig;
use crate::error::GraphError;
use crate::geometry::{BBox, Point};
use crate::half_bond::{HalfBond, HalfBondId, HalfBondIndex};
use crate::item::{EntityKind, ItemId, Selection};
use crate::loops::{LoopEngine, RemovedRing, Ring, RingId};
use crate::marks::{DirtyMarks, Severity};
use crate::mol::{
    AtomId, BondId, Fragment, FragmentId, Mol, RGroup, RxnArrow, RxnPlus, SGroup, SGroupId,
};
use crate::painter::{NullPainter, Painter};
use crate::sssr::RingInfo;
use crate::valence;

/// The graph store together with everything derived from it.
///
/// Painters receive a `&Scene` while drawing; nothing outside this module
/// can mutate the derived indices.
#[derive(Debug, Clone)]
pub struct Scene {
    mol: Mol,
    half_bonds: HalfBondIndex,
    components: ComponentTracker,
    loops: LoopEngine,
    implicit_h: BTreeMap<AtomId, u8>,
    config: ViewConfig,
}

impl Scene {
    fn new(mol: Mol, config: ViewConfig) -> Self {
        Self {
            mol,
            half_bonds: HalfBondIndex::new(),
            components: ComponentTracker::new(),
            loops: LoopEngine::new(),
            implicit_h: BTreeMap::new(),
            config,
        }
    }

    pub fn mol(&self) -> &Mol {
        &self.mol
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Every live entity, grouped by kind in drawing order.
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        let mol = &self.mol;
        mol.atoms()
            .map(ItemId::Atom)
            .chain(mol.bonds().map(ItemId::Bond))
            .chain(self.loops.iter().map(|(id, _)| ItemId::Ring(id)))
            .chain(mol.rxn_arrows().map(|(id, _)| ItemId::RxnArrow(id)))
            .chain(mol.rxn_pluses().map(|(id, _)| ItemId::RxnPlus(id)))
            .chain(mol.sgroups().map(|(id, _)| ItemId::SGroup(id)))
            .chain(mol.fragments().map(|(id, _)| ItemId::Fragment(id)))
            .chain(mol.rgroups().map(|(label, _)| ItemId::RGroup(label)))
            .chain(mol.is_chiral().then_some(ItemId::ChiralFlag))
    }

    pub fn contains(&self, item: ItemId) -> bool {
        let mol = &self.mol;
        match item {
            ItemId::Atom(idx) => mol.contains_atom(idx),
            ItemId::Bond(idx) => mol.contains_bond(idx),
            ItemId::RxnArrow(id) => mol.rxn_arrow(id).is_some(),
            ItemId::RxnPlus(id) => mol.rxn_plus(id).is_some(),
            ItemId::Fragment(id) => mol.fragment(id).is_some(),
            ItemId::RGroup(label) => mol.rgroup(label).is_some(),
            ItemId::ChiralFlag => mol.is_chiral(),
            ItemId::SGroup(id) => mol.sgroup(id).is_some(),
            ItemId::Ring(id) => self.loops.get(id).is_some(),
        }
    }

    /// Component of an atom. `None` for unknown atoms, and for atoms added
    /// since the last update.
    pub fn component_of(&self, atom: AtomId) -> Option<ComponentId> {
        self.components.component_of(atom)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.components.iter()
    }

    pub fn components_with_role(
        &self,
        role: Option<ReactionRole>,
    ) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.components.with_role(role)
    }

    /// Outgoing half-bonds of an atom in counter-clockwise order.
    pub fn half_bonds_of(&self, atom: AtomId) -> &[HalfBondId] {
        self.half_bonds.neighbors(atom)
    }

    pub fn half_bond(&self, id: HalfBondId) -> Option<&HalfBond> {
        self.half_bonds.get(id)
    }

    pub fn rings(&self) -> impl Iterator<Item = (RingId, &Ring)> + '_ {
        self.loops.iter()
    }

    pub fn ring(&self, id: RingId) -> Option<&Ring> {
        self.loops.get(id)
    }

    /// Implicit hydrogen count as of the last cycle that touched the atom.
    /// `None` when counting is switched off or the atom was never counted.
    pub fn implicit_hydrogens(&self, atom: AtomId) -> Option<u8> {
        self.implicit_h.get(&atom).copied()
    }

    /// Where the chiral flag is drawn: right of and below the atoms.
    pub fn chiral_flag_position(&self) -> Option<Point> {
        if !self.mol.is_chiral() {
            return None;
        }
        let bb = self.mol.atoms_bbox(self.mol.atoms()).unwrap_or_else(BBox::zero);
        Some([bb.max[0], bb.min[1] - 1.0])
    }

    pub fn item_bbox(&self, item: ItemId) -> Option<BBox> {
        let mol = &self.mol;
        match item {
            ItemId::Atom(idx) => mol.atom(idx).map(|a| BBox::point(a.position)),
            ItemId::Bond(idx) => {
                let (a, b) = mol.bond_endpoints(idx)?;
                mol.atoms_bbox([a, b])
            }
            ItemId::RxnArrow(id) => mol
                .rxn_arrow(id)
                .and_then(|arrow| BBox::from_points([arrow.tail, arrow.head])),
            ItemId::RxnPlus(id) => mol.rxn_plus(id).map(|p| BBox::point(p.position)),
            ItemId::Fragment(id) => mol.atoms_bbox(mol.fragment_atoms(id)),
            ItemId::RGroup(label) => mol
                .rgroup(label)?
                .fragments
                .iter()
                .filter_map(|&f| self.item_bbox(ItemId::Fragment(f)))
                .reduce(|acc, b| acc.union(&b)),
            ItemId::ChiralFlag => self.chiral_flag_position().map(BBox::point),
            ItemId::SGroup(id) => mol.atoms_bbox(mol.sgroup(id)?.atoms.iter().copied()),
            ItemId::Ring(id) => mol.atoms_bbox(self.loops.get(id)?.atoms().iter().copied()),
        }
    }

    /// Bounding box of the selected entities, or of everything when the
    /// selection is empty. A scene with nothing to measure gives the zero box.
    pub fn bounding_box(&self, selection: &Selection) -> BBox {
        let items: Vec<ItemId> = if selection.is_empty() {
            self.items().collect()
        } else {
            selection.iter().collect()
        };
        items
            .into_iter()
            .filter_map(|item| self.item_bbox(item))
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_else(BBox::zero)
    }

    /// Smallest set of smallest rings of the bond graph, ignoring the drawing.
    pub fn sssr(&self) -> RingInfo {
        RingInfo::sssr(&self.mol)
    }

    /// `E − V + C`, with `C` taken from the component tracker.
    pub fn cycle_rank(&self) -> usize {
        (self.mol.bond_count() + self.components.len()).saturating_sub(self.mol.atom_count())
    }
}

/// What the last update cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub forced: bool,
    pub rings_added: Vec<RingId>,
    pub rings_removed: Vec<RingId>,
    pub components_created: Vec<ComponentId>,
    pub fragments_dropped: Vec<FragmentId>,
    /// Number of draw calls issued.
    pub redrawn: usize,
    pub changed: bool,
}

pub struct StructView<P: Painter = NullPainter> {
    scene: Scene,
    marks: DirtyMarks,
    painter: P,
    initialized: bool,
    last_cycle: CycleSummary,
}

impl StructView<NullPainter> {
    /// A view that draws nothing, with the default configuration.
    pub fn headless(mol: Mol) -> Self {
        Self::new(mol, NullPainter, ViewConfig::default())
    }
}

impl<P: Painter> StructView<P> {
    /// Wraps a structure. Derived state is empty until the first
    /// [`update`](Self::update), which always runs as a forced rebuild.
    pub fn new(mol: Mol, painter: P, config: ViewConfig) -> Self {
        Self {
            scene: Scene::new(mol, config),
            marks: DirtyMarks::new(),
            painter,
            initialized: false,
            last_cycle: CycleSummary::default(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn mol(&self) -> &Mol {
        &self.scene.mol
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    /// Marks collected since the last cycle.
    pub fn marks(&self) -> &DirtyMarks {
        &self.marks
    }

    pub fn last_cycle(&self) -> &CycleSummary {
        &self.last_cycle
    }

    pub fn into_mol(self) -> Mol {
        self.scene.mol
    }

    pub fn mark_atom(&mut self, atom: AtomId, severity: Severity) {
        self.marks.mark(ItemId::Atom(atom), severity);
    }

    pub fn mark_bond(&mut self, bond: BondId, severity: Severity) {
        self.marks.mark(ItemId::Bond(bond), severity);
    }

    pub fn mark_item(&mut self, item: ItemId, severity: Severity) {
        self.marks.mark(item, severity);
    }

    pub fn mark_item_removed(&mut self) {
        self.marks.mark_item_removed();
    }

    /// Mutable access to an atom record. The caller marks the atom with the
    /// right severity afterwards.
    pub fn atom_mut(&mut self, atom: AtomId) -> Option<&mut Atom> {
        self.scene.mol.atom_mut(atom)
    }

    /// Mutable access to a bond record. The caller marks the bond afterwards.
    pub fn bond_mut(&mut self, bond: BondId) -> Option<&mut Bond> {
        self.scene.mol.bond_mut(bond)
    }

    pub fn add_atom(&mut self, atom: Atom) -> Result<AtomId, GraphError> {
        let idx = self.scene.mol.add_atom(atom)?;
        self.marks.mark(ItemId::Atom(idx), Severity::Changed);
        Ok(idx)
    }

    /// Removes an atom together with its bonds.
    pub fn remove_atom(&mut self, atom: AtomId) -> Option<Atom> {
        if !self.scene.mol.contains_atom(atom) {
            return None;
        }
        let incident: Vec<BondId> = self.scene.mol.bonds_of(atom).collect();
        for bond in incident {
            self.remove_bond(bond);
        }
        self.mark_dependents_of_removed(atom);
        self.scene.components.remove_atom(atom);
        self.scene.half_bonds.remove_atom(atom);
        self.scene.implicit_h.remove(&atom);
        let removed = self.scene.mol.remove_atom(atom)?;
        self.painter.discard(ItemId::Atom(atom));
        self.marks.mark_item_removed();
        Some(removed)
    }

    fn mark_dependents_of_removed(&mut self, atom: AtomId) {
        let mol = &self.scene.mol;
        if let Some(f) = mol.atom(atom).and_then(|a| a.fragment) {
            self.marks.mark_derived(ItemId::Fragment(f), Severity::Moved);
        }
        for sg in mol.sgroups_with_atom(atom) {
            self.marks.mark_derived(ItemId::SGroup(sg), Severity::Changed);
        }
        if mol.is_chiral() {
            self.marks.mark_derived(ItemId::ChiralFlag, Severity::Moved);
        }
    }

    pub fn add_bond(&mut self, a: AtomId, b: AtomId, bond: Bond) -> Result<BondId, GraphError> {
        let idx = self.scene.mol.add_bond(a, b, bond)?;
        self.scene.half_bonds.insert_bond(idx, a, b);
        self.marks.mark(ItemId::Bond(idx), Severity::Changed);
        Ok(idx)
    }

    pub fn remove_bond(&mut self, bond: BondId) -> Option<Bond> {
        let removed = self.scene.mol.remove_bond(bond)?;
        self.scene.half_bonds.remove_bond(bond);
        self.painter.discard(ItemId::Bond(bond));
        self.marks.mark_item_removed();
        Some(removed)
    }

    pub fn add_fragment(&mut self, fragment: Fragment) -> FragmentId {
        let id = self.scene.mol.add_fragment(fragment);
        self.marks.mark(ItemId::Fragment(id), Severity::Changed);
        id
    }

    /// Removes a fragment; its atoms stay, detached from any fragment.
    pub fn remove_fragment(&mut self, id: FragmentId) -> Option<Fragment> {
        let rgroup = self.scene.mol.rgroup_of(id);
        let atoms: Vec<AtomId> = self.scene.mol.fragment_atoms(id).collect();
        let removed = self.scene.mol.remove_fragment(id)?;
        if let Some(label) = rgroup {
            self.marks.mark_derived(ItemId::RGroup(label), Severity::Changed);
        }
        for atom in atoms {
            self.marks.mark_derived(ItemId::Atom(atom), Severity::Moved);
        }
        self.painter.discard(ItemId::Fragment(id));
        self.marks.mark_item_removed();
        Some(removed)
    }

    /// Inserts or replaces r-group `label`.
    pub fn add_rgroup(&mut self, label: u32, rgroup: RGroup) -> Result<Option<RGroup>, GraphError> {
        let previous = self.scene.mol.set_rgroup(label, rgroup)?;
        self.marks.mark(ItemId::RGroup(label), Severity::Changed);
        Ok(previous)
    }

    pub fn remove_rgroup(&mut self, label: u32) -> Option<RGroup> {
        let removed = self.scene.mol.remove_rgroup(label)?;
        self.painter.discard(ItemId::RGroup(label));
        self.marks.mark_item_removed();
        Some(removed)
    }

    pub fn add_sgroup(&mut self, sgroup: SGroup) -> Result<SGroupId, GraphError> {
        let id = self.scene.mol.add_sgroup(sgroup)?;
        self.marks.mark(ItemId::SGroup(id), Severity::Changed);
        Ok(id)
    }

    pub fn remove_sgroup(&mut self, id: SGroupId) -> Option<SGroup> {
        let removed = self.scene.mol.remove_sgroup(id)?;
        self.painter.discard(ItemId::SGroup(id));
        self.marks.mark_item_removed();
        Some(removed)
    }

    pub fn add_rxn_arrow(&mut self, arrow: RxnArrow) -> u32 {
        let id = self.scene.mol.add_rxn_arrow(arrow);
        self.marks.mark(ItemId::RxnArrow(id), Severity::Changed);
        id
    }

    pub fn remove_rxn_arrow(&mut self, id: u32) -> Option<RxnArrow> {
        let removed = self.scene.mol.remove_rxn_arrow(id)?;
        self.painter.discard(ItemId::RxnArrow(id));
        self.marks.mark_item_removed();
        Some(removed)
    }

    pub fn add_rxn_plus(&mut self, plus: RxnPlus) -> u32 {
        let id = self.scene.mol.add_rxn_plus(plus);
        self.marks.mark(ItemId::RxnPlus(id), Severity::Changed);
        id
    }

    pub fn remove_rxn_plus(&mut self, id: u32) -> Option<RxnPlus> {
        let removed = self.scene.mol.remove_rxn_plus(id)?;
        self.painter.discard(ItemId::RxnPlus(id));
        self.marks.mark_item_removed();
        Some(removed)
    }

    /// Flags the structure chiral or not; the chiral flag appears or goes
    /// away with it.
    pub fn set_chiral(&mut self, chiral: bool) {
        let was = self.scene.mol.is_chiral();
        self.scene.mol.set_chiral(chiral);
        match (was, chiral) {
            (false, true) => self.marks.mark(ItemId::ChiralFlag, Severity::Changed),
            (true, false) => {
                self.painter.discard(ItemId::ChiralFlag);
                self.marks.mark_item_removed();
            }
            _ => {}
        }
    }

    /// Runs one update cycle and reports whether anything changed.
    ///
    /// `force` rebuilds every derived index from scratch. The first cycle of
    /// a view is always forced. Rings whose half-bonds survive a forced
    /// rebuild unchanged keep their ids, so forcing twice in a row reports no
    /// change the second time.
    pub fn update(&mut self, force: bool) -> bool {
        let force = force || !self.initialized;
        let span = debug_span!("update", force);
        let _enter = span.enter();

        let mut summary = CycleSummary {
            forced: force,
            ..CycleSummary::default()
        };
        self.marks.begin_cycle();

        self.collect_marks(force);
        let touched = self.marks.touched_by_caller();
        self.propagate_marks();

        if force {
            self.scene.components.clear();
            trace!("dissolved every component");
        } else {
            let evicted: Vec<AtomId> = self.marks.atoms().map(|(idx, _)| idx).collect();
            for &atom in &evicted {
                self.scene.components.remove_atom(atom);
            }
            trace!(atoms = evicted.len(), "evicted marked atoms");
        }

        summary.fragments_dropped = self.drop_empty_fragments();

        let marked: Vec<(ItemId, Severity)> = self.marks.iter().collect();
        for &(item, severity) in &marked {
            self.painter.discard(item);
            self.marks.note_severity(severity);
        }

        self.rebuild_half_bonds(force);

        summary.components_created = self
            .scene
            .components
            .reconcile(&self.scene.mol, &self.scene.half_bonds);
        let partition_changed = self.scene.components.take_partition_change();

        let removed = self.scene.loops.validate(&mut self.scene.half_bonds);
        summary.rings_removed = self.release_rings(removed);
        if force || self.marks.structure_changed() {
            let found = self
                .scene
                .loops
                .find_loops(&self.scene.mol, &mut self.scene.half_bonds);
            summary
                .rings_removed
                .extend(self.release_rings(found.displaced));
            for bond in found.bonds_to_mark {
                self.late_mark(ItemId::Bond(bond), Severity::Changed);
            }
            for &id in &found.new_rings {
                self.marks.mark_derived(ItemId::Ring(id), Severity::Changed);
            }
            summary.rings_added = found.new_rings;
        }

        let hydrogens_changed = self.count_hydrogens();
        summary.redrawn = self.draw_marked();

        summary.changed = touched
            || partition_changed
            || !summary.rings_added.is_empty()
            || !summary.rings_removed.is_empty()
            || !summary.fragments_dropped.is_empty()
            || hydrogens_changed;
        debug!(
            rings_added = summary.rings_added.len(),
            rings_removed = summary.rings_removed.len(),
            components_created = summary.components_created.len(),
            fragments_dropped = summary.fragments_dropped.len(),
            redrawn = summary.redrawn,
            changed = summary.changed,
            "update finished"
        );

        self.marks.end_cycle();
        self.initialized = true;
        let changed = summary.changed;
        self.last_cycle = summary;
        changed
    }

    fn collect_marks(&mut self, force: bool) {
        let scene = &self.scene;
        self.marks.retain(|item| {
            let live = scene.contains(item);
            if !live {
                trace!(?item, "dropping mark on removed item");
            }
            live
        });
        if force {
            let all: Vec<ItemId> = self.scene.items().collect();
            for item in all {
                self.marks.mark_derived(item, Severity::Changed);
            }
            return;
        }
        let unsorted: Vec<AtomId> = self
            .scene
            .half_bonds
            .unsorted()
            .filter(|&atom| self.scene.mol.contains_atom(atom))
            .collect();
        for atom in unsorted {
            self.marks.mark_derived(ItemId::Atom(atom), Severity::Changed);
        }
    }

    // Aggregates are redrawn only when marked, so they follow their members.
    fn propagate_marks(&mut self) {
        let mol = &self.scene.mol;
        let bonds: Vec<BondId> = self.marks.bonds().map(|(idx, _)| idx).collect();
        for bond in bonds {
            if let Some((a, b)) = mol.bond_endpoints(bond) {
                self.marks.mark_derived(ItemId::Atom(a), Severity::Moved);
                self.marks.mark_derived(ItemId::Atom(b), Severity::Moved);
            }
        }

        let atoms: Vec<AtomId> = self.marks.atoms().map(|(idx, _)| idx).collect();
        for atom in atoms {
            if let Some(f) = mol.atom(atom).and_then(|a| a.fragment) {
                if mol.fragment(f).is_some() {
                    self.marks.mark_derived(ItemId::Fragment(f), Severity::Moved);
                }
            }
            for sg in mol.sgroups_with_atom(atom) {
                self.marks.mark_derived(ItemId::SGroup(sg), Severity::Moved);
            }
            for ring in self.scene.loops.rings_at(atom, &self.scene.half_bonds) {
                self.marks.mark_derived(ItemId::Ring(ring), Severity::Moved);
            }
            if mol.is_chiral() {
                self.marks.mark_derived(ItemId::ChiralFlag, Severity::Moved);
            }
        }

        let fragments: Vec<ItemId> = self
            .marks
            .of_kind(EntityKind::Fragment)
            .map(|(item, _)| item)
            .collect();
        for item in fragments {
            if let ItemId::Fragment(f) = item {
                if let Some(label) = mol.rgroup_of(f) {
                    self.marks.mark_derived(ItemId::RGroup(label), Severity::Moved);
                }
            }
        }
    }

    fn drop_empty_fragments(&mut self) -> Vec<FragmentId> {
        let mol = &self.scene.mol;
        let empty: Vec<FragmentId> = mol
            .fragments()
            .map(|(id, _)| id)
            .filter(|&id| mol.fragment_atoms(id).next().is_none())
            .collect();
        for &id in &empty {
            if let Some(label) = self.scene.mol.rgroup_of(id) {
                self.late_mark(ItemId::RGroup(label), Severity::Changed);
            }
            self.scene.mol.remove_fragment(id);
            self.painter.discard(ItemId::Fragment(id));
            trace!(fragment = id.0, "dropped empty fragment");
        }
        self.marks
            .retain(|item| !matches!(item, ItemId::Fragment(f) if empty.contains(&f)));
        empty
    }

    fn rebuild_half_bonds(&mut self, force: bool) {
        let hbs = &mut self.scene.half_bonds;
        if force {
            hbs.init_all(&self.scene.mol);
            trace!(half_bonds = hbs.len(), "rebuilt all half-bonds");
            return;
        }
        let moved: Vec<AtomId> = self.marks.atoms().map(|(idx, _)| idx).collect();
        let resort: BTreeSet<AtomId> = self
            .marks
            .atoms_at_least(Severity::Changed)
            .chain(hbs.unsorted())
            .collect();
        hbs.refresh_geometry(&self.scene.mol, moved.iter().copied());
        hbs.sort_neighbors(resort.iter().copied());
        trace!(refreshed = moved.len(), resorted = resort.len(), "half-bonds updated");
    }

    // Marks an entity after visuals were discarded, discarding its visual
    // if this is the first mark it gets this cycle.
    fn late_mark(&mut self, item: ItemId, severity: Severity) {
        if self.marks.get(item).is_none() {
            self.painter.discard(item);
        }
        self.marks.mark_derived(item, severity);
    }

    fn release_rings(&mut self, removed: Vec<RemovedRing>) -> Vec<RingId> {
        let mut ids = Vec::with_capacity(removed.len());
        for RemovedRing { id, ring } in removed {
            self.painter.discard(ItemId::Ring(id));
            for (&bond, &atom) in ring.bonds().iter().zip(ring.atoms()) {
                if self.scene.mol.contains_bond(bond) {
                    self.late_mark(ItemId::Bond(bond), Severity::Changed);
                }
                if self.scene.mol.contains_atom(atom) {
                    self.late_mark(ItemId::Atom(atom), Severity::Changed);
                }
            }
            ids.push(id);
        }
        ids
    }

    fn count_hydrogens(&mut self) -> bool {
        if !self.scene.config.implicit_hydrogens {
            return false;
        }
        let mut changed = false;
        let atoms: Vec<AtomId> = self.marks.atoms().map(|(idx, _)| idx).collect();
        for atom in atoms {
            if !self.scene.mol.contains_atom(atom) {
                continue;
            }
            let count = valence::implicit_hydrogens(&self.scene.mol, atom);
            changed |= self.scene.implicit_h.insert(atom, count) != Some(count);
        }
        changed
    }

    fn draw_marked(&mut self) -> usize {
        let rings: Vec<RingId> = self
            .marks
            .of_kind(EntityKind::Ring)
            .filter_map(|(item, _)| match item {
                ItemId::Ring(id) => Some(id),
                _ => None,
            })
            .collect();
        for id in rings {
            self.scene
                .loops
                .refresh(id, &self.scene.mol, &self.scene.half_bonds);
        }
        let mut drawn = 0;
        for kind in EntityKind::ALL {
            if kind == EntityKind::ChiralFlag && !self.scene.config.show_chiral_flag {
                continue;
            }
            for (item, _) in self.marks.of_kind(kind) {
                if self.scene.contains(item) {
                    self.painter.draw(item, &self.scene);
                    drawn += 1;
                }
            }
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::painter::{PaintEvent, Recorder};

    fn square(view: &mut StructView<Recorder>) -> Vec<AtomId> {
        let atoms: Vec<AtomId> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .into_iter()
            .map(|p| view.add_atom(Atom::new("C", p)).unwrap())
            .collect();
        for i in 0..4 {
            view.add_bond(atoms[i], atoms[(i + 1) % 4], Bond::default())
                .unwrap();
        }
        atoms
    }

    fn recording() -> StructView<Recorder> {
        StructView::new(Mol::new(), Recorder::new(), ViewConfig::default())
    }

    #[test]
    fn first_update_is_forced() {
        let mut view = recording();
        square(&mut view);
        assert!(view.update(false));
        assert!(view.last_cycle().forced);
        assert_eq!(view.scene().rings().count(), 1);
        assert_eq!(view.scene().components().count(), 1);
    }

    #[test]
    fn discards_come_before_draws() {
        let mut view = recording();
        square(&mut view);
        view.update(true);
        let events = view.painter().events();
        let first_draw = events
            .iter()
            .position(|e| matches!(e, PaintEvent::Draw(_)))
            .unwrap();
        assert!(events[first_draw..]
            .iter()
            .all(|e| matches!(e, PaintEvent::Draw(_))));
    }

    #[test]
    fn drawing_follows_kind_order() {
        let mut view = recording();
        square(&mut view);
        view.add_rxn_plus(RxnPlus { position: [3.0, 0.0] });
        view.update(true);
        let kinds: Vec<EntityKind> = view.painter().drawn().map(ItemId::kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort_by_key(|k| EntityKind::ALL.iter().position(|x| x == k));
        assert_eq!(kinds, sorted);
        assert_eq!(kinds.first(), Some(&EntityKind::Atom));
        assert!(kinds.contains(&EntityKind::Ring));
    }

    #[test]
    fn bounding_box_of_selection_and_of_everything() {
        let mut view = recording();
        let atoms = square(&mut view);
        view.add_rxn_arrow(RxnArrow {
            tail: [2.0, 0.5],
            head: [4.0, 0.5],
        });
        view.update(false);
        let scene = view.scene();

        let mut sel = Selection::new();
        sel.insert(atoms[0]);
        sel.insert(atoms[2]);
        let bb = scene.bounding_box(&sel);
        assert_eq!((bb.min, bb.max), ([0.0, 0.0], [1.0, 1.0]));

        let all = scene.bounding_box(&Selection::new());
        assert_eq!((all.min, all.max), ([0.0, 0.0], [4.0, 1.0]));

        let empty = StructView::headless(Mol::new());
        assert_eq!(empty.scene().bounding_box(&Selection::new()), BBox::zero());
    }

    #[test]
    fn chiral_flag_sits_below_right() {
        let mut view = recording();
        square(&mut view);
        view.set_chiral(true);
        view.update(false);
        assert_eq!(view.scene().chiral_flag_position(), Some([1.0, -1.0]));
        assert!(view.painter().drawn().any(|i| i == ItemId::ChiralFlag));

        let mut hidden = StructView::new(
            view.mol().clone(),
            Recorder::new(),
            ViewConfig {
                show_chiral_flag: false,
                ..ViewConfig::default()
            },
        );
        hidden.update(true);
        assert!(hidden.scene().contains(ItemId::ChiralFlag));
        assert!(!hidden.painter().drawn().any(|i| i == ItemId::ChiralFlag));
    }

    #[test]
    fn removals_discard_at_once() {
        let mut view = recording();
        let atoms = square(&mut view);
        view.update(false);
        view.painter_mut().take();

        let bond = view.mol().bond_between(atoms[0], atoms[1]).unwrap();
        view.remove_atom(atoms[0]);
        let discarded: Vec<ItemId> = view.painter().discarded().collect();
        assert!(discarded.contains(&ItemId::Atom(atoms[0])));
        assert!(discarded.contains(&ItemId::Bond(bond)));
        assert!(view.marks().item_removed());
        assert_eq!(view.scene().component_of(atoms[0]), None);
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let mut view = recording();
        let a = view.add_atom(Atom::default()).unwrap();
        assert_eq!(
            view.add_bond(a, a, Bond::default()),
            Err(GraphError::SelfBond(a.index()))
        );
        assert_eq!(
            view.add_atom(Atom::default().with_fragment(FragmentId(9))),
            Err(GraphError::MissingFragment(9))
        );
        assert!(view.remove_atom(AtomId::new(42)).is_none());
    }

    #[test]
    fn implicit_hydrogens_follow_edits() {
        let mut view = recording();
        let c = view.add_atom(Atom::new("C", [0.0, 0.0])).unwrap();
        let o = view.add_atom(Atom::new("O", [1.0, 0.0])).unwrap();
        let bond = view.add_bond(c, o, Bond::default()).unwrap();
        view.update(false);
        assert_eq!(view.scene().implicit_hydrogens(c), Some(3));
        assert_eq!(view.scene().implicit_hydrogens(o), Some(1));

        view.bond_mut(bond).unwrap().order = crate::bond::BondOrder::Double;
        view.mark_bond(bond, Severity::Changed);
        assert!(view.update(false));
        assert_eq!(view.scene().implicit_hydrogens(c), Some(2));
        assert_eq!(view.scene().implicit_hydrogens(o), Some(0));
    }
}

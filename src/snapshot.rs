//! Hand-off format between file parsers and the graph store.
//!
//! Entities refer to each other by position in their list: a bond's `begin`
//! is an index into `atoms`, an atom's `fragment` an index into `fragments`,
//! and so on. Text formats are parsed elsewhere; this is only the shape a
//! parser fills in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder, BondStereo};
use crate::error::GraphError;
use crate::mol::{AtomId, Fragment, FragmentId, Mol, RGroup, RxnArrow, RxnPlus, SGroup, SGroupKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructSnapshot {
    /// `fragment` holds an index into `fragments`.
    pub atoms: Vec<Atom>,
    pub bonds: Vec<SnapshotBond>,
    pub fragments: Vec<Fragment>,
    /// Keyed by r-group label; `fragments` holds indices into `fragments`.
    pub rgroups: BTreeMap<u32, RGroup>,
    pub sgroups: Vec<SnapshotSGroup>,
    pub rxn_arrows: Vec<RxnArrow>,
    pub rxn_pluses: Vec<RxnPlus>,
    pub chiral: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotBond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
    pub stereo: BondStereo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSGroup {
    pub kind: SGroupKind,
    pub atoms: Vec<usize>,
    pub data: String,
}

impl Mol {
    /// Builds a graph store from a parsed structure, checking that every
    /// cross reference resolves.
    pub fn from_snapshot(snapshot: &StructSnapshot) -> Result<Self, GraphError> {
        let mut mol = Mol::new();
        let fragments: Vec<FragmentId> = snapshot
            .fragments
            .iter()
            .map(|f| mol.add_fragment(f.clone()))
            .collect();
        let fragment_at = |FragmentId(i): FragmentId| {
            fragments
                .get(i as usize)
                .copied()
                .ok_or(GraphError::MissingFragment(i))
        };

        let mut atoms = Vec::with_capacity(snapshot.atoms.len());
        for record in &snapshot.atoms {
            let mut atom = record.clone();
            atom.fragment = atom.fragment.map(fragment_at).transpose()?;
            atoms.push(mol.add_atom(atom)?);
        }
        let atom_at = |i: usize| atoms.get(i).copied().ok_or(GraphError::MissingAtom(i));

        for b in &snapshot.bonds {
            let bond = Bond {
                order: b.order,
                stereo: b.stereo,
            };
            mol.add_bond(atom_at(b.begin)?, atom_at(b.end)?, bond)?;
        }
        for (&label, rgroup) in &snapshot.rgroups {
            let fragments = rgroup
                .fragments
                .iter()
                .map(|&f| fragment_at(f))
                .collect::<Result<_, _>>()?;
            mol.set_rgroup(
                label,
                RGroup {
                    fragments,
                    ..rgroup.clone()
                },
            )?;
        }
        for sg in &snapshot.sgroups {
            let members = sg
                .atoms
                .iter()
                .map(|&i| atom_at(i))
                .collect::<Result<_, _>>()?;
            mol.add_sgroup(SGroup {
                kind: sg.kind,
                atoms: members,
                data: sg.data.clone(),
            })?;
        }
        for &arrow in &snapshot.rxn_arrows {
            mol.add_rxn_arrow(arrow);
        }
        for &plus in &snapshot.rxn_pluses {
            mol.add_rxn_plus(plus);
        }
        mol.set_chiral(snapshot.chiral);
        Ok(mol)
    }

    /// Flattens the store into a snapshot with compact, gap-free indices.
    pub fn to_snapshot(&self) -> StructSnapshot {
        let atom_index: BTreeMap<AtomId, usize> =
            self.atoms().enumerate().map(|(i, a)| (a, i)).collect();
        let fragment_index: BTreeMap<FragmentId, FragmentId> = self
            .fragments()
            .enumerate()
            .map(|(i, (id, _))| (id, FragmentId(i as u32)))
            .collect();

        let atoms = self
            .atoms()
            .filter_map(|idx| self.atom(idx))
            .map(|a| Atom {
                fragment: a.fragment.and_then(|f| fragment_index.get(&f).copied()),
                ..a.clone()
            })
            .collect();
        let bonds = self
            .bonds()
            .filter_map(|idx| {
                let (a, b) = self.bond_endpoints(idx)?;
                let bond = self.bond(idx)?;
                Some(SnapshotBond {
                    begin: *atom_index.get(&a)?,
                    end: *atom_index.get(&b)?,
                    order: bond.order,
                    stereo: bond.stereo,
                })
            })
            .collect();
        let rgroups = self
            .rgroups()
            .map(|(label, rg)| {
                let fragments = rg
                    .fragments
                    .iter()
                    .filter_map(|f| fragment_index.get(f).copied())
                    .collect();
                (
                    label,
                    RGroup {
                        fragments,
                        ..rg.clone()
                    },
                )
            })
            .collect();
        let sgroups = self
            .sgroups()
            .map(|(_, sg)| SnapshotSGroup {
                kind: sg.kind,
                atoms: sg.atoms.iter().filter_map(|a| atom_index.get(a).copied()).collect(),
                data: sg.data.clone(),
            })
            .collect();

        StructSnapshot {
            atoms,
            bonds,
            fragments: self.fragments().map(|(_, f)| f.clone()).collect(),
            rgroups,
            sgroups,
            rxn_arrows: self.rxn_arrows().map(|(_, a)| *a).collect(),
            rxn_pluses: self.rxn_pluses().map(|(_, p)| *p).collect(),
            chiral: self.is_chiral(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethanol() -> StructSnapshot {
        serde_json::from_str(
            r#"{
                "atoms": [
                    {"label": "C", "position": [0.0, 0.0], "fragment": 0},
                    {"label": "C", "position": [0.866, 0.5], "fragment": 0},
                    {"label": "O", "position": [1.732, 0.0], "fragment": 0}
                ],
                "bonds": [{"begin": 0, "end": 1}, {"begin": 1, "end": 2}],
                "fragments": [{}],
                "rgroups": {"1": {"fragments": [0], "range": ">0"}},
                "sgroups": [{"kind": "data", "atoms": [2], "data": "OH"}],
                "chiral": true
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn loads_a_parsed_structure() {
        let mol = Mol::from_snapshot(&ethanol()).unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.fragments().count(), 1);
        assert_eq!(mol.rgroup(1).unwrap().range, ">0");
        assert_eq!(mol.sgroups().count(), 1);
        assert!(mol.is_chiral());
        let o = mol.atoms().nth(2).unwrap();
        assert_eq!(mol.atom(o).unwrap().label, "O");
        assert_eq!(mol.sgroups_with_atom(o).count(), 1);
    }

    #[test]
    fn dangling_references_are_rejected() {
        let mut snap = ethanol();
        snap.bonds[1].end = 7;
        assert_eq!(Mol::from_snapshot(&snap).unwrap_err(), GraphError::MissingAtom(7));

        let mut snap = ethanol();
        snap.atoms[0].fragment = Some(FragmentId(3));
        assert_eq!(Mol::from_snapshot(&snap).unwrap_err(), GraphError::MissingFragment(3));

        let mut snap = ethanol();
        snap.bonds.push(SnapshotBond {
            begin: 1,
            end: 0,
            ..SnapshotBond::default()
        });
        assert_eq!(Mol::from_snapshot(&snap).unwrap_err(), GraphError::DuplicateBond(1, 0));
    }

    #[test]
    fn export_compacts_ids() {
        let mut mol = Mol::from_snapshot(&ethanol()).unwrap();
        let first = mol.atoms().next().unwrap();
        mol.remove_atom(first);

        let snap = mol.to_snapshot();
        assert_eq!(snap.atoms.len(), 2);
        assert_eq!(snap.bonds.len(), 1);
        assert_eq!((snap.bonds[0].begin, snap.bonds[0].end), (0, 1));
        assert_eq!(snap.sgroups[0].atoms, vec![1]);
        assert_eq!(snap.atoms[0].fragment, Some(FragmentId(0)));

        let again = Mol::from_snapshot(&snap).unwrap();
        assert_eq!(again.to_snapshot(), snap);
    }
}

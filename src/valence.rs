use crate::bond::BondOrder;
use crate::mol::{AtomId, Mol};

/// Allowed valences for an element label, lowest first. Empty for labels
/// that get no implicit hydrogens (metals, pseudo-atoms, R-group labels).
pub fn default_valences(label: &str) -> &'static [u8] {
    match label {
        "H" => &[1],
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "F" | "Cl" | "Br" | "At" => &[1],
        "Si" | "Ge" => &[4],
        "P" | "As" => &[3, 5],
        "S" | "Se" | "Te" => &[2, 4, 6],
        "I" => &[1, 3, 5, 7],
        _ => &[],
    }
}

/// Sum of bond valences around an atom.
///
/// Each aromatic bond counts one, plus one extra if the atom has any
/// aromatic bond at all.
pub fn bond_valence(mol: &Mol, atom: AtomId) -> u8 {
    let mut aromatic = false;
    let sum: u8 = mol
        .bonds_of(atom)
        .filter_map(|b| mol.bond(b))
        .map(|bond| {
            aromatic |= bond.order == BondOrder::Aromatic;
            bond.order.valence()
        })
        .fold(0u8, u8::saturating_add);
    sum.saturating_add(aromatic as u8)
}

/// Implicit hydrogen count for an atom; zero for missing atoms.
///
/// The target valence is the smallest default valence (shifted by the formal
/// charge) that covers the bond valence, or the explicit valence when one is
/// set. Boron-group and carbon-group elements lose a valence per unit of
/// charge either sign; everything else gains one per positive unit.
pub fn implicit_hydrogens(mol: &Mol, atom: AtomId) -> u8 {
    let Some(record) = mol.atom(atom) else {
        return 0;
    };
    let used = i16::from(bond_valence(mol, atom));
    if let Some(explicit) = record.explicit_valence {
        return (i16::from(explicit) - used).max(0) as u8;
    }
    let charge = i16::from(record.charge);
    let shift = match record.label.as_str() {
        "B" | "C" | "Si" | "Ge" => -charge.abs(),
        _ => charge,
    };
    default_valences(&record.label)
        .iter()
        .map(|&v| i16::from(v) + shift)
        .find(|&target| target >= used)
        .map_or(0, |target| (target - used) as u8)
}

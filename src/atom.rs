use serde::{Deserialize, Serialize};

use crate::mol::FragmentId;

/// Which side of a reaction scheme an atom was drawn on.
///
/// Connected components inherit this tag from their atoms; see
/// [`Component::fragment_type`](crate::components::Component::fragment_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionRole {
    Reactant,
    Product,
    Agent,
}

/// Atom record held by the graph store.
///
/// Only the editable, drawn properties live here. Everything derived from
/// the graph (component membership, rotation order, implicit hydrogens) is
/// owned by the [`Scene`](crate::view::Scene) and recomputed by
/// [`StructView::update`](crate::view::StructView::update).
///
/// # Examples
///
/// ```
/// use restruct::Atom;
///
/// let oxygen = Atom::new("O", [1.0, 0.5]);
/// assert_eq!(oxygen.label, "O");
/// assert_eq!(oxygen.charge, 0);
/// assert!(oxygen.fragment.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Atom {
    /// Element symbol, or a pseudo label (`R#`, `A`, `*`) that carries no valence.
    pub label: String,
    /// 2D drawing coordinates, y axis pointing up.
    pub position: [f64; 2],
    /// Formal charge in elementary charge units.
    pub charge: i8,
    /// Mass number. `0` means natural abundance.
    pub isotope: u16,
    /// User-forced valence; overrides the element defaults when counting hydrogens.
    pub explicit_valence: Option<u8>,
    /// Rendering fragment this atom is drawn in.
    pub fragment: Option<FragmentId>,
    /// Reaction-scheme marker. `None` is the default, unmarked state.
    pub rxn_role: Option<ReactionRole>,
}

impl Atom {
    pub fn new(label: impl Into<String>, position: [f64; 2]) -> Self {
        Self {
            label: label.into(),
            position,
            ..Self::default()
        }
    }

    pub fn with_fragment(mut self, fragment: FragmentId) -> Self {
        self.fragment = Some(fragment);
        self
    }

    pub fn with_role(mut self, role: ReactionRole) -> Self {
        self.rxn_role = Some(role);
        self
    }
}

impl Default for Atom {
    fn default() -> Self {
        Self {
            label: "C".to_string(),
            position: [0.0, 0.0],
            charge: 0,
            isotope: 0,
            explicit_valence: None,
            fragment: None,
            rxn_role: None,
        }
    }
}

use thiserror::Error;

/// Structural consistency violations rejected by the graph store.
///
/// Only ingestion and explicit structural edits can fail. The update cycle
/// itself never returns an error: stale ids are skipped, invalid rings are
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A bond, s-group or edit referenced an atom that does not exist.
    #[error("atom {0} does not exist")]
    MissingAtom(usize),
    /// An atom or r-group referenced a fragment that does not exist.
    #[error("fragment {0} does not exist")]
    MissingFragment(u32),
    /// A bond would join an atom to itself.
    #[error("bond would join atom {0} to itself")]
    SelfBond(usize),
    /// The two atoms are already joined by a bond.
    #[error("atoms {0} and {1} are already bonded")]
    DuplicateBond(usize, usize),
}

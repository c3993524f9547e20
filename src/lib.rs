pub mod atom;
pub mod bond;
pub mod components;
pub mod config;
pub mod error;
pub mod geometry;
pub mod half_bond;
pub mod item;
pub mod loops;
pub mod marks;
pub mod mol;
pub mod painter;
pub mod snapshot;
pub mod sssr;
pub mod valence;
pub mod view;

pub use atom::{Atom, ReactionRole};
pub use bond::{Bond, BondOrder, BondStereo};
pub use components::{Component, ComponentId, ComponentTracker};
pub use config::ViewConfig;
pub use error::GraphError;
pub use geometry::{BBox, Point};
pub use half_bond::{HalfBond, HalfBondId, HalfBondIndex, LoopMark};
pub use item::{EntityKind, ItemId, Selection};
pub use loops::{LoopEngine, Ring, RingId};
pub use marks::{DirtyMarks, Severity};
pub use mol::{
    AtomId, BondId, Fragment, FragmentId, Mol, RGroup, RxnArrow, RxnPlus, SGroup, SGroupId,
    SGroupKind,
};
pub use painter::{NullPainter, PaintEvent, Painter, Recorder};
pub use snapshot::{SnapshotBond, SnapshotSGroup, StructSnapshot};
pub use sssr::RingInfo;
pub use view::{CycleSummary, Scene, StructView};

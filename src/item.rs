use std::collections::BTreeSet;

use crate::loops::RingId;
use crate::mol::{AtomId, BondId, FragmentId, SGroupId};

/// Every kind of entity the view tracks marks and visuals for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Atom,
    Bond,
    RxnArrow,
    RxnPlus,
    Fragment,
    RGroup,
    ChiralFlag,
    SGroup,
    Ring,
}

impl EntityKind {
    /// Every kind, in the order the view redraws them.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Atom,
        EntityKind::Bond,
        EntityKind::Ring,
        EntityKind::RxnArrow,
        EntityKind::RxnPlus,
        EntityKind::SGroup,
        EntityKind::Fragment,
        EntityKind::RGroup,
        EntityKind::ChiralFlag,
    ];

    /// Whether an editing tool can pick entities of this kind.
    pub fn is_selectable(self) -> bool {
        matches!(
            self,
            EntityKind::Atom
                | EntityKind::Bond
                | EntityKind::RxnArrow
                | EntityKind::RxnPlus
                | EntityKind::ChiralFlag
        )
    }
}

/// Id of one tracked entity, tagged with its kind.
///
/// Ordering groups ids by kind first, so a `BTreeSet<ItemId>` iterates one
/// kind at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemId {
    Atom(AtomId),
    Bond(BondId),
    RxnArrow(u32),
    RxnPlus(u32),
    Fragment(FragmentId),
    RGroup(u32),
    ChiralFlag,
    SGroup(SGroupId),
    Ring(RingId),
}

impl ItemId {
    pub fn kind(self) -> EntityKind {
        match self {
            ItemId::Atom(_) => EntityKind::Atom,
            ItemId::Bond(_) => EntityKind::Bond,
            ItemId::RxnArrow(_) => EntityKind::RxnArrow,
            ItemId::RxnPlus(_) => EntityKind::RxnPlus,
            ItemId::Fragment(_) => EntityKind::Fragment,
            ItemId::RGroup(_) => EntityKind::RGroup,
            ItemId::ChiralFlag => EntityKind::ChiralFlag,
            ItemId::SGroup(_) => EntityKind::SGroup,
            ItemId::Ring(_) => EntityKind::Ring,
        }
    }
}

impl From<AtomId> for ItemId {
    fn from(idx: AtomId) -> Self {
        ItemId::Atom(idx)
    }
}

impl From<BondId> for ItemId {
    fn from(idx: BondId) -> Self {
        ItemId::Bond(idx)
    }
}

impl From<RingId> for ItemId {
    fn from(id: RingId) -> Self {
        ItemId::Ring(id)
    }
}

/// A subset of entities, e.g. what an editing tool has picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: BTreeSet<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: impl Into<ItemId>) -> bool {
        self.items.insert(item.into())
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = ItemId> + '_ {
        self.iter().filter(move |item| item.kind() == kind)
    }
}

impl FromIterator<ItemId> for Selection {
    fn from_iter<I: IntoIterator<Item = ItemId>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

//! The rendering collaborator.
//!
//! The update cycle never draws anything itself. It tells a [`Painter`] which
//! visuals went stale and which entities to draw again, in a fixed order:
//! every discard of a cycle comes before its first draw.

use crate::item::ItemId;
use crate::view::Scene;

pub trait Painter {
    /// Drop whatever visual is cached for `item`. Called for removed
    /// entities too, so the item may no longer be in the scene.
    fn discard(&mut self, item: ItemId);

    /// Draw `item` from the current derived state.
    fn draw(&mut self, item: ItemId, scene: &Scene);
}

impl<P: Painter + ?Sized> Painter for &mut P {
    fn discard(&mut self, item: ItemId) {
        (**self).discard(item);
    }

    fn draw(&mut self, item: ItemId, scene: &Scene) {
        (**self).draw(item, scene);
    }
}

/// Painter for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPainter;

impl Painter for NullPainter {
    fn discard(&mut self, _item: ItemId) {}

    fn draw(&mut self, _item: ItemId, _scene: &Scene) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintEvent {
    Discard(ItemId),
    Draw(ItemId),
}

/// Records every call, for hosts that batch redraws and for tests.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Vec<PaintEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[PaintEvent] {
        &self.events
    }

    /// Returns the events recorded so far and starts over.
    pub fn take(&mut self) -> Vec<PaintEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drawn(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.events.iter().filter_map(|e| match *e {
            PaintEvent::Draw(item) => Some(item),
            PaintEvent::Discard(_) => None,
        })
    }

    pub fn discarded(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.events.iter().filter_map(|e| match *e {
            PaintEvent::Discard(item) => Some(item),
            PaintEvent::Draw(_) => None,
        })
    }
}

impl Painter for Recorder {
    fn discard(&mut self, item: ItemId) {
        self.events.push(PaintEvent::Discard(item));
    }

    fn draw(&mut self, item: ItemId, _scene: &Scene) {
        self.events.push(PaintEvent::Draw(item));
    }
}

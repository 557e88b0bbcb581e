use std::collections::HashMap;

use super::types::{PointerEvent, PointerId};

/// Last known sample of every active pointer.
///
/// The number of entries selects the gesture: 0 idle, 1 pan, 2 pinch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerMap {
    active: HashMap<PointerId, PointerEvent>,
}

impl PointerMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[inline]
    pub fn get(&self, id: PointerId) -> Option<&PointerEvent> {
        self.active.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: PointerId) -> bool {
        self.active.contains_key(&id)
    }

    /// Records `ev` as the latest sample of its pointer, returning the previous one.
    pub fn record(&mut self, ev: PointerEvent) -> Option<PointerEvent> {
        self.active.insert(ev.id, ev)
    }

    pub fn release(&mut self, id: PointerId) -> Option<PointerEvent> {
        self.active.remove(&id)
    }

    /// Any active pointer other than `id`.
    ///
    /// With exactly two active pointers this is the pinch anchor.
    pub fn other_than(&self, id: PointerId) -> Option<&PointerEvent> {
        self.active.values().find(|e| e.id != id)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

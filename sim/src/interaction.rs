//! Per-entity interaction buffers.
//!
//! An [`Interactions`] buffer lives on the entity that *raises* interactions
//! (an item, an attack, an enemy body). Producers append records during the
//! produce phase; consumers in later phases scan for unhandled records whose
//! target matches their own predicate. Buffers are cleared at the start of
//! every produce phase, so no record outlives the frame that raised it.
//!
//! Keeping one buffer per source entity means parallel producers touching
//! different sources never contend.

use bevy_ecs::prelude::*;

/// One buffered contact between the owning entity and `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionRecord {
    pub target: Entity,
    pub handled: bool,
}

/// Whether a raise checks for an existing unhandled record first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    /// Skip the append if an unhandled record for the same target exists.
    Unique,
    /// Always append. Used by effects that retrigger on every contact.
    Repeat,
}

/// Ordered log of interactions raised by this entity in the current frame.
#[derive(Component, Debug, Clone, Default)]
pub struct Interactions {
    records: Vec<InteractionRecord>,
}

impl Interactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unhandled record. Returns false when deduplication dropped it.
    pub fn raise(&mut self, target: Entity, dedup: Dedup) -> bool {
        if dedup == Dedup::Unique && self.has_unhandled(target) {
            return false;
        }
        self.records.push(InteractionRecord {
            target,
            handled: false,
        });
        true
    }

    pub fn has_unhandled(&self, target: Entity) -> bool {
        self.records
            .iter()
            .any(|r| !r.handled && r.target == target)
    }

    /// Set the handled bit. The record stays in place so sibling consumers
    /// iterating by index are unaffected.
    pub fn mark_handled(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.handled = true;
        }
    }

    /// `(index, target)` of every unhandled record, in raise order.
    ///
    /// Collected eagerly so callers can mark records while walking the list.
    pub fn unhandled(&self) -> Vec<(usize, Entity)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.handled)
            .map(|(i, r)| (i, r.target))
            .collect()
    }

    pub fn records(&self) -> &[InteractionRecord] {
        &self.records
    }

    /// Drop every record from `index` onwards.
    pub fn discard_from(&mut self, index: usize) {
        self.records.truncate(index);
    }

    /// Remove a single record. Only valid before any sibling consumer of the
    /// current phase has started iterating.
    pub fn remove(&mut self, index: usize) {
        if index < self.records.len() {
            self.records.remove(index);
        }
    }

    /// Empty the buffer, keeping its capacity.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Clears every buffer at the start of the produce phase.
pub fn drain_interactions_system(mut query: Query<&mut Interactions>) {
    for mut buffer in query.iter_mut() {
        if !buffer.is_empty() {
            buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(n: u32) -> Entity {
        Entity::from_raw(n)
    }

    #[test]
    fn test_unique_raise_skips_duplicate_unhandled_target() {
        let mut buffer = Interactions::new();
        assert!(buffer.raise(entity(1), Dedup::Unique));
        assert!(!buffer.raise(entity(1), Dedup::Unique));
        assert!(buffer.raise(entity(2), Dedup::Unique));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_unique_raise_allowed_after_handled() {
        let mut buffer = Interactions::new();
        buffer.raise(entity(1), Dedup::Unique);
        buffer.mark_handled(0);
        assert!(buffer.raise(entity(1), Dedup::Unique));
        assert_eq!(buffer.unhandled(), vec![(1, entity(1))]);
    }

    #[test]
    fn test_repeat_raise_always_appends() {
        let mut buffer = Interactions::new();
        for _ in 0..3 {
            assert!(buffer.raise(entity(7), Dedup::Repeat));
        }
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_mark_handled_keeps_indices_stable() {
        let mut buffer = Interactions::new();
        buffer.raise(entity(1), Dedup::Repeat);
        buffer.raise(entity(2), Dedup::Repeat);
        buffer.raise(entity(3), Dedup::Repeat);
        buffer.mark_handled(1);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.records()[2].target, entity(3));
        assert_eq!(buffer.unhandled(), vec![(0, entity(1)), (2, entity(3))]);
    }

    #[test]
    fn test_drain_system_empties_buffers() {
        let mut world = World::new();
        let mut buffer = Interactions::new();
        buffer.raise(entity(9), Dedup::Repeat);
        let source = world.spawn(buffer).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(drain_interactions_system);
        schedule.run(&mut world);

        assert!(world.get::<Interactions>(source).unwrap().is_empty());
    }
}

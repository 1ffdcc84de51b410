//! Per-run singleton state.
//!
//! Each aggregate here has exactly one writer system per frame.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::ExperienceCurve;
use crate::upgrades::Reward;

/// Incremented every time a new run starts. Cached derived data tagged with
/// an older index is stale.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIndex(pub u64);

/// Run-wide counters.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub enemies_defeated: u32,
    pub coins: u32,
}

/// Latched once the game-over marker has been observed.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct RunState {
    pub game_over: bool,
}

/// Player experience and level.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub experience: u32,
    pub level: u32,
    /// Experience collected towards the next level.
    pub into_level: u32,
    /// Level-ups earned but not yet announced.
    pub pending_level_ups: u32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            experience: 0,
            level: 1,
            into_level: 0,
            pending_level_ups: 0,
        }
    }
}

impl Progression {
    /// Add experience; may earn several levels at once.
    pub fn add_experience(&mut self, amount: u32, curve: &ExperienceCurve) {
        self.experience = self.experience.saturating_add(amount);
        self.into_level = self.into_level.saturating_add(amount);
        loop {
            let required = curve.required_for(self.level + self.pending_level_ups);
            if self.into_level < required {
                break;
            }
            self.into_level -= required;
            self.pending_level_ups += 1;
        }
    }

    /// Announce one pending level-up. Returns the new level.
    pub fn take_level_up(&mut self) -> Option<u32> {
        if self.pending_level_ups == 0 {
            return None;
        }
        self.pending_level_ups -= 1;
        self.level += 1;
        Some(self.level)
    }
}

/// Upgrade choice sets waiting for the player, oldest first.
#[derive(Resource, Debug, Clone, Default)]
pub struct PendingUpgradeOffers(pub VecDeque<Vec<Reward>>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_level_ups_from_one_pickup() {
        let curve = ExperienceCurve { base: 5, growth: 5 };
        let mut progression = Progression::default();
        // Level 1 needs 5, level 2 needs 10.
        progression.add_experience(16, &curve);
        assert_eq!(progression.pending_level_ups, 2);
        assert_eq!(progression.into_level, 1);

        assert_eq!(progression.take_level_up(), Some(2));
        assert_eq!(progression.take_level_up(), Some(3));
        assert_eq!(progression.take_level_up(), None);
        assert_eq!(progression.experience, 16);
    }
}

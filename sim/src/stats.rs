//! Character stat model.
//!
//! A character owns an ordered list of modifier entities ([`ActiveModifiers`]).
//! Each modifier entity carries a [`StatModifier`] with a list of
//! [`StatDelta`]s. The effective values in [`CharacterStats`] are rebuilt from
//! scratch whenever the owner's `NeedsStatRecalc` flag is enabled:
//!
//! 1. every stat starts at its default (0 for additive, 1 for multiplicative)
//! 2. deltas are folded in list order using the stat's combination rule
//! 3. each aggregate is clamped to the configured range

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// How a stat folds its deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    Add,
    Multiply,
}

/// Every stat a modifier can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatKind {
    /// Multiplier on base movement speed.
    MoveSpeed,
    /// Multiplier on outgoing attack damage.
    DamageDealt,
    /// Multiplier on incoming damage.
    DamageReceived,
    /// Multiplier on weapon cooldowns.
    CooldownMultiplier,
    /// Multiplier on attack area.
    AttackArea,
    /// Multiplier on pickup radius.
    PickupRadius,
    /// Extra projectiles per attack.
    ProjectileCount,
    /// Flat damage reduction per hit.
    Armor,
    /// Hit points regenerated per second.
    Regeneration,
}

impl StatKind {
    pub const COUNT: usize = 9;

    pub const ALL: [StatKind; StatKind::COUNT] = [
        StatKind::MoveSpeed,
        StatKind::DamageDealt,
        StatKind::DamageReceived,
        StatKind::CooldownMultiplier,
        StatKind::AttackArea,
        StatKind::PickupRadius,
        StatKind::ProjectileCount,
        StatKind::Armor,
        StatKind::Regeneration,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn combine(self) -> Combine {
        match self {
            StatKind::MoveSpeed
            | StatKind::DamageDealt
            | StatKind::DamageReceived
            | StatKind::CooldownMultiplier
            | StatKind::AttackArea
            | StatKind::PickupRadius => Combine::Multiply,
            StatKind::ProjectileCount | StatKind::Armor | StatKind::Regeneration => Combine::Add,
        }
    }

    pub fn default_value(self) -> f32 {
        match self.combine() {
            Combine::Add => 0.0,
            Combine::Multiply => 1.0,
        }
    }
}

/// One named change to one stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatDelta {
    pub kind: StatKind,
    pub value: f32,
}

impl StatDelta {
    pub fn new(kind: StatKind, value: f32) -> Self {
        Self { kind, value }
    }
}

/// Inclusive clamp range of an aggregated stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatRange {
    pub min: f32,
    pub max: f32,
}

impl StatRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Per-stat clamp ranges. Stats without an entry are unclamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatLimits(pub BTreeMap<StatKind, StatRange>);

impl Default for StatLimits {
    fn default() -> Self {
        let ranges = [
            (StatKind::MoveSpeed, StatRange::new(0.1, 5.0)),
            (StatKind::DamageDealt, StatRange::new(0.0, 10.0)),
            (StatKind::DamageReceived, StatRange::new(0.1, 5.0)),
            (StatKind::CooldownMultiplier, StatRange::new(0.1, 5.0)),
            (StatKind::AttackArea, StatRange::new(0.1, 10.0)),
            (StatKind::PickupRadius, StatRange::new(0.1, 10.0)),
            (StatKind::ProjectileCount, StatRange::new(0.0, 20.0)),
            (StatKind::Armor, StatRange::new(0.0, 100.0)),
            (StatKind::Regeneration, StatRange::new(0.0, 100.0)),
        ];
        Self(ranges.into_iter().collect())
    }
}

impl StatLimits {
    /// Clamp `value` into the range for `kind`. An inverted range collapses
    /// to its `max`; it never panics.
    pub fn clamp(&self, kind: StatKind, value: f32) -> f32 {
        match self.0.get(&kind) {
            Some(range) => value.max(range.min).min(range.max),
            None => value,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, range) in &self.0 {
            if range.min > range.max || range.min.is_nan() || range.max.is_nan() {
                return Err(ConfigError::InvalidStatRange {
                    kind: *kind,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// COMPONENTS
// ============================================================================

/// A bundle of stat deltas applied to `owner`.
///
/// Lives on its own entity. Permanent modifiers come from upgrades; temporary
/// ones carry a `TimeToLive` and are destroyed when it runs out.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct StatModifier {
    pub owner: Entity,
    pub deltas: Vec<StatDelta>,
}

impl StatModifier {
    pub fn new(owner: Entity, deltas: Vec<StatDelta>) -> Self {
        Self { owner, deltas }
    }

    /// Swap in a new level's deltas. Levels supersede each other, they do
    /// not stack.
    pub fn replace_deltas(&mut self, deltas: &[StatDelta]) {
        self.deltas.clear();
        self.deltas.extend_from_slice(deltas);
    }
}

/// Modifier entities currently applied to a character, in fold order.
#[derive(Component, Debug, Clone, Default)]
pub struct ActiveModifiers(pub Vec<Entity>);

/// Aggregated effective stats. Read-only between recalculations.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CharacterStats {
    values: [f32; StatKind::COUNT],
}

impl Default for CharacterStats {
    fn default() -> Self {
        let mut values = [0.0; StatKind::COUNT];
        for kind in StatKind::ALL {
            values[kind.index()] = kind.default_value();
        }
        Self { values }
    }
}

impl CharacterStats {
    #[inline]
    pub fn get(&self, kind: StatKind) -> f32 {
        self.values[kind.index()]
    }

    /// Fold `deltas` over the defaults and clamp.
    pub fn fold<'a>(deltas: impl IntoIterator<Item = &'a StatDelta>, limits: &StatLimits) -> Self {
        let mut stats = Self::default();
        for delta in deltas {
            let slot = &mut stats.values[delta.kind.index()];
            match delta.kind.combine() {
                Combine::Add => *slot += delta.value,
                Combine::Multiply => *slot *= delta.value,
            }
        }
        for kind in StatKind::ALL {
            let slot = &mut stats.values[kind.index()];
            *slot = limits.clamp(kind, *slot);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_combination_rule() {
        let stats = CharacterStats::default();
        assert_eq!(stats.get(StatKind::MoveSpeed), 1.0);
        assert_eq!(stats.get(StatKind::Armor), 0.0);
    }

    #[test]
    fn test_percentage_move_speed_halves() {
        let deltas = [StatDelta::new(StatKind::MoveSpeed, 0.5)];
        let stats = CharacterStats::fold(deltas.iter(), &StatLimits::default());
        assert!((stats.get(StatKind::MoveSpeed) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_fold_and_clamp() {
        let deltas = [
            StatDelta::new(StatKind::Armor, 2.0),
            StatDelta::new(StatKind::Armor, 3.0),
            StatDelta::new(StatKind::DamageDealt, 1.5),
            StatDelta::new(StatKind::DamageDealt, 2.0),
            StatDelta::new(StatKind::MoveSpeed, 100.0),
        ];
        let stats = CharacterStats::fold(deltas.iter(), &StatLimits::default());
        assert_eq!(stats.get(StatKind::Armor), 5.0);
        assert!((stats.get(StatKind::DamageDealt) - 3.0).abs() < 1e-6);
        assert_eq!(stats.get(StatKind::MoveSpeed), 5.0);
    }

    #[test]
    fn test_fold_is_deterministic() {
        let deltas = vec![
            StatDelta::new(StatKind::CooldownMultiplier, 0.9),
            StatDelta::new(StatKind::ProjectileCount, 1.0),
            StatDelta::new(StatKind::CooldownMultiplier, 0.8),
        ];
        let limits = StatLimits::default();
        let first = CharacterStats::fold(deltas.iter(), &limits);
        for _ in 0..10 {
            assert_eq!(CharacterStats::fold(deltas.iter(), &limits), first);
        }
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut limits = StatLimits::default();
        limits.0.insert(StatKind::Armor, StatRange::new(5.0, 1.0));
        assert!(matches!(
            limits.validate(),
            Err(ConfigError::InvalidStatRange { kind: StatKind::Armor, .. })
        ));
    }

    #[test]
    fn test_inverted_range_clamps_without_panic() {
        let mut limits = StatLimits::default();
        limits.0.insert(StatKind::Armor, StatRange::new(5.0, 1.0));
        assert_eq!(limits.clamp(StatKind::Armor, 3.0), 1.0);
        assert_eq!(limits.clamp(StatKind::Armor, 0.0), 1.0);
    }

    #[test]
    fn test_replace_deltas_supersedes() {
        let mut modifier = StatModifier::new(
            Entity::from_raw(1),
            vec![StatDelta::new(StatKind::Armor, 1.0)],
        );
        modifier.replace_deltas(&[StatDelta::new(StatKind::Armor, 3.0)]);
        assert_eq!(modifier.deltas, vec![StatDelta::new(StatKind::Armor, 3.0)]);
    }
}

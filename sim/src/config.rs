//! Tunable game configuration.
//!
//! Loaded from JSON with every field optional; missing fields fall back to
//! the defaults below.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stats::StatLimits;

/// Experience required to leave `level`: `base + growth * (level - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperienceCurve {
    pub base: u32,
    pub growth: u32,
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        Self { base: 5, growth: 10 }
    }
}

impl ExperienceCurve {
    pub fn required_for(&self, level: u32) -> u32 {
        self.base
            .saturating_add(self.growth.saturating_mul(level.saturating_sub(1)))
            .max(1)
    }
}

/// Configuration for the gameplay core.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Fixed timestep in seconds (e.g., 1/60 for 60 Hz).
    pub fixed_timestep: f32,
    /// Seed for the run RNG. Mixed with the run index at each run start.
    pub rng_seed: u64,
    /// Damage immunity window opened on the player after taking damage.
    pub invincibility_duration: f32,
    /// Lifetime of a dissolving destruction visual.
    pub dissolve_duration: f32,
    /// Random draws per upgrade slot before falling back to a bonus reward.
    pub upgrade_retry_budget: u32,
    /// Number of upgrade choices offered on level up.
    pub upgrade_choice_slots: usize,
    /// Coins granted by the bonus fallback reward.
    pub bonus_coins: u32,
    /// Hit points restored by the bonus fallback reward.
    pub bonus_heal: i32,
    pub experience_curve: ExperienceCurve,
    pub stat_limits: StatLimits,
    /// Generate contact events from overlapping circle colliders.
    pub builtin_contacts: bool,
    /// Cell size of the built-in contact grid.
    pub spatial_cell_size: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            rng_seed: 0x5eed,
            invincibility_duration: 0.5,
            dissolve_duration: 0.6,
            upgrade_retry_budget: 500,
            upgrade_choice_slots: 3,
            bonus_coins: 25,
            bonus_heal: 30,
            experience_curve: ExperienceCurve::default(),
            stat_limits: StatLimits::default(),
            builtin_contacts: true,
            spatial_cell_size: 4.0,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(data).map_err(|source| ConfigError::Parse {
            what: "game config",
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep > 0.0) {
            return Err(ConfigError::InvalidTimestep(self.fixed_timestep));
        }
        self.stat_limits.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{StatKind, StatRange};

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json_str(r#"{ "upgrade_retry_budget": 64 }"#).unwrap();
        assert_eq!(config.upgrade_retry_budget, 64);
        assert_eq!(config.upgrade_choice_slots, 3);
    }

    #[test]
    fn test_stat_limits_from_json() {
        let config = GameConfig::from_json_str(
            r#"{ "stat_limits": { "MoveSpeed": { "min": 0.5, "max": 2.0 } } }"#,
        )
        .unwrap();
        assert_eq!(
            config.stat_limits.0.get(&StatKind::MoveSpeed),
            Some(&StatRange::new(0.5, 2.0))
        );
    }

    #[test]
    fn test_rejects_bad_timestep() {
        let err = GameConfig::from_json_str(r#"{ "fixed_timestep": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimestep(_)));
    }

    #[test]
    fn test_rejects_unknown_stat_name() {
        let err = GameConfig::from_json_str(
            r#"{ "stat_limits": { "Charisma": { "min": 0.0, "max": 1.0 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_experience_curve() {
        let curve = ExperienceCurve { base: 5, growth: 10 };
        assert_eq!(curve.required_for(1), 5);
        assert_eq!(curve.required_for(3), 25);
    }
}

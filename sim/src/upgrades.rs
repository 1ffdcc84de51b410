//! Passive upgrades and reward selection.
//!
//! An upgrade is a list of levels, each an authored set of stat deltas. The
//! first level spawns a permanent modifier entity for the owner; every later
//! level overwrites that entity's deltas in place.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::components::{DamageQueue, DestructibleBundle, Enableable, NeedsStatRecalc};
use crate::config::GameConfig;
use crate::error::ConfigError;
use crate::events::GameEvent;
use crate::run::RunStats;
use crate::stats::{ActiveModifiers, StatDelta, StatModifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpgradeId(pub u32);

/// Authored upgrade definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: UpgradeId,
    pub name: String,
    /// `levels[0]` is granted first. Levels do not stack.
    pub levels: Vec<Vec<StatDelta>>,
}

impl UpgradeDef {
    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn deltas_for(&self, level: u32) -> Option<&[StatDelta]> {
        let index = (level as usize).checked_sub(1)?;
        self.levels.get(index).map(Vec::as_slice)
    }
}

/// Every upgrade that can be offered this run.
#[derive(Resource, Debug, Clone, Default)]
pub struct UpgradeCatalog {
    upgrades: Vec<UpgradeDef>,
}

impl UpgradeCatalog {
    pub fn new(upgrades: Vec<UpgradeDef>) -> Result<Self, ConfigError> {
        for def in &upgrades {
            if def.levels.is_empty() {
                return Err(ConfigError::EmptyUpgrade(def.id));
            }
        }
        Ok(Self { upgrades })
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let upgrades: Vec<UpgradeDef> =
            serde_json::from_str(data).map_err(|source| ConfigError::Parse {
                what: "upgrade catalog",
                source,
            })?;
        Self::new(upgrades)
    }

    pub fn get(&self, id: UpgradeId) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }
}

/// One upgrade held by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedUpgrade {
    pub id: UpgradeId,
    pub level: u32,
    /// The modifier entity carrying this upgrade's current deltas.
    pub modifier: Entity,
}

/// Upgrades held by a character.
#[derive(Component, Debug, Clone, Default)]
pub struct OwnedUpgrades(pub Vec<OwnedUpgrade>);

impl OwnedUpgrades {
    pub fn get(&self, id: UpgradeId) -> Option<&OwnedUpgrade> {
        self.0.iter().find(|o| o.id == id)
    }

    pub fn level_of(&self, id: UpgradeId) -> u32 {
        self.get(id).map(|o| o.level).unwrap_or(0)
    }
}

/// Consolation reward when no upgrade could be found for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonusReward {
    Coins(u32),
    Heal(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reward {
    /// Take `id` to `level`.
    Upgrade { id: UpgradeId, level: u32 },
    Bonus(BonusReward),
}

/// Parameters for [`pick_rewards`].
#[derive(Debug, Clone, Copy)]
pub struct RewardRoll {
    pub slots: usize,
    pub retry_budget: u32,
    pub bonus_coins: u32,
    pub bonus_heal: i32,
}

impl RewardRoll {
    pub fn from_config(config: &GameConfig, slots: usize) -> Self {
        Self {
            slots,
            retry_budget: config.upgrade_retry_budget,
            bonus_coins: config.bonus_coins,
            bonus_heal: config.bonus_heal,
        }
    }
}

/// Fill `slots` reward slots with distinct, non-maxed upgrades.
///
/// Each slot gets at most `retry_budget` random draws. A slot that exhausts
/// its budget becomes a bonus reward instead.
pub fn pick_rewards<R: Rng>(
    catalog: &UpgradeCatalog,
    owned: Option<&OwnedUpgrades>,
    roll: RewardRoll,
    rng: &mut R,
) -> Vec<Reward> {
    let mut rewards = Vec::with_capacity(roll.slots);

    for slot in 0..roll.slots {
        let mut picked = None;
        if !catalog.is_empty() {
            for _ in 0..roll.retry_budget {
                let def = &catalog.upgrades[rng.random_range(0..catalog.len())];
                let already_offered = rewards
                    .iter()
                    .any(|r| matches!(r, Reward::Upgrade { id, .. } if *id == def.id));
                if already_offered {
                    continue;
                }
                let current = owned.map(|o| o.level_of(def.id)).unwrap_or(0);
                if current >= def.max_level() {
                    continue;
                }
                picked = Some(Reward::Upgrade {
                    id: def.id,
                    level: current + 1,
                });
                break;
            }
        }

        match picked {
            Some(reward) => rewards.push(reward),
            None => {
                warn!(slot, retry_budget = roll.retry_budget, "no upgrade available, offering bonus");
                let bonus = if rng.random_bool(0.5) {
                    BonusReward::Coins(roll.bonus_coins)
                } else {
                    BonusReward::Heal(roll.bonus_heal)
                };
                rewards.push(Reward::Bonus(bonus));
            }
        }
    }

    rewards
}

/// Apply a reward to `owner`. Structural: call only from a commit point or
/// from outside the frame schedule.
pub fn grant_reward(world: &mut World, owner: Entity, reward: &Reward) -> Result<(), ConfigError> {
    match *reward {
        Reward::Upgrade { id, .. } => grant_upgrade(world, owner, id),
        Reward::Bonus(BonusReward::Coins(amount)) => {
            let total = {
                let mut stats = world.resource_mut::<RunStats>();
                stats.coins = stats.coins.saturating_add(amount);
                stats.coins
            };
            world.send_event(GameEvent::CoinCollected { amount, total });
            Ok(())
        }
        Reward::Bonus(BonusReward::Heal(amount)) => {
            if let Some(mut queue) = world.get_mut::<DamageQueue>(owner) {
                queue.push(amount);
            }
            Ok(())
        }
    }
}

/// Take `id` one level further on `owner`.
pub fn grant_upgrade(world: &mut World, owner: Entity, id: UpgradeId) -> Result<(), ConfigError> {
    let def = world
        .resource::<UpgradeCatalog>()
        .get(id)
        .cloned()
        .ok_or(ConfigError::UnknownUpgrade(id))?;

    if world.get::<ActiveModifiers>(owner).is_none() {
        debug!(?owner, ?id, "upgrade owner has no modifier list, skipping");
        return Ok(());
    }

    let existing = world
        .get::<OwnedUpgrades>(owner)
        .and_then(|owned| owned.get(id).copied());

    let level = match existing {
        Some(entry) => {
            let next = entry.level + 1;
            let Some(deltas) = def.deltas_for(next) else {
                warn!(?id, level = entry.level, "upgrade already at max level");
                return Ok(());
            };
            if let Some(mut modifier) = world.get_mut::<StatModifier>(entry.modifier) {
                modifier.replace_deltas(deltas);
            }
            if let Some(mut owned) = world.get_mut::<OwnedUpgrades>(owner) {
                if let Some(slot) = owned.0.iter_mut().find(|o| o.id == id) {
                    slot.level = next;
                }
            }
            next
        }
        None => {
            let deltas = def.deltas_for(1).ok_or(ConfigError::EmptyUpgrade(id))?.to_vec();
            let modifier = world
                .spawn((StatModifier::new(owner, deltas), DestructibleBundle::default()))
                .id();
            if let Some(mut active) = world.get_mut::<ActiveModifiers>(owner) {
                active.0.push(modifier);
            }
            if let Some(mut owned) = world.get_mut::<OwnedUpgrades>(owner) {
                owned.0.push(OwnedUpgrade {
                    id,
                    level: 1,
                    modifier,
                });
            }
            1
        }
    };

    if let Some(mut flag) = world.get_mut::<NeedsStatRecalc>(owner) {
        flag.enable();
    }
    info!(?owner, upgrade = %def.name, level, "upgrade granted");
    Ok(())
}

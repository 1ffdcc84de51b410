//! Item pickup consumers.
//!
//! Every item raises interactions against the player. Each consumer takes the
//! first unhandled player record on an item, applies the item's effect,
//! marks the record and sets the item's destroy-pending flag. An item whose
//! flag is already set has been collected and is skipped.

use crate::clock::GameRng;
use crate::commands::{BeginFrameCommands, DeferredOp};
use crate::components::*;
use crate::config::GameConfig;
use crate::events::GameEvent;
use crate::interaction::Interactions;
use crate::run::{Progression, RunStats};
use crate::upgrades::{pick_rewards, OwnedUpgrades, RewardRoll, UpgradeCatalog};
use bevy_ecs::prelude::*;

/// Players, by presence.
pub type PlayerFilter<'w, 's> = Query<'w, 's, (), With<PlayerTag>>;

/// Mark and return the first unhandled record that targets a player.
fn claim_player_record(buffer: &mut Interactions, players: &PlayerFilter) -> Option<Entity> {
    let (index, player) = buffer
        .unhandled()
        .into_iter()
        .find(|(_, target)| players.contains(*target))?;
    buffer.mark_handled(index);
    Some(player)
}

pub fn experience_gem_pickup_system(
    config: Res<GameConfig>,
    mut progression: ResMut<Progression>,
    mut gems: Query<(&ExperienceGemItem, &mut Interactions, &mut DestroyPending)>,
    players: PlayerFilter,
) {
    for (gem, mut buffer, mut pending) in gems.iter_mut() {
        if pending.is_enabled() {
            continue;
        }
        if claim_player_record(&mut buffer, &players).is_none() {
            continue;
        }
        progression.add_experience(gem.value, &config.experience_curve);
        pending.enable();
    }
}

pub fn coin_pickup_system(
    mut stats: ResMut<RunStats>,
    mut events: EventWriter<GameEvent>,
    mut coins: Query<(&CoinItem, &mut Interactions, &mut DestroyPending)>,
    players: PlayerFilter,
) {
    for (coin, mut buffer, mut pending) in coins.iter_mut() {
        if pending.is_enabled() {
            continue;
        }
        if claim_player_record(&mut buffer, &players).is_none() {
            continue;
        }
        stats.coins = stats.coins.saturating_add(coin.value);
        events.send(GameEvent::CoinCollected {
            amount: coin.value,
            total: stats.coins,
        });
        pending.enable();
    }
}

pub fn heal_pickup_system(
    mut items: Query<(&HealItem, &mut Interactions, &mut DestroyPending)>,
    players: PlayerFilter,
    mut queues: Query<&mut DamageQueue, With<PlayerTag>>,
) {
    for (heal, mut buffer, mut pending) in items.iter_mut() {
        if pending.is_enabled() {
            continue;
        }
        let Some(player) = claim_player_record(&mut buffer, &players) else {
            continue;
        };
        if let Ok(mut queue) = queues.get_mut(player) {
            queue.push(heal.amount);
        }
        pending.enable();
    }
}

/// Temporary boosts become modifier entities at the next begin commit.
pub fn stat_boost_pickup_system(
    mut commands: ResMut<BeginFrameCommands>,
    mut items: Query<(&StatBoostItem, &mut Interactions, &mut DestroyPending)>,
    players: PlayerFilter,
) {
    for (boost, mut buffer, mut pending) in items.iter_mut() {
        if pending.is_enabled() {
            continue;
        }
        let Some(player) = claim_player_record(&mut buffer, &players) else {
            continue;
        };
        commands.push(DeferredOp::SpawnStatModifier {
            owner: player,
            deltas: boost.deltas.clone(),
            lifetime: Some(boost.duration),
        });
        pending.enable();
    }
}

/// Crates roll one reward, announce it and grant it at the next begin commit.
pub fn crate_pickup_system(
    config: Res<GameConfig>,
    catalog: Res<UpgradeCatalog>,
    mut rng: ResMut<GameRng>,
    mut commands: ResMut<BeginFrameCommands>,
    mut events: EventWriter<GameEvent>,
    mut crates: Query<(&mut Interactions, &mut DestroyPending), With<CrateItem>>,
    players: PlayerFilter,
    owned: Query<&OwnedUpgrades, With<PlayerTag>>,
) {
    for (mut buffer, mut pending) in crates.iter_mut() {
        if pending.is_enabled() {
            continue;
        }
        let Some(player) = claim_player_record(&mut buffer, &players) else {
            continue;
        };
        let rewards = pick_rewards(
            &catalog,
            owned.get(player).ok(),
            RewardRoll::from_config(&config, 1),
            &mut rng.0,
        );
        for reward in rewards {
            events.send(GameEvent::CrateOpened { reward });
            commands.push(DeferredOp::GrantReward {
                owner: player,
                reward,
            });
        }
        pending.enable();
    }
}

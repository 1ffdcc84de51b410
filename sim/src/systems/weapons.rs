//! Weapons - periodic attack volleys shaped by the carrier's stats.
//!
//! A volley is recorded on the begin buffer and instantiated at the start of
//! the next frame, like every other spawn made during a frame.
//!
//! | Stat                 | Effect                                 |
//! |----------------------|----------------------------------------|
//! | `CooldownMultiplier` | scales the time until the next volley  |
//! | `ProjectileCount`    | extra copies per volley (whole points) |
//! | `AttackArea`         | spawn scale of each copy               |
//!
//! `DamageDealt` is applied later, when the fired attack deals damage.

use crate::clock::GameClock;
use crate::commands::{BeginFrameCommands, DeferredOp};
use crate::components::*;
use crate::stats::{CharacterStats, StatKind};
use bevy_ecs::prelude::*;

/// Positions of one volley: `count` points spread evenly on a ring.
pub fn volley_positions(center: &Position, reach: f32, count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Position::new(center.x + reach * angle.cos(), center.y + reach * angle.sin())
        })
        .collect()
}

/// Fires every ready weapon.
///
/// ## Data Access
/// - Reads: GameClock, Position, CharacterStats, DestroyPending
/// - Writes: Weapon (ready time), BeginFrameCommands
pub fn weapon_system(
    clock: Res<GameClock>,
    mut commands: ResMut<BeginFrameCommands>,
    mut carriers: Query<(
        Entity,
        &Position,
        &mut Weapon,
        Option<&CharacterStats>,
        Option<&DestroyPending>,
    )>,
) {
    for (owner, pos, mut weapon, stats, pending) in carriers.iter_mut() {
        if pending.is_some_and(|p| p.is_enabled()) || !clock.has_passed(weapon.ready_at) {
            continue;
        }

        let stat = |kind: StatKind| stats.map_or(kind.default_value(), |s| s.get(kind));
        let count = 1 + stat(StatKind::ProjectileCount).max(0.0).floor() as usize;
        let scale = stat(StatKind::AttackArea);

        for position in volley_positions(pos, weapon.reach, count) {
            commands.push(DeferredOp::SpawnAttack {
                prefab: weapon.attack,
                position,
                scale,
                owner,
                lifetime: weapon.lifetime,
            });
        }
        weapon.ready_at = clock.elapsed + weapon.cooldown * stat(StatKind::CooldownMultiplier);
    }
}

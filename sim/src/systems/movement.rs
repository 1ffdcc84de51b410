//! Movement system - steering and velocity integration.

use crate::clock::GameClock;
use crate::components::*;
use crate::stats::{CharacterStats, StatKind};
use bevy_ecs::prelude::*;

/// Desired movement direction of the player, written by the host's input
/// layer. Normalized on use.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    pub x: f32,
    pub y: f32,
}

/// System that turns player input into velocity.
pub fn player_input_system(
    input: Res<PlayerInput>,
    mut query: Query<(&MoveSpeed, &mut Velocity), With<PlayerTag>>,
) {
    let dir = Velocity::new(input.x, input.y).normalized();
    for (speed, mut vel) in query.iter_mut() {
        vel.vx = dir.vx * speed.0;
        vel.vy = dir.vy * speed.0;
    }
}

/// System that steers chasing enemies straight at the player.
pub fn chase_player_system(
    players: Query<&Position, With<PlayerTag>>,
    mut chasers: Query<(&Position, &MoveSpeed, &mut Velocity), (With<ChasePlayer>, Without<PlayerTag>)>,
) {
    let Some(target) = players.iter().next() else {
        for (_, _, mut vel) in chasers.iter_mut() {
            vel.vx = 0.0;
            vel.vy = 0.0;
        }
        return;
    };

    for (pos, speed, mut vel) in chasers.iter_mut() {
        let (dx, dy) = target.direction_from(pos);
        vel.vx = dx * speed.0;
        vel.vy = dy * speed.0;
    }
}

/// System that applies velocity to position.
/// Active knockback overrides the entity's own velocity; otherwise velocity
/// is scaled by the MoveSpeed stat when the entity has stats.
pub fn movement_system(
    clock: Res<GameClock>,
    mut query: Query<(
        &mut Position,
        &Velocity,
        Option<&Knockback>,
        Option<&CharacterStats>,
    )>,
) {
    let delta = clock.delta;
    for (mut pos, vel, knockback, stats) in query.iter_mut() {
        if let Some(knockback) = knockback.filter(|k| k.is_enabled()) {
            pos.x += knockback.vx * delta;
            pos.y += knockback.vy * delta;
            continue;
        }

        let speed_mult = stats.map(|s| s.get(StatKind::MoveSpeed)).unwrap_or(1.0);
        pos.x += vel.vx * delta * speed_mult;
        pos.y += vel.vy * delta * speed_mult;
    }
}

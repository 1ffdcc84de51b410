//! Timed effects, expressed as absolute expiry times against the game clock.
//!
//! Each owning system checks its own expiry and disables or raises its own
//! flag. Nothing here removes components or entities.

use crate::clock::GameClock;
use crate::components::*;
use bevy_ecs::prelude::*;

/// Closes invincibility windows whose time has passed.
pub fn invincibility_timer_system(clock: Res<GameClock>, mut query: Query<&mut Invincible>) {
    for mut invincible in query.iter_mut() {
        if invincible.is_enabled() && clock.has_passed(invincible.until) {
            invincible.disable();
        }
    }
}

/// Ends knockback once its duration is up.
pub fn knockback_timer_system(clock: Res<GameClock>, mut query: Query<&mut Knockback>) {
    for mut knockback in query.iter_mut() {
        if knockback.is_enabled() && clock.has_passed(knockback.until) {
            knockback.disable();
        }
    }
}

/// Temporary entities (modifiers, blasts) request destruction when their
/// lifetime ends.
pub fn time_to_live_system(
    clock: Res<GameClock>,
    mut query: Query<(&TimeToLive, &mut DestroyPending)>,
) {
    for (ttl, mut pending) in query.iter_mut() {
        if !pending.is_enabled() && clock.has_passed(ttl.expires_at) {
            pending.enable();
        }
    }
}

/// Fused explosives destroy themselves at detonation time. The blast itself
/// is spawned by the terminal destruction stage.
pub fn explosion_fuse_system(
    clock: Res<GameClock>,
    mut query: Query<(&ExplodeOnTimer, &mut DestroyPending)>,
) {
    for (fuse, mut pending) in query.iter_mut() {
        if !pending.is_enabled() && clock.has_passed(fuse.detonate_at) {
            pending.enable();
        }
    }
}

/// Finished dissolve visuals leave without further effects.
pub fn dissolve_timer_system(
    clock: Res<GameClock>,
    mut query: Query<(&DissolveVisual, &mut DestroyInstantly)>,
) {
    for (visual, mut instant) in query.iter_mut() {
        if !instant.is_enabled() && clock.has_passed(visual.started_at + visual.duration) {
            instant.enable();
        }
    }
}

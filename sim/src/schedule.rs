//! Frame schedule.
//!
//! One run of the schedule is one fixed tick. The phases below are chained,
//! so every system in a phase sees every write of the phases before it:
//!
//! | Phase         | Systems                                                   |
//! |---------------|-----------------------------------------------------------|
//! | `BeginCommit` | replay of last frame's begin buffer                       |
//! | `Timers`      | invincibility, knockback, TTL, fuses, dissolve expiry     |
//! | `Stats`       | stat recalculation                                        |
//! | `Movement`    | player input, chase steering, integration, weapon volleys |
//! | `Produce`     | buffer drain, grid rebuild, contacts, blasts              |
//! | `Interact`    | `Cap` then `React` then `Consume`                         |
//! | `Resolve`     | regeneration, damage aggregation, zero-hit destroy,       |
//! |               | level up, game over                                       |
//! | `Destroy`     | instant stage then terminal stage                         |
//! | `EndCommit`   | replay of this frame's end buffer                         |
//!
//! Systems inside a phase are chained as well. Several of them share the
//! RNG or a command buffer, and a fixed order keeps runs reproducible.

use bevy_ecs::prelude::*;

use crate::commands::{commit_begin_frame_commands, commit_end_frame_commands};
use crate::interaction::drain_interactions_system;
use crate::spatial::spatial_grid_update_system;
use crate::systems::*;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSet {
    BeginCommit,
    Timers,
    Stats,
    Movement,
    Produce,
    Interact,
    Resolve,
    Destroy,
    EndCommit,
}

/// Sub-phases of [`FrameSet::Interact`].
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractSet {
    /// Trims buffers before anyone reads them.
    Cap,
    /// Non-marking readers.
    React,
    /// Marking consumers.
    Consume,
}

/// Build the full frame schedule.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.configure_sets(
        (
            FrameSet::BeginCommit,
            FrameSet::Timers,
            FrameSet::Stats,
            FrameSet::Movement,
            FrameSet::Produce,
            FrameSet::Interact,
            FrameSet::Resolve,
            FrameSet::Destroy,
            FrameSet::EndCommit,
        )
            .chain(),
    );
    schedule.configure_sets(
        (InteractSet::Cap, InteractSet::React, InteractSet::Consume)
            .chain()
            .in_set(FrameSet::Interact),
    );

    schedule.add_systems(commit_begin_frame_commands.in_set(FrameSet::BeginCommit));

    schedule.add_systems(
        (
            invincibility_timer_system,
            knockback_timer_system,
            time_to_live_system,
            explosion_fuse_system,
            dissolve_timer_system,
        )
            .chain()
            .in_set(FrameSet::Timers),
    );

    schedule.add_systems(stat_recalc_system.in_set(FrameSet::Stats));

    schedule.add_systems(
        (
            player_input_system,
            chase_player_system,
            movement_system,
            weapon_system,
        )
            .chain()
            .in_set(FrameSet::Movement),
    );

    schedule.add_systems(
        (
            drain_interactions_system,
            spatial_grid_update_system,
            proximity_contacts_system,
            contact_detection_system,
            blast_producer_system,
        )
            .chain()
            .in_set(FrameSet::Produce),
    );

    schedule.add_systems(hit_cap_system.in_set(InteractSet::Cap));
    schedule.add_systems(
        (knockback_system, destroy_on_contact_system)
            .chain()
            .in_set(InteractSet::React),
    );
    schedule.add_systems(
        (
            damage_system,
            bounce_system,
            experience_gem_pickup_system,
            coin_pickup_system,
            heal_pickup_system,
            stat_boost_pickup_system,
            crate_pickup_system,
        )
            .chain()
            .in_set(InteractSet::Consume),
    );

    schedule.add_systems(
        (
            regeneration_system,
            damage_aggregation_system,
            destroy_on_zero_hits_system,
            level_up_system,
            game_over_system,
        )
            .chain()
            .in_set(FrameSet::Resolve),
    );

    schedule.add_systems(
        (instant_destroy_system, terminal_destroy_system)
            .chain()
            .in_set(FrameSet::Destroy),
    );

    schedule.add_systems(commit_end_frame_commands.in_set(FrameSet::EndCommit));

    schedule
}

//! Combat consumers - hit capping, knockback, damage and damage aggregation.
//!
//! ## Ordering
//!
//! Within the interact phase the systems here run in three groups:
//!
//! 1. **Cap** - `hit_cap_system` trims over-threshold records before anyone
//!    else reads the buffer.
//! 2. **React** - `knockback_system` and `destroy_on_contact_system` read
//!    records without marking them. Running them twice in a frame writes the
//!    same values again.
//! 3. **Consume** - `damage_system` and `bounce_system` apply their effect to
//!    unhandled records and mark them handled.
//!
//! `damage_aggregation_system` and `destroy_on_zero_hits_system` run later in
//! the resolve phase, once every producer of damage has run.

use crate::clock::GameClock;
use crate::components::*;
use crate::config::GameConfig;
use crate::interaction::Interactions;
use crate::stats::{CharacterStats, StatKind};
use bevy_ecs::prelude::*;

/// Damage after the owning character's `DamageDealt` multiplier.
pub fn dealt_damage(amount: i32, owner: Option<&CharacterStats>) -> i32 {
    match owner {
        Some(stats) => (amount as f32 * stats.get(StatKind::DamageDealt)).round() as i32,
        None => amount,
    }
}

/// Damage after the target's stats. Never negative, so damage never heals.
pub fn scaled_damage(amount: i32, stats: Option<&CharacterStats>) -> i32 {
    let (received, armor) = stats
        .map(|s| (s.get(StatKind::DamageReceived), s.get(StatKind::Armor)))
        .unwrap_or((1.0, 0.0));
    (amount as f32 * received - armor).round().max(0.0) as i32
}

/// Caps how many enemies an attack can hit.
///
/// Keeps the first `HitsRemaining` unhandled records that target an enemy,
/// drops records against enemies already in the attack's [`HitHistory`], and
/// discards everything from the first over-threshold record onwards.
///
/// ## Data Access
/// - Writes: HitsRemaining, HitHistory, Interactions
/// - Reads: EnemyTag (presence)
pub fn hit_cap_system(
    mut attacks: Query<(&mut HitsRemaining, &mut Interactions, Option<&mut HitHistory>)>,
    enemies: Query<(), With<EnemyTag>>,
) {
    for (mut hits, mut buffer, mut history) in attacks.iter_mut() {
        if buffer.is_empty() {
            continue;
        }

        let mut kept = 0;
        let mut cutoff = None;
        let mut repeats = Vec::new();

        for (index, target) in buffer.unhandled() {
            if !enemies.contains(target) {
                continue;
            }
            if history.as_ref().is_some_and(|h| h.contains(target)) {
                repeats.push(index);
                continue;
            }
            if kept == hits.0 {
                cutoff = Some(index);
                break;
            }
            kept += 1;
            if let Some(history) = history.as_mut() {
                history.0.push(target);
            }
        }

        if let Some(cutoff) = cutoff {
            buffer.discard_from(cutoff);
        }
        // All repeats sit before the cutoff.
        for index in repeats.into_iter().rev() {
            buffer.remove(index);
        }
        if kept > 0 {
            hits.0 -= kept;
        }
    }
}

/// Attacks that have used up their hits are destroyed.
pub fn destroy_on_zero_hits_system(mut query: Query<(&HitsRemaining, &mut DestroyPending)>) {
    for (hits, mut pending) in query.iter_mut() {
        if hits.0 == 0 && !pending.is_enabled() {
            pending.enable();
        }
    }
}

/// Pushes every interacted target away from the source.
///
/// ## Data Access
/// - Reads: GameClock, Position, KnockbackOnInteraction, Interactions
/// - Writes: Knockback
pub fn knockback_system(
    clock: Res<GameClock>,
    sources: Query<(&Position, &KnockbackOnInteraction, &Interactions)>,
    mut targets: Query<(&Position, &mut Knockback)>,
) {
    for (origin, push, buffer) in sources.iter() {
        for record in buffer.records() {
            let Ok((pos, mut knockback)) = targets.get_mut(record.target) else {
                continue;
            };
            let (dx, dy) = pos.direction_from(origin);
            knockback.push(
                dx * push.strength,
                dy * push.strength,
                clock.elapsed + push.duration,
            );
        }
    }
}

/// Sources that interact with anything destroy themselves.
pub fn destroy_on_contact_system(
    mut query: Query<(&Interactions, &mut DestroyPending), With<DestroyOnContact>>,
) {
    for (buffer, mut pending) in query.iter_mut() {
        if !buffer.is_empty() && !pending.is_enabled() {
            pending.enable();
        }
    }
}

/// Queues interaction damage on targets that can take it.
///
/// Owned attacks are scaled by the owner's stats first, then by the
/// target's. Damage against an open invincibility window is dropped, but the
/// record still counts as handled.
///
/// ## Data Access
/// - Reads: DamageOnInteraction, AttackOwner, CharacterStats, Invincible
/// - Writes: Interactions (handled bit), DamageQueue
pub fn damage_system(
    mut sources: Query<(&DamageOnInteraction, &mut Interactions, Option<&AttackOwner>)>,
    owners: Query<&CharacterStats>,
    mut targets: Query<
        (&mut DamageQueue, Option<&CharacterStats>, Option<&Invincible>),
        With<HitPoints>,
    >,
) {
    for (damage, mut buffer, owner) in sources.iter_mut() {
        let base = dealt_damage(
            damage.amount,
            owner.and_then(|owner| owners.get(owner.0).ok()),
        );
        for (index, target) in buffer.unhandled() {
            let Ok((mut queue, stats, invincible)) = targets.get_mut(target) else {
                continue;
            };
            buffer.mark_handled(index);
            if invincible.is_some_and(|i| i.is_enabled()) {
                continue;
            }
            let amount = scaled_damage(base, stats);
            if amount > 0 {
                queue.push(-amount);
            }
        }
    }
}

/// Reflects bouncing projectiles off obstacles.
///
/// ## Data Access
/// - Reads: Position (both sides), EnvironmentTag
/// - Writes: Velocity, BounceOffEnvironment, Interactions, DestroyPending
pub fn bounce_system(
    mut sources: Query<(
        &Position,
        &mut Velocity,
        &mut BounceOffEnvironment,
        &mut Interactions,
        &mut DestroyPending,
    )>,
    obstacles: Query<&Position, With<EnvironmentTag>>,
) {
    for (pos, mut vel, mut bounce, mut buffer, mut pending) in sources.iter_mut() {
        for (index, target) in buffer.unhandled() {
            let Ok(obstacle) = obstacles.get(target) else {
                continue;
            };
            buffer.mark_handled(index);

            let (nx, ny) = pos.direction_from(obstacle);
            let dot = vel.vx * nx + vel.vy * ny;
            // Only reflect when moving into the obstacle.
            if dot < 0.0 {
                vel.vx -= 2.0 * dot * nx;
                vel.vy -= 2.0 * dot * ny;
            }

            bounce.remaining = bounce.remaining.saturating_sub(1);
            if bounce.remaining == 0 && !pending.is_enabled() {
                pending.enable();
            }
        }
    }
}

/// Turns the `Regeneration` stat into healing, one whole hit point at a time.
///
/// Nothing is carried while the character is at full health or dead.
///
/// ## Data Access
/// - Reads: GameClock, CharacterStats, HitPoints
/// - Writes: RegenCarry, DamageQueue
pub fn regeneration_system(
    clock: Res<GameClock>,
    mut query: Query<(&CharacterStats, &HitPoints, &mut RegenCarry, &mut DamageQueue)>,
) {
    for (stats, hit_points, mut carry, mut queue) in query.iter_mut() {
        let rate = stats.get(StatKind::Regeneration);
        if rate <= 0.0 || !hit_points.is_alive() || hit_points.current >= hit_points.max {
            carry.0 = 0.0;
            continue;
        }
        carry.0 += rate * clock.delta;
        let whole = carry.0.floor();
        if whole >= 1.0 {
            carry.0 -= whole;
            queue.push(whole as i32);
        }
    }
}

/// Sums each damage queue into hit points.
///
/// ## Data Access
/// - Reads: GameClock, GameConfig
/// - Writes: HitPoints, DamageQueue, DestroyPending, Invincible
pub fn damage_aggregation_system(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut query: Query<(
        &mut HitPoints,
        &mut DamageQueue,
        &mut DestroyPending,
        Option<&mut Invincible>,
    )>,
) {
    for (mut hit_points, mut queue, mut pending, invincible) in query.iter_mut() {
        if queue.is_empty() {
            continue;
        }
        let total = queue.take_total();
        hit_points.apply(total);

        if total < 0 {
            if let Some(mut invincible) = invincible {
                invincible.open_until(clock.elapsed + config.invincibility_duration);
            }
        }
        if !hit_points.is_alive() && !pending.is_enabled() {
            pending.enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Dedup;
    use crate::stats::{StatDelta, StatLimits};

    fn enemy(world: &mut World) -> Entity {
        world
            .spawn((
                EnemyTag,
                Position::default(),
                HitPoints::new(10),
                DamageQueue::default(),
                Knockback::default(),
                DestructibleBundle::default(),
            ))
            .id()
    }

    fn consumers() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                hit_cap_system,
                knockback_system,
                destroy_on_contact_system,
                damage_system,
                bounce_system,
            )
                .chain(),
        );
        schedule
    }

    #[test]
    fn test_hit_cap_keeps_first_and_discards_rest() {
        let mut world = World::new();
        world.insert_resource(GameClock::default());
        let targets: Vec<_> = (0..3).map(|_| enemy(&mut world)).collect();
        let mut buffer = Interactions::new();
        for target in &targets {
            buffer.raise(*target, Dedup::Unique);
        }
        let attack = world
            .spawn((
                AttackTag,
                HitsRemaining(1),
                buffer,
                DamageOnInteraction { amount: 4 },
                DestructibleBundle::default(),
            ))
            .id();

        consumers().run(&mut world);

        assert_eq!(world.get::<Interactions>(attack).unwrap().len(), 1);
        assert_eq!(world.get::<HitsRemaining>(attack), Some(&HitsRemaining(0)));
        assert_eq!(world.get::<DamageQueue>(targets[0]).unwrap().0, vec![-4]);
        assert!(world.get::<DamageQueue>(targets[1]).unwrap().is_empty());
        assert!(world.get::<DamageQueue>(targets[2]).unwrap().is_empty());
    }

    #[test]
    fn test_hit_history_skips_repeat_targets() {
        let mut world = World::new();
        let first = enemy(&mut world);
        let second = enemy(&mut world);
        let mut buffer = Interactions::new();
        buffer.raise(first, Dedup::Unique);
        buffer.raise(second, Dedup::Unique);
        let attack = world
            .spawn((HitsRemaining(3), HitHistory(vec![first]), buffer))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(hit_cap_system);
        schedule.run(&mut world);

        let buffer = world.get::<Interactions>(attack).unwrap();
        assert_eq!(buffer.unhandled(), vec![(0, second)]);
        assert_eq!(world.get::<HitsRemaining>(attack), Some(&HitsRemaining(2)));
        assert_eq!(world.get::<HitHistory>(attack).unwrap().0, vec![first, second]);
    }

    #[test]
    fn test_zero_hits_sets_pending() {
        let mut world = World::new();
        let spent = world.spawn((HitsRemaining(0), DestroyPending::default())).id();
        let fresh = world.spawn((HitsRemaining(2), DestroyPending::default())).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(destroy_on_zero_hits_system);
        schedule.run(&mut world);

        assert!(world.get::<DestroyPending>(spent).unwrap().is_enabled());
        assert!(!world.get::<DestroyPending>(fresh).unwrap().is_enabled());
    }

    #[test]
    fn test_consumers_are_idempotent() {
        let mut world = World::new();
        world.insert_resource(GameClock::default());
        let target = enemy(&mut world);
        let mut buffer = Interactions::new();
        buffer.raise(target, Dedup::Unique);
        world.spawn((
            Position::new(-1.0, 0.0),
            buffer,
            DamageOnInteraction { amount: 3 },
            KnockbackOnInteraction {
                strength: 5.0,
                duration: 0.2,
            },
        ));

        let mut schedule = consumers();
        schedule.run(&mut world);
        let knockback_after_first = *world.get::<Knockback>(target).unwrap();
        schedule.run(&mut world);

        assert_eq!(world.get::<DamageQueue>(target).unwrap().0, vec![-3]);
        assert_eq!(*world.get::<Knockback>(target).unwrap(), knockback_after_first);
        assert!(knockback_after_first.is_enabled());
        assert!((knockback_after_first.vx - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_invincible_target_takes_no_damage() {
        let mut world = World::new();
        let mut invincible = Invincible::default();
        invincible.open_until(10.0);
        let player = world
            .spawn((PlayerTag, HitPoints::new(10), DamageQueue::default(), invincible))
            .id();
        let mut buffer = Interactions::new();
        buffer.raise(player, Dedup::Unique);
        let source = world.spawn((buffer, DamageOnInteraction { amount: 3 })).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(damage_system);
        schedule.run(&mut world);

        assert!(world.get::<DamageQueue>(player).unwrap().is_empty());
        assert!(world.get::<Interactions>(source).unwrap().unhandled().is_empty());
    }

    #[test]
    fn test_damage_scaled_by_target_stats() {
        let deltas = [
            StatDelta::new(StatKind::DamageReceived, 2.0),
            StatDelta::new(StatKind::Armor, 1.0),
        ];
        let stats = CharacterStats::fold(deltas.iter(), &StatLimits::default());
        assert_eq!(scaled_damage(4, Some(&stats)), 7);
        assert_eq!(scaled_damage(4, None), 4);

        let heavy = CharacterStats::fold(
            [StatDelta::new(StatKind::Armor, 50.0)].iter(),
            &StatLimits::default(),
        );
        assert_eq!(scaled_damage(4, Some(&heavy)), 0);
    }

    #[test]
    fn test_owned_attack_scaled_by_damage_dealt() {
        let mut world = World::new();
        let owner = world
            .spawn(CharacterStats::fold(
                [StatDelta::new(StatKind::DamageDealt, 3.0)].iter(),
                &StatLimits::default(),
            ))
            .id();
        let target = enemy(&mut world);
        let mut owned = Interactions::new();
        owned.raise(target, Dedup::Unique);
        world.spawn((owned, DamageOnInteraction { amount: 2 }, AttackOwner(owner)));
        let mut stray = Interactions::new();
        stray.raise(target, Dedup::Unique);
        world.spawn((stray, DamageOnInteraction { amount: 2 }));

        let mut schedule = Schedule::default();
        schedule.add_systems(damage_system);
        schedule.run(&mut world);

        let mut queued = world.get::<DamageQueue>(target).unwrap().0.clone();
        queued.sort_unstable();
        assert_eq!(queued, vec![-6, -2]);
    }

    #[test]
    fn test_regeneration_heals_whole_points() {
        let mut world = World::new();
        world.insert_resource(GameClock {
            tick: 1,
            elapsed: 0.25,
            delta: 0.25,
        });
        let mut hurt = HitPoints::new(100);
        hurt.current = 50;
        let stats = CharacterStats::fold(
            [StatDelta::new(StatKind::Regeneration, 2.0)].iter(),
            &StatLimits::default(),
        );
        let player = world
            .spawn((stats, hurt, RegenCarry::default(), DamageQueue::default()))
            .id();
        let healthy = world
            .spawn((stats, HitPoints::new(100), RegenCarry::default(), DamageQueue::default()))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(regeneration_system);
        schedule.run(&mut world);
        assert!(world.get::<DamageQueue>(player).unwrap().is_empty());
        assert_eq!(world.get::<RegenCarry>(player), Some(&RegenCarry(0.5)));

        schedule.run(&mut world);
        assert_eq!(world.get::<DamageQueue>(player).unwrap().0, vec![1]);
        assert_eq!(world.get::<RegenCarry>(player), Some(&RegenCarry(0.0)));

        assert!(world.get::<DamageQueue>(healthy).unwrap().is_empty());
        assert_eq!(world.get::<RegenCarry>(healthy), Some(&RegenCarry(0.0)));
    }

    #[test]
    fn test_bounce_reflects_and_expires() {
        let mut world = World::new();
        let wall = world.spawn((EnvironmentTag, Position::new(1.0, 0.0))).id();
        let mut buffer = Interactions::new();
        buffer.raise(wall, Dedup::Repeat);
        let bolt = world
            .spawn((
                Position::new(0.0, 0.0),
                Velocity::new(4.0, 0.0),
                BounceOffEnvironment { remaining: 1 },
                buffer,
                DestroyPending::default(),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(bounce_system);
        schedule.run(&mut world);

        assert_eq!(*world.get::<Velocity>(bolt).unwrap(), Velocity::new(-4.0, 0.0));
        assert_eq!(world.get::<BounceOffEnvironment>(bolt).unwrap().remaining, 0);
        assert!(world.get::<DestroyPending>(bolt).unwrap().is_enabled());
    }

    #[test]
    fn test_aggregation_sums_and_opens_invincibility() {
        let mut world = World::new();
        world.insert_resource(GameClock {
            tick: 1,
            elapsed: 1.0,
            delta: 0.1,
        });
        world.insert_resource(GameConfig::default());
        let player = world
            .spawn((
                HitPoints::new(10),
                DamageQueue(vec![-4, -3, 2]),
                DestroyPending::default(),
                Invincible::default(),
            ))
            .id();
        let doomed = world
            .spawn((
                HitPoints::new(3),
                DamageQueue(vec![-5]),
                DestroyPending::default(),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(damage_aggregation_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<HitPoints>(player).unwrap().current, 5);
        assert!(world.get::<DamageQueue>(player).unwrap().is_empty());
        let window = world.get::<Invincible>(player).unwrap();
        assert!(window.is_enabled());
        assert!((window.until - 1.5).abs() < 1e-6);
        assert!(!world.get::<DestroyPending>(player).unwrap().is_enabled());

        assert_eq!(world.get::<HitPoints>(doomed).unwrap().current, 0);
        assert!(world.get::<DestroyPending>(doomed).unwrap().is_enabled());
    }
}

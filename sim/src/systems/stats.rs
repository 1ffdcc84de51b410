//! Stat recalculation - rebuilds a character's snapshot when flagged.

use crate::components::*;
use crate::config::GameConfig;
use crate::stats::{ActiveModifiers, CharacterStats, StatModifier};
use bevy_ecs::prelude::*;
use tracing::debug;

/// System that refolds stats for every character with `NeedsStatRecalc`
/// enabled.
///
/// Modifier references whose entity is gone (or no longer points back at this
/// owner) are pruned from the active list first, so a destroyed modifier
/// stops contributing on the same recalculation that its destruction
/// triggered.
///
/// ## Data Access
/// - Reads: GameConfig, StatModifier
/// - Writes: NeedsStatRecalc, ActiveModifiers, CharacterStats
pub fn stat_recalc_system(
    config: Res<GameConfig>,
    mut characters: Query<(
        Entity,
        &mut NeedsStatRecalc,
        &mut ActiveModifiers,
        &mut CharacterStats,
    )>,
    modifiers: Query<&StatModifier>,
) {
    for (owner, mut flag, mut active, mut stats) in characters.iter_mut() {
        if !flag.is_enabled() {
            continue;
        }

        active
            .0
            .retain(|m| modifiers.get(*m).is_ok_and(|modifier| modifier.owner == owner));

        let deltas = active
            .0
            .iter()
            .filter_map(|m| modifiers.get(*m).ok())
            .flat_map(|modifier| modifier.deltas.iter());
        let folded = CharacterStats::fold(deltas, &config.stat_limits);

        if *stats != folded {
            *stats = folded;
        }
        flag.disable();
        debug!(?owner, modifiers = active.0.len(), "stats recalculated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{StatDelta, StatKind};

    fn character(world: &mut World) -> Entity {
        let mut flag = NeedsStatRecalc::default();
        flag.enable();
        world
            .spawn((flag, ActiveModifiers::default(), CharacterStats::default()))
            .id()
    }

    fn attach(world: &mut World, owner: Entity, deltas: Vec<StatDelta>) -> Entity {
        let modifier = world.spawn(StatModifier::new(owner, deltas)).id();
        world.get_mut::<ActiveModifiers>(owner).unwrap().0.push(modifier);
        modifier
    }

    #[test]
    fn test_percentage_move_speed_scenario() {
        let mut world = World::new();
        world.insert_resource(GameConfig::default());
        let owner = character(&mut world);
        attach(&mut world, owner, vec![StatDelta::new(StatKind::MoveSpeed, 0.5)]);

        let mut schedule = Schedule::default();
        schedule.add_systems(stat_recalc_system);
        schedule.run(&mut world);

        let stats = world.get::<CharacterStats>(owner).unwrap();
        assert!((stats.get(StatKind::MoveSpeed) - 0.5).abs() < 1e-6);
        assert!(!world.get::<NeedsStatRecalc>(owner).unwrap().is_enabled());
    }

    #[test]
    fn test_recalc_is_stable_and_prunes_dead_modifiers() {
        let mut world = World::new();
        world.insert_resource(GameConfig::default());
        let owner = character(&mut world);
        attach(&mut world, owner, vec![StatDelta::new(StatKind::Armor, 2.0)]);
        let temporary = attach(&mut world, owner, vec![StatDelta::new(StatKind::Armor, 3.0)]);

        let mut schedule = Schedule::default();
        schedule.add_systems(stat_recalc_system);
        schedule.run(&mut world);
        let first = *world.get::<CharacterStats>(owner).unwrap();
        assert_eq!(first.get(StatKind::Armor), 5.0);

        // Re-running with no changes yields the same snapshot.
        world.get_mut::<NeedsStatRecalc>(owner).unwrap().enable();
        schedule.run(&mut world);
        assert_eq!(*world.get::<CharacterStats>(owner).unwrap(), first);

        world.despawn(temporary);
        world.get_mut::<NeedsStatRecalc>(owner).unwrap().enable();
        schedule.run(&mut world);
        assert_eq!(world.get::<CharacterStats>(owner).unwrap().get(StatKind::Armor), 2.0);
        assert_eq!(world.get::<ActiveModifiers>(owner).unwrap().0.len(), 1);
    }

    #[test]
    fn test_unflagged_character_untouched() {
        let mut world = World::new();
        world.insert_resource(GameConfig::default());
        let owner = world
            .spawn((
                NeedsStatRecalc::default(),
                ActiveModifiers::default(),
                CharacterStats::default(),
            ))
            .id();
        attach(&mut world, owner, vec![StatDelta::new(StatKind::Armor, 2.0)]);

        let mut schedule = Schedule::default();
        schedule.add_systems(stat_recalc_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<CharacterStats>(owner).unwrap().get(StatKind::Armor), 0.0);
    }
}

//! Level-up and game-over processing.

use crate::clock::GameRng;
use crate::components::*;
use crate::config::GameConfig;
use crate::events::GameEvent;
use crate::run::{PendingUpgradeOffers, Progression, RunState, RunStats};
use crate::upgrades::{pick_rewards, OwnedUpgrades, RewardRoll, UpgradeCatalog};
use bevy_ecs::prelude::*;
use tracing::info;

/// Announces each earned level and queues one set of upgrade choices for it.
pub fn level_up_system(
    config: Res<GameConfig>,
    catalog: Res<UpgradeCatalog>,
    mut rng: ResMut<GameRng>,
    mut progression: ResMut<Progression>,
    mut offers: ResMut<PendingUpgradeOffers>,
    mut events: EventWriter<GameEvent>,
    owned: Query<&OwnedUpgrades, With<PlayerTag>>,
) {
    while let Some(level) = progression.take_level_up() {
        info!(level, experience = progression.experience, "level up");
        events.send(GameEvent::LevelUp { level });

        let choices = pick_rewards(
            &catalog,
            owned.iter().next(),
            RewardRoll::from_config(&config, config.upgrade_choice_slots),
            &mut rng.0,
        );
        offers.0.push_back(choices.clone());
        events.send(GameEvent::UpgradeOffered { choices });
    }
}

/// Latches the run as over once the game-over marker exists.
pub fn game_over_system(
    mut state: ResMut<RunState>,
    stats: Res<RunStats>,
    mut events: EventWriter<GameEvent>,
    markers: Query<(), With<GameOverMarker>>,
) {
    if state.game_over || markers.is_empty() {
        return;
    }
    state.game_over = true;
    info!(enemies_defeated = stats.enemies_defeated, "game over");
    events.send(GameEvent::GameOver {
        enemies_defeated: stats.enemies_defeated,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperienceCurve;

    fn setup() -> World {
        let mut world = World::new();
        world.insert_resource(GameConfig {
            upgrade_choice_slots: 2,
            ..Default::default()
        });
        world.insert_resource(UpgradeCatalog::default());
        world.insert_resource(GameRng::seeded(3));
        world.insert_resource(Progression::default());
        world.insert_resource(PendingUpgradeOffers::default());
        world.insert_resource(RunState::default());
        world.insert_resource(RunStats::default());
        world.init_resource::<Events<GameEvent>>();
        world
    }

    #[test]
    fn test_each_level_gets_an_offer() {
        let mut world = setup();
        world
            .resource_mut::<Progression>()
            .add_experience(16, &ExperienceCurve { base: 5, growth: 5 });

        let mut schedule = Schedule::default();
        schedule.add_systems(level_up_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<Progression>().level, 3);
        let offers = &world.resource::<PendingUpgradeOffers>().0;
        assert_eq!(offers.len(), 2);
        // Empty catalog: every slot falls back to a bonus.
        assert!(offers.iter().all(|choices| choices.len() == 2));

        let events: Vec<_> = world.resource_mut::<Events<GameEvent>>().drain().collect();
        let levels: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::LevelUp { level } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![2, 3]);
    }

    #[test]
    fn test_game_over_fires_once() {
        let mut world = setup();
        world.resource_mut::<RunStats>().enemies_defeated = 4;
        world.spawn(GameOverMarker);

        let mut schedule = Schedule::default();
        schedule.add_systems(game_over_system);
        schedule.run(&mut world);
        schedule.run(&mut world);

        assert!(world.resource::<RunState>().game_over);
        let events: Vec<_> = world.resource_mut::<Events<GameEvent>>().drain().collect();
        assert_eq!(events, vec![GameEvent::GameOver { enemies_defeated: 4 }]);
    }
}

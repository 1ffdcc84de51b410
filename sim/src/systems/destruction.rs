//! Destruction pipeline - the only place entities leave the world.
//!
//! Every other system only *requests* destruction by enabling
//! `DestroyPending` (or `DestroyInstantly`). Two stages run back to back at
//! the end of the frame:
//!
//! 1. `instant_destroy_system` removes instant-destroy entities with no
//!    secondary effects and clears their pending flag so the next stage
//!    never sees them.
//! 2. `terminal_destroy_system` fires every secondary effect of each pending
//!    entity exactly once, then records its despawn.
//!
//! Both stages only record deferred ops. The despawns land at the end commit,
//! after visuals spawned at the same commit have read the final position.

use crate::clock::{GameClock, GameRng};
use crate::commands::{BeginFrameCommands, DeferredOp, EndFrameCommands, ExplosionPayload};
use crate::components::*;
use crate::config::GameConfig;
use crate::events::AudioRequest;
use crate::loot::{LootLibrary, LootTableCache};
use crate::run::{RunIndex, RunStats};
use crate::stats::StatModifier;
use bevy_ecs::prelude::*;
use bevy_ecs::query::QueryData;
use rand::Rng;
use tracing::{debug, error};

/// Instant-destroy stage.
///
/// ## Data Access
/// - Reads: DestroyInstantly, PlayAudioOnDestroy (presence)
/// - Writes: DestroyPending, EndFrameCommands
pub fn instant_destroy_system(
    mut end: ResMut<EndFrameCommands>,
    mut query: Query<(
        Entity,
        &DestroyInstantly,
        &mut DestroyPending,
        Has<PlayAudioOnDestroy>,
    )>,
) {
    for (entity, instant, mut pending, has_audio) in query.iter_mut() {
        if !instant.is_enabled() {
            continue;
        }
        if has_audio {
            end.push(DeferredOp::RemoveAudioOnDestroy(entity));
        }
        if pending.is_enabled() {
            pending.disable();
        }
        end.push(DeferredOp::Despawn(entity));
    }
}

/// Everything the terminal stage reads off a dying entity.
#[derive(QueryData)]
#[query_data(mutable)]
pub struct DyingEntity {
    entity: Entity,
    pending: &'static mut DestroyPending,
    instant: Option<&'static DestroyInstantly>,
    position: Option<&'static Position>,
    scale: Option<&'static Scale>,
    player: Has<PlayerTag>,
    enemy: Has<EnemyTag>,
    visual: Has<PlayDestructionVisual>,
    graphics: Option<&'static GraphicsLink>,
    audio: Option<&'static PlayAudioOnDestroy>,
    drop: Option<&'static DropExperienceOnDestroy>,
    spawn: Option<&'static SpawnOnDestroy>,
    explode: Option<&'static ExplodeOnTimer>,
    loot: Option<&'static LootDrop>,
    modifier: Option<&'static StatModifier>,
}

/// Terminal destruction stage.
///
/// For each entity with `DestroyPending` enabled, in order:
/// game-over marker (player), dissolve visual, destroy sound, defeated
/// counter (enemy), experience drop roll, spawn-on-destroy (armed as a blast
/// when the entity was a fused explosive), loot roll, owner stat recalc
/// (modifier entities), and finally the despawn.
///
/// The pending flag is cleared once processed, so no effect can fire twice
/// even if the stage were to run again before the end commit.
#[allow(clippy::too_many_arguments)]
pub fn terminal_destroy_system(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    run: Res<RunIndex>,
    loot_library: Res<LootLibrary>,
    mut loot_cache: ResMut<LootTableCache>,
    mut rng: ResMut<GameRng>,
    mut stats: ResMut<RunStats>,
    mut begin: ResMut<BeginFrameCommands>,
    mut end: ResMut<EndFrameCommands>,
    mut audio: EventWriter<AudioRequest>,
    mut dying: Query<DyingEntity>,
    mut owners: Query<&mut NeedsStatRecalc>,
) {
    for mut item in dying.iter_mut() {
        if !item.pending.is_enabled() {
            continue;
        }
        item.pending.disable();
        if item.instant.is_some_and(|i| i.is_enabled()) {
            continue;
        }

        let entity = item.entity;
        let position = item.position.copied().unwrap_or_default();
        let scale = item.scale.map(|s| s.0).unwrap_or(1.0);

        if item.player {
            begin.push(DeferredOp::SpawnGameOverMarker);
        }

        if item.visual {
            if let Some(link) = item.graphics {
                end.push(DeferredOp::SpawnDissolveVisual {
                    graphics: link.0,
                    position,
                    scale,
                    started_at: clock.elapsed,
                    duration: config.dissolve_duration,
                });
            }
        }

        if let Some(sound) = item.audio {
            audio.send(AudioRequest {
                cue: sound.cue,
                position,
            });
        }

        if item.enemy {
            stats.enemies_defeated = stats.enemies_defeated.saturating_add(1);
        }

        if let Some(drop) = item.drop {
            let roll: u32 = rng.0.random_range(1..=100);
            if roll <= drop.chance_to_drop {
                begin.push(DeferredOp::SpawnExperienceGem {
                    position,
                    value: drop.experience_value,
                });
            }
        }

        if let Some(spawn) = item.spawn {
            let explosion = item.explode.map(|fuse| ExplosionPayload {
                damage: fuse.damage,
                radius: fuse.radius * scale,
                lifetime: fuse.lifetime,
            });
            begin.push(DeferredOp::InstantiatePrefab {
                prefab: spawn.prefab,
                position,
                scale,
                explosion,
            });
        }

        if let Some(loot) = item.loot {
            match loot_library.get(loot.table) {
                Some(def) => {
                    let table = loot_cache.resolve(def, *run);
                    if let Some(prefab) = table.roll(&mut rng.0) {
                        begin.push(DeferredOp::InstantiatePrefab {
                            prefab,
                            position,
                            scale,
                            explosion: None,
                        });
                    }
                }
                None => error!(?entity, table = ?loot.table, "unknown loot table"),
            }
        }

        if let Some(modifier) = item.modifier {
            if let Ok(mut flag) = owners.get_mut(modifier.owner) {
                flag.enable();
            }
        }

        end.push(DeferredOp::Despawn(entity));
        debug!(?entity, x = position.x, y = position.y, "entity destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loot::{LootEntryDef, LootTable, LootTableDef};
    use crate::stats::{ActiveModifiers, StatDelta, StatKind};

    fn setup() -> World {
        let mut world = World::new();
        world.insert_resource(GameClock {
            tick: 30,
            elapsed: 3.0,
            delta: 0.1,
        });
        world.insert_resource(GameConfig::default());
        world.insert_resource(RunIndex(1));
        world.insert_resource(LootLibrary::default());
        world.insert_resource(LootTableCache::default());
        world.insert_resource(GameRng::seeded(42));
        world.insert_resource(RunStats::default());
        world.init_resource::<BeginFrameCommands>();
        world.init_resource::<EndFrameCommands>();
        world.init_resource::<Events<AudioRequest>>();
        world
    }

    fn stages() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems((instant_destroy_system, terminal_destroy_system).chain());
        schedule
    }

    fn pending() -> DestructibleBundle {
        let mut bundle = DestructibleBundle::default();
        bundle.pending.enable();
        bundle
    }

    #[test]
    fn test_enemy_drop_scenario() {
        let mut world = setup();
        let enemy = world
            .spawn((
                EnemyTag,
                Position::new(4.0, -2.0),
                DropExperienceOnDestroy {
                    experience_value: 10,
                    chance_to_drop: 100,
                },
                pending(),
            ))
            .id();

        stages().run(&mut world);

        assert_eq!(world.resource::<RunStats>().enemies_defeated, 1);
        assert_eq!(
            world.resource::<BeginFrameCommands>().ops(),
            &[DeferredOp::SpawnExperienceGem {
                position: Position::new(4.0, -2.0),
                value: 10,
            }]
        );
        assert_eq!(
            world.resource::<EndFrameCommands>().ops(),
            &[DeferredOp::Despawn(enemy)]
        );
    }

    #[test]
    fn test_effects_fire_once() {
        let mut world = setup();
        world.spawn((
            EnemyTag,
            Position::default(),
            DropExperienceOnDestroy {
                experience_value: 1,
                chance_to_drop: 100,
            },
            pending(),
        ));

        let mut schedule = stages();
        schedule.run(&mut world);
        schedule.run(&mut world);

        assert_eq!(world.resource::<RunStats>().enemies_defeated, 1);
        assert_eq!(world.resource::<BeginFrameCommands>().len(), 1);
        assert_eq!(world.resource::<EndFrameCommands>().len(), 1);
    }

    #[test]
    fn test_instant_destroy_bypasses_effects() {
        let mut world = setup();
        let mut flags = pending();
        flags.instant.enable();
        let doomed = world
            .spawn((
                EnemyTag,
                PlayerTag,
                Position::default(),
                DropExperienceOnDestroy {
                    experience_value: 1,
                    chance_to_drop: 100,
                },
                SpawnOnDestroy { prefab: PrefabId(1) },
                LootDrop {
                    table: LootTableId(1),
                },
                PlayAudioOnDestroy { cue: AudioCue(2) },
                flags,
            ))
            .id();

        stages().run(&mut world);

        assert_eq!(world.resource::<RunStats>().enemies_defeated, 0);
        assert!(world.resource::<BeginFrameCommands>().is_empty());
        assert_eq!(
            world.resource::<EndFrameCommands>().ops(),
            &[
                DeferredOp::RemoveAudioOnDestroy(doomed),
                DeferredOp::Despawn(doomed)
            ]
        );
        assert!(world.resource::<Events<AudioRequest>>().is_empty());
    }

    #[test]
    fn test_drop_chance_boundaries() {
        for (chance, expected) in [(0, 0), (100, 200)] {
            let mut world = setup();
            for _ in 0..200 {
                world.spawn((
                    Position::default(),
                    DropExperienceOnDestroy {
                        experience_value: 1,
                        chance_to_drop: chance,
                    },
                    pending(),
                ));
            }

            stages().run(&mut world);

            let gems = world
                .resource::<BeginFrameCommands>()
                .ops()
                .iter()
                .filter(|op| matches!(op, DeferredOp::SpawnExperienceGem { .. }))
                .count();
            assert_eq!(gems, expected, "chance {chance}");
        }
    }

    #[test]
    fn test_fused_explosive_spawns_armed_blast() {
        let mut world = setup();
        world.spawn((
            Position::new(1.0, 1.0),
            Scale(2.0),
            SpawnOnDestroy { prefab: PrefabId(7) },
            ExplodeOnTimer {
                detonate_at: 3.0,
                damage: 9,
                radius: 1.5,
                lifetime: 0.25,
            },
            pending(),
        ));

        stages().run(&mut world);

        assert_eq!(
            world.resource::<BeginFrameCommands>().ops(),
            &[DeferredOp::InstantiatePrefab {
                prefab: PrefabId(7),
                position: Position::new(1.0, 1.0),
                scale: 2.0,
                explosion: Some(ExplosionPayload {
                    damage: 9,
                    radius: 3.0,
                    lifetime: 0.25,
                }),
            }]
        );
    }

    #[test]
    fn test_loot_roll_and_unknown_table() {
        let mut world = setup();
        let def = LootTableDef {
            entries: vec![LootEntryDef {
                prefab: PrefabId(20),
                weight: 1000,
            }],
        };
        let mut library = LootLibrary::default();
        library.insert(LootTableId(1), def.clone());
        world.insert_resource(library);
        // Same seed, same single draw as the terminal stage.
        let expected = LootTable::bake(&def).roll(&mut GameRng::seeded(42).0);
        assert_eq!(expected, Some(PrefabId(20)));

        let dropped = world
            .spawn((Position::default(), LootDrop { table: LootTableId(1) }, pending()))
            .id();
        let broken = world
            .spawn((Position::default(), LootDrop { table: LootTableId(9) }, pending()))
            .id();

        stages().run(&mut world);

        let spawned: Vec<_> = world
            .resource::<BeginFrameCommands>()
            .ops()
            .iter()
            .filter_map(|op| match op {
                DeferredOp::InstantiatePrefab { prefab, .. } => Some(*prefab),
                _ => None,
            })
            .collect();
        assert_eq!(spawned, vec![PrefabId(20)]);
        let despawns = world.resource::<EndFrameCommands>().ops().to_vec();
        assert!(despawns.contains(&DeferredOp::Despawn(dropped)));
        assert!(despawns.contains(&DeferredOp::Despawn(broken)));
        assert_eq!(world.resource::<LootTableCache>().len(), 1);
    }

    #[test]
    fn test_player_death_and_visual() {
        let mut world = setup();
        let player = world
            .spawn((
                PlayerTag,
                Position::new(2.0, 2.0),
                PlayDestructionVisual,
                GraphicsLink(GraphicsId(5)),
                PlayAudioOnDestroy { cue: AudioCue(8) },
                pending(),
            ))
            .id();

        stages().run(&mut world);

        assert_eq!(
            world.resource::<BeginFrameCommands>().ops(),
            &[DeferredOp::SpawnGameOverMarker]
        );
        assert_eq!(
            world.resource::<EndFrameCommands>().ops(),
            &[
                DeferredOp::SpawnDissolveVisual {
                    graphics: GraphicsId(5),
                    position: Position::new(2.0, 2.0),
                    scale: 1.0,
                    started_at: 3.0,
                    duration: 0.6,
                },
                DeferredOp::Despawn(player)
            ]
        );
        let sounds: Vec<_> = world
            .resource_mut::<Events<AudioRequest>>()
            .drain()
            .collect();
        assert_eq!(
            sounds,
            vec![AudioRequest {
                cue: AudioCue(8),
                position: Position::new(2.0, 2.0)
            }]
        );
    }

    #[test]
    fn test_destroyed_modifier_flags_owner() {
        let mut world = setup();
        let owner = world
            .spawn((ActiveModifiers::default(), NeedsStatRecalc::default()))
            .id();
        world.spawn((
            StatModifier::new(owner, vec![StatDelta::new(StatKind::Armor, 2.0)]),
            pending(),
        ));

        stages().run(&mut world);

        assert!(world.get::<NeedsStatRecalc>(owner).unwrap().is_enabled());
    }
}

//! Prefabs: authored entity templates and the built-in archetypes.
//!
//! A prefab describes the full component set of one kind of entity. Deferred
//! spawn operations name a prefab by id and supply the position and scale at
//! which to instantiate it.

use bevy_ecs::prelude::*;
use bevy_ecs::world::EntityWorldMut;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::GameClock;
use crate::components::*;
use crate::error::ConfigError;
use crate::interaction::Interactions;
use crate::stats::{ActiveModifiers, CharacterStats, StatDelta};
use crate::upgrades::OwnedUpgrades;

/// Collider radius of experience gems spawned by the destruction pipeline.
const GEM_RADIUS: f32 = 0.3;

/// Fuse of an explosive enemy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuseSpec {
    pub delay: f32,
    pub damage: i32,
    pub radius: f32,
    pub lifetime: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    ExperienceGem { value: u32 },
    Coin { value: u32 },
    Heal { amount: i32 },
    StatBoost { deltas: Vec<StatDelta>, duration: f32 },
    Crate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrefabKind {
    Enemy {
        hit_points: i32,
        speed: f32,
        contact_damage: i32,
        #[serde(default)]
        experience: Option<DropExperienceOnDestroy>,
        #[serde(default)]
        loot: Option<LootTableId>,
        #[serde(default)]
        spawn_on_destroy: Option<PrefabId>,
        #[serde(default)]
        fuse: Option<FuseSpec>,
    },
    Item {
        item: ItemKind,
    },
    /// Damages the player on contact.
    Hazard {
        damage: i32,
        #[serde(default)]
        destroy_on_contact: bool,
    },
    /// Player attack that damages enemies.
    Attack {
        damage: i32,
        #[serde(default)]
        hits: Option<u32>,
        #[serde(default)]
        knockback: Option<KnockbackOnInteraction>,
        #[serde(default)]
        bounces: Option<u32>,
    },
    Obstacle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    pub name: String,
    pub radius: f32,
    #[serde(default)]
    pub graphics: Option<GraphicsId>,
    #[serde(default)]
    pub audio_on_destroy: Option<AudioCue>,
    #[serde(default)]
    pub destruction_visual: bool,
    pub kind: PrefabKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrefabLibraryEntry {
    id: PrefabId,
    prefab: Prefab,
}

/// Every prefab a run can instantiate.
#[derive(Resource, Debug, Clone, Default)]
pub struct PrefabLibrary {
    prefabs: HashMap<PrefabId, Prefab>,
}

impl PrefabLibrary {
    pub fn insert(&mut self, id: PrefabId, prefab: Prefab) {
        self.prefabs.insert(id, prefab);
    }

    pub fn get(&self, id: PrefabId) -> Option<&Prefab> {
        self.prefabs.get(&id)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let entries: Vec<PrefabLibraryEntry> =
            serde_json::from_str(data).map_err(|source| ConfigError::Parse {
                what: "prefab library",
                source,
            })?;
        Ok(Self {
            prefabs: entries.into_iter().map(|e| (e.id, e.prefab)).collect(),
        })
    }
}

/// Spawn prefab `id` at `position` with uniform `scale`.
pub fn instantiate(
    world: &mut World,
    id: PrefabId,
    position: Position,
    scale: f32,
) -> Result<Entity, ConfigError> {
    let prefab = world
        .get_resource::<PrefabLibrary>()
        .and_then(|library| library.get(id))
        .cloned()
        .ok_or(ConfigError::UnknownPrefab(id))?;
    let now = world.get_resource::<GameClock>().map(|c| c.elapsed).unwrap_or(0.0);

    let entity = world
        .spawn((
            position,
            Scale(scale),
            Collider {
                radius: prefab.radius * scale,
            },
            DestructibleBundle::default(),
        ))
        .id();
    let mut entity_mut = world.entity_mut(entity);

    if let Some(graphics) = prefab.graphics {
        entity_mut.insert(GraphicsLink(graphics));
    }
    if let Some(cue) = prefab.audio_on_destroy {
        entity_mut.insert(PlayAudioOnDestroy { cue });
    }
    if prefab.destruction_visual {
        entity_mut.insert(PlayDestructionVisual);
    }

    match prefab.kind {
        PrefabKind::Enemy {
            hit_points,
            speed,
            contact_damage,
            experience,
            loot,
            spawn_on_destroy,
            fuse,
        } => {
            entity_mut.insert((
                Velocity::default(),
                MoveSpeed(speed),
                HitPoints::new(hit_points),
                DamageQueue::default(),
                Knockback::default(),
                EnemyTag,
                ChasePlayer,
                Interactions::new(),
                DamageOnInteraction {
                    amount: contact_damage,
                },
            ));
            if let Some(drop) = experience {
                entity_mut.insert(drop);
            }
            if let Some(table) = loot {
                entity_mut.insert(LootDrop { table });
            }
            if let Some(prefab) = spawn_on_destroy {
                entity_mut.insert(SpawnOnDestroy { prefab });
            }
            if let Some(fuse) = fuse {
                entity_mut.insert(ExplodeOnTimer {
                    detonate_at: now + fuse.delay,
                    damage: fuse.damage,
                    radius: fuse.radius,
                    lifetime: fuse.lifetime,
                });
            }
        }
        PrefabKind::Item { item } => insert_item(&mut entity_mut, item),
        PrefabKind::Hazard {
            damage,
            destroy_on_contact,
        } => {
            entity_mut.insert((
                HazardTag,
                Interactions::new(),
                DamageOnInteraction { amount: damage },
            ));
            if destroy_on_contact {
                entity_mut.insert(DestroyOnContact);
            }
        }
        PrefabKind::Attack {
            damage,
            hits,
            knockback,
            bounces,
        } => {
            entity_mut.insert((
                AttackTag,
                Velocity::default(),
                Interactions::new(),
                DamageOnInteraction { amount: damage },
            ));
            if let Some(hits) = hits {
                entity_mut.insert((HitsRemaining(hits), HitHistory::default()));
            }
            if let Some(knockback) = knockback {
                entity_mut.insert(knockback);
            }
            if let Some(remaining) = bounces {
                entity_mut.insert(BounceOffEnvironment { remaining });
            }
        }
        PrefabKind::Obstacle => {
            entity_mut.insert(EnvironmentTag);
        }
    }

    Ok(entity)
}

fn insert_item(entity_mut: &mut EntityWorldMut, item: ItemKind) {
    entity_mut.insert((ItemTag, Interactions::new()));
    match item {
        ItemKind::ExperienceGem { value } => {
            entity_mut.insert(ExperienceGemItem { value });
        }
        ItemKind::Coin { value } => {
            entity_mut.insert(CoinItem { value });
        }
        ItemKind::Heal { amount } => {
            entity_mut.insert(HealItem { amount });
        }
        ItemKind::StatBoost { deltas, duration } => {
            entity_mut.insert(StatBoostItem { deltas, duration });
        }
        ItemKind::Crate => {
            entity_mut.insert(CrateItem);
        }
    }
}

/// Spawn a pickup without going through the library.
pub fn spawn_item(world: &mut World, item: ItemKind, position: Position, radius: f32) -> Entity {
    let mut entity_mut = world.spawn((
        position,
        Scale::default(),
        Collider { radius },
        DestructibleBundle::default(),
    ));
    insert_item(&mut entity_mut, item);
    entity_mut.id()
}

/// Spawn the player character.
pub fn spawn_player(world: &mut World, position: Position, hit_points: i32) -> Entity {
    world
        .spawn((
            CharacterBundle {
                position,
                hit_points: HitPoints::new(hit_points),
                ..Default::default()
            },
            PlayerTag,
            Invincible::default(),
            NeedsStatRecalc::default(),
            ActiveModifiers::default(),
            CharacterStats::default(),
            OwnedUpgrades::default(),
            RegenCarry::default(),
        ))
        .id()
}

/// Spawn an experience pickup worth `value`.
pub fn spawn_experience_gem(world: &mut World, position: Position, value: u32) -> Entity {
    world
        .spawn((
            position,
            Scale::default(),
            Collider { radius: GEM_RADIUS },
            ItemTag,
            Interactions::new(),
            ExperienceGemItem { value },
            DestructibleBundle::default(),
        ))
        .id()
}

/// Spawn a detached, dissolving copy of a destroyed entity's graphics.
pub fn spawn_dissolve_visual(
    world: &mut World,
    graphics: GraphicsId,
    position: Position,
    scale: f32,
    started_at: f32,
    duration: f32,
) -> Entity {
    world
        .spawn((
            position,
            Scale(scale),
            DissolveVisual {
                graphics,
                started_at,
                duration,
            },
            DestructibleBundle::default(),
        ))
        .id()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY_JSON: &str = r#"[
        { "id": 1, "prefab": {
            "name": "Bomber", "radius": 0.5, "graphics": 4, "destruction_visual": true,
            "kind": { "type": "Enemy", "hit_points": 12, "speed": 2.0, "contact_damage": 3,
                      "experience": { "experience_value": 10, "chance_to_drop": 100 },
                      "spawn_on_destroy": 2,
                      "fuse": { "delay": 3.0, "damage": 8, "radius": 2.0, "lifetime": 0.25 } } } },
        { "id": 2, "prefab": {
            "name": "Blast", "radius": 0.1,
            "kind": { "type": "Hazard", "damage": 0 } } },
        { "id": 3, "prefab": {
            "name": "Coin", "radius": 0.2,
            "kind": { "type": "Item", "item": { "Coin": { "value": 5 } } } } }
    ]"#;

    #[test]
    fn test_instantiate_enemy_from_json() {
        let mut world = World::new();
        world.insert_resource(PrefabLibrary::from_json_str(LIBRARY_JSON).unwrap());

        let enemy = instantiate(&mut world, PrefabId(1), Position::new(2.0, 3.0), 2.0).unwrap();

        assert!(world.get::<EnemyTag>(enemy).is_some());
        assert_eq!(world.get::<HitPoints>(enemy), Some(&HitPoints::new(12)));
        assert_eq!(world.get::<Collider>(enemy).unwrap().radius, 1.0);
        assert_eq!(world.get::<GraphicsLink>(enemy), Some(&GraphicsLink(GraphicsId(4))));
        assert!(world.get::<PlayDestructionVisual>(enemy).is_some());
        assert_eq!(
            world.get::<SpawnOnDestroy>(enemy),
            Some(&SpawnOnDestroy { prefab: PrefabId(2) })
        );
        assert_eq!(world.get::<ExplodeOnTimer>(enemy).unwrap().detonate_at, 3.0);
        assert!(!world.get::<DestroyPending>(enemy).unwrap().is_enabled());
    }

    #[test]
    fn test_instantiate_item() {
        let mut world = World::new();
        world.insert_resource(PrefabLibrary::from_json_str(LIBRARY_JSON).unwrap());

        let coin = instantiate(&mut world, PrefabId(3), Position::default(), 1.0).unwrap();
        assert_eq!(world.get::<CoinItem>(coin), Some(&CoinItem { value: 5 }));
        assert!(world.get::<ItemTag>(coin).is_some());
        assert!(world.get::<Interactions>(coin).is_some());
    }

    #[test]
    fn test_unknown_prefab() {
        let mut world = World::new();
        world.insert_resource(PrefabLibrary::default());
        let err = instantiate(&mut world, PrefabId(9), Position::default(), 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPrefab(PrefabId(9))));
    }
}

//! Read-only snapshot types for UI and render collaborators.
//!
//! A `HudSnapshot` is built once per step from the ECS world. Collaborators
//! read it; they never write back through it.

use crate::clock::GameClock;
use crate::components::*;
use crate::run::{PendingUpgradeOffers, Progression, RunIndex, RunState, RunStats};
use crate::config::GameConfig;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Position and render handle of one visible entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: u64,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub graphics: Option<u32>,
}

/// HUD-facing view of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HudSnapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub run_index: u64,
    pub hit_points: i32,
    pub max_hit_points: i32,
    /// Total experience collected this run.
    pub experience: u32,
    pub level: u32,
    /// Experience collected towards the next level.
    pub experience_into_level: u32,
    /// Experience the current level requires.
    pub experience_required: u32,
    pub coins: u32,
    pub enemies_defeated: u32,
    /// Upgrade choice sets waiting for the player.
    pub pending_offers: usize,
    pub game_over: bool,
    pub entities: Vec<EntitySnapshot>,
}

fn kind_of(
    player: bool,
    enemy: bool,
    item: bool,
    attack: bool,
    hazard: bool,
    obstacle: bool,
    dissolving: bool,
) -> Option<&'static str> {
    let kind = if player {
        "player"
    } else if enemy {
        "enemy"
    } else if item {
        "item"
    } else if attack {
        "attack"
    } else if hazard {
        "hazard"
    } else if obstacle {
        "obstacle"
    } else if dissolving {
        "dissolve"
    } else {
        return None;
    };
    Some(kind)
}

impl HudSnapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World) -> Self {
        let mut snapshot = HudSnapshot::default();

        if let Some(clock) = world.get_resource::<GameClock>() {
            snapshot.tick = clock.tick;
            snapshot.time = clock.elapsed;
        }
        if let Some(run) = world.get_resource::<RunIndex>() {
            snapshot.run_index = run.0;
        }
        if let Some(progression) = world.get_resource::<Progression>() {
            snapshot.experience = progression.experience;
            snapshot.level = progression.level;
            snapshot.experience_into_level = progression.into_level;
            snapshot.experience_required = world
                .get_resource::<GameConfig>()
                .map(|c| c.experience_curve.required_for(progression.level))
                .unwrap_or(0);
        }
        if let Some(stats) = world.get_resource::<RunStats>() {
            snapshot.coins = stats.coins;
            snapshot.enemies_defeated = stats.enemies_defeated;
        }
        if let Some(offers) = world.get_resource::<PendingUpgradeOffers>() {
            snapshot.pending_offers = offers.0.len();
        }
        if let Some(state) = world.get_resource::<RunState>() {
            snapshot.game_over = state.game_over;
        }

        let mut player_query = world.query_filtered::<&HitPoints, With<PlayerTag>>();
        if let Some(hit_points) = player_query.iter(world).next() {
            snapshot.hit_points = hit_points.current;
            snapshot.max_hit_points = hit_points.max;
        }

        let mut query = world.query::<(
            Entity,
            &Position,
            Option<&Scale>,
            Option<&GraphicsLink>,
            Option<&DissolveVisual>,
            (
                Has<PlayerTag>,
                Has<EnemyTag>,
                Has<ItemTag>,
                Has<AttackTag>,
                Has<HazardTag>,
                Has<EnvironmentTag>,
            ),
        )>();
        for (entity, pos, scale, link, dissolve, tags) in query.iter(world) {
            let (player, enemy, item, attack, hazard, obstacle) = tags;
            let Some(kind) = kind_of(player, enemy, item, attack, hazard, obstacle, dissolve.is_some())
            else {
                continue;
            };
            let graphics = link
                .map(|l| l.0)
                .or(dissolve.map(|d| d.graphics))
                .map(|g| g.0);
            snapshot.entities.push(EntitySnapshot {
                id: entity.to_bits(),
                kind: kind.to_string(),
                x: pos.x,
                y: pos.y,
                scale: scale.map(|s| s.0).unwrap_or(1.0),
                graphics,
            });
        }
        snapshot.entities.sort_by_key(|e| e.id);

        snapshot
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

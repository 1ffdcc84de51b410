//! Public API for the gameplay core.
//!
//! `GameWorld` is the one object a host holds. It owns the ECS world and the
//! frame schedule, and exposes the few entry points a host needs: stepping,
//! feeding contacts and input, spawning, reading snapshots and draining
//! notifications.
//!
//! ## Fixed Timestep
//!
//! The core runs at a fixed timestep (default 60 Hz). `step(dt)` accumulates
//! wall time and runs as many fixed updates as fit, so behavior does not
//! depend on the host's frame rate.

use bevy_ecs::event::Events;
use bevy_ecs::prelude::*;
use tracing::{error, info, warn};

use crate::clock::{GameClock, GameRng};
use crate::commands::{BeginFrameCommands, EndFrameCommands};
use crate::components::*;
use crate::config::GameConfig;
use crate::error::ConfigError;
use crate::events::{AudioRequest, GameEvent};
use crate::loot::{LootLibrary, LootTableCache};
use crate::prefab::{self, ItemKind, PrefabLibrary};
use crate::run::{PendingUpgradeOffers, Progression, RunIndex, RunState, RunStats};
use crate::schedule::build_schedule;
use crate::spatial::SpatialGrid;
use crate::systems::{events_to_json_string, ContactEvents, PlayerInput};
use crate::upgrades::{grant_reward, Reward, UpgradeCatalog};
use crate::world::HudSnapshot;

/// Collider radius of items spawned through [`GameWorld::spawn_item`].
const ITEM_RADIUS: f32 = 0.3;

/// The gameplay world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Loading authored content
/// - Stepping the simulation forward
/// - Feeding contacts from the host's physics
/// - Extracting snapshots and notifications
pub struct GameWorld {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl GameWorld {
    /// Create a world with default configuration and no authored content.
    pub fn new() -> Self {
        Self::build(GameConfig::default())
    }

    /// Create a world with custom configuration.
    ///
    /// The configuration is validated first. A bad timestep or an inverted
    /// stat range never reaches the frame loop.
    pub fn with_config(config: GameConfig) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            error!(%err, "rejected game configuration");
            return Err(err);
        }
        Ok(Self::build(config))
    }

    fn build(config: GameConfig) -> Self {
        let mut world = World::new();

        world.insert_resource(GameClock::default());
        world.insert_resource(GameRng::seeded(config.rng_seed));
        world.insert_resource(SpatialGrid::new(config.spatial_cell_size));
        world.insert_resource(config);

        // Run state
        world.insert_resource(RunIndex::default());
        world.insert_resource(RunStats::default());
        world.insert_resource(RunState::default());
        world.insert_resource(Progression::default());
        world.insert_resource(PendingUpgradeOffers::default());

        // Frame plumbing
        world.insert_resource(BeginFrameCommands::default());
        world.insert_resource(EndFrameCommands::default());
        world.insert_resource(ContactEvents::default());
        world.insert_resource(PlayerInput::default());
        world.init_resource::<Events<GameEvent>>();
        world.init_resource::<Events<AudioRequest>>();

        // Authored content
        world.insert_resource(PrefabLibrary::default());
        world.insert_resource(LootLibrary::default());
        world.insert_resource(LootTableCache::default());
        world.insert_resource(UpgradeCatalog::default());

        Self {
            world,
            schedule: build_schedule(),
            time_accumulator: 0.0,
        }
    }

    /// Create a world from a JSON configuration document.
    pub fn from_config_json(data: &str) -> Result<Self, ConfigError> {
        Self::with_config(GameConfig::from_json_str(data)?)
    }

    pub fn set_prefabs(&mut self, library: PrefabLibrary) {
        self.world.insert_resource(library);
    }

    pub fn set_loot(&mut self, library: LootLibrary) {
        self.world.insert_resource(library);
    }

    pub fn set_upgrades(&mut self, catalog: UpgradeCatalog) {
        self.world.insert_resource(catalog);
    }

    pub fn load_prefabs_json(&mut self, data: &str) -> Result<(), ConfigError> {
        self.set_prefabs(PrefabLibrary::from_json_str(data)?);
        Ok(())
    }

    pub fn load_loot_json(&mut self, data: &str) -> Result<(), ConfigError> {
        self.set_loot(LootLibrary::from_json_str(data)?);
        Ok(())
    }

    pub fn load_upgrades_json(&mut self, data: &str) -> Result<(), ConfigError> {
        self.set_upgrades(UpgradeCatalog::from_json_str(data)?);
        Ok(())
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Accumulates time and runs fixed updates as needed.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.resource::<GameConfig>().fixed_timestep;
        if !(fixed_dt > 0.0) {
            warn!(fixed_dt, "non-positive fixed timestep, not stepping");
            return;
        }

        self.time_accumulator += dt;

        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run exactly one frame, bypassing the accumulator.
    pub fn fixed_update(&mut self, dt: f32) {
        self.world.resource_mut::<GameClock>().advance(dt);
        self.schedule.run(&mut self.world);
    }

    /// Report a contact between two entities. Consumed by the next frame.
    pub fn push_contact(&mut self, a: Entity, b: Entity) {
        self.world.resource_mut::<ContactEvents>().push(a, b);
    }

    /// Set the player's desired movement direction.
    pub fn set_player_direction(&mut self, x: f32, y: f32) {
        *self.world.resource_mut::<PlayerInput>() = PlayerInput { x, y };
    }

    pub fn spawn_player(&mut self, x: f32, y: f32, hit_points: i32) -> Entity {
        prefab::spawn_player(&mut self.world, Position::new(x, y), hit_points)
    }

    /// Give the player a weapon, replacing any it carried. Returns `false`
    /// when there is no player.
    pub fn equip_weapon(&mut self, weapon: Weapon) -> bool {
        let Some(player) = self.player() else {
            return false;
        };
        self.world.entity_mut(player).insert(weapon);
        true
    }

    /// Spawn an enemy prefab at unit scale.
    pub fn spawn_enemy(&mut self, prefab: PrefabId, x: f32, y: f32) -> Result<Entity, ConfigError> {
        self.spawn_prefab(prefab, x, y, 1.0)
    }

    pub fn spawn_item(&mut self, item: ItemKind, x: f32, y: f32) -> Entity {
        prefab::spawn_item(&mut self.world, item, Position::new(x, y), ITEM_RADIUS)
    }

    pub fn spawn_prefab(
        &mut self,
        prefab: PrefabId,
        x: f32,
        y: f32,
        scale: f32,
    ) -> Result<Entity, ConfigError> {
        prefab::instantiate(&mut self.world, prefab, Position::new(x, y), scale)
    }

    /// The player entity, if one exists.
    pub fn player(&mut self) -> Option<Entity> {
        let mut query = self.world.query_filtered::<Entity, With<PlayerTag>>();
        query.iter(&self.world).next()
    }

    /// Get a snapshot of the current run.
    pub fn snapshot(&mut self) -> HudSnapshot {
        HudSnapshot::from_world(&mut self.world)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Take every notification fired since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.resource_mut::<Events<GameEvent>>().drain().collect()
    }

    /// Drain notifications as a JSON array. A batch that fails to serialize
    /// is logged and reported as `"[]"`.
    pub fn drain_events_json(&mut self) -> String {
        let events = self.drain_events();
        events_to_json_string(&events).unwrap_or_else(|err| {
            error!(%err, dropped = events.len(), "failed to serialize notifications");
            "[]".to_string()
        })
    }

    /// Take every pending audio request, oldest first.
    pub fn drain_audio(&mut self) -> Vec<AudioRequest> {
        self.world.resource_mut::<Events<AudioRequest>>().drain().collect()
    }

    /// Upgrade choice sets waiting for the player.
    pub fn pending_offers(&self) -> usize {
        self.world.resource::<PendingUpgradeOffers>().0.len()
    }

    /// Resolve the oldest pending offer by picking choice `index`.
    ///
    /// Returns the granted reward, or `None` when there is no offer, no
    /// player, or `index` is out of range. An out-of-range pick leaves the
    /// offer queued.
    pub fn choose_upgrade(&mut self, index: usize) -> Result<Option<Reward>, ConfigError> {
        let Some(player) = self.player() else {
            return Ok(None);
        };
        let reward = {
            let mut offers = self.world.resource_mut::<PendingUpgradeOffers>();
            let Some(reward) = offers.0.front().and_then(|choices| choices.get(index).copied())
            else {
                return Ok(None);
            };
            offers.0.pop_front();
            reward
        };
        grant_reward(&mut self.world, player, &reward)?;
        Ok(Some(reward))
    }

    /// Tear the current run down and start a fresh one.
    ///
    /// Every entity is removed, per-run resources are reset and the RNG is
    /// reseeded from the configured seed and the new run index. Baked loot
    /// tables are dropped lazily on their next lookup.
    pub fn start_new_run(&mut self) {
        self.world.clear_entities();

        let run = {
            let mut run = self.world.resource_mut::<RunIndex>();
            run.0 += 1;
            *run
        };
        let seed = self.world.resource::<GameConfig>().rng_seed;

        self.world.insert_resource(GameRng::seeded(seed.wrapping_add(run.0)));
        self.world.insert_resource(RunStats::default());
        self.world.insert_resource(RunState::default());
        self.world.insert_resource(Progression::default());
        self.world.insert_resource(PendingUpgradeOffers::default());
        self.world.insert_resource(BeginFrameCommands::default());
        self.world.insert_resource(EndFrameCommands::default());
        self.world.insert_resource(ContactEvents::default());
        self.world.insert_resource(PlayerInput::default());
        self.world.resource_mut::<Events<GameEvent>>().clear();
        self.world.resource_mut::<Events<AudioRequest>>().clear();
        self.time_accumulator = 0.0;

        if self.world.resource::<UpgradeCatalog>().is_empty() {
            warn!(run = run.0, "starting run with an empty upgrade catalog");
        }
        info!(run = run.0, "new run started");
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world.resource::<GameClock>().tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.world.resource::<GameClock>().elapsed
    }

    pub fn run_index(&self) -> u64 {
        self.world.resource::<RunIndex>().0
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new()
    }
}

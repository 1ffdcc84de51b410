//! Horde Sim - Gameplay Core
//!
//! A deterministic, fixed-timestep ECS core for a top-down horde-survival
//! game: contact-driven interactions, a staged destruction pipeline, derived
//! character stats and run progression. Uses `bevy_ecs` for the
//! entity-component-system architecture.

pub mod api;
pub mod clock;
pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod interaction;
pub mod loot;
pub mod prefab;
pub mod run;
pub mod schedule;
pub mod spatial;
pub mod stats;
pub mod systems;
pub mod upgrades;
pub mod world;

pub use api::GameWorld;
pub use clock::{GameClock, GameRng};
pub use commands::{BeginFrameCommands, DeferredOp, EndFrameCommands};
pub use components::*;
pub use config::GameConfig;
pub use error::ConfigError;
pub use events::{AudioRequest, GameEvent};
pub use interaction::{Dedup, InteractionRecord, Interactions};
pub use prefab::{ItemKind, Prefab, PrefabKind, PrefabLibrary};
pub use schedule::{build_schedule, FrameSet, InteractSet};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use stats::{CharacterStats, StatDelta, StatKind};
pub use upgrades::{BonusReward, Reward, UpgradeCatalog, UpgradeId};
pub use world::{EntitySnapshot, HudSnapshot};

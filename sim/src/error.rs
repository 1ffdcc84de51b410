//! Error types for configuration and authored content.
//!
//! These are development-time faults: a bad JSON file, an id that names
//! nothing, an impossible clamp range. Runtime "component not present" is not
//! an error anywhere in the crate.

use crate::components::{LootTableId, PrefabId};
use crate::stats::StatKind;
use crate::upgrades::UpgradeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown prefab {0:?}")]
    UnknownPrefab(PrefabId),

    #[error("unknown loot table {0:?}")]
    UnknownLootTable(LootTableId),

    #[error("unknown upgrade {0:?}")]
    UnknownUpgrade(UpgradeId),

    #[error("upgrade {0:?} has no levels")]
    EmptyUpgrade(UpgradeId),

    #[error("stat {kind:?} has min {min} above max {max}")]
    InvalidStatRange { kind: StatKind, min: f32, max: f32 },

    #[error("fixed timestep must be positive, got {0}")]
    InvalidTimestep(f32),
}

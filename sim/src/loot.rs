//! Weighted loot tables.
//!
//! Authoring tables ([`LootTableDef`]) are baked once per run into
//! cumulative-key tables shared by `Arc` between every entity that uses the
//! same content. The cache is keyed by a content hash and dropped wholesale
//! when the run index changes.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::components::{LootTableId, PrefabId};
use crate::error::ConfigError;
use crate::run::RunIndex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootEntryDef {
    pub prefab: PrefabId,
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootTableDef {
    pub entries: Vec<LootEntryDef>,
}

impl LootTableDef {
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LootLibraryEntry {
    id: LootTableId,
    table: LootTableDef,
}

/// Authoring loot tables by id.
#[derive(Resource, Debug, Clone, Default)]
pub struct LootLibrary {
    tables: HashMap<LootTableId, LootTableDef>,
}

impl LootLibrary {
    pub fn insert(&mut self, id: LootTableId, table: LootTableDef) {
        self.tables.insert(id, table);
    }

    pub fn get(&self, id: LootTableId) -> Option<&LootTableDef> {
        self.tables.get(&id)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let entries: Vec<LootLibraryEntry> =
            serde_json::from_str(data).map_err(|source| ConfigError::Parse {
                what: "loot library",
                source,
            })?;
        Ok(Self {
            tables: entries.into_iter().map(|e| (e.id, e.table)).collect(),
        })
    }
}

/// Baked table: `(cumulative_key, prefab)` in ascending key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootTable {
    entries: Vec<(u32, PrefabId)>,
}

impl LootTable {
    pub fn bake(def: &LootTableDef) -> Self {
        let mut cumulative = 0u32;
        let entries = def
            .entries
            .iter()
            .map(|entry| {
                cumulative = cumulative.saturating_add(entry.weight);
                (cumulative, entry.prefab)
            })
            .collect();
        Self { entries }
    }

    pub fn max_key(&self) -> u32 {
        self.entries.last().map(|(key, _)| *key).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose key exceeds `draw`. A draw at or past the largest
    /// key selects nothing.
    pub fn pick(&self, draw: u32) -> Option<PrefabId> {
        self.entries
            .iter()
            .find(|(key, _)| *key > draw)
            .map(|(_, prefab)| *prefab)
    }

    /// Draw uniformly in `[0, max_key]` and pick.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> Option<PrefabId> {
        if self.is_empty() {
            return None;
        }
        let draw = rng.random_range(0..=self.max_key());
        self.pick(draw)
    }
}

/// Baked tables for the current run.
#[derive(Resource, Debug, Default)]
pub struct LootTableCache {
    run: RunIndex,
    tables: HashMap<u64, Arc<LootTable>>,
}

impl LootTableCache {
    /// Baked table for `def`, baking on first use in this run.
    pub fn resolve(&mut self, def: &LootTableDef, run: RunIndex) -> Arc<LootTable> {
        if self.run != run {
            self.tables.clear();
            self.run = run;
        }
        self.tables
            .entry(def.content_hash())
            .or_insert_with(|| Arc::new(LootTable::bake(def)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

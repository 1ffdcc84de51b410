//! ECS Components for the horde survival core.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.
//!
//! Rare per-entity conditions (pending destruction, invincibility, knockback,
//! stat recalculation) are modelled as *enableable* flags: the component is
//! attached once when the entity is created and only its `enabled` bit toggles
//! afterwards. Systems filter on the bit instead of adding/removing components
//! mid-frame.

use crate::stats::StatDelta;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position in the arena.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit vector pointing from `other` towards `self`, or zero when the
    /// two positions coincide.
    pub fn direction_from(&self, other: &Position) -> (f32, f32) {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < 0.0001 {
            (0.0, 0.0)
        } else {
            (dx / len, dy / len)
        }
    }
}

/// 2D velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }
}

/// Uniform scale of an entity. Spawn-on-destroy and loot spawns inherit it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale(pub f32);

impl Default for Scale {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Circle collider used by the built-in proximity contact source.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Collider {
    pub radius: f32,
}

impl Default for Collider {
    fn default() -> Self {
        Self { radius: 0.5 }
    }
}

/// Base movement speed in units per second, before the MoveSpeed stat.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveSpeed(pub f32);

impl Default for MoveSpeed {
    fn default() -> Self {
        Self(3.0)
    }
}

/// Enemy steering: walk straight at the player.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ChasePlayer;

// ============================================================================
// IDENTITY / CONTENT IDS
// ============================================================================

/// Key into the [`crate::prefab::PrefabLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefabId(pub u32);

/// Key into the [`crate::loot::LootLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LootTableId(pub u32);

/// Opaque handle of a renderer-side graphics counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GraphicsId(pub u32);

/// Opaque handle of a sound cue owned by the audio collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AudioCue(pub u32);

// ============================================================================
// TAG COMPONENTS
// ============================================================================

/// Marker for the player character.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PlayerTag;

/// Marker for hostile characters.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct EnemyTag;

/// Marker for pickups.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ItemTag;

/// Marker for static obstacles that projectiles can bounce off.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct EnvironmentTag;

/// Marker for player-owned attacks that hit enemies.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct AttackTag;

/// Marker for hostile attacks and explosions that hit the player.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct HazardTag;

// ============================================================================
// ENABLEABLE FLAGS
// ============================================================================

/// A component whose presence is permanent but whose active bit toggles.
pub trait Enableable {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    fn enable(&mut self) {
        self.set_enabled(true);
    }

    fn disable(&mut self) {
        self.set_enabled(false);
    }
}

/// Entity is waiting for the terminal destruction stage.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyPending {
    enabled: bool,
}

impl Enableable for DestroyPending {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Entity is removed by the instant-destroy stage with no secondary effects.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyInstantly {
    enabled: bool,
}

impl Enableable for DestroyInstantly {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Damage immunity window, closed once the game clock passes `until`.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Invincible {
    enabled: bool,
    pub until: f32,
}

impl Invincible {
    pub fn open_until(&mut self, until: f32) {
        self.enabled = true;
        self.until = until;
    }
}

impl Enableable for Invincible {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Forced displacement that overrides the entity's own velocity while active.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Knockback {
    enabled: bool,
    pub vx: f32,
    pub vy: f32,
    pub until: f32,
}

impl Knockback {
    pub fn push(&mut self, vx: f32, vy: f32, until: f32) {
        self.enabled = true;
        self.vx = vx;
        self.vy = vy;
        self.until = until;
    }
}

impl Enableable for Knockback {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// The owner's stat snapshot is stale.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeedsStatRecalc {
    enabled: bool,
}

impl Enableable for NeedsStatRecalc {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

// ============================================================================
// HEALTH COMPONENTS
// ============================================================================

/// Integer hit points.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
}

impl HitPoints {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Apply a signed delta, clamped to `[0, max]`.
    pub fn apply(&mut self, delta: i32) {
        self.current = self.current.saturating_add(delta).clamp(0, self.max);
    }
}

impl Default for HitPoints {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Signed hit point deltas accumulated during one frame.
///
/// Negative values are damage, positive values are healing. Drained once per
/// frame by the damage aggregation system.
#[derive(Component, Debug, Clone, Default)]
pub struct DamageQueue(pub Vec<i32>);

impl DamageQueue {
    pub fn push(&mut self, delta: i32) {
        self.0.push(delta);
    }

    /// Sum and empty the queue.
    pub fn take_total(&mut self) -> i32 {
        let total = self.0.iter().fold(0i32, |acc, d| acc.saturating_add(*d));
        self.0.clear();
        total
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fraction of a hit point regenerated but not yet applied.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct RegenCarry(pub f32);

// ============================================================================
// INTERACTION PAYLOADS
// ============================================================================

/// Damage dealt to whatever this entity interacts with.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DamageOnInteraction {
    pub amount: i32,
}

/// Character whose `DamageDealt` stat scales this attack's damage.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOwner(pub Entity);

/// Push targets away on interaction.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnockbackOnInteraction {
    pub strength: f32,
    pub duration: f32,
}

/// Number of enemies this attack can still hit.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsRemaining(pub u32);

/// Targets a capped attack has already spent a hit on.
#[derive(Component, Debug, Clone, Default)]
pub struct HitHistory(pub Vec<Entity>);

impl HitHistory {
    pub fn contains(&self, target: Entity) -> bool {
        self.0.contains(&target)
    }
}

/// Destroy this entity as soon as it interacts with anything.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct DestroyOnContact;

/// Reflect off obstacles a limited number of times.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BounceOffEnvironment {
    pub remaining: u32,
}

/// One-shot area effect: on its first produce phase the entity raises an
/// interaction against every valid target within `radius`.
#[derive(Component, Debug, Clone, Copy)]
pub struct Blast {
    pub radius: f32,
    pub fired: bool,
}

impl Blast {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            fired: false,
        }
    }
}

// ============================================================================
// WEAPON COMPONENTS
// ============================================================================

/// Periodically fires an attack prefab around its carrier.
///
/// Each volley places `1 + ProjectileCount` copies evenly on a ring of
/// `reach` around the carrier, scaled by `AttackArea`. The next volley is
/// ready `cooldown * CooldownMultiplier` seconds later.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub attack: PrefabId,
    pub cooldown: f32,
    pub reach: f32,
    /// Lifetime of each fired attack.
    pub lifetime: f32,
    #[serde(skip)]
    pub ready_at: f32,
}

impl Weapon {
    pub fn new(attack: PrefabId, cooldown: f32, reach: f32, lifetime: f32) -> Self {
        Self {
            attack,
            cooldown,
            reach,
            lifetime,
            ready_at: 0.0,
        }
    }
}

// ============================================================================
// ITEM COMPONENTS
// ============================================================================

/// Experience pickup.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceGemItem {
    pub value: u32,
}

/// Currency pickup.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinItem {
    pub value: u32,
}

/// Healing pickup.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealItem {
    pub amount: i32,
}

/// Temporary stat boost pickup.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBoostItem {
    pub deltas: Vec<StatDelta>,
    pub duration: f32,
}

/// Treasure crate, rolls one upgrade reward on pickup.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct CrateItem;

// ============================================================================
// DESTRUCTION COMPONENTS
// ============================================================================

/// Destroy the entity once the game clock passes `expires_at`.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct TimeToLive {
    pub expires_at: f32,
}

/// Presence tag read once by the terminal stage.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayAudioOnDestroy {
    pub cue: AudioCue,
}

/// Presence tag: leave a dissolving copy of the graphics counterpart behind.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PlayDestructionVisual;

/// Renderer-side counterpart that follows this entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsLink(pub GraphicsId);

/// Detached graphics left behind by a destroyed entity.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DissolveVisual {
    pub graphics: GraphicsId,
    pub started_at: f32,
    pub duration: f32,
}

/// Roll for an experience gem on destruction.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropExperienceOnDestroy {
    pub experience_value: u32,
    /// Percent chance in `0..=100`.
    pub chance_to_drop: u32,
}

/// Instantiate a prefab where this entity dies.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOnDestroy {
    pub prefab: PrefabId,
}

/// Fused explosive. Destroys itself at `detonate_at`; whatever it spawns on
/// destruction becomes a damaging blast.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplodeOnTimer {
    pub detonate_at: f32,
    pub damage: i32,
    pub radius: f32,
    pub lifetime: f32,
}

/// Roll a weighted loot table on destruction.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootDrop {
    pub table: LootTableId,
}

/// Spawned by the terminal stage when the player dies.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct GameOverMarker;

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Flags every destructible entity carries from creation.
#[derive(Bundle, Default)]
pub struct DestructibleBundle {
    pub pending: DestroyPending,
    pub instant: DestroyInstantly,
}

/// Everything the terminal stage and the consumers need on a character.
#[derive(Bundle, Default)]
pub struct CharacterBundle {
    pub position: Position,
    pub velocity: Velocity,
    pub scale: Scale,
    pub collider: Collider,
    pub speed: MoveSpeed,
    pub hit_points: HitPoints,
    pub damage_queue: DamageQueue,
    pub knockback: Knockback,
    pub destructible: DestructibleBundle,
}

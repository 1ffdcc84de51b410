//! Deferred structural changes.
//!
//! Systems running inside the frame never spawn or despawn directly. They
//! record a [`DeferredOp`] into one of two ordered logs:
//!
//! - [`BeginFrameCommands`] is replayed at the start of the next frame, before
//!   any other system observes the world.
//! - [`EndFrameCommands`] is replayed after the terminal destruction stage of
//!   the current frame, so it sees this frame's final positions.
//!
//! Replay is strictly in recorded order. An op that fails with a
//! configuration fault is logged and skipped; the rest of the log still runs.

use bevy_ecs::prelude::*;
use std::ops::{Deref, DerefMut};
use tracing::{debug, error};

use crate::clock::GameClock;
use crate::components::*;
use crate::error::ConfigError;
use crate::interaction::Interactions;
use crate::prefab::{instantiate, spawn_dissolve_visual, spawn_experience_gem};
use crate::stats::{ActiveModifiers, StatDelta, StatModifier};
use crate::upgrades::{grant_reward, Reward};

/// Damage payload applied to whatever an exploding entity spawns on death.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplosionPayload {
    pub damage: i32,
    pub radius: f32,
    pub lifetime: f32,
}

/// One recorded structural change.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredOp {
    SpawnGameOverMarker,
    SpawnDissolveVisual {
        graphics: GraphicsId,
        position: Position,
        scale: f32,
        started_at: f32,
        duration: f32,
    },
    SpawnExperienceGem {
        position: Position,
        value: u32,
    },
    InstantiatePrefab {
        prefab: PrefabId,
        position: Position,
        scale: f32,
        explosion: Option<ExplosionPayload>,
    },
    /// Fire one attack on behalf of `owner`. Dropped if the owner is gone.
    SpawnAttack {
        prefab: PrefabId,
        position: Position,
        scale: f32,
        owner: Entity,
        lifetime: f32,
    },
    /// Attach a new modifier entity to `owner`. `lifetime` makes it temporary.
    SpawnStatModifier {
        owner: Entity,
        deltas: Vec<StatDelta>,
        lifetime: Option<f32>,
    },
    GrantReward {
        owner: Entity,
        reward: Reward,
    },
    RemoveAudioOnDestroy(Entity),
    Despawn(Entity),
}

/// An ordered operation log.
#[derive(Debug, Clone, Default)]
pub struct DeferredCommands {
    ops: Vec<DeferredOp>,
}

impl DeferredCommands {
    pub fn push(&mut self, op: DeferredOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[DeferredOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Move the recorded ops out, leaving the log empty.
    pub fn take(&mut self) -> Vec<DeferredOp> {
        std::mem::take(&mut self.ops)
    }
}

/// Replayed before the next frame's systems run.
#[derive(Resource, Debug, Default)]
pub struct BeginFrameCommands(pub DeferredCommands);

/// Replayed after this frame's destruction stages.
#[derive(Resource, Debug, Default)]
pub struct EndFrameCommands(pub DeferredCommands);

impl Deref for BeginFrameCommands {
    type Target = DeferredCommands;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BeginFrameCommands {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Deref for EndFrameCommands {
    type Target = DeferredCommands;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for EndFrameCommands {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Apply the begin-of-frame log.
pub fn commit_begin_frame_commands(world: &mut World) {
    let ops = world
        .get_resource_mut::<BeginFrameCommands>()
        .map(|mut commands| commands.take())
        .unwrap_or_default();
    apply_ops(world, ops);
}

/// Apply the end-of-frame log.
pub fn commit_end_frame_commands(world: &mut World) {
    let ops = world
        .get_resource_mut::<EndFrameCommands>()
        .map(|mut commands| commands.take())
        .unwrap_or_default();
    apply_ops(world, ops);
}

/// Replay `ops` in order.
pub fn apply_ops(world: &mut World, ops: Vec<DeferredOp>) {
    for op in ops {
        if let Err(err) = apply_op(world, &op) {
            error!(?op, %err, "deferred operation aborted");
        }
    }
}

fn apply_op(world: &mut World, op: &DeferredOp) -> Result<(), ConfigError> {
    match op {
        DeferredOp::SpawnGameOverMarker => {
            world.spawn(GameOverMarker);
        }
        DeferredOp::SpawnDissolveVisual {
            graphics,
            position,
            scale,
            started_at,
            duration,
        } => {
            spawn_dissolve_visual(world, *graphics, *position, *scale, *started_at, *duration);
        }
        DeferredOp::SpawnExperienceGem { position, value } => {
            spawn_experience_gem(world, *position, *value);
        }
        DeferredOp::InstantiatePrefab {
            prefab,
            position,
            scale,
            explosion,
        } => {
            let entity = instantiate(world, *prefab, *position, *scale)?;
            if let Some(payload) = explosion {
                arm_explosion(world, entity, payload);
            }
        }
        DeferredOp::SpawnAttack {
            prefab,
            position,
            scale,
            owner,
            lifetime,
        } => {
            if !world.entities().contains(*owner) {
                debug!(?owner, "attack owner gone, dropping attack");
                return Ok(());
            }
            let entity = instantiate(world, *prefab, *position, *scale)?;
            let now = world.get_resource::<GameClock>().map(|c| c.elapsed).unwrap_or(0.0);
            world.entity_mut(entity).insert((
                AttackOwner(*owner),
                TimeToLive {
                    expires_at: now + lifetime,
                },
            ));
        }
        DeferredOp::SpawnStatModifier {
            owner,
            deltas,
            lifetime,
        } => {
            if world.get::<ActiveModifiers>(*owner).is_none() {
                debug!(?owner, "modifier owner gone, dropping modifier");
                return Ok(());
            }
            let modifier = world
                .spawn((
                    StatModifier::new(*owner, deltas.clone()),
                    DestructibleBundle::default(),
                ))
                .id();
            if let Some(lifetime) = lifetime {
                let now = world.get_resource::<GameClock>().map(|c| c.elapsed).unwrap_or(0.0);
                world.entity_mut(modifier).insert(TimeToLive {
                    expires_at: now + lifetime,
                });
            }
            if let Some(mut active) = world.get_mut::<ActiveModifiers>(*owner) {
                active.0.push(modifier);
            }
            if let Some(mut flag) = world.get_mut::<NeedsStatRecalc>(*owner) {
                flag.enable();
            }
        }
        DeferredOp::GrantReward { owner, reward } => {
            grant_reward(world, *owner, reward)?;
        }
        DeferredOp::RemoveAudioOnDestroy(entity) => {
            if world.get::<PlayAudioOnDestroy>(*entity).is_some() {
                world.entity_mut(*entity).remove::<PlayAudioOnDestroy>();
            }
        }
        DeferredOp::Despawn(entity) => {
            if !world.despawn(*entity) {
                debug!(?entity, "despawn target already gone");
            }
        }
    }
    Ok(())
}

/// Turn a freshly spawned entity into a one-shot blast.
fn arm_explosion(world: &mut World, entity: Entity, payload: &ExplosionPayload) {
    let now = world.get_resource::<GameClock>().map(|c| c.elapsed).unwrap_or(0.0);
    let mut entity_mut = world.entity_mut(entity);
    entity_mut.insert((
        DamageOnInteraction {
            amount: payload.damage,
        },
        Blast::new(payload.radius),
        TimeToLive {
            expires_at: now + payload.lifetime,
        },
    ));
    if !entity_mut.contains::<Interactions>() {
        entity_mut.insert(Interactions::new());
    }
    if !entity_mut.contains::<AttackTag>() && !entity_mut.contains::<HazardTag>() {
        entity_mut.insert(HazardTag);
    }
}

//! Contact detection - turns physics contact events into interactions.
//!
//! ## Phases
//!
//! 1. **Gather** - look up the tag set of both participants of every contact
//!    event. Sequential, one query lookup per participant.
//! 2. **Classify** - pure function of the two tag sets. With
//!    `--features parallel` this runs on rayon across all events of the step.
//! 3. **Apply** - append records to the source buffers in event order.
//!
//! Physics reports pairs with no A/B ordering, so classification tries both
//! orientations and only raises when exactly one rule matches.

use crate::components::*;
use crate::config::GameConfig;
use crate::interaction::{Dedup, Interactions};
use crate::spatial::SpatialGrid;
use crate::stats::{CharacterStats, StatKind};
use bevy_ecs::prelude::*;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One contact reported by the physics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: Entity,
    pub b: Entity,
}

/// Contact stream for the current step. Consumed by [`contact_detection_system`].
#[derive(Resource, Debug, Default)]
pub struct ContactEvents {
    events: Vec<ContactEvent>,
}

impl ContactEvents {
    pub fn push(&mut self, a: Entity, b: Entity) {
        self.events.push(ContactEvent { a, b });
    }

    pub fn take(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Bit set of the tags contact classification cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagSet(u8);

impl TagSet {
    pub const EMPTY: TagSet = TagSet(0);
    pub const PLAYER: TagSet = TagSet(1 << 0);
    pub const ENEMY: TagSet = TagSet(1 << 1);
    pub const ITEM: TagSet = TagSet(1 << 2);
    pub const ENVIRONMENT: TagSet = TagSet(1 << 3);
    pub const ATTACK: TagSet = TagSet(1 << 4);
    pub const HAZARD: TagSet = TagSet(1 << 5);
    pub const BOUNCY: TagSet = TagSet(1 << 6);

    #[inline]
    pub const fn union(self, other: TagSet) -> TagSet {
        TagSet(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: TagSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: TagSet, present: bool) -> TagSet {
        if present {
            self.union(other)
        } else {
            self
        }
    }
}

/// Which side raises against which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PairRule {
    source: TagSet,
    target: TagSet,
    dedup: Dedup,
}

const PAIR_RULES: [PairRule; 5] = [
    PairRule {
        source: TagSet::ITEM,
        target: TagSet::PLAYER,
        dedup: Dedup::Unique,
    },
    PairRule {
        source: TagSet::ATTACK,
        target: TagSet::ENEMY,
        dedup: Dedup::Unique,
    },
    PairRule {
        source: TagSet::ENEMY,
        target: TagSet::PLAYER,
        dedup: Dedup::Unique,
    },
    PairRule {
        source: TagSet::HAZARD,
        target: TagSet::PLAYER,
        dedup: Dedup::Unique,
    },
    // Bounces retrigger on every separate contact.
    PairRule {
        source: TagSet::BOUNCY,
        target: TagSet::ENVIRONMENT,
        dedup: Dedup::Repeat,
    },
];

/// Outcome of classifying one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Raise {
    pub source: Entity,
    pub target: Entity,
    pub dedup: Dedup,
}

/// Classify a contact between `a` and `b`. Returns a raise only when exactly
/// one rule matches in exactly one orientation.
pub fn classify(a: Entity, a_tags: TagSet, b: Entity, b_tags: TagSet) -> Option<Raise> {
    let mut found = None;
    let mut matches = 0;
    for rule in &PAIR_RULES {
        if a_tags.contains(rule.source) && b_tags.contains(rule.target) {
            matches += 1;
            found = Some(Raise {
                source: a,
                target: b,
                dedup: rule.dedup,
            });
        }
        if b_tags.contains(rule.source) && a_tags.contains(rule.target) {
            matches += 1;
            found = Some(Raise {
                source: b,
                target: a,
                dedup: rule.dedup,
            });
        }
    }
    if matches == 1 {
        found
    } else {
        None
    }
}

/// Read-only tag lookup used by the gather phase.
pub type TagQuery<'w, 's> = Query<
    'w,
    's,
    (
        Has<PlayerTag>,
        Has<EnemyTag>,
        Has<ItemTag>,
        Has<EnvironmentTag>,
        Has<AttackTag>,
        Has<HazardTag>,
        Has<BounceOffEnvironment>,
    ),
>;

pub fn tags_of(query: &TagQuery, entity: Entity) -> Option<TagSet> {
    let (player, enemy, item, environment, attack, hazard, bouncy) = query.get(entity).ok()?;
    Some(
        TagSet::EMPTY
            .with(TagSet::PLAYER, player)
            .with(TagSet::ENEMY, enemy)
            .with(TagSet::ITEM, item)
            .with(TagSet::ENVIRONMENT, environment)
            .with(TagSet::ATTACK, attack)
            .with(TagSet::HAZARD, hazard)
            .with(TagSet::BOUNCY, bouncy),
    )
}

/// Classify a batch of gathered contacts.
pub fn classify_all(gathered: &[(ContactEvent, TagSet, TagSet)]) -> Vec<Raise> {
    #[cfg(feature = "parallel")]
    let raises = gathered
        .par_iter()
        .filter_map(|(event, a_tags, b_tags)| classify(event.a, *a_tags, event.b, *b_tags))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let raises = gathered
        .iter()
        .filter_map(|(event, a_tags, b_tags)| classify(event.a, *a_tags, event.b, *b_tags))
        .collect();

    raises
}

/// System that converts the step's contact events into interaction records.
///
/// ## Data Access
/// - Writes: ContactEvents (drained), Interactions
/// - Reads: tag components of both participants
pub fn contact_detection_system(
    mut contacts: ResMut<ContactEvents>,
    tags: TagQuery,
    mut buffers: Query<&mut Interactions>,
) {
    let events = contacts.take();
    if events.is_empty() {
        return;
    }

    // Gather: participants that no longer exist drop out here.
    let gathered: Vec<_> = events
        .into_iter()
        .filter_map(|event| {
            let a_tags = tags_of(&tags, event.a)?;
            let b_tags = tags_of(&tags, event.b)?;
            Some((event, a_tags, b_tags))
        })
        .collect();

    let raises = classify_all(&gathered);

    // Apply: sequential, in contact order.
    for raise in raises {
        match buffers.get_mut(raise.source) {
            Ok(mut buffer) => {
                buffer.raise(raise.target, raise.dedup);
            }
            Err(_) => debug!(source = ?raise.source, "contact source has no interaction buffer"),
        }
    }
}

/// Built-in stand-in for a physics engine: every overlapping collider pair
/// becomes a contact event.
///
/// Players also touch items within their pickup reach, the collider radius
/// scaled by the `PickupRadius` stat. Reach never shrinks below the collider.
///
/// ## Data Access
/// - Reads: GameConfig, SpatialGrid, player Position/Collider/CharacterStats,
///   ItemTag (presence)
/// - Writes: ContactEvents
pub fn proximity_contacts_system(
    config: Res<GameConfig>,
    grid: Res<SpatialGrid>,
    mut contacts: ResMut<ContactEvents>,
    players: Query<(Entity, &Position, &Collider, &CharacterStats), With<PlayerTag>>,
    items: Query<(), With<ItemTag>>,
) {
    if !config.builtin_contacts {
        return;
    }
    for (a, b) in grid.overlapping_pairs() {
        contacts.push(a, b);
    }

    for (player, pos, collider, stats) in players.iter() {
        let reach = collider.radius * stats.get(StatKind::PickupRadius);
        if reach <= collider.radius {
            continue;
        }
        for entry in grid.query_radius(pos.x, pos.y, reach + grid.max_radius()) {
            if !items.contains(entry.entity) {
                continue;
            }
            let touch = reach + entry.radius;
            let dist_sq = (entry.x - pos.x).powi(2) + (entry.y - pos.y).powi(2);
            if dist_sq <= touch * touch {
                contacts.push(entry.entity, player);
            }
        }
    }
}

/// Armed blasts raise one interaction against every valid target in range,
/// once. Hazard blasts hit the player, attack blasts hit enemies.
pub fn blast_producer_system(
    mut blasts: Query<(&Position, &mut Blast, &mut Interactions, Has<AttackTag>)>,
    targets: Query<(Entity, &Position, Has<PlayerTag>, Has<EnemyTag>)>,
) {
    for (origin, mut blast, mut buffer, is_attack) in blasts.iter_mut() {
        if blast.fired {
            continue;
        }
        blast.fired = true;

        let mut hits: Vec<Entity> = targets
            .iter()
            .filter(|(_, _, is_player, is_enemy)| if is_attack { *is_enemy } else { *is_player })
            .filter(|(_, pos, _, _)| pos.distance_to(origin) <= blast.radius)
            .map(|(entity, _, _, _)| entity)
            .collect();
        hits.sort_unstable();

        for target in hits {
            buffer.raise(target, Dedup::Unique);
        }
    }
}

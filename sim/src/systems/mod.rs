//! ECS systems for the gameplay core.
//!
//! Systems contain the game logic that operates on components. Their order
//! lives in [`crate::schedule`]; each module here lists the data it reads and
//! writes.
//!
//! **Movement** - `weapon_system` records volleys once carriers have moved.
//!
//! **Produce** - turn raw contacts into interaction records:
//! - `contact_detection_system` - classifies the frame's contact events
//! - `proximity_contacts_system` - built-in overlap detector
//! - `blast_producer_system` - one-shot explosion blasts
//!
//! **Interact** - consume records:
//! - `hit_cap_system` - trims attack buffers to the remaining hit count
//! - `knockback_system`, `destroy_on_contact_system` - non-marking readers
//! - `damage_system`, `bounce_system` and the pickup systems - marking consumers
//!
//! **Resolve / Destroy** - apply the frame's outcome:
//! - `regeneration_system`, `damage_aggregation_system`,
//!   `destroy_on_zero_hits_system`
//! - `level_up_system`, `game_over_system`
//! - `instant_destroy_system`, `terminal_destroy_system`

pub mod combat;
pub mod contacts;
pub mod destruction;
pub mod movement;
pub mod pickups;
pub mod progression;
pub mod serialization;
pub mod stats;
pub mod timers;
pub mod weapons;

pub use combat::*;
pub use contacts::*;
pub use destruction::*;
pub use movement::*;
pub use pickups::*;
pub use progression::*;
pub use serialization::*;
pub use stats::*;
pub use timers::*;
pub use weapons::*;

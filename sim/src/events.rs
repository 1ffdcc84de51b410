//! Notifications for UI and audio collaborators.
//!
//! Each event fires exactly once per state transition. Collaborators drain
//! them after a step and must not write back into the core from a handler.

use bevy_ecs::prelude::*;
use serde::Serialize;

use crate::components::{AudioCue, Position};
use crate::upgrades::Reward;

#[derive(Event, Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    LevelUp { level: u32 },
    CoinCollected { amount: u32, total: u32 },
    CrateOpened { reward: Reward },
    UpgradeOffered { choices: Vec<Reward> },
    GameOver { enemies_defeated: u32 },
}

/// Sound requested by the terminal destruction stage.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AudioRequest {
    pub cue: AudioCue,
    pub position: Position,
}

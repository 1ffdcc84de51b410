//! Game clock and the run-wide random number generator.

use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Monotonic simulation clock. Advanced once per fixed update, before the
/// frame schedule runs. Timed effects store absolute expiry times against
/// `elapsed`.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct GameClock {
    pub tick: u64,
    pub elapsed: f32,
    pub delta: f32,
}

impl GameClock {
    pub fn advance(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.delta = dt;
        self.elapsed += dt;
    }

    #[inline]
    pub fn has_passed(&self, timestamp: f32) -> bool {
        self.elapsed >= timestamp
    }
}

/// Seeded RNG shared by every system that rolls dice.
///
/// Only one system holds it mutably at a time, so rolls are deterministic for
/// a given seed and contact stream.
#[derive(Resource, Debug, Clone)]
pub struct GameRng(pub ChaCha8Rng);

impl GameRng {
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}

//! Spawning from a user track: a note whenever the low band jumps above its
//! recent average.

use std::collections::VecDeque;

use pose_stream::Hand;
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::voice::{Direction, Lane, Spawn, LANE_COLUMNS, LANE_ROWS};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Samples in the rolling average.
    pub window:           usize,
    /// Spawn when energy exceeds the average by this factor…
    pub threshold_factor: f32,
    /// …and this absolute floor.
    pub floor:            f32,
    /// Seconds between spawns, at least.
    pub min_interval:     f64,
    /// Chance that a spawn is a hazard instead of a note.
    pub hazard_chance:    f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        EnergyConfig {
            window:           30,
            threshold_factor: 1.35,
            floor:            0.02,
            min_interval:     0.3,
            hazard_chance:    0.1,
        }
    }
}

/// Onset detector over a stream of energy samples.
///
/// Each sample is compared with the mean of the samples before it, so an
/// onset is not diluted by itself.  The very first sample never spawns.
#[derive(Debug)]
pub struct EnergySpawner {
    config:     EnergyConfig,
    history:    VecDeque<f32>,
    last_spawn: Option<f64>,
    next_hand:  Hand,
    rng:        SmallRng,
}

impl EnergySpawner {
    pub fn new(config: EnergyConfig, rng: SmallRng) -> Self {
        let cap = config.window.max(1);
        EnergySpawner {
            config,
            history: VecDeque::with_capacity(cap),
            last_spawn: None,
            next_hand: Hand::Left,
            rng,
        }
    }

    pub fn sample(&mut self, energy: f32, now: f64) -> Option<Spawn> {
        let energy = if energy.is_finite() { energy.max(0.0) } else { 0.0 };

        let triggered = match self.average() {
            Some(avg) => {
                energy > avg * self.config.threshold_factor
                    && energy > self.config.floor
                    && self.last_spawn.map_or(true, |t| now - t >= self.config.min_interval)
            }
            None => false,
        };

        if self.history.len() == self.config.window.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(energy);

        if !triggered { return None; }
        trace!(energy, now, "energy onset");
        self.last_spawn = Some(now);
        Some(self.make_spawn())
    }

    /// Mean of the retained samples.
    pub fn average(&self) -> Option<f32> {
        if self.history.is_empty() { return None; }
        Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_spawn = None;
        self.next_hand  = Hand::Left;
    }

    fn make_spawn(&mut self) -> Spawn {
        let y = self.rng.gen_range(0..LANE_ROWS);
        if self.rng.gen_bool(self.config.hazard_chance.clamp(0.0, 1.0)) {
            let x = self.rng.gen_range(0..LANE_COLUMNS);
            return Spawn::Hazard { lane: Lane::new(x, y) };
        }
        let hand = self.next_hand;
        self.next_hand = hand.other();
        let half = LANE_COLUMNS / 2;
        let x = match hand {
            Hand::Left  => self.rng.gen_range(0..half),
            Hand::Right => self.rng.gen_range(half..LANE_COLUMNS),
        };
        let direction = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
        Spawn::Note { lane: Lane::new(x, y), hand, direction }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

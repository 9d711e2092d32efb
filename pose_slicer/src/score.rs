//! Score, combo, energy and the end-of-session grade.

use std::fmt;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// ScoringConfig
// ════════════════════════════════════════════════════════════════════════════

/// Multiplier applied while the combo is strictly above `above`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComboTier {
    pub above:      u32,
    pub multiplier: f64,
}

/// Accuracy needed for each grade; anything lower is C.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub sss: f64,
    pub ss:  f64,
    pub s:   f64,
    pub a:   f64,
    pub b:   f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        GradeThresholds { sss: 0.90, ss: 0.85, s: 0.75, a: 0.60, b: 0.45 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points for a regular hit before multipliers.
    pub base_value:       u32,
    pub combo_tiers:      Vec<ComboTier>,
    pub starting_energy:  u8,
    pub hit_bonus:        u8,
    pub miss_penalty:     u8,
    pub hazard_penalty:   u8,
    pub obstacle_penalty: u8,
    pub grades:           GradeThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            base_value:       100,
            combo_tiers:      vec![
                ComboTier { above: 10, multiplier: 1.1  },
                ComboTier { above: 25, multiplier: 1.25 },
                ComboTier { above: 50, multiplier: 1.5  },
            ],
            starting_energy:  100,
            hit_bonus:        2,
            miss_penalty:     10,
            hazard_penalty:   25,
            obstacle_penalty: 15,
            grades:           GradeThresholds::default(),
        }
    }
}

impl ScoringConfig {
    /// Highest tier the combo qualifies for; 1.0 below every tier.
    pub fn combo_multiplier(&self, combo: u32) -> f64 {
        self.combo_tiers.iter()
            .filter(|t| combo > t.above)
            .map(|t| t.multiplier)
            .fold(1.0, f64::max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Grade
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade { C, B, A, S, SS, SSS }

impl Grade {
    pub fn from_accuracy(accuracy: f64, t: &GradeThresholds) -> Grade {
        if accuracy >= t.sss      { Grade::SSS }
        else if accuracy >= t.ss  { Grade::SS }
        else if accuracy >= t.s   { Grade::S }
        else if accuracy >= t.a   { Grade::A }
        else if accuracy >= t.b   { Grade::B }
        else                      { Grade::C }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::SSS => "SSS", Grade::SS => "SS", Grade::S => "S",
            Grade::A   => "A",   Grade::B  => "B",  Grade::C => "C",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

// ════════════════════════════════════════════════════════════════════════════
// Scoreboard
// ════════════════════════════════════════════════════════════════════════════

/// Per-session tallies.  Energy is kept in `0..=100` by every update.
#[derive(Clone, Debug)]
pub struct Scoreboard {
    config:      ScoringConfig,
    score:       u64,
    combo:       u32,
    max_combo:   u32,
    energy:      u8,
    total_notes: u32,
    hit_notes:   u32,
    misses:      u32,
    hazards_hit: u32,
    obstacles_hit: u32,
}

impl Scoreboard {
    pub fn new(config: ScoringConfig) -> Self {
        let energy = config.starting_energy.min(100);
        Scoreboard {
            config,
            score: 0, combo: 0, max_combo: 0, energy,
            total_notes: 0, hit_notes: 0, misses: 0, hazards_hit: 0, obstacles_hit: 0,
        }
    }

    /// Count a regular note toward accuracy as soon as it exists.
    pub fn register_note(&mut self) { self.total_notes += 1; }

    /// A regular note sliced by the right hand.  `boost` stacks on the combo
    /// multiplier (overdrive).  Returns the points awarded.
    pub fn hit(&mut self, boost: f64) -> u64 {
        self.hit_notes += 1;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        let mult = self.config.combo_multiplier(self.combo) * boost.max(1.0);
        let points = (self.config.base_value as f64 * mult).round() as u64;
        self.score += points;
        self.add_energy(self.config.hit_bonus as i32);
        points
    }

    /// Returns true if this emptied the energy bar.
    pub fn miss(&mut self) -> bool {
        self.misses += 1;
        self.combo = 0;
        self.drain(self.config.miss_penalty)
    }

    /// Returns true if this emptied the energy bar.
    pub fn hazard(&mut self) -> bool {
        self.hazards_hit += 1;
        self.combo = 0;
        self.drain(self.config.hazard_penalty)
    }

    /// Obstacle collision.  Returns true if this emptied the energy bar.
    pub fn obstacle(&mut self) -> bool {
        self.obstacles_hit += 1;
        self.combo = 0;
        self.drain(self.config.obstacle_penalty)
    }

    fn drain(&mut self, amount: u8) -> bool {
        self.add_energy(-(amount as i32));
        self.energy == 0
    }

    fn add_energy(&mut self, delta: i32) {
        self.energy = (self.energy as i32 + delta).clamp(0, 100) as u8;
    }

    /// `hit / total`, 0 when nothing spawned.
    pub fn accuracy(&self) -> f64 {
        if self.total_notes == 0 { 0.0 } else { self.hit_notes as f64 / self.total_notes as f64 }
    }

    pub fn grade(&self) -> Grade { Grade::from_accuracy(self.accuracy(), &self.config.grades) }

    pub fn score(&self)         -> u64 { self.score }
    pub fn combo(&self)         -> u32 { self.combo }
    pub fn max_combo(&self)     -> u32 { self.max_combo }
    pub fn energy(&self)        -> u8  { self.energy }
    pub fn total_notes(&self)   -> u32 { self.total_notes }
    pub fn hit_notes(&self)     -> u32 { self.hit_notes }
    pub fn misses(&self)        -> u32 { self.misses }
    pub fn hazards_hit(&self)   -> u32 { self.hazards_hit }
    pub fn obstacles_hit(&self) -> u32 { self.obstacles_hit }
    pub fn config(&self) -> &ScoringConfig { &self.config }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Overdrive: a combo-triggered score boost with a cooldown.
//!
//! ```text
//!   Ready ──combo ≥ trigger──▶ Active ──active_secs──▶ Cooling ──cooldown_secs──▶ Ready
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverdriveConfig {
    pub enabled:       bool,
    pub trigger_combo: u32,
    pub active_secs:   f64,
    pub cooldown_secs: f64,
    /// Score multiplier while active.
    pub boost:         f64,
}

impl Default for OverdriveConfig {
    fn default() -> Self {
        OverdriveConfig {
            enabled:       true,
            trigger_combo: 30,
            active_secs:   6.0,
            cooldown_secs: 12.0,
            boost:         2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkillState {
    Ready,
    Active  { until: f64 },
    Cooling { until: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkillTransition { Activated, Expired, Recharged }

#[derive(Clone, Debug)]
pub struct Overdrive {
    config: OverdriveConfig,
    state:  SkillState,
}

impl Overdrive {
    pub fn new(config: OverdriveConfig) -> Self { Overdrive { config, state: SkillState::Ready } }

    /// Advance on the session clock.  At most one transition per call.
    pub fn update(&mut self, combo: u32, now: f64) -> Option<SkillTransition> {
        if !self.config.enabled { return None; }
        match self.state {
            SkillState::Ready if combo >= self.config.trigger_combo => {
                self.state = SkillState::Active { until: now + self.config.active_secs };
                info!(combo, "overdrive on");
                Some(SkillTransition::Activated)
            }
            SkillState::Active { until } if now >= until => {
                self.state = SkillState::Cooling { until: now + self.config.cooldown_secs };
                Some(SkillTransition::Expired)
            }
            SkillState::Cooling { until } if now >= until => {
                self.state = SkillState::Ready;
                Some(SkillTransition::Recharged)
            }
            _ => None,
        }
    }

    pub fn boost(&self) -> f64 {
        match self.state {
            SkillState::Active { .. } => self.config.boost,
            _ => 1.0,
        }
    }

    pub fn state(&self) -> SkillState { self.state }
    pub fn is_active(&self) -> bool { matches!(self.state, SkillState::Active { .. }) }

    /// Fraction of the current phase left, for the HUD meter.
    pub fn remaining_fraction(&self, now: f64) -> f32 {
        let (until, span) = match self.state {
            SkillState::Ready => return 1.0,
            SkillState::Active  { until } => (until, self.config.active_secs),
            SkillState::Cooling { until } => (until, self.config.cooldown_secs),
        };
        if span <= 0.0 { return 0.0; }
        ((until - now) / span).clamp(0.0, 1.0) as f32
    }
}

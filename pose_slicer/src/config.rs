//! Game configuration, loaded from TOML.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes:
//!
//! ```toml
//! [scheduler]
//! obstacle_chance = 0.5
//! seed = 7
//!
//! [scoring]
//! miss_penalty = 5
//! ```

use std::path::{Path, PathBuf};

use beat_midi::{EnergyConfig, SchedulerConfig};
use pose_stream::SmoothingConfig;
use serde::{Deserialize, Serialize};

use crate::judge::JudgeConfig;
use crate::notes::NoteConfig;
use crate::score::ScoringConfig;
use crate::skill::OverdriveConfig;
use crate::Error;

/// Where pose frames come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseFeedKind {
    /// Mouse and keyboard stand in for the body.
    #[default]
    Sim,
    /// JSON lines on stdin from an external detector.
    Stdin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of a synthesized session.  Recorded tracks run to their end.
    pub session_seconds: f64,
    pub dwell_secs:      f64,
    /// Frames older than this count as no frame.
    pub stale_pose_ms:   u64,
    /// Simulation and render rate.
    pub sim_hz:          u32,
    pub pose_feed:       PoseFeedKind,
    /// Offered as the fourth track choice when set.
    pub user_track:      Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            session_seconds: 90.0,
            dwell_secs:      dwell_select::DEFAULT_DWELL_SECS,
            stale_pose_ms:   250,
            sim_hz:          60,
            pose_feed:       PoseFeedKind::Sim,
            user_track:      None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Send the groove to a MIDI port.  Without one, play silently.
    pub enable_midi:    bool,
    /// Prefer the first output port whose name contains this.
    pub midi_port_hint: Option<String>,
    /// User track volume, 0–1.
    pub volume:         f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig { enable_midi: true, midi_port_hint: None, volume: 0.8 }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub session:   SessionConfig,
    pub smoothing: SmoothingConfig,
    pub scheduler: SchedulerConfig,
    pub energy:    EnergyConfig,
    pub notes:     NoteConfig,
    pub judge:     JudgeConfig,
    pub scoring:   ScoringConfig,
    pub overdrive: OverdriveConfig,
    pub audio:     AudioConfig,
}

fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), Error> {
    if ok { Ok(()) } else { Err(Error::Config(msg())) }
}

fn unit(x: f64) -> bool { (0.0..=1.0).contains(&x) }

impl GameConfig {
    /// Reject values the game cannot run with.  Reports the first problem.
    pub fn validate(&self) -> Result<(), Error> {
        let s = &self.session;
        check(s.session_seconds > 0.0, || format!("session_seconds must be > 0, got {}", s.session_seconds))?;
        check(s.dwell_secs > 0.0 && s.dwell_secs.is_finite(), || format!("dwell_secs must be a finite value > 0, got {}", s.dwell_secs))?;
        check((10..=240).contains(&s.sim_hz), || format!("sim_hz must be in [10, 240], got {}", s.sim_hz))?;

        let p = &self.smoothing;
        check(p.hand_alpha > 0.0 && p.hand_alpha <= 1.0, || format!("hand_alpha must be in (0, 1], got {}", p.hand_alpha))?;
        check(p.body_alpha > 0.0 && p.body_alpha <= 1.0, || format!("body_alpha must be in (0, 1], got {}", p.body_alpha))?;
        check(unit(p.min_confidence as f64), || format!("min_confidence must be in [0, 1], got {}", p.min_confidence))?;

        let b = &self.scheduler;
        check((20.0..=300.0).contains(&b.bpm), || format!("bpm must be in [20, 300], got {}", b.bpm))?;
        check(b.period > 0.0 && b.lookahead > b.period, || {
            format!("need 0 < period < lookahead, got period {} lookahead {}", b.period, b.lookahead)
        })?;
        check(b.start_delay >= 0.0, || "start_delay must be >= 0".to_string())?;
        check(unit(b.obstacle_chance), || format!("obstacle_chance must be in [0, 1], got {}", b.obstacle_chance))?;

        let e = &self.energy;
        check(e.window > 0, || "energy window must be > 0".to_string())?;
        check(e.threshold_factor >= 1.0, || format!("threshold_factor must be >= 1, got {}", e.threshold_factor))?;
        check(unit(e.hazard_chance), || format!("hazard_chance must be in [0, 1], got {}", e.hazard_chance))?;

        let n = &self.notes;
        check(n.speed > 0.0, || format!("note speed must be > 0, got {}", n.speed))?;
        check(
            n.remove_depth < n.near_bound && n.near_bound < n.far_bound && n.far_bound < n.spawn_depth,
            || "note depths must satisfy remove_depth < near_bound < far_bound < spawn_depth".to_string(),
        )?;
        check(n.max_speed_scale >= 1.0, || "max_speed_scale must be >= 1".to_string())?;

        let j = &self.judge;
        check(j.note_size > 0.0 && j.margin_factor > 0.0, || "note_size and margin_factor must be > 0".to_string())?;

        let c = &self.scoring;
        check(c.starting_energy > 0 && c.starting_energy <= 100, || {
            format!("starting_energy must be in [1, 100], got {}", c.starting_energy)
        })?;
        check(c.combo_tiers.iter().all(|t| t.multiplier >= 1.0), || "combo multipliers must be >= 1".to_string())?;

        check(self.overdrive.boost >= 1.0, || format!("overdrive boost must be >= 1, got {}", self.overdrive.boost))?;
        check(unit(self.audio.volume as f64), || format!("volume must be in [0, 1], got {}", self.audio.volume))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_has_every_section() {
        let toml = GameConfig::default().to_toml().unwrap();
        for section in ["[session]", "[smoothing]", "[scheduler]", "[notes]", "[judge]", "[scoring]", "[overdrive]", "[audio]"] {
            assert!(toml.contains(section), "missing {}", section);
        }
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("slicer.toml");
        let mut config = GameConfig::default();
        config.scheduler.bpm = 140.0;
        config.scheduler.seed = Some(7);
        config.session.pose_feed = PoseFeedKind::Stdin;
        config.save(&path).unwrap();
        assert_eq!(GameConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: GameConfig = toml::from_str("[scoring]\nmiss_penalty = 5\n").unwrap();
        assert_eq!(config.scoring.miss_penalty, 5);
        assert_eq!(config.scoring.hazard_penalty, 25);
        assert_eq!(config.scheduler.bpm, 120.0);
    }

    #[test]
    fn bad_value_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[scheduler]\nbpm = 0.0\n").unwrap();
        assert!(matches!(GameConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_file_is_a_toml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[scheduler\n").unwrap();
        assert!(matches!(GameConfig::load(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn missing_file_is_io() {
        assert!(matches!(GameConfig::load(Path::new("/nonexistent/slicer.toml")), Err(Error::Io(_))));
    }

    #[test]
    fn non_finite_dwell_rejected() {
        let mut config = GameConfig::default();
        config.session.dwell_secs = f64::INFINITY;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.session.dwell_secs = f64::NAN;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn inverted_depth_window_rejected() {
        let mut config = GameConfig::default();
        config.notes.near_bound = 5.0;
        assert!(config.validate().is_err());
    }
}

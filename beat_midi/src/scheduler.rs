//! Lookahead beat scheduler.
//!
//! The scheduler is ticked every `period` seconds (25 ms by default) from
//! the session loop.  Each tick it processes every subdivision whose
//! nominal time falls before `audio.now() + lookahead`, so sound is queued
//! slightly ahead of the clock and never waits on render jitter.  After a
//! stall the next tick drains all overdue subdivisions in order.
//!
//! ```text
//!         audio.now()            now + lookahead
//!   ──────────┼───────────────────────┼────────────▶ t
//!     ●   ●   ●   ●   ●   ●   ●   ●   ○   ○
//!     └─ already emitted ─┘└─ due this tick ─┘ later
//! ```
//!
//! In energy mode there is no grid: each tick samples the track's low
//! band and asks the [`EnergySpawner`] whether to spawn.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::AudioOutput;
use crate::energy::{EnergyConfig, EnergySpawner};
use crate::pattern::{Pattern, STEPS_PER_BAR};
use crate::voice::{ObstacleKind, Spawn, VoiceEvent};

// ════════════════════════════════════════════════════════════════════════════
// SchedulerConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub bpm:             f64,
    /// How far ahead of the audio clock to schedule, seconds.
    pub lookahead:       f64,
    /// Scheduler tick period, seconds.
    pub period:          f64,
    /// Gap between `start` and the first subdivision, seconds.
    pub start_delay:     f64,
    /// Chance of an obstacle on each rolling step.
    pub obstacle_chance: f64,
    /// Fixed RNG seed; random when absent.
    pub seed:            Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            bpm:             120.0,
            lookahead:       0.1,
            period:          0.025,
            start_delay:     0.05,
            obstacle_chance: 0.08,
            seed:            None,
        }
    }
}

impl SchedulerConfig {
    /// Length of one sixteenth note.
    pub fn step_duration(&self) -> f64 { 0.25 * 60.0 / self.bpm }

    pub fn rng(&self) -> SmallRng {
        match self.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None    => SmallRng::from_entropy(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ScheduledStep
// ════════════════════════════════════════════════════════════════════════════

/// One processed trigger point.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledStep {
    /// Strictly increasing across the scheduler's life.
    pub instance:    u64,
    /// Position in the bar; `None` for energy-driven triggers.
    pub subdivision: Option<u8>,
    /// Nominal time on the audio clock.
    pub time:        f64,
    pub voices:      Vec<VoiceEvent>,
    pub spawns:      Vec<Spawn>,
}

// ════════════════════════════════════════════════════════════════════════════
// BeatScheduler
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Mode {
    Synth  { pattern: Pattern },
    Energy { spawner: EnergySpawner },
}

#[derive(Debug)]
pub struct BeatScheduler {
    config:          SchedulerConfig,
    mode:            Mode,
    next_event_time: f64,
    counter:         u8,
    instance:        u64,
    running:         bool,
    rng:             SmallRng,
}

/// More than this many steps in one tick is logged as a stall.
const CATCH_UP_LOG: usize = 4;

impl BeatScheduler {
    /// Synthesized mode over `pattern`.
    ///
    /// # Panics
    /// If the tempo is not a positive finite number.
    pub fn synth(config: SchedulerConfig, pattern: Pattern) -> Self {
        BeatScheduler::with_mode(config, |_| Mode::Synth { pattern })
    }

    /// Audio-energy mode.
    pub fn energy(config: SchedulerConfig, energy: EnergyConfig) -> Self {
        BeatScheduler::with_mode(config, |rng| Mode::Energy {
            spawner: EnergySpawner::new(energy, SmallRng::seed_from_u64(rng.gen())),
        })
    }

    fn with_mode(config: SchedulerConfig, mode: impl FnOnce(&mut SmallRng) -> Mode) -> Self {
        assert!(config.bpm.is_finite() && config.bpm > 0.0, "bpm must be positive, got {}", config.bpm);
        let mut rng = config.rng();
        let mode = mode(&mut rng);
        BeatScheduler {
            config,
            mode,
            next_event_time: 0.0,
            counter:         0,
            instance:        0,
            running:         false,
            rng,
        }
    }

    /// Arm the scheduler; the first subdivision falls `start_delay` after
    /// `now`.
    pub fn start(&mut self, now: f64) {
        self.next_event_time = now + self.config.start_delay;
        self.counter = 0;
        if let Mode::Energy { spawner } = &mut self.mode { spawner.reset(); }
        self.running = true;
        info!(bpm = self.config.bpm, energy = self.is_energy_mode(), "scheduler started");
    }

    /// Cancel.  Calling it again does nothing.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            info!(instances = self.instance, "scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool { self.running }
    pub fn is_energy_mode(&self) -> bool { matches!(self.mode, Mode::Energy { .. }) }
    pub fn step_duration(&self) -> f64 { self.config.step_duration() }
    pub fn period(&self) -> f64 { self.config.period }
    pub fn next_event_time(&self) -> f64 { self.next_event_time }
    pub fn config(&self) -> &SchedulerConfig { &self.config }

    /// One scheduler period.  Voices go straight to `audio`; the processed
    /// steps are returned so the caller can spawn notes.
    pub fn tick(&mut self, audio: &mut dyn AudioOutput) -> Vec<ScheduledStep> {
        if !self.running { return Vec::new(); }
        let now = audio.now();

        if self.is_energy_mode() {
            return self.tick_energy(audio, now).into_iter().collect();
        }

        let horizon = now + self.config.lookahead;
        let mut out = Vec::new();
        while self.next_event_time < horizon {
            let step = self.process_subdivision();
            for v in &step.voices {
                audio.schedule(step.time, *v);
            }
            out.push(step);
        }
        if out.len() > CATCH_UP_LOG {
            debug!(steps = out.len(), "scheduler caught up after stall");
        }
        out
    }

    fn process_subdivision(&mut self) -> ScheduledStep {
        let sub  = self.counter;
        let time = self.next_event_time;
        let step_secs = self.config.step_duration();

        let (voices, mut spawns, roll) = match &self.mode {
            Mode::Synth { pattern } => {
                let s = pattern.step(sub as usize);
                (s.hits.iter().map(|h| h.event(step_secs)).collect(), s.spawns.clone(), s.obstacle_roll)
            }
            Mode::Energy { .. } => (Vec::new(), Vec::new(), false),
        };

        if roll && self.rng.gen_bool(self.config.obstacle_chance.clamp(0.0, 1.0)) {
            let kind = ObstacleKind::ALL[self.rng.gen_range(0..ObstacleKind::ALL.len())];
            spawns.push(Spawn::Obstacle { kind });
        }

        self.instance += 1;
        self.next_event_time += step_secs;
        self.counter = (self.counter + 1) % STEPS_PER_BAR as u8;

        ScheduledStep { instance: self.instance, subdivision: Some(sub), time, voices, spawns }
    }

    fn tick_energy(&mut self, audio: &dyn AudioOutput, now: f64) -> Option<ScheduledStep> {
        let energy = audio.low_band_energy()?;
        let Mode::Energy { spawner } = &mut self.mode else { return None };
        let spawn = spawner.sample(energy, now)?;
        self.instance += 1;
        Some(ScheduledStep {
            instance:    self.instance,
            subdivision: None,
            time:        now,
            voices:      Vec::new(),
            spawns:      vec![spawn],
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TrackBuffer;
    use std::sync::Arc;

    /// Manually advanced clock that records what was scheduled.
    #[derive(Default)]
    struct FakeAudio {
        now:       f64,
        scheduled: Vec<(f64, VoiceEvent)>,
        energy:    Option<f32>,
    }

    impl AudioOutput for FakeAudio {
        fn now(&self) -> f64 { self.now }
        fn schedule(&mut self, at: f64, event: VoiceEvent) { self.scheduled.push((at, event)); }
        fn play_track(&mut self, _track: Arc<TrackBuffer>) {}
        fn stop_all(&mut self) {}
        fn low_band_energy(&self) -> Option<f32> { self.energy }
        fn track_position(&self) -> Option<f64> { None }
    }

    fn seeded(bpm: f64) -> SchedulerConfig {
        SchedulerConfig { bpm, seed: Some(1), ..SchedulerConfig::default() }
    }

    #[test]
    fn step_duration_at_120_bpm() {
        assert_eq!(seeded(120.0).step_duration(), 0.125);
    }

    #[test]
    fn nothing_before_start() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        assert!(s.tick(&mut audio).is_empty());
    }

    #[test]
    fn schedules_within_lookahead_only() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        // first step at 0.05, horizon 0.1
        let steps = s.tick(&mut audio);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].subdivision, Some(0));
        assert!((steps[0].time - 0.05).abs() < 1e-9);
        // nothing new until the horizon passes 0.175
        audio.now = 0.05;
        assert!(s.tick(&mut audio).is_empty());
        audio.now = 0.08;
        assert_eq!(s.tick(&mut audio).len(), 1);
    }

    #[test]
    fn catch_up_emits_exactly_the_due_steps() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        s.tick(&mut audio);
        // stall for a second
        audio.now = 1.0;
        let steps = s.tick(&mut audio);
        // due: nominal times 0.175, 0.3, … < 1.1
        let expected = (0..).map(|k| 0.05 + 0.125 * k as f64)
            .skip(1)
            .take_while(|&t| t < 1.1)
            .count();
        assert_eq!(steps.len(), expected);
        for w in steps.windows(2) {
            assert!(w[1].time > w[0].time);
            assert_eq!(w[1].instance, w[0].instance + 1);
        }
        assert!(s.tick(&mut audio).is_empty());
    }

    #[test]
    fn instances_never_repeat_across_ticks() {
        let mut s = BeatScheduler::synth(seeded(140.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        let mut seen = Vec::new();
        let mut t = 0.0;
        while t < 4.0 {
            audio.now = t;
            seen.extend(s.tick(&mut audio).into_iter().map(|st| st.instance));
            t += if (t * 40.0) as u32 % 17 == 0 { 0.3 } else { 0.025 };
        }
        let mut dedup = seen.clone();
        dedup.dedup();
        assert_eq!(seen, dedup);
        assert!(seen.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn subdivision_wraps_every_bar() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio { now: 2.5, ..FakeAudio::default() };
        s.start(0.0);
        let subs: Vec<u8> = s.tick(&mut audio).iter().filter_map(|st| st.subdivision).collect();
        assert_eq!(&subs[..18], &[0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,0,1]);
    }

    #[test]
    fn voices_reach_the_audio_output() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        let steps = s.tick(&mut audio);
        assert_eq!(audio.scheduled.len(), steps[0].voices.len());
        assert!(audio.scheduled.iter().all(|(at, _)| (*at - 0.05).abs() < 1e-9));
    }

    #[test]
    fn stop_is_idempotent_and_silences_ticks() {
        let mut s = BeatScheduler::synth(seeded(120.0), Pattern::authored());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        s.stop();
        s.stop();
        audio.now = 5.0;
        assert!(s.tick(&mut audio).is_empty());
    }

    #[test]
    fn obstacles_follow_chance() {
        let always = SchedulerConfig { obstacle_chance: 1.0, ..seeded(120.0) };
        let mut s = BeatScheduler::synth(always, Pattern::authored());
        let mut audio = FakeAudio { now: 1.9, ..FakeAudio::default() };
        s.start(0.0);
        let obstacles: Vec<u8> = s.tick(&mut audio).iter()
            .filter(|st| st.spawns.iter().any(|sp| matches!(sp, Spawn::Obstacle { .. })))
            .filter_map(|st| st.subdivision)
            .collect();
        assert_eq!(obstacles, vec![0, 8]);

        let never = SchedulerConfig { obstacle_chance: 0.0, ..seeded(120.0) };
        let mut s = BeatScheduler::synth(never, Pattern::authored());
        s.start(0.0);
        assert!(s.tick(&mut audio).iter()
            .all(|st| st.spawns.iter().all(|sp| !matches!(sp, Spawn::Obstacle { .. }))));
    }

    #[test]
    fn energy_mode_spawns_on_onsets() {
        let cfg = EnergyConfig { hazard_chance: 0.0, ..EnergyConfig::default() };
        let mut s = BeatScheduler::energy(seeded(120.0), cfg);
        let mut audio = FakeAudio { energy: Some(0.05), ..FakeAudio::default() };
        s.start(0.0);
        for i in 0..30 {
            audio.now = i as f64 * 0.025;
            assert!(s.tick(&mut audio).is_empty());
        }
        audio.now = 1.0;
        audio.energy = Some(0.6);
        let steps = s.tick(&mut audio);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].subdivision, None);
        assert!(matches!(steps[0].spawns[0], Spawn::Note { .. }));
    }

    #[test]
    fn energy_mode_waits_for_track() {
        let mut s = BeatScheduler::energy(seeded(120.0), EnergyConfig::default());
        let mut audio = FakeAudio::default();
        s.start(0.0);
        audio.now = 1.0;
        assert!(s.tick(&mut audio).is_empty());
    }

    #[test]
    #[should_panic]
    fn zero_bpm_rejected() {
        let _ = BeatScheduler::synth(seeded(0.0), Pattern::authored());
    }
}

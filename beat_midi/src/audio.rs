//! The audio seam: a clock, a place to send voices, and the decoded track
//! that drives energy-mode spawning.

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Instant;

use crate::voice::VoiceEvent;

// ════════════════════════════════════════════════════════════════════════════
// AudioOutput trait
// ════════════════════════════════════════════════════════════════════════════

/// An audio backend owned by the session and passed in by reference.
///
/// Implementations must keep `now()` running even when no device is present,
/// so scheduling keeps its timing while sound is skipped.
pub trait AudioOutput {
    /// Seconds on the audio clock.
    fn now(&self) -> f64;
    /// Start `event` at `at` seconds on the audio clock.
    fn schedule(&mut self, at: f64, event: VoiceEvent);
    /// Start playing a decoded track from the beginning.
    fn play_track(&mut self, track: Arc<TrackBuffer>);
    /// Silence everything.  Safe to call repeatedly.
    fn stop_all(&mut self);
    /// Low-frequency energy of the playing track right now, if any.
    fn low_band_energy(&self) -> Option<f32>;
    /// Position in the playing track, in seconds.
    fn track_position(&self) -> Option<f64>;
}

// ════════════════════════════════════════════════════════════════════════════
// AudioClock
// ════════════════════════════════════════════════════════════════════════════

/// Monotonic seconds since construction.
#[derive(Clone, Copy, Debug)]
pub struct AudioClock {
    origin: Instant,
}

impl AudioClock {
    pub fn new() -> Self { AudioClock { origin: Instant::now() } }
    pub fn now(&self) -> f64 { self.origin.elapsed().as_secs_f64() }
}

impl Default for AudioClock {
    fn default() -> Self { AudioClock::new() }
}

// ════════════════════════════════════════════════════════════════════════════
// TrackBuffer
// ════════════════════════════════════════════════════════════════════════════

/// Cutoff for the low band, Hz.
pub const LOW_BAND_CUTOFF: f32 = 150.0;
/// Samples per energy window.
pub const ENERGY_WINDOW: usize = 1024;
const FILTER_WARMUP: usize = 256;

/// A decoded track, downmixed to mono.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackBuffer {
    pub name:        String,
    pub sample_rate: u32,
    pub samples:     Vec<f32>,
}

impl TrackBuffer {
    pub fn new(name: &str, sample_rate: u32, samples: Vec<f32>) -> Self {
        TrackBuffer { name: name.to_string(), sample_rate, samples }
    }

    /// Interleaved frames of `channels` samples, averaged to mono.
    pub fn from_interleaved(name: &str, sample_rate: u32, channels: u16, data: &[f32]) -> Self {
        let ch = channels.max(1) as usize;
        let samples = data.chunks(ch).map(|f| f.iter().sum::<f32>() / f.len() as f32).collect();
        TrackBuffer::new(name, sample_rate, samples)
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 { return 0.0; }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// RMS of the low-passed signal over the window ending at `at` seconds.
    /// Zero outside the track.
    pub fn low_band_energy(&self, at: f64) -> f32 {
        if self.sample_rate == 0 || at < 0.0 { return 0.0; }
        let end = ((at * self.sample_rate as f64) as usize).min(self.samples.len());
        if end == 0 { return 0.0; }
        let start  = end.saturating_sub(ENERGY_WINDOW);
        let warmup = start.saturating_sub(FILTER_WARMUP);

        let dt    = 1.0 / self.sample_rate as f32;
        let rc    = 1.0 / (2.0 * PI * LOW_BAND_CUTOFF);
        let alpha = dt / (rc + dt);

        let mut y = 0.0f32;
        let mut sum_sq = 0.0f32;
        for (i, &x) in self.samples[warmup..end].iter().enumerate() {
            y += alpha * (x - y);
            if warmup + i >= start {
                sum_sq += y * y;
            }
        }
        (sum_sq / (end - start) as f32).sqrt()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SilentOutput — no device
// ════════════════════════════════════════════════════════════════════════════

/// Keeps time and analyses the track, makes no sound.
#[derive(Debug, Default)]
pub struct SilentOutput {
    clock: AudioClock,
    track: Option<(Arc<TrackBuffer>, f64)>,
}

impl SilentOutput {
    pub fn new() -> Self { SilentOutput::default() }
}

impl AudioOutput for SilentOutput {
    fn now(&self) -> f64 { self.clock.now() }

    fn schedule(&mut self, _at: f64, _event: VoiceEvent) {}

    fn play_track(&mut self, track: Arc<TrackBuffer>) {
        self.track = Some((track, self.clock.now()));
    }

    fn stop_all(&mut self) { self.track = None; }

    fn low_band_energy(&self) -> Option<f32> {
        let pos = self.track_position()?;
        self.track.as_ref().map(|(t, _)| t.low_band_energy(pos))
    }

    fn track_position(&self) -> Option<f64> {
        self.track.as_ref().map(|(_, started)| self.clock.now() - started)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

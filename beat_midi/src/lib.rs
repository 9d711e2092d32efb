//! # beat_midi
//!
//! Musical timing for the slicer: an authored 16-step groove, a lookahead
//! [`BeatScheduler`] that turns it into timed sounds and spawns, an
//! [`EnergySpawner`] for user tracks, and standard MIDI file export.
//!
//! | Mode | Clock source | Spawns from |
//! |---|---|---|
//! | Synthesized | [`AudioOutput::now`] | [`Pattern`] steps, plus random obstacles |
//! | Audio-energy | [`AudioOutput::now`] | low-band onsets in the playing track |
//!
//! ## Quick start
//!
//! ```rust
//! use beat_midi::{BeatScheduler, Pattern, SchedulerConfig, SilentOutput};
//!
//! let mut audio = SilentOutput::new();
//! let mut sched = BeatScheduler::synth(
//!     SchedulerConfig { seed: Some(7), ..SchedulerConfig::default() },
//!     Pattern::authored(),
//! );
//! sched.start(0.0);
//! for step in sched.tick(&mut audio) {
//!     assert_eq!(step.subdivision, Some(0));
//! }
//! ```

pub mod audio;
pub mod energy;
pub mod midi;
pub mod pattern;
pub mod scheduler;
pub mod voice;

pub use audio::{AudioClock, AudioOutput, SilentOutput, TrackBuffer};
pub use energy::{EnergyConfig, EnergySpawner};
pub use midi::{multi_track_bytes, write_multi_track, Drum, GeneralMidi, MidiTrack, PitchMap, Scale};
pub use pattern::{Hit, Pattern, Step, STEPS_PER_BAR};
pub use scheduler::{BeatScheduler, ScheduledStep, SchedulerConfig};
pub use voice::{Direction, Lane, ObstacleKind, Spawn, Voice, VoiceEvent, LANE_COLUMNS, LANE_ROWS};

//! The authored 16-step groove: which sounds and which spawns each
//! sixteenth-note subdivision produces.
//!
//! ```text
//! step   0 1 2 3 4 5 6 7 8 9 A B C D E F
//! kick   x . . . x . . . x . . . x . . .
//! snare  . . . . x . . . . . . . x . . .
//! hat    . . x . . . x . . . x . . . x o
//! bass   x . . x . . x . x . . x . . x .
//! lead   x . . . x . . x . . x . x . . .
//! notes  L . . . R . . . LR. . . R . . .
//! bomb   . . . . . . . . . . . . . . x .
//! obst   ? . . . . . . . ? . . . . . . .
//! ```

use pose_stream::Hand;

use crate::midi::{MidiTrack, PitchMap};
use crate::voice::{
    Direction, Lane, Spawn, Voice, VoiceEvent,
    BASS_CHANNEL, BASS_PROGRAM, LEAD_CHANNEL, LEAD_PROGRAM,
};

/// Subdivisions per bar.
pub const STEPS_PER_BAR: usize = 16;

// ════════════════════════════════════════════════════════════════════════════
// Hit / Step
// ════════════════════════════════════════════════════════════════════════════

/// A sound in the pattern, with its length in steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub voice:    Voice,
    pub velocity: u8,
    pub length:   u8,
}

impl Hit {
    fn new(voice: Voice, velocity: u8, length: u8) -> Self { Hit { voice, velocity, length } }

    /// Resolve against a tempo.
    pub fn event(&self, step_secs: f64) -> VoiceEvent {
        VoiceEvent {
            voice:    self.voice,
            velocity: self.velocity,
            duration: self.length.max(1) as f64 * step_secs,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    pub hits:          Vec<Hit>,
    pub spawns:        Vec<Spawn>,
    /// Roll for a random obstacle on this step.
    pub obstacle_roll: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Pattern
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    steps: Vec<Step>,
}

impl Pattern {
    /// The stock groove (see module docs).
    pub fn authored() -> Self {
        let bass = PitchMap::pentatonic_minor(36);
        let lead = PitchMap::pentatonic_minor(72);
        let mut steps = vec![Step::default(); STEPS_PER_BAR];

        for s in [0, 4, 8, 12] { steps[s].hits.push(Hit::new(Voice::Kick, 110, 1)); }
        for s in [4, 12]       { steps[s].hits.push(Hit::new(Voice::Snare, 100, 1)); }
        for s in [2, 6, 10, 14] {
            steps[s].hits.push(Hit::new(Voice::HiHat { open: false }, 70, 1));
        }
        steps[15].hits.push(Hit::new(Voice::HiHat { open: true }, 60, 1));

        for (s, degree, len) in [(0, 0, 2), (3, 0, 2), (6, 2, 2), (8, 3, 2), (11, 3, 2), (14, 1, 2)] {
            steps[s].hits.push(Hit::new(Voice::Bass { note: bass.note_for(degree) }, 96, len));
        }
        for (s, degree, len) in [(0, 4, 3), (4, 2, 2), (7, 3, 3), (10, 1, 2), (12, 0, 4)] {
            steps[s].hits.push(Hit::new(Voice::Lead { note: lead.note_for(degree) }, 84, len));
        }

        steps[0].spawns.push(Spawn::Note {
            lane: Lane::new(1, 1), hand: Hand::Left, direction: Direction::Down,
        });
        steps[4].spawns.push(Spawn::Note {
            lane: Lane::new(2, 1), hand: Hand::Right, direction: Direction::Down,
        });
        steps[8].spawns.push(Spawn::Note {
            lane: Lane::new(1, 0), hand: Hand::Left, direction: Direction::Up,
        });
        steps[8].spawns.push(Spawn::Note {
            lane: Lane::new(2, 0), hand: Hand::Right, direction: Direction::Up,
        });
        steps[12].spawns.push(Spawn::Note {
            lane: Lane::new(3, 1), hand: Hand::Right, direction: Direction::Right,
        });
        steps[14].spawns.push(Spawn::Hazard { lane: Lane::new(1, 2) });

        steps[0].obstacle_roll = true;
        steps[8].obstacle_roll = true;

        Pattern { steps }
    }

    /// A pattern from explicit steps.
    ///
    /// # Panics
    /// If `steps` does not hold exactly [`STEPS_PER_BAR`] entries.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        assert_eq!(steps.len(), STEPS_PER_BAR, "a pattern has {} steps", STEPS_PER_BAR);
        Pattern { steps }
    }

    pub fn step(&self, subdivision: usize) -> &Step { &self.steps[subdivision % STEPS_PER_BAR] }

    pub fn steps(&self) -> &[Step] { &self.steps }

    /// Regular notes spawned per bar.
    pub fn notes_per_bar(&self) -> usize {
        self.steps.iter()
            .flat_map(|s| &s.spawns)
            .filter(|s| matches!(s, Spawn::Note { .. }))
            .count()
    }

    /// Render `bars` repetitions as a Type-0 MIDI track.
    pub fn to_midi(&self, bars: u32, bpm: u32, ticks_per_quarter: u16) -> MidiTrack {
        let step_ticks = ticks_per_quarter as u32 / 4;
        let mut track = MidiTrack::new("pose slicer groove", bpm, ticks_per_quarter);
        track.program(0, BASS_CHANNEL, BASS_PROGRAM.program());
        track.program(0, LEAD_CHANNEL, LEAD_PROGRAM.program());

        for bar in 0..bars {
            for (i, step) in self.steps.iter().enumerate() {
                let tick = (bar * STEPS_PER_BAR as u32 + i as u32) * step_ticks;
                for hit in &step.hits {
                    track.note(
                        tick,
                        hit.voice.channel(),
                        hit.voice.pitch(),
                        hit.velocity,
                        hit.length.max(1) as u32 * step_ticks,
                    );
                }
            }
        }
        track
    }
}

impl Default for Pattern {
    fn default() -> Self { Pattern::authored() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

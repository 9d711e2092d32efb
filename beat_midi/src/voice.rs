//! What a step can trigger: sounds and spawns.

use pose_stream::Hand;

use crate::midi::{Drum, GeneralMidi, DRUM_CHANNEL};

// ════════════════════════════════════════════════════════════════════════════
// Voice / VoiceEvent — audio triggers
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Voice {
    Kick,
    Snare,
    HiHat { open: bool },
    Bass  { note: u8 },
    Lead  { note: u8 },
}

pub const BASS_CHANNEL: u8 = 1;
pub const LEAD_CHANNEL: u8 = 2;
pub const BASS_PROGRAM: GeneralMidi = GeneralMidi::SynthBass1;
pub const LEAD_PROGRAM: GeneralMidi = GeneralMidi::LeadSawtooth;

impl Voice {
    pub fn channel(self) -> u8 {
        match self {
            Voice::Kick | Voice::Snare | Voice::HiHat { .. } => DRUM_CHANNEL,
            Voice::Bass { .. } => BASS_CHANNEL,
            Voice::Lead { .. } => LEAD_CHANNEL,
        }
    }

    pub fn pitch(self) -> u8 {
        match self {
            Voice::Kick                 => Drum::Kick.note(),
            Voice::Snare                => Drum::Snare.note(),
            Voice::HiHat { open: false } => Drum::ClosedHat.note(),
            Voice::HiHat { open: true }  => Drum::OpenHat.note(),
            Voice::Bass { note } | Voice::Lead { note } => note,
        }
    }

    pub fn is_percussion(self) -> bool { self.channel() == DRUM_CHANNEL }
}

/// A sound to start at a scheduled time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceEvent {
    pub voice:    Voice,
    pub velocity: u8,
    /// Seconds until note-off.
    pub duration: f64,
}

// ════════════════════════════════════════════════════════════════════════════
// Lane / Direction / ObstacleKind / Spawn — gameplay triggers
// ════════════════════════════════════════════════════════════════════════════

pub const LANE_COLUMNS: u8 = 4;
pub const LANE_ROWS:    u8 = 3;

/// A cell of the 4×3 note grid, column `x` left to right, row `y` top to
/// bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Lane { x: u8, y: u8 }

impl Lane {
    /// # Panics
    /// On a cell outside the grid; lanes are authored, so that is a bug.
    pub fn new(x: u8, y: u8) -> Self {
        assert!(x < LANE_COLUMNS && y < LANE_ROWS, "lane ({}, {}) outside 4x3 grid", x, y);
        Lane { x, y }
    }

    pub fn x(self) -> u8 { self.x }
    pub fn y(self) -> u8 { self.y }
}

/// Cosmetic: which way the slice arrow points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction { Up, Down, Left, Right }

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
}

/// Obstacles are dodged with the body rather than sliced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleKind {
    /// Overhead bar: duck.
    LowBar,
    /// Wall on the left half: lean right.
    LeftWall,
    /// Wall on the right half: lean left.
    RightWall,
}

impl ObstacleKind {
    pub const ALL: [ObstacleKind; 3] = [ObstacleKind::LowBar, ObstacleKind::LeftWall, ObstacleKind::RightWall];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Spawn {
    /// Regular note, sliced by `hand`.
    Note     { lane: Lane, hand: Hand, direction: Direction },
    /// Bomb: touching it with either hand costs energy.
    Hazard   { lane: Lane },
    Obstacle { kind: ObstacleKind },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drums_share_channel_ten() {
        assert_eq!(Voice::Kick.channel(), 9);
        assert_eq!(Voice::HiHat { open: true }.channel(), 9);
        assert!(!Voice::Bass { note: 36 }.is_percussion());
    }

    #[test]
    fn open_and_closed_hats_differ() {
        assert_eq!(Voice::HiHat { open: false }.pitch(), 42);
        assert_eq!(Voice::HiHat { open: true }.pitch(), 46);
    }

    #[test]
    fn lane_corners_are_valid() {
        assert_eq!(Lane::new(3, 2).x(), 3);
        assert_eq!(Lane::new(0, 0).y(), 0);
    }

    #[test]
    #[should_panic]
    fn lane_outside_grid_panics() {
        let _ = Lane::new(4, 0);
    }
}

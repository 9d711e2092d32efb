//! Instruments, scales and standard MIDI file output.
//!
//! MIDI bytes are written directly; no external crate is involved.

use std::io::Write;
use std::path::Path;

// ════════════════════════════════════════════════════════════════════════════
// General MIDI programs / percussion keys
// ════════════════════════════════════════════════════════════════════════════

/// The General MIDI programs the groove uses (0-indexed, as sent in Program
/// Change).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GeneralMidi {
    AcousticGrandPiano = 0,
    ElectricBassFinger = 33,
    SynthBass1         = 38,
    LeadSquare         = 80,
    LeadSawtooth       = 81,
    PadWarm            = 89,
}

impl GeneralMidi {
    pub fn program(self) -> u8 { self as u8 }

    pub fn name(self) -> &'static str {
        match self {
            GeneralMidi::AcousticGrandPiano => "Acoustic Grand Piano",
            GeneralMidi::ElectricBassFinger => "Electric Bass (finger)",
            GeneralMidi::SynthBass1         => "Synth Bass 1",
            GeneralMidi::LeadSquare         => "Lead 1 (square)",
            GeneralMidi::LeadSawtooth       => "Lead 2 (sawtooth)",
            GeneralMidi::PadWarm            => "Pad 2 (warm)",
        }
    }
}

/// MIDI channel reserved for percussion (channel 10, 0-indexed 9).
pub const DRUM_CHANNEL: u8 = 9;

/// General MIDI percussion key numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Drum {
    Kick      = 36,
    Snare     = 38,
    ClosedHat = 42,
    OpenHat   = 46,
    Crash     = 49,
}

impl Drum {
    pub fn note(self) -> u8 { self as u8 }
}

// ════════════════════════════════════════════════════════════════════════════
// Scale / PitchMap
// ════════════════════════════════════════════════════════════════════════════

/// Semitone intervals from a root.
#[derive(Clone, Debug, PartialEq)]
pub struct Scale {
    pub intervals: Vec<u8>,
    pub name: &'static str,
}

impl Scale {
    pub fn chromatic() -> Self {
        Scale { intervals: (0..12).collect(), name: "Chromatic" }
    }
    pub fn minor() -> Self {
        Scale { intervals: vec![0,2,3,5,7,8,10], name: "Minor" }
    }
    pub fn pentatonic_minor() -> Self {
        Scale { intervals: vec![0,3,5,7,10], name: "Pentatonic Minor" }
    }
    pub fn dorian() -> Self {
        Scale { intervals: vec![0,2,3,5,7,9,10], name: "Dorian" }
    }
    pub fn len(&self) -> usize { self.intervals.len() }
    pub fn is_empty(&self) -> bool { self.intervals.is_empty() }
}

/// Maps a scale degree to a MIDI note number, wrapping across octaves.
///
/// ```rust
/// use beat_midi::PitchMap;
///
/// let pm = PitchMap::pentatonic_minor(36);
/// assert_eq!(pm.note_for(0), 36); // C2
/// assert_eq!(pm.note_for(1), 39); // Eb2
/// assert_eq!(pm.note_for(5), 48); // C3
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PitchMap {
    pub root:  u8,
    pub scale: Scale,
}

impl PitchMap {
    pub fn pentatonic_minor(root: u8) -> Self {
        PitchMap { root, scale: Scale::pentatonic_minor() }
    }
    pub fn minor(root: u8) -> Self {
        PitchMap { root, scale: Scale::minor() }
    }
    pub fn custom(root: u8, scale: Scale) -> Self {
        PitchMap { root, scale }
    }

    /// Resolve scale degree `d`; the result is clamped to 0–127.
    pub fn note_for(&self, d: u8) -> u8 {
        let n = self.scale.len().max(1);
        let octave   = (d as usize) / n;
        let degree   = (d as usize) % n;
        let semitone = self.scale.intervals.get(degree).copied().unwrap_or(0) as usize;
        let note     = self.root as usize + octave * 12 + semitone;
        note.min(127) as u8
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MidiEvent / MidiTrack
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    Program { program: u8 },
    NoteOff { pitch: u8 },
    NoteOn  { pitch: u8, velocity: u8 },
}

impl MidiMessage {
    // Order within the same tick: set up instruments, release, then strike.
    fn rank(&self) -> u8 {
        match self {
            MidiMessage::Program { .. } => 0,
            MidiMessage::NoteOff { .. } => 1,
            MidiMessage::NoteOn  { .. } => 2,
        }
    }
}

/// A channel message at an absolute tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub tick:    u32,
    pub channel: u8,
    pub message: MidiMessage,
}

/// A set of timed events ready for serialisation.  Events may be pushed in
/// any order; they are sorted when written.
#[derive(Clone, Debug)]
pub struct MidiTrack {
    pub events:            Vec<MidiEvent>,
    pub ticks_per_quarter: u16,
    pub tempo_bpm:         u32,
    pub name:              String,
}

impl MidiTrack {
    pub fn new(name: &str, tempo_bpm: u32, ticks_per_quarter: u16) -> Self {
        MidiTrack { events: Vec::new(), ticks_per_quarter, tempo_bpm, name: name.to_string() }
    }

    pub fn program(&mut self, tick: u32, channel: u8, program: u8) {
        self.events.push(MidiEvent { tick, channel, message: MidiMessage::Program { program } });
    }

    /// Note on at `tick`, note off `length` ticks later.
    pub fn note(&mut self, tick: u32, channel: u8, pitch: u8, velocity: u8, length: u32) {
        self.events.push(MidiEvent { tick, channel, message: MidiMessage::NoteOn { pitch, velocity } });
        self.events.push(MidiEvent {
            tick: tick + length.max(1),
            channel,
            message: MidiMessage::NoteOff { pitch },
        });
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| matches!(e.message, MidiMessage::NoteOn { .. })).count()
    }

    /// Serialise to a standard MIDI Type-0 file and write to `path`.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        let mut f = std::fs::File::create(path)?;
        f.write_all(&self.to_bytes())
    }

    /// A complete Type-0 file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, 0, 1, self.ticks_per_quarter);
        write_chunk(&mut out, &self.build_track_chunk());
        out
    }

    fn build_track_chunk(&self) -> Vec<u8> {
        let mut t: Vec<u8> = Vec::new();

        // ── Tempo meta-event ──────────────────────────────────────────────
        let micros = 60_000_000u32 / self.tempo_bpm.max(1);
        t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
        t.push(((micros >> 16) & 0xFF) as u8);
        t.push(((micros >>  8) & 0xFF) as u8);
        t.push(( micros        & 0xFF) as u8);

        // ── Track name ────────────────────────────────────────────────────
        let name = self.name.as_bytes();
        t.extend_from_slice(&[0x00, 0xFF, 0x03]);
        write_vlq(&mut t, name.len() as u32);
        t.extend_from_slice(name);

        // ── Channel events, delta-timed ───────────────────────────────────
        let mut events = self.events.clone();
        events.sort_by_key(|e| (e.tick, e.message.rank()));

        let mut last_tick = 0u32;
        for e in &events {
            write_vlq(&mut t, e.tick - last_tick);
            last_tick = e.tick;
            let ch = e.channel & 0x0F;
            match e.message {
                MidiMessage::Program { program } => t.extend_from_slice(&[0xC0 | ch, program & 0x7F]),
                MidiMessage::NoteOn { pitch, velocity } =>
                    t.extend_from_slice(&[0x90 | ch, pitch & 0x7F, velocity & 0x7F]),
                MidiMessage::NoteOff { pitch } => t.extend_from_slice(&[0x80 | ch, pitch & 0x7F, 0]),
            }
        }

        // ── End of Track ──────────────────────────────────────────────────
        t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        t
    }
}

/// Serialise several tracks as one Type-1 file.  Division and tempo come
/// from the first track.
pub fn multi_track_bytes(tracks: &[MidiTrack]) -> Vec<u8> {
    let Some(first) = tracks.first() else { return Vec::new() };
    let mut out = Vec::new();
    write_header(&mut out, 1, tracks.len() as u16, first.ticks_per_quarter);
    for track in tracks {
        write_chunk(&mut out, &track.build_track_chunk());
    }
    out
}

pub fn write_multi_track(path: &Path, tracks: &[MidiTrack]) -> std::io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    f.write_all(&multi_track_bytes(tracks))
}

fn write_header(out: &mut Vec<u8>, format: u16, ntracks: u16, division: u16) {
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&ntracks.to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
}

fn write_chunk(out: &mut Vec<u8>, track: &[u8]) {
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(track);
}

/// Write a MIDI variable-length quantity.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 4];
    let mut i = 3;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 && i > 0 {
        i -= 1;
        bytes[i] = ((value & 0x7F) | 0x80) as u8;
        value >>= 7;
    }
    buf.extend_from_slice(&bytes[i..]);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

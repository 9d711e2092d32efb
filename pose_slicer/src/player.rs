//! Audio output thread.
//!
//! The groove is played as MIDI voices on a time-ordered queue; user tracks
//! are played through `rodio`.  Both live on one thread that owns the
//! devices and is driven by [`PlayerCommand`]s.  The session only ever sees
//! the [`AudioOutput`] trait on [`Player`].
//!
//! Missing devices are not errors: without a MIDI port the voices go to a
//! null backend, without a sound card tracks are silently skipped, and the
//! clock and track analysis keep working either way.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use beat_midi::voice::{BASS_CHANNEL, BASS_PROGRAM, LEAD_CHANNEL, LEAD_PROGRAM};
use beat_midi::{AudioClock, AudioOutput, TrackBuffer, VoiceEvent};
use rodio::Source;
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::Error;

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand — sent to the audio thread
// ════════════════════════════════════════════════════════════════════════════

pub enum PlayerCommand {
    /// Sound `event` at `at` on the shared clock.
    Schedule { at: f64, event: VoiceEvent },
    PlayTrack(Arc<TrackBuffer>),
    /// Silence everything and forget queued voices.
    StopAll,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — abstraction over midir / null
// ════════════════════════════════════════════════════════════════════════════

trait MidiOut: Send {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self,  channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

// ── midir backend ─────────────────────────────────────────────────────────

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn program_change(&mut self, channel: u8, program: u8) {
        let _ = self.conn.send(&[0xC0 | (channel & 0x0F), program]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note, velocity]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note, 0]);
    }
}

// ── null backend (no MIDI port) ────────────────────────────────────────────

struct NullOut;
impl MidiOut for NullOut {
    fn program_change(&mut self, _ch: u8, _p: u8)   {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8)  {}
    fn note_off(&mut self, _ch: u8, _n: u8)          {}
}

/// Open the port matching `hint`, else the first softsynth-looking port,
/// else the first port.  Falls back to [`NullOut`] with a warning.
fn open_midi_output(hint: Option<&str>) -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("pose_slicer") {
        Ok(m)  => m,
        Err(e) => {
            warn!(error = %e, "MIDI init failed, playing silently");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports; start a synth such as `fluidsynth` or `timidity -iA` for sound");
        return Box::new(NullOut);
    }

    let names: Vec<String> = ports.iter()
        .map(|p| midi_out.port_name(p).unwrap_or_default().to_lowercase())
        .collect();
    let wanted = hint.map(str::to_lowercase);
    let port_idx = wanted.as_deref()
        .and_then(|h| names.iter().position(|n| n.contains(h)))
        .or_else(|| names.iter().position(|n| {
            n.contains("fluid") || n.contains("timidity") || n.contains("microsoft")
                || n.contains("gm") || n.contains("synth")
        }))
        .unwrap_or(0);

    let port = &ports[port_idx];
    info!(port = %names[port_idx], "opening MIDI port");
    match midi_out.connect(port, "pose-slicer-groove") {
        Ok(conn) => Box::new(MidirOut { conn }),
        Err(e) => {
            warn!(error = %e, "MIDI connect failed, playing silently");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VoiceQueue — time-ordered note on/off
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MidiAction {
    On  { channel: u8, pitch: u8, velocity: u8 },
    Off { channel: u8, pitch: u8 },
}

#[derive(Debug)]
struct Timed {
    at:     f64,
    seq:    u64,
    action: MidiAction,
}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}
impl Eq for Timed {}
impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
// Reversed so the max-heap pops the earliest action first.
impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.total_cmp(&self.at).then(other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct VoiceQueue {
    heap: BinaryHeap<Timed>,
    seq:  u64,
}

impl VoiceQueue {
    fn push_action(&mut self, at: f64, action: MidiAction) {
        self.seq += 1;
        self.heap.push(Timed { at, seq: self.seq, action });
    }

    fn push(&mut self, at: f64, event: VoiceEvent) {
        let (channel, pitch) = (event.voice.channel(), event.voice.pitch());
        self.push_action(at, MidiAction::On { channel, pitch, velocity: event.velocity });
        self.push_action(at + event.duration.max(0.0), MidiAction::Off { channel, pitch });
    }

    /// Everything due at or before `now`, earliest first.
    fn due(&mut self, now: f64) -> Vec<MidiAction> {
        let mut out = Vec::new();
        while self.heap.peek().is_some_and(|t| t.at <= now) {
            if let Some(t) = self.heap.pop() { out.push(t.action); }
        }
        out
    }

    fn next_at(&self) -> Option<f64> { self.heap.peek().map(|t| t.at) }

    /// Drop queued note-ons; return the note-offs so nothing hangs.
    fn drain_offs(&mut self) -> Vec<MidiAction> {
        let offs = self.heap.drain()
            .map(|t| t.action)
            .filter(|a| matches!(a, MidiAction::Off { .. }))
            .collect();
        self.seq = 0;
        offs
    }

    fn len(&self) -> usize { self.heap.len() }
}

// ════════════════════════════════════════════════════════════════════════════
// Player — handle to the audio thread
// ════════════════════════════════════════════════════════════════════════════

pub struct Player {
    cmd_tx: Sender<PlayerCommand>,
    clock:  AudioClock,
    track:  Option<(Arc<TrackBuffer>, f64)>,
}

impl Player {
    pub fn spawn(config: &AudioConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        let clock = AudioClock::new();
        let config = config.clone();
        thread::spawn(move || player_thread(config, clock, cmd_rx));
        Player { cmd_tx, clock, track: None }
    }

    pub fn quit(&self) { let _ = self.cmd_tx.send(PlayerCommand::Quit); }
}

impl Drop for Player {
    fn drop(&mut self) { self.quit(); }
}

impl AudioOutput for Player {
    fn now(&self) -> f64 { self.clock.now() }

    fn schedule(&mut self, at: f64, event: VoiceEvent) {
        let _ = self.cmd_tx.send(PlayerCommand::Schedule { at, event });
    }

    fn play_track(&mut self, track: Arc<TrackBuffer>) {
        self.track = Some((Arc::clone(&track), self.clock.now()));
        let _ = self.cmd_tx.send(PlayerCommand::PlayTrack(track));
    }

    fn stop_all(&mut self) {
        self.track = None;
        let _ = self.cmd_tx.send(PlayerCommand::StopAll);
    }

    fn low_band_energy(&self) -> Option<f32> {
        let pos = self.track_position()?;
        self.track.as_ref().map(|(t, _)| t.low_band_energy(pos))
    }

    fn track_position(&self) -> Option<f64> {
        self.track.as_ref().map(|(_, started)| self.clock.now() - started)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread — the actual loop
// ════════════════════════════════════════════════════════════════════════════

/// Longest the thread sleeps with nothing queued.
const IDLE_WAIT: Duration = Duration::from_millis(10);

fn player_thread(config: AudioConfig, clock: AudioClock, cmd_rx: Receiver<PlayerCommand>) {
    let mut midi: Box<dyn MidiOut> = if config.enable_midi {
        open_midi_output(config.midi_port_hint.as_deref())
    } else {
        Box::new(NullOut)
    };
    midi.program_change(BASS_CHANNEL, BASS_PROGRAM.program());
    midi.program_change(LEAD_CHANNEL, LEAD_PROGRAM.program());

    // The output stream must stay alive as long as any sink plays on it.
    let device = match rodio::OutputStream::try_default() {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!(error = %e, "no audio device; user tracks will be silent");
            None
        }
    };
    let mut sink: Option<rodio::Sink> = None;
    let volume = config.volume;
    let mut queue = VoiceQueue::default();

    loop {
        let wait = queue.next_at()
            .map(|at| Duration::from_secs_f64((at - clock.now()).clamp(0.0, IDLE_WAIT.as_secs_f64())))
            .unwrap_or(IDLE_WAIT);

        match cmd_rx.recv_timeout(wait) {
            Ok(PlayerCommand::Schedule { at, event }) => queue.push(at, event),
            Ok(PlayerCommand::PlayTrack(track)) => {
                sink = device.as_ref().and_then(|(_, handle)| {
                    let s = rodio::Sink::try_new(handle)
                        .map_err(|e| warn!(error = %e, "could not open sink"))
                        .ok()?;
                    s.set_volume(volume);
                    s.append(rodio::buffer::SamplesBuffer::new(1, track.sample_rate, track.samples.clone()));
                    Some(s)
                });
                debug!(track = %track.name, playing = sink.is_some(), "track started");
            }
            Ok(PlayerCommand::StopAll) => {
                for action in queue.drain_offs() { fire(midi.as_mut(), action); }
                if let Some(s) = sink.take() { s.stop(); }
            }
            Ok(PlayerCommand::Quit) | Err(RecvTimeoutError::Disconnected) => {
                for action in queue.drain_offs() { fire(midi.as_mut(), action); }
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        for action in queue.due(clock.now()) {
            fire(midi.as_mut(), action);
        }
        if queue.len() > 512 {
            debug!(queued = queue.len(), "voice queue backing up");
        }
    }
}

fn fire(midi: &mut dyn MidiOut, action: MidiAction) {
    match action {
        MidiAction::On  { channel, pitch, velocity } => midi.note_on(channel, pitch, velocity),
        MidiAction::Off { channel, pitch }           => midi.note_off(channel, pitch),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// decode_track
// ════════════════════════════════════════════════════════════════════════════

/// Decode an audio file into a mono [`TrackBuffer`].
pub fn decode_track(path: &Path) -> crate::Result<TrackBuffer> {
    let decode_err = |reason: String| Error::AudioDecode { path: path.display().to_string(), reason };
    let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;

    let decoder = rodio::Decoder::new(BufReader::new(file)).map_err(|e| decode_err(e.to_string()))?;
    let channels = decoder.channels();
    let rate     = decoder.sample_rate();
    let data: Vec<f32> = decoder.convert_samples::<f32>().collect();
    if data.is_empty() || rate == 0 {
        return Err(decode_err("no audio samples".to_string()));
    }

    let name = path.file_stem().map_or_else(|| "track".to_string(), |s| s.to_string_lossy().into_owned());
    let track = TrackBuffer::from_interleaved(&name, rate, channels, &data);
    info!(track = %name, secs = track.duration(), rate, channels, "track decoded");
    Ok(track)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use beat_midi::Voice;

    fn ev(voice: Voice, duration: f64) -> VoiceEvent {
        VoiceEvent { voice, velocity: 100, duration }
    }

    #[test]
    fn queue_fires_in_time_order() {
        let mut q = VoiceQueue::default();
        q.push(0.5, ev(Voice::Snare, 0.1));
        q.push(0.25, ev(Voice::Kick, 0.1));
        assert!(q.due(0.2).is_empty());
        assert_eq!(q.due(0.3), vec![MidiAction::On { channel: 9, pitch: 36, velocity: 100 }]);
        assert_eq!(q.due(0.55), vec![
            MidiAction::Off { channel: 9, pitch: 36 },
            MidiAction::On  { channel: 9, pitch: 38, velocity: 100 },
        ]);
        assert!((q.next_at().unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn same_time_keeps_push_order() {
        let mut q = VoiceQueue::default();
        q.push(1.0, ev(Voice::Bass { note: 36 }, 0.5));
        q.push(1.0, ev(Voice::Lead { note: 72 }, 0.5));
        let due = q.due(1.0);
        assert_eq!(due, vec![
            MidiAction::On { channel: BASS_CHANNEL, pitch: 36, velocity: 100 },
            MidiAction::On { channel: LEAD_CHANNEL, pitch: 72, velocity: 100 },
        ]);
    }

    #[test]
    fn stop_keeps_only_note_offs() {
        let mut q = VoiceQueue::default();
        q.push(0.0, ev(Voice::Kick, 0.1));
        q.push(5.0, ev(Voice::Snare, 0.1));
        q.due(0.0);
        let offs = q.drain_offs();
        assert_eq!(offs.len(), 2);
        assert!(offs.iter().all(|a| matches!(a, MidiAction::Off { .. })));
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn missing_file_is_decode_error() {
        let err = decode_track(Path::new("/nonexistent/track.ogg")).unwrap_err();
        match err {
            Error::AudioDecode { path, .. } => assert_eq!(path, "/nonexistent/track.ogg"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let err = decode_track(&path).unwrap_err();
        assert!(matches!(err, Error::AudioDecode { .. }));
        assert!(err.to_string().contains("noise.mp3"));
    }
}

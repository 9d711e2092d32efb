//! Pose feeds: where landmark frames come from.
//!
//! A feed runs on its own thread and sends [`PoseFrame`]s over an `mpsc`
//! channel.  The main loop holds a [`FrameSlot`], which keeps only the
//! newest frame and reports nothing once that frame has gone stale, so a
//! stalled or crashed feed reads as "no body in view" rather than as a
//! frozen pose.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use pose_stream::landmark::{
    LEFT_SHOULDER, LEFT_WRIST, NOSE, RIGHT_SHOULDER, RIGHT_WRIST,
};
use pose_stream::{Landmark, PoseFrame, PoseSource, Vec2};
use tracing::{debug, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// PoseFeed trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`PoseFrame`]s over a channel.
pub trait PoseFeed: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<PoseFrame>);
}

/// Spawn a feed on its own thread and return the receiving end.
pub fn spawn_pose_feed<F: PoseFeed>(feed: F) -> Receiver<PoseFrame> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(feed).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSlot — newest frame, with staleness
// ════════════════════════════════════════════════════════════════════════════

pub struct FrameSlot {
    rx:         Receiver<PoseFrame>,
    latest:     Option<(PoseFrame, f64)>,
    stale_secs: f64,
    connected:  bool,
}

impl FrameSlot {
    pub fn new(rx: Receiver<PoseFrame>, stale_ms: u64) -> Self {
        FrameSlot { rx, latest: None, stale_secs: stale_ms as f64 / 1000.0, connected: true }
    }

    /// Drain the channel, keeping the last frame and stamping it `now`.
    pub fn poll(&mut self, now: f64) {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => self.latest = Some((frame, now)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        self.connected = false;
                        warn!("pose feed disconnected");
                    }
                    break;
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool { self.connected }
}

impl PoseSource for FrameSlot {
    fn detect(&mut self, timestamp: f64) -> Option<PoseFrame> {
        self.poll(timestamp);
        match &self.latest {
            Some((frame, at)) if timestamp - at <= self.stale_secs => Some(frame.clone()),
            _ => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LinesPoseSource — JSON lines from an external detector
// ════════════════════════════════════════════════════════════════════════════

/// One frame per line:
/// `{"timestamp":1.5,"landmarks":[{"x":0.4,"y":0.6,"visibility":0.9},…]}`.
/// A blank line or `null` means "no person this frame" and sends nothing.
pub fn parse_pose_line(line: &str) -> crate::Result<Option<PoseFrame>> {
    let line = line.trim();
    if line.is_empty() { return Ok(None); }
    Ok(serde_json::from_str::<Option<PoseFrame>>(line)?)
}

pub struct LinesPoseSource<R> {
    reader: R,
}

impl<R: BufRead + Send + 'static> LinesPoseSource<R> {
    pub fn new(reader: R) -> Self { LinesPoseSource { reader } }
}

impl LinesPoseSource<std::io::BufReader<std::io::Stdin>> {
    pub fn stdin() -> Self { LinesPoseSource::new(std::io::BufReader::new(std::io::stdin())) }
}

impl<R: BufRead + Send + 'static> PoseFeed for LinesPoseSource<R> {
    fn run(self: Box<Self>, tx: Sender<PoseFrame>) {
        let mut bad = 0u64;
        for (n, line) in self.reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "pose input closed");
                    return;
                }
            };
            match parse_pose_line(&line) {
                Ok(Some(frame)) => {
                    if tx.send(frame).is_err() { return; }
                }
                Ok(None) => {}
                Err(e) => {
                    bad += 1;
                    if bad <= 5 { warn!(line = n + 1, error = %e, "skipping bad pose line"); }
                }
            }
        }
        info!(bad_lines = bad, "pose input ended");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimPoseSource — mouse and keyboard stand in for a body
// ════════════════════════════════════════════════════════════════════════════

/// Raw input from the simulation window, in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Pointer moved; drives the right hand, or the left with `left` set.
    Pointer { x: f32, y: f32, left: bool },
    KeyDown(SimKey),
    KeyUp(SimKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Duck,       // C
    LeanLeft,   // Z
    LeanRight,  // X
    HideHands,  // H, toggles
}

/// Simulated body, in screen coordinates (what the player sees).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimBody {
    pub left_hand:    Vec2,
    pub right_hand:   Vec2,
    pub ducking:      bool,
    pub lean_left:    bool,
    pub lean_right:   bool,
    pub hands_hidden: bool,
}

impl Default for SimBody {
    fn default() -> Self {
        SimBody {
            left_hand:    Vec2::new(0.3, 0.85),
            right_hand:   Vec2::new(0.7, 0.85),
            ducking:      false,
            lean_left:    false,
            lean_right:   false,
            hands_hidden: false,
        }
    }
}

const STANDING_HEAD_Y:  f32 = 0.3;
const DUCKING_HEAD_Y:   f32 = 0.7;
const SHOULDER_DROP:    f32 = 0.12;
const SHOULDER_HALF:    f32 = 0.08;
const LEAN_OFFSET:      f32 = 0.2;

impl SimBody {
    pub fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Pointer { x, y, left } => {
                let p = Vec2::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
                if left { self.left_hand = p } else { self.right_hand = p }
            }
            SimInput::KeyDown(SimKey::Duck)      => self.ducking = true,
            SimInput::KeyUp(SimKey::Duck)        => self.ducking = false,
            SimInput::KeyDown(SimKey::LeanLeft)  => self.lean_left = true,
            SimInput::KeyUp(SimKey::LeanLeft)    => self.lean_left = false,
            SimInput::KeyDown(SimKey::LeanRight) => self.lean_right = true,
            SimInput::KeyUp(SimKey::LeanRight)   => self.lean_right = false,
            SimInput::KeyDown(SimKey::HideHands) => self.hands_hidden = !self.hands_hidden,
            SimInput::KeyUp(SimKey::HideHands)   => {}
        }
    }

    /// The camera-space frame that, after mirroring, shows this body.
    pub fn frame(&self, timestamp: f64) -> PoseFrame {
        let mut center = 0.5;
        if self.lean_left  { center -= LEAN_OFFSET; }
        if self.lean_right { center += LEAN_OFFSET; }
        let head_y = if self.ducking { DUCKING_HEAD_Y } else { STANDING_HEAD_Y };

        let cam = |x: f32, y: f32| Landmark::new(1.0 - x, y, 1.0);
        let mut f = PoseFrame::empty(timestamp);
        f.set(NOSE,           cam(center, head_y));
        f.set(LEFT_SHOULDER,  cam(center - SHOULDER_HALF, head_y + SHOULDER_DROP));
        f.set(RIGHT_SHOULDER, cam(center + SHOULDER_HALF, head_y + SHOULDER_DROP));
        if !self.hands_hidden {
            f.set(LEFT_WRIST,  cam(self.left_hand.x,  self.left_hand.y));
            f.set(RIGHT_WRIST, cam(self.right_hand.x, self.right_hand.y));
        }
        f
    }
}

/// Emits a [`SimBody`] frame at `hz` until the input channel closes.
pub struct SimPoseSource {
    pub rx: Receiver<SimInput>,
    pub hz: u32,
}

impl PoseFeed for SimPoseSource {
    fn run(self: Box<Self>, tx: Sender<PoseFrame>) {
        let period = Duration::from_secs_f64(1.0 / self.hz.max(1) as f64);
        let clock = beat_midi::AudioClock::new();
        let mut body = SimBody::default();
        loop {
            loop {
                match self.rx.try_recv() {
                    Ok(input) => body.apply(input),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("sim input closed");
                        return;
                    }
                }
            }
            if tx.send(body.frame(clock.now())).is_err() { return; }
            thread::sleep(period);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

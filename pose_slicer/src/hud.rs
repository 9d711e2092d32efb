//! What the renderer draws, one snapshot per frame.
//!
//! The app builds a [`RenderSnapshot`] from the session and pose every
//! frame; the visualizer only reads it.  Short-lived effects (slice
//! flashes, score popups) live in [`Effects`] and are fed from
//! [`SessionEvent`]s.

use beat_midi::{Direction, ObstacleKind};
use dwell_select::Region;
use pose_stream::{Hand, PoseSignalProcessor, Vec2};

use crate::notes::{NoteKind, NoteLifecycleManager};
use crate::session::SessionEvent;
use crate::skill::{Overdrive, SkillState};
use crate::score::Grade;

// ════════════════════════════════════════════════════════════════════════════
// Colors
// ════════════════════════════════════════════════════════════════════════════

pub const LEFT_HAND_COLOR:  u32 = 0xFF00C8FF;
pub const RIGHT_HAND_COLOR: u32 = 0xFFFF3C8C;
pub const HAZARD_COLOR:     u32 = 0xFF303030;
pub const OBSTACLE_COLOR:   u32 = 0xFFFF8C00;
pub const GOLD:             u32 = 0xFFFFD700;

pub fn hand_color(hand: Hand) -> u32 {
    match hand { Hand::Left => LEFT_HAND_COLOR, Hand::Right => RIGHT_HAND_COLOR }
}

/// Convert HSV → packed ARGB (0xAARRGGBB, A=0xFF).
pub fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let h  = h.rem_euclid(360.0);
    let hi = (h / 60.0) as u32;
    let f  = h / 60.0 - hi as f32;
    let p  = v * (1.0 - s);
    let q  = v * (1.0 - s * f);
    let t  = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match hi {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let ri = (r * 255.0) as u32;
    let gi = (g * 255.0) as u32;
    let bi = (b * 255.0) as u32;
    0xFF000000 | (ri << 16) | (gi << 8) | bi
}

/// Energy bar color: red when low, green when full.
pub fn energy_color(energy: u8) -> u32 {
    hsv_to_argb(energy.min(100) as f32 * 1.2, 0.85, 0.9)
}

pub fn grade_color(grade: Grade) -> u32 {
    match grade {
        Grade::SSS | Grade::SS => GOLD,
        Grade::S  => 0xFFE0E0FF,
        Grade::A  => 0xFF7CFC00,
        Grade::B  => 0xFF87CEEB,
        Grade::C  => 0xFFB0B0B0,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Perspective
// ════════════════════════════════════════════════════════════════════════════

/// Where far-away notes converge.
pub const VANISHING_POINT: Vec2 = Vec2 { x: 0.5, y: 0.45 };

/// Screen position and size factor of something at `depth` heading for
/// `target` on the hit plane.  Scale is 1 at depth 0.
pub fn project(target: Vec2, depth: f32, spawn_depth: f32) -> (Vec2, f32) {
    let t = if spawn_depth > 0.0 { (depth / spawn_depth).clamp(-0.25, 1.0) } else { 0.0 };
    let scale = 1.0 / (1.0 + 3.0 * t);
    (VANISHING_POINT + (target - VANISHING_POINT) * scale, scale)
}

// ════════════════════════════════════════════════════════════════════════════
// Effects
// ════════════════════════════════════════════════════════════════════════════

/// A slash drawn across a sliced note, fading out.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceFlash {
    pub position: Vec2,
    pub angle:    f32,
    pub color:    u32,
    /// 0 → 1 over the flash's life.
    pub progress: f32,
}

impl SliceFlash {
    pub fn new(position: Vec2, angle: f32, color: u32) -> Self {
        SliceFlash { position, angle, color, progress: 0.0 }
    }
    pub fn tick(&mut self) { self.progress = (self.progress + 0.08).min(1.0); }
    pub fn done(&self) -> bool { self.progress >= 1.0 }
}

/// Short text that drifts up and fades.
#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    pub text:     String,
    pub position: Vec2,
    pub color:    u32,
    pub progress: f32,
}

impl Popup {
    pub fn tick(&mut self) {
        self.progress = (self.progress + 0.04).min(1.0);
        self.position.y -= 0.002;
    }
    pub fn done(&self) -> bool { self.progress >= 1.0 }
}

const MAX_EFFECTS: usize = 24;

#[derive(Debug, Default)]
pub struct Effects {
    pub flashes: Vec<SliceFlash>,
    pub popups:  Vec<Popup>,
    /// Red screen-edge pulse after damage, 1 → 0.
    pub damage:  f32,
}

impl Effects {
    pub fn apply(&mut self, event: &SessionEvent) {
        match *event {
            SessionEvent::Sliced { hand, points, position, angle, .. } => {
                self.flashes.push(SliceFlash::new(position, angle, hand_color(hand)));
                self.popup(format!("+{}", points), position, hand_color(hand));
            }
            SessionEvent::HazardHit { position, .. } => {
                self.popup("BOOM".to_string(), position, 0xFFFF4040);
                self.damage = 1.0;
            }
            SessionEvent::Missed { .. } => {
                self.damage = self.damage.max(0.4);
            }
            SessionEvent::ObstacleHit { .. } => {
                self.popup("OUCH".to_string(), Vec2::new(0.5, 0.4), OBSTACLE_COLOR);
                self.damage = 1.0;
            }
            SessionEvent::ObstacleDodged { .. } => {
                self.popup("DODGE".to_string(), Vec2::new(0.5, 0.4), 0xFF7CFC00);
            }
            SessionEvent::OverdriveStarted => {
                self.popup("OVERDRIVE".to_string(), Vec2::new(0.5, 0.2), GOLD);
            }
            SessionEvent::OverdriveEnded | SessionEvent::OverdriveReady | SessionEvent::Finished { .. } => {}
        }
        if self.flashes.len() > MAX_EFFECTS { self.flashes.remove(0); }
        if self.popups.len()  > MAX_EFFECTS { self.popups.remove(0); }
    }

    fn popup(&mut self, text: String, position: Vec2, color: u32) {
        self.popups.push(Popup { text, position, color, progress: 0.0 });
    }

    pub fn tick(&mut self) {
        for f in &mut self.flashes { f.tick(); }
        for p in &mut self.popups  { p.tick(); }
        self.flashes.retain(|f| !f.done());
        self.popups.retain(|p| !p.done());
        self.damage = (self.damage - 0.05).max(0.0);
    }

    pub fn clear(&mut self) {
        *self = Effects::default();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Snapshot views
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct NoteView {
    pub position:  Vec2,
    /// Radius in normalized units after perspective.
    pub radius:    f32,
    pub color:     u32,
    pub hazard:    bool,
    pub direction: Option<Direction>,
    pub hittable:  bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleView {
    pub kind:  ObstacleKind,
    /// 1 at the hit plane, toward 0 in the distance.
    pub scale: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandView {
    pub hand:     Hand,
    pub position: Vec2,
    /// Oldest first.
    pub trail:    Vec<Vec2>,
    pub tracked:  bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ButtonView {
    pub label:    String,
    pub region:   Region,
    /// Dwell progress 0–100 from whichever hand is on it.
    pub progress: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HudView {
    pub score:      u64,
    pub combo:      u32,
    pub multiplier: f64,
    pub energy:     u8,
    pub remaining:  f64,
    pub overdrive:  OverdriveView,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverdriveView {
    pub active:   bool,
    pub ready:    bool,
    pub fraction: f32,
}

impl OverdriveView {
    pub fn of(o: &Overdrive, session_time: f64) -> Self {
        OverdriveView {
            active:   o.is_active(),
            ready:    o.state() == SkillState::Ready,
            fraction: o.remaining_fraction(session_time),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Screen {
    Menu    { buttons: Vec<ButtonView>, error: Option<String> },
    Playing { notes: Vec<NoteView>, obstacles: Vec<ObstacleView>, hud: HudView },
    Results {
        score:     u64,
        grade:     Grade,
        accuracy:  f64,
        max_combo: u32,
        best:      Option<u64>,
        buttons:   Vec<ButtonView>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSnapshot {
    pub screen:  Screen,
    pub hands:   Vec<HandView>,
    pub flashes: Vec<SliceFlash>,
    pub popups:  Vec<Popup>,
    pub damage:  f32,
    pub status:  String,
}

/// Note views, farthest first so nearer notes paint over them.
pub fn note_views(notes: &NoteLifecycleManager, note_size: f32) -> Vec<NoteView> {
    let spawn_depth = notes.config().spawn_depth;
    let mut sorted: Vec<_> = notes.notes().iter().collect();
    sorted.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    sorted.into_iter()
        .map(|n| {
            let (position, scale) = project(n.position, n.depth, spawn_depth);
            let (color, hazard, direction) = match n.kind {
                NoteKind::Regular { hand, direction } => (hand_color(hand), false, Some(direction)),
                NoteKind::Hazard => (HAZARD_COLOR, true, None),
            };
            NoteView {
                position,
                radius: note_size * scale,
                color,
                hazard,
                direction,
                hittable: notes.is_hittable(n),
            }
        })
        .collect()
}

pub fn obstacle_views(notes: &NoteLifecycleManager) -> Vec<ObstacleView> {
    let spawn_depth = notes.config().spawn_depth;
    notes.obstacles().iter()
        .filter(|o| o.depth >= 0.0)
        .map(|o| ObstacleView { kind: o.kind, scale: project(VANISHING_POINT, o.depth, spawn_depth).1 })
        .collect()
}

pub fn hand_views(pose: &PoseSignalProcessor) -> Vec<HandView> {
    Hand::BOTH.into_iter()
        .map(|hand| {
            let p = pose.point(hand.into());
            HandView {
                hand,
                position: p.position(),
                trail:    p.history().copied().collect(),
                tracked:  p.is_tracked(),
            }
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

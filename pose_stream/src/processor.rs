//! Per-tick smoothing of the joints the game cares about.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::landmark::{self, PoseFrame, Vec2};
use crate::tracked::TrackedPoint;

// ════════════════════════════════════════════════════════════════════════════
// Hand / TrackedJoint
// ════════════════════════════════════════════════════════════════════════════

/// Which of the player's hands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand { Left, Right }

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn other(self) -> Hand {
        match self { Hand::Left => Hand::Right, Hand::Right => Hand::Left }
    }
}

/// The joints tracked every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackedJoint {
    LeftHand,
    RightHand,
    Head,
    LeftShoulder,
    RightShoulder,
}

impl TrackedJoint {
    pub const ALL: [TrackedJoint; 5] = [
        TrackedJoint::LeftHand,
        TrackedJoint::RightHand,
        TrackedJoint::Head,
        TrackedJoint::LeftShoulder,
        TrackedJoint::RightShoulder,
    ];

    pub fn landmark_index(self) -> usize {
        match self {
            TrackedJoint::LeftHand      => landmark::LEFT_WRIST,
            TrackedJoint::RightHand     => landmark::RIGHT_WRIST,
            TrackedJoint::Head          => landmark::NOSE,
            TrackedJoint::LeftShoulder  => landmark::LEFT_SHOULDER,
            TrackedJoint::RightShoulder => landmark::RIGHT_SHOULDER,
        }
    }

    pub fn is_hand(self) -> bool {
        matches!(self, TrackedJoint::LeftHand | TrackedJoint::RightHand)
    }

    fn slot(self) -> usize { self as usize }
}

impl From<Hand> for TrackedJoint {
    fn from(h: Hand) -> Self {
        match h { Hand::Left => TrackedJoint::LeftHand, Hand::Right => TrackedJoint::RightHand }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SmoothingConfig
// ════════════════════════════════════════════════════════════════════════════

/// Smoothing and gating parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// EMA factor for hands (responsive).
    pub hand_alpha:     f32,
    /// EMA factor for head and shoulders (steady).
    pub body_alpha:     f32,
    /// Minimum landmark visibility to accept a sample.
    pub min_confidence: f32,
    /// Mirror x so on-screen motion matches the user's own.
    pub mirror_x:       bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            hand_alpha:     0.2,
            body_alpha:     0.12,
            min_confidence: 0.5,
            mirror_x:       true,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// BodyPose
// ════════════════════════════════════════════════════════════════════════════

/// Head and shoulder centre, used to judge ducking and leaning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyPose {
    pub head:            Vec2,
    pub shoulder_center: Vec2,
}

// ════════════════════════════════════════════════════════════════════════════
// PoseSignalProcessor
// ════════════════════════════════════════════════════════════════════════════

pub struct PoseSignalProcessor {
    config: SmoothingConfig,
    points: [TrackedPoint; 5],
    frames: u64,
}

impl PoseSignalProcessor {
    pub fn new(config: SmoothingConfig) -> Self {
        let points = TrackedJoint::ALL.map(|j| {
            TrackedPoint::new(if j.is_hand() { config.hand_alpha } else { config.body_alpha })
        });
        PoseSignalProcessor { config, points, frames: 0 }
    }

    /// Advance one tick.  `None` means the source had nothing this tick.
    pub fn process(&mut self, frame: Option<&PoseFrame>) {
        if frame.is_some() { self.frames += 1; }

        for joint in TrackedJoint::ALL {
            let target = frame
                .and_then(|f| f.get(joint.landmark_index()))
                .filter(|lm| lm.is_confident(self.config.min_confidence))
                .map(|lm| {
                    let x = if self.config.mirror_x { 1.0 - lm.x } else { lm.x };
                    Vec2::new(x, lm.y)
                });

            let point = &mut self.points[joint.slot()];
            let was_tracked = point.is_tracked();
            let tracked = point.update(target);
            if was_tracked != tracked {
                if tracked {
                    debug!(?joint, "tracking regained");
                } else {
                    debug!(?joint, "tracking lost");
                }
            }
        }
    }

    pub fn point(&self, joint: TrackedJoint) -> &TrackedPoint { &self.points[joint.slot()] }

    /// The hand's point, only while it is tracked this tick.
    pub fn hand(&self, hand: Hand) -> Option<&TrackedPoint> {
        Some(self.point(hand.into())).filter(|p| p.is_tracked())
    }

    /// Head plus shoulder centre, only if all three are tracked this tick.
    pub fn body(&self) -> Option<BodyPose> {
        let head = self.point(TrackedJoint::Head);
        let ls   = self.point(TrackedJoint::LeftShoulder);
        let rs   = self.point(TrackedJoint::RightShoulder);
        if !(head.is_tracked() && ls.is_tracked() && rs.is_tracked()) {
            return None;
        }
        Some(BodyPose {
            head:            head.position(),
            shoulder_center: (ls.position() + rs.position()) * 0.5,
        })
    }

    /// Frames received since construction or the last reset.
    pub fn frames_seen(&self) -> u64 { self.frames }

    pub fn config(&self) -> &SmoothingConfig { &self.config }

    pub fn reset(&mut self) {
        for p in &mut self.points { p.reset(); }
        self.frames = 0;
    }
}

impl Default for PoseSignalProcessor {
    fn default() -> Self { PoseSignalProcessor::new(SmoothingConfig::default()) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Raw landmark frames and the pose-source seam.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices (33-point body model)
// ════════════════════════════════════════════════════════════════════════════

pub const NOSE:           usize = 0;
pub const LEFT_SHOULDER:  usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_WRIST:     usize = 15;
pub const RIGHT_WRIST:    usize = 16;
pub const LEFT_HIP:       usize = 23;
pub const RIGHT_HIP:      usize = 24;

/// Landmarks in a full body frame.
pub const LANDMARK_COUNT: usize = 33;

// ════════════════════════════════════════════════════════════════════════════
// Vec2
// ════════════════════════════════════════════════════════════════════════════

/// A point or delta in normalized screen space (`0..1` on both axes,
/// y growing downward).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self { Vec2 { x, y } }

    pub fn length(self) -> f32 { (self.x * self.x + self.y * self.y).sqrt() }

    pub fn distance(self, other: Vec2) -> f32 { (self - other).length() }

    pub fn is_finite(self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, o: Vec2) -> Vec2 { Vec2::new(self.x + o.x, self.y + o.y) }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, o: Vec2) -> Vec2 { Vec2::new(self.x - o.x, self.y - o.y) }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, k: f32) -> Vec2 { Vec2::new(self.x * k, self.y * k) }
}

// ════════════════════════════════════════════════════════════════════════════
// Landmark / PoseFrame
// ════════════════════════════════════════════════════════════════════════════

/// One detected landmark, as delivered by the pose model (not mirrored).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Detector confidence that the landmark is visible, `0..1`.
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self { Landmark { x, y, visibility } }

    /// True if the landmark clears `threshold` and carries usable numbers.
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.visibility >= threshold && self.x.is_finite() && self.y.is_finite()
    }
}

/// The landmarks detected for a single camera frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Seconds on the producer's clock.
    #[serde(default)]
    pub timestamp: f64,
    pub landmarks: Vec<Landmark>,
}

impl PoseFrame {
    /// A full-size frame with every landmark invisible.
    pub fn empty(timestamp: f64) -> Self {
        PoseFrame { timestamp, landmarks: vec![Landmark::default(); LANDMARK_COUNT] }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> { self.landmarks.get(index) }

    /// Overwrite landmark `index`, growing the frame if the detector sent a
    /// short one.
    pub fn set(&mut self, index: usize, lm: Landmark) {
        if self.landmarks.len() <= index {
            self.landmarks.resize(index + 1, Landmark::default());
        }
        self.landmarks[index] = lm;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PoseSource
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can be asked for the pose at a given time.
///
/// Returning `None` means "no usable detection this tick"; the processor
/// treats that as every joint lost.
pub trait PoseSource {
    fn detect(&mut self, timestamp: f64) -> Option<PoseFrame>;
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_from_json_defaults_visibility() {
        let f: PoseFrame = serde_json::from_str(
            r#"{"timestamp":1.5,"landmarks":[{"x":0.1,"y":0.2}]}"#,
        ).unwrap();
        assert_eq!(f.timestamp, 1.5);
        assert_eq!(f.landmarks[0].visibility, 0.0);
    }

    #[test]
    fn set_grows_short_frame() {
        let mut f = PoseFrame { timestamp: 0.0, landmarks: vec![] };
        f.set(RIGHT_WRIST, Landmark::new(0.5, 0.5, 1.0));
        assert_eq!(f.landmarks.len(), RIGHT_WRIST + 1);
        assert_eq!(f.get(RIGHT_WRIST).unwrap().x, 0.5);
    }

    #[test]
    fn nan_landmark_is_not_confident() {
        assert!(!Landmark::new(f32::NAN, 0.5, 1.0).is_confident(0.5));
        assert!(Landmark::new(0.3, 0.5, 0.5).is_confident(0.5));
    }

    #[test]
    fn vec2_distance() {
        let d = Vec2::new(0.0, 0.0).distance(Vec2::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-6);
    }
}

//! A single smoothed, confidence-gated point with velocity and trail.

use std::collections::VecDeque;

use crate::landmark::Vec2;

/// Samples kept per point for the trail and velocity.
pub const HISTORY_LEN: usize = 6;

/// One joint after smoothing.
///
/// The point is *untracked* until its first confident sample arrives, which
/// places it directly at the target.  After that every confident sample
/// moves it `alpha` of the way toward the target.  A missing sample flags
/// the point lost and leaves position, velocity and trail untouched.
#[derive(Clone, Debug)]
pub struct TrackedPoint {
    position:    Vec2,
    velocity:    Vec2,
    history:     VecDeque<Vec2>,
    alpha:       f32,
    initialized: bool,
    lost:        bool,
}

impl TrackedPoint {
    pub fn new(alpha: f32) -> Self {
        TrackedPoint {
            position:    Vec2::ZERO,
            velocity:    Vec2::ZERO,
            history:     VecDeque::with_capacity(HISTORY_LEN),
            alpha:       alpha.clamp(0.0, 1.0),
            initialized: false,
            lost:        true,
        }
    }

    /// Feed this tick's sample.  Returns whether the point is tracked after
    /// the update.
    pub fn update(&mut self, target: Option<Vec2>) -> bool {
        let target = match target {
            Some(t) if t.is_finite() => t,
            _ => {
                self.lost = true;
                return false;
            }
        };

        if self.initialized {
            let prev = self.position;
            self.position = prev + (target - prev) * self.alpha;
            self.velocity = self.position - prev;
        } else {
            self.position    = target;
            self.velocity    = Vec2::ZERO;
            self.initialized = true;
        }
        self.lost = false;

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(self.position);
        true
    }

    pub fn position(&self) -> Vec2 { self.position }
    /// Delta between the last two smoothed samples, per tick.
    pub fn velocity(&self) -> Vec2 { self.velocity }
    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Vec2> { self.history.iter() }
    pub fn history_len(&self) -> usize { self.history.len() }
    pub fn is_lost(&self) -> bool { self.lost }
    pub fn is_tracked(&self) -> bool { self.initialized && !self.lost }
    pub fn alpha(&self) -> f32 { self.alpha }

    pub fn reset(&mut self) {
        *self = TrackedPoint::new(self.alpha);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool { (a - b).abs() < 1e-5 }

    #[test]
    fn starts_untracked() {
        let p = TrackedPoint::new(0.2);
        assert!(p.is_lost());
        assert!(!p.is_tracked());
        assert_eq!(p.history_len(), 0);
    }

    #[test]
    fn first_sample_places_point() {
        let mut p = TrackedPoint::new(0.2);
        assert!(p.update(Some(Vec2::new(0.4, 0.6))));
        assert_eq!(p.position(), Vec2::new(0.4, 0.6));
        assert_eq!(p.velocity(), Vec2::ZERO);
    }

    #[test]
    fn ema_step_moves_alpha_of_the_way() {
        let mut p = TrackedPoint::new(0.2);
        p.update(Some(Vec2::new(0.0, 0.0)));
        p.update(Some(Vec2::new(1.0, 0.5)));
        assert!(approx_eq(p.position().x, 0.2));
        assert!(approx_eq(p.position().y, 0.1));
        assert!(approx_eq(p.velocity().x, 0.2));
        assert!(approx_eq(p.velocity().y, 0.1));
    }

    #[test]
    fn missing_sample_keeps_position() {
        let mut p = TrackedPoint::new(0.2);
        p.update(Some(Vec2::new(0.3, 0.3)));
        p.update(Some(Vec2::new(0.8, 0.3)));
        let before = p.position();
        assert!(!p.update(None));
        assert!(p.is_lost());
        assert_eq!(p.position(), before);
    }

    #[test]
    fn regains_from_last_position() {
        let mut p = TrackedPoint::new(0.5);
        p.update(Some(Vec2::new(0.0, 0.0)));
        p.update(None);
        p.update(Some(Vec2::new(1.0, 0.0)));
        assert!(p.is_tracked());
        assert!(approx_eq(p.position().x, 0.5));
    }

    #[test]
    fn non_finite_target_counts_as_lost() {
        let mut p = TrackedPoint::new(0.2);
        p.update(Some(Vec2::new(0.5, 0.5)));
        assert!(!p.update(Some(Vec2::new(f32::NAN, 0.5))));
        assert_eq!(p.position(), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn history_is_bounded() {
        let mut p = TrackedPoint::new(1.0);
        for i in 0..20 {
            p.update(Some(Vec2::new(i as f32 * 0.01, 0.0)));
        }
        assert_eq!(p.history_len(), HISTORY_LEN);
        let first = p.history().next().unwrap();
        assert!(approx_eq(first.x, 0.14));
    }

    #[test]
    fn reset_keeps_alpha() {
        let mut p = TrackedPoint::new(0.12);
        p.update(Some(Vec2::new(0.5, 0.5)));
        p.reset();
        assert!(!p.is_tracked());
        assert!(approx_eq(p.alpha(), 0.12));
    }
}

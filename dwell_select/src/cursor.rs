//! Dwell cursors.

use std::fmt::Debug;

use pose_stream::Hand;
use tracing::{debug, info};

/// Hover time needed to commit, in seconds.
pub const DEFAULT_DWELL_SECS: f64 = 1.5;

// ════════════════════════════════════════════════════════════════════════════
// DwellUpdate
// ════════════════════════════════════════════════════════════════════════════

/// Result of one [`DwellSelectCursor::update`].
#[derive(Clone, Debug, PartialEq)]
pub struct DwellUpdate<T> {
    /// 0–100.  Reads 100 on the tick that commits.
    pub progress:  f32,
    pub committed: Option<T>,
}

impl<T> DwellUpdate<T> {
    fn idle() -> Self { DwellUpdate { progress: 0.0, committed: None } }
}

#[derive(Clone, Debug)]
struct DwellTarget<T> {
    candidate:  T,
    started_at: f64,
    progress:   f32,
}

// ════════════════════════════════════════════════════════════════════════════
// DwellSelectCursor
// ════════════════════════════════════════════════════════════════════════════

/// Hover-to-commit selector over targets of type `T`.
///
/// * Same candidate as last tick: progress grows linearly with hover time.
///   Reaching 100 commits the candidate once and clears the target.
/// * Different candidate (or none): tracking restarts at 0 from `now`.
/// * After a commit the committed candidate is ignored until the pointer
///   leaves it, so holding still never fires twice.
#[derive(Clone, Debug)]
pub struct DwellSelectCursor<T> {
    dwell_secs: f64,
    target:     Option<DwellTarget<T>>,
    latched:    Option<T>,
}

impl<T: Clone + PartialEq + Debug> DwellSelectCursor<T> {
    /// # Panics
    /// If `dwell_secs` is not a positive finite number.
    pub fn new(dwell_secs: f64) -> Self {
        assert!(
            dwell_secs.is_finite() && dwell_secs > 0.0,
            "dwell time must be positive, got {}", dwell_secs
        );
        DwellSelectCursor { dwell_secs, target: None, latched: None }
    }

    pub fn update(&mut self, candidate: Option<T>, now: f64) -> DwellUpdate<T> {
        if let Some(latched) = &self.latched {
            if candidate.as_ref() == Some(latched) {
                return DwellUpdate::idle();
            }
            self.latched = None;
        }

        let candidate = match candidate {
            Some(c) => c,
            None => {
                self.target = None;
                return DwellUpdate::idle();
            }
        };

        let same = self.target.as_ref().map_or(false, |t| t.candidate == candidate);
        if !same {
            debug!(?candidate, "dwell armed");
            self.target = Some(DwellTarget { candidate, started_at: now, progress: 0.0 });
            return DwellUpdate::idle();
        }
        let target = match self.target.as_mut() {
            Some(t) => t,
            None    => return DwellUpdate::idle(),
        };

        let elapsed = (now - target.started_at).max(0.0);
        let raw = (elapsed / self.dwell_secs * 100.0).min(100.0) as f32;
        target.progress = target.progress.max(raw);

        if target.progress >= 100.0 {
            let committed = target.candidate.clone();
            info!(?committed, "dwell committed");
            self.target  = None;
            self.latched = Some(committed.clone());
            return DwellUpdate { progress: 100.0, committed: Some(committed) };
        }

        DwellUpdate { progress: target.progress, committed: None }
    }

    /// Candidate currently accumulating hover time.
    pub fn candidate(&self) -> Option<&T> { self.target.as_ref().map(|t| &t.candidate) }

    pub fn progress(&self) -> f32 { self.target.as_ref().map_or(0.0, |t| t.progress) }

    pub fn dwell_secs(&self) -> f64 { self.dwell_secs }

    pub fn reset(&mut self) {
        self.target  = None;
        self.latched = None;
    }
}

impl<T: Clone + PartialEq + Debug> Default for DwellSelectCursor<T> {
    fn default() -> Self { DwellSelectCursor::new(DEFAULT_DWELL_SECS) }
}

// ════════════════════════════════════════════════════════════════════════════
// DualDwell — one cursor per hand
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct DualDwellUpdate<T> {
    pub left_progress:  f32,
    pub right_progress: f32,
    /// The hand that committed and what it picked.  Left wins a tie.
    pub committed:      Option<(Hand, T)>,
}

/// Two independent cursors sharing nothing but a dwell time.
#[derive(Clone, Debug)]
pub struct DualDwell<T> {
    left:  DwellSelectCursor<T>,
    right: DwellSelectCursor<T>,
}

impl<T: Clone + PartialEq + Debug> DualDwell<T> {
    pub fn new(dwell_secs: f64) -> Self {
        DualDwell {
            left:  DwellSelectCursor::new(dwell_secs),
            right: DwellSelectCursor::new(dwell_secs),
        }
    }

    pub fn update(&mut self, left: Option<T>, right: Option<T>, now: f64) -> DualDwellUpdate<T> {
        let l = self.left.update(left, now);
        let r = self.right.update(right, now);
        let committed = l.committed.map(|t| (Hand::Left, t))
            .or_else(|| r.committed.map(|t| (Hand::Right, t)));
        DualDwellUpdate { left_progress: l.progress, right_progress: r.progress, committed }
    }

    pub fn cursor(&self, hand: Hand) -> &DwellSelectCursor<T> {
        match hand { Hand::Left => &self.left, Hand::Right => &self.right }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

impl<T: Clone + PartialEq + Debug> Default for DualDwell<T> {
    fn default() -> Self { DualDwell::new(DEFAULT_DWELL_SECS) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Item { Play, Quit }

    #[test]
    fn default_dwell_is_one_and_a_half_seconds() {
        let c: DwellSelectCursor<Item> = DwellSelectCursor::default();
        assert_eq!(c.dwell_secs(), 1.5);
    }

    #[test]
    fn progress_grows_linearly() {
        let mut c = DwellSelectCursor::new(2.0);
        assert_eq!(c.update(Some(Item::Play), 10.0).progress, 0.0);
        assert_eq!(c.update(Some(Item::Play), 10.5).progress, 25.0);
        assert_eq!(c.update(Some(Item::Play), 11.0).progress, 50.0);
    }

    #[test]
    fn continuous_hover_commits_exactly_once() {
        let mut c = DwellSelectCursor::new(1.5);
        let mut commits = 0;
        let mut t = 0.0;
        while t < 6.0 {
            let u = c.update(Some(Item::Play), t);
            assert!((0.0..=100.0).contains(&u.progress));
            if u.committed.is_some() { commits += 1; }
            t += 1.0 / 60.0;
        }
        assert_eq!(commits, 1);
    }

    #[test]
    fn commit_resets_target() {
        let mut c = DwellSelectCursor::new(1.0);
        c.update(Some(Item::Play), 0.0);
        let u = c.update(Some(Item::Play), 1.0);
        assert_eq!(u.committed, Some(Item::Play));
        assert_eq!(u.progress, 100.0);
        assert!(c.candidate().is_none());
        assert_eq!(c.progress(), 0.0);
    }

    #[test]
    fn leaving_and_returning_rearms() {
        let mut c = DwellSelectCursor::new(1.0);
        c.update(Some(Item::Play), 0.0);
        assert!(c.update(Some(Item::Play), 1.0).committed.is_some());
        c.update(None, 1.1);
        c.update(Some(Item::Play), 1.2);
        assert_eq!(c.update(Some(Item::Play), 2.5).committed, Some(Item::Play));
    }

    #[test]
    fn switching_candidate_restarts_at_zero() {
        let mut c = DwellSelectCursor::new(1.0);
        c.update(Some(Item::Play), 0.0);
        assert_eq!(c.update(Some(Item::Play), 0.8).progress, 80.0);
        assert_eq!(c.update(Some(Item::Quit), 0.9).progress, 0.0);
        assert_eq!(c.update(Some(Item::Quit), 1.4).progress, 50.0);
    }

    #[test]
    fn losing_the_pointer_resets() {
        let mut c = DwellSelectCursor::new(1.0);
        c.update(Some(Item::Play), 0.0);
        c.update(Some(Item::Play), 0.9);
        assert_eq!(c.update(None, 1.0).progress, 0.0);
        assert_eq!(c.update(Some(Item::Play), 1.1).progress, 0.0);
        assert!(c.update(Some(Item::Play), 1.5).committed.is_none());
    }

    #[test]
    fn progress_never_decreases_if_clock_steps_back() {
        let mut c = DwellSelectCursor::new(1.0);
        c.update(Some(Item::Play), 0.0);
        c.update(Some(Item::Play), 0.6);
        assert_eq!(c.update(Some(Item::Play), 0.4).progress, 60.0);
    }

    #[test]
    #[should_panic]
    fn zero_dwell_is_rejected() {
        let _ = DwellSelectCursor::<Item>::new(0.0);
    }

    #[test]
    fn dual_cursors_are_independent() {
        let mut d = DualDwell::new(1.0);
        d.update(Some(Item::Play), None, 0.0);
        let u = d.update(Some(Item::Play), Some(Item::Quit), 0.5);
        assert_eq!(u.left_progress, 50.0);
        assert_eq!(u.right_progress, 0.0);
        let u = d.update(Some(Item::Play), Some(Item::Quit), 1.0);
        assert_eq!(u.committed, Some((Hand::Left, Item::Play)));
        assert_eq!(u.right_progress, 50.0);
    }

    #[test]
    fn dual_left_wins_tie() {
        let mut d = DualDwell::new(1.0);
        d.update(Some(Item::Play), Some(Item::Quit), 0.0);
        let u = d.update(Some(Item::Play), Some(Item::Quit), 1.0);
        assert_eq!(u.committed, Some((Hand::Left, Item::Play)));
    }
}

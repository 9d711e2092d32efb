//! Hands against notes, body against obstacles.
//!
//! The judge only decides *what* happened this tick.  Score and energy are
//! applied by the session so that every penalty goes through one place.

use beat_midi::{Lane, ObstacleKind};
use pose_stream::{BodyPose, Hand, PoseSignalProcessor, Vec2};
use serde::{Deserialize, Serialize};

use crate::notes::{EntityId, NoteLifecycleManager};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Note radius in normalized screen units.
    pub note_size:       f32,
    /// Hit radius is `note_size * margin_factor`.
    pub margin_factor:   f32,
    /// Head below this y (screen y grows downward) counts as ducking.
    pub duck_threshold:  f32,
    /// Shoulder centre must be this far from mid-screen to count as a lean.
    pub lean_threshold:  f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        JudgeConfig {
            note_size:      0.08,
            margin_factor:  1.25,
            duck_threshold: 0.55,
            lean_threshold: 0.1,
        }
    }
}

impl JudgeConfig {
    pub fn hit_radius(&self) -> f32 { self.note_size * self.margin_factor }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Judgement {
    /// Regular note sliced by its hand.  `angle` is the slice direction in
    /// radians, from the hand's velocity.
    Hit       { id: EntityId, hand: Hand, lane: Lane, position: Vec2, angle: f32 },
    HazardHit { id: EntityId, hand: Hand, position: Vec2 },
}

/// Check every tracked hand against every hittable note, nearest note first.
/// Notes that are hit are moved to `Hit` in `notes`.  A hand can slice more
/// than one note per tick.
pub fn judge_notes(
    config: &JudgeConfig,
    notes:  &mut NoteLifecycleManager,
    pose:   &PoseSignalProcessor,
) -> Vec<Judgement> {
    let radius = config.hit_radius();
    let mut out = Vec::new();

    for id in notes.hittable() {
        let Some(note) = notes.note(id) else { continue };
        let (position, lane, required) = (note.position, note.lane, note.required_hand());

        let hand = Hand::BOTH.into_iter().find(|&h| {
            required.map_or(true, |r| r == h)
                && pose.hand(h).is_some_and(|p| p.position().distance(position) < radius)
        });
        let Some(hand) = hand else { continue };

        if !notes.mark_hit(id) { continue; }
        out.push(match required {
            Some(_) => {
                let v = pose.hand(hand).map_or(Vec2::ZERO, |p| p.velocity());
                Judgement::Hit { id, hand, lane, position, angle: v.y.atan2(v.x) }
            }
            None => Judgement::HazardHit { id, hand, position },
        });
    }
    out
}

/// Did the body clear an arriving obstacle?  `None` when the body is not
/// tracked; the caller treats that as cleared without penalty.
pub fn obstacle_cleared(config: &JudgeConfig, kind: ObstacleKind, body: Option<BodyPose>) -> Option<bool> {
    let body = body?;
    Some(match kind {
        ObstacleKind::LowBar    => body.head.y > config.duck_threshold,
        ObstacleKind::LeftWall  => body.shoulder_center.x > 0.5 + config.lean_threshold,
        ObstacleKind::RightWall => body.shoulder_center.x < 0.5 - config.lean_threshold,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{NoteConfig, NoteState};
    use beat_midi::{Direction, Spawn};
    use pose_stream::{Landmark, PoseFrame, SmoothingConfig, TrackedJoint};

    /// Processor that snaps straight to the target and does not mirror.
    fn raw_pose() -> PoseSignalProcessor {
        PoseSignalProcessor::new(SmoothingConfig { mirror_x: false, ..SmoothingConfig::default() })
    }

    fn place(pose: &mut PoseSignalProcessor, joints: &[(TrackedJoint, Vec2)]) {
        let mut f = PoseFrame::empty(0.0);
        for &(j, p) in joints {
            f.set(j.landmark_index(), Landmark::new(p.x, p.y, 1.0));
        }
        pose.process(Some(&f));
    }

    /// Manager with one entity already sitting at depth 1.
    fn with_one(spawn: Spawn) -> (NoteLifecycleManager, EntityId) {
        let mut m = NoteLifecycleManager::new(NoteConfig {
            spawn_depth: 2.0, speed: 1.0, speed_ramp: 0.0, ..NoteConfig::default()
        });
        let id = m.spawn(spawn);
        m.advance(0);
        (m, id)
    }

    fn left_note() -> Spawn {
        Spawn::Note { lane: Lane::new(2, 0), hand: Hand::Left, direction: Direction::Down }
    }

    #[test]
    fn required_hand_near_note_hits() {
        let (mut m, id) = with_one(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.3))]);
        let j = judge_notes(&JudgeConfig::default(), &mut m, &pose);
        assert!(matches!(j.as_slice(), [Judgement::Hit { hand: Hand::Left, .. }]));
        assert_eq!(m.note(id).unwrap().state(), NoteState::Hit);
    }

    #[test]
    fn wrong_hand_is_ignored() {
        let (mut m, id) = with_one(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::RightHand, Vec2::new(0.6, 0.3))]);
        assert!(judge_notes(&JudgeConfig::default(), &mut m, &pose).is_empty());
        assert_eq!(m.note(id).unwrap().state(), NoteState::Spawned);
    }

    #[test]
    fn far_hand_is_ignored() {
        let (mut m, _) = with_one(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.5))]);
        assert!(judge_notes(&JudgeConfig::default(), &mut m, &pose).is_empty());
    }

    #[test]
    fn lost_hand_never_hits() {
        let (mut m, _) = with_one(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.3))]);
        pose.process(None);
        assert!(judge_notes(&JudgeConfig::default(), &mut m, &pose).is_empty());
    }

    #[test]
    fn hazard_accepts_either_hand() {
        for joint in [TrackedJoint::LeftHand, TrackedJoint::RightHand] {
            let (mut m, id) = with_one(Spawn::Hazard { lane: Lane::new(0, 0) });
            let mut pose = raw_pose();
            place(&mut pose, &[(joint, Vec2::new(0.2, 0.3))]);
            let j = judge_notes(&JudgeConfig::default(), &mut m, &pose);
            assert!(matches!(j.as_slice(), [Judgement::HazardHit { id: got, .. }] if *got == id));
        }
    }

    #[test]
    fn note_outside_window_is_not_judged() {
        let mut m = NoteLifecycleManager::new(NoteConfig::default());
        m.spawn(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.3))]);
        assert!(judge_notes(&JudgeConfig::default(), &mut m, &pose).is_empty());
    }

    #[test]
    fn slice_angle_follows_velocity() {
        let (mut m, _) = with_one(left_note());
        let mut pose = raw_pose();
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.0))]);
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 1.0))]);
        // y: 0.0 → 0.2 → 0.28, moving straight down the screen
        place(&mut pose, &[(TrackedJoint::LeftHand, Vec2::new(0.6, 0.6))]);
        let j = judge_notes(&JudgeConfig::default(), &mut m, &pose);
        match j.as_slice() {
            [Judgement::Hit { angle, .. }] => assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-3),
            other => panic!("expected one hit, got {:?}", other),
        }
    }

    fn body(head_y: f32, center_x: f32) -> Option<BodyPose> {
        Some(BodyPose { head: Vec2::new(center_x, head_y), shoulder_center: Vec2::new(center_x, 0.6) })
    }

    #[test]
    fn duck_clears_low_bar() {
        let c = JudgeConfig::default();
        assert_eq!(obstacle_cleared(&c, ObstacleKind::LowBar, body(0.6, 0.5)), Some(true));
        assert_eq!(obstacle_cleared(&c, ObstacleKind::LowBar, body(0.3, 0.5)), Some(false));
    }

    #[test]
    fn lean_clears_walls() {
        let c = JudgeConfig::default();
        assert_eq!(obstacle_cleared(&c, ObstacleKind::LeftWall, body(0.3, 0.7)), Some(true));
        assert_eq!(obstacle_cleared(&c, ObstacleKind::LeftWall, body(0.3, 0.5)), Some(false));
        assert_eq!(obstacle_cleared(&c, ObstacleKind::RightWall, body(0.3, 0.3)), Some(true));
        assert_eq!(obstacle_cleared(&c, ObstacleKind::RightWall, body(0.3, 0.7)), Some(false));
    }

    #[test]
    fn untracked_body_is_undecided() {
        assert_eq!(obstacle_cleared(&JudgeConfig::default(), ObstacleKind::LowBar, None), None);
    }
}

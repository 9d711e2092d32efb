//! # pose_stream
//!
//! Turns raw, possibly-missing pose landmarks into smoothed tracked points.
//!
//! A [`PoseSource`] produces at most one [`PoseFrame`] per simulation tick.
//! The [`PoseSignalProcessor`] keeps one [`TrackedPoint`] per joint of
//! interest and, every tick:
//!
//! * mirrors x (`x' = 1 - x`) so the user sees themselves as in a mirror,
//! * gates each landmark on visibility (`>= min_confidence`),
//! * blends toward the target with an exponential moving average,
//! * records velocity and a short trail for rendering.
//!
//! Low-confidence joints are flagged *lost* and left where they were.
//! A missing frame marks every joint lost.  Nothing here ever panics on
//! bad input.
//!
//! ## Joints
//!
//! | Joint | Landmark (33-point body model) | Alpha |
//! |---|---|---|
//! | Left hand      | 15 (left wrist)     | `hand_alpha` (0.2)  |
//! | Right hand     | 16 (right wrist)    | `hand_alpha` (0.2)  |
//! | Head           | 0 (nose)            | `body_alpha` (0.12) |
//! | Left shoulder  | 11                  | `body_alpha` (0.12) |
//! | Right shoulder | 12                  | `body_alpha` (0.12) |
//!
//! ```rust
//! use pose_stream::{Landmark, PoseFrame, PoseSignalProcessor, SmoothingConfig, Hand};
//!
//! let mut proc = PoseSignalProcessor::new(SmoothingConfig::default());
//! let mut frame = PoseFrame::empty(0.0);
//! frame.set(pose_stream::landmark::LEFT_WRIST, Landmark::new(0.25, 0.5, 0.9));
//! proc.process(Some(&frame));
//! let left = proc.hand(Hand::Left).unwrap();
//! assert!((left.position().x - 0.75).abs() < 1e-6); // mirrored
//! ```

pub mod landmark;
pub mod tracked;
pub mod processor;

pub use landmark::{Landmark, PoseFrame, PoseSource, Vec2};
pub use tracked::{TrackedPoint, HISTORY_LEN};
pub use processor::{BodyPose, Hand, PoseSignalProcessor, SmoothingConfig, TrackedJoint};

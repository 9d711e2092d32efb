//! # dwell_select
//!
//! Turns a noisy, continuous pointer (a tracked hand) into discrete
//! commits: hold over the same target long enough and it is selected.
//!
//! * [`DwellSelectCursor`] — one cursor, generic over the target id type.
//! * [`DualDwell`] — two independent cursors, one per hand.
//! * [`Region`] / [`pick`] — map a pointer position to the target under it.
//!
//! ```rust
//! use dwell_select::DwellSelectCursor;
//!
//! let mut cursor = DwellSelectCursor::new(1.0);
//! assert_eq!(cursor.update(Some("play"), 0.0).progress, 0.0);
//! assert_eq!(cursor.update(Some("play"), 0.5).progress, 50.0);
//! assert_eq!(cursor.update(Some("play"), 1.0).committed, Some("play"));
//! ```

pub mod cursor;
pub mod region;

pub use cursor::{DualDwell, DualDwellUpdate, DwellSelectCursor, DwellUpdate, DEFAULT_DWELL_SECS};
pub use region::{pick, Region};

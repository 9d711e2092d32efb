//! Fixed-rate tick sources for the main loop.
//!
//! The beat scheduler and the frame loop run at different rates.  A
//! [`Cadence`] keeps one rate on a fixed grid of due times, and
//! [`spawn_ticker`] runs one cadence per rate on a thread, sending a
//! [`Tick`] each time one comes due.  The main thread blocks on that
//! channel and stays the only writer to the session, while scheduler ticks
//! keep arriving on their own grid however long a frame takes to draw.
//!
//! ```text
//!   ticker thread ──Tick::Schedule (every period)──▶ ┐
//!                 ──Tick::Frame    (every 1/hz)───▶ ├─ main loop
//! ```

use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use beat_midi::AudioClock;
use tracing::debug;

// ════════════════════════════════════════════════════════════════════════════
// Cadence — one fixed grid
// ════════════════════════════════════════════════════════════════════════════

const MIN_PERIOD: f64 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cadence {
    period: f64,
    next:   f64,
}

impl Cadence {
    /// First tick is due at `start`.
    pub fn new(period: f64, start: f64) -> Self {
        Cadence { period: period.max(MIN_PERIOD), next: start }
    }

    /// True once `now` has reached the next grid point.  The grid advances
    /// by whole periods, so a late check neither drifts the grid nor
    /// produces a burst of catch-up ticks.
    pub fn due(&mut self, now: f64) -> bool {
        if now < self.next { return false; }
        let passed = ((now - self.next) / self.period).floor() + 1.0;
        self.next += passed * self.period;
        true
    }

    pub fn next(&self) -> f64 { self.next }
    pub fn period(&self) -> f64 { self.period }
}

// ════════════════════════════════════════════════════════════════════════════
// Ticker thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Time to run one beat scheduler period.
    Schedule,
    /// Time to poll input, step the simulation and draw.
    Frame,
}

/// Spawn the ticker.  It runs until the receiver is dropped.
pub fn spawn_ticker(schedule_period: f64, frame_period: f64) -> Receiver<Tick> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let clock = AudioClock::new();
        let mut schedule = Cadence::new(schedule_period, 0.0);
        let mut frame    = Cadence::new(frame_period, 0.0);
        loop {
            let now = clock.now();
            if schedule.due(now) && tx.send(Tick::Schedule).is_err() { break; }
            if frame.due(now) && tx.send(Tick::Frame).is_err() { break; }

            let wake = schedule.next().min(frame.next()) - clock.now();
            if wake > 0.0 { thread::sleep(Duration::from_secs_f64(wake)); }
        }
        debug!("ticker stopped");
    });
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_the_grid() {
        let mut c = Cadence::new(0.025, 0.0);
        assert!(c.due(0.0));
        assert!(!c.due(0.01));
        assert!(!c.due(0.024));
        assert!(c.due(0.025));
        assert!((c.next() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn late_checks_do_not_drift() {
        let mut c = Cadence::new(0.025, 0.0);
        let mut fired = 0;
        // Checked every 16 ms, like a frame loop: 0.0 ..= 0.992 s.
        for i in 0..=62 {
            if c.due(i as f64 * 0.016) { fired += 1; }
        }
        // One tick per grid point 0.0 ..= 0.975, and the grid stays put.
        assert_eq!(fired, 40);
        assert!((c.next() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stall_fires_once_and_realigns() {
        let mut c = Cadence::new(0.025, 0.0);
        assert!(c.due(0.0));
        assert!(c.due(0.31));
        assert!(!c.due(0.31));
        assert!((c.next() - 0.325).abs() < 1e-9);
    }

    #[test]
    fn zero_period_is_clamped() {
        let c = Cadence::new(0.0, 1.0);
        assert!(c.period() > 0.0);
        assert_eq!(c.next(), 1.0);
    }

    #[test]
    fn ticker_runs_schedule_faster_than_frames() {
        let rx = spawn_ticker(0.005, 0.02);
        let (mut schedules, mut frames) = (0, 0);
        while frames < 3 {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                Tick::Schedule => schedules += 1,
                Tick::Frame    => frames += 1,
            }
        }
        assert!(schedules >= frames, "{} schedule ticks for {} frames", schedules, frames);
    }
}

//! pose_probe — print smoothed tracking for a JSON-lines pose feed.
//!
//! Each stdin line is one frame:
//! `{"timestamp":0.033,"landmarks":[{"x":0.5,"y":0.4,"visibility":0.98}, …]}`.
//! An empty line or `null` stands for "no detection this tick".
//!
//! Handy for checking an external detector before pointing the game at it.

use std::io::{self, BufRead};

use pose_stream::{PoseFrame, PoseSignalProcessor, SmoothingConfig, TrackedJoint};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let mut proc = PoseSignalProcessor::new(SmoothingConfig::default());
    let stdin = io::stdin();

    for (n, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(l)  => l,
            Err(e) => { warn!("stdin closed: {}", e); break; }
        };
        let trimmed = line.trim();
        let frame: Option<PoseFrame> = if trimmed.is_empty() {
            None
        } else {
            match serde_json::from_str(trimmed) {
                Ok(f)  => f,
                Err(e) => { warn!(line = n + 1, "bad frame: {}", e); None }
            }
        };

        proc.process(frame.as_ref());

        let mut out = format!("{:>6}", n);
        for joint in TrackedJoint::ALL {
            let p = proc.point(joint);
            if p.is_tracked() {
                let pos = p.position();
                out.push_str(&format!("  {:?}=({:.3},{:.3})", joint, pos.x, pos.y));
            } else {
                out.push_str(&format!("  {:?}=lost", joint));
            }
        }
        println!("{}", out);
    }
}

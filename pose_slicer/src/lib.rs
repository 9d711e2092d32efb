//! # pose_slicer
//!
//! Camera-pose rhythm slicer.  Notes fly toward the player on a beat grid
//! and are sliced by moving the matching hand onto them; obstacles are
//! dodged by ducking or leaning.  Menus are driven by dwelling a hand over
//! a button.
//!
//! ## Session flow
//!
//! ```text
//!   Selecting ──dwell on a track──▶ Playing ──energy 0 / time up──▶ Finished
//!       ▲                              │                              │
//!       └────────── abort ─────────────┘◀──── Retry / Menu (dwell) ───┘
//! ```
//!
//! ## Ticks
//!
//! | Cadence | Work |
//! |---|---|
//! | ~60 Hz | pose → smoothing → note advance → judge → score → render |
//! | 25 ms | beat scheduler lookahead → audio voices + spawns |
//!
//! A ticker thread paces both on their own fixed grids and the main thread
//! does the work, so the session has one writer.  Pose feeds and audio
//! playback also run on their own threads and talk to it over channels.
//!
//! ## Simulation controls
//!
//! | Input | Pose |
//! |---|---|
//! | Mouse | Right hand (left hand with `Shift`) |
//! | `C` / hold | Duck |
//! | `Z` / `X` hold | Lean left / right |
//! | `H` | Hide hands (tracking lost) |
//! | `Escape` | Abort to the menu |
//! | `Q` | Quit |

pub mod config;
pub mod notes;
pub mod judge;
pub mod score;
pub mod skill;
pub mod session;
pub mod gesture;
pub mod player;
pub mod hud;
pub mod cadence;
pub mod app;
pub mod visualizer;

pub use config::GameConfig;
pub use session::{GameSession, SessionEvent, SessionPhase, SessionTrack};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not decode {path}: {reason}")]
    AudioDecode { path: String, reason: String },

    #[error("Pose input error: {0}")]
    PoseInput(#[from] serde_json::Error),

    #[error("Window error: {0}")]
    Window(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

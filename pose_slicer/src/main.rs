//! pose_slicer — windowed entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pose_slicer::config::PoseFeedKind;
use pose_slicer::{app, GameConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pose_slicer", about = "Slice notes to the beat with your hands")]
struct Cli {
    /// TOML config file; missing keys take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio file offered as "YOUR TRACK" in the menu
    #[arg(short, long)]
    track: Option<PathBuf>,

    /// Read pose frames as JSON lines on stdin instead of the mouse simulation
    #[arg(long)]
    pose_stdin: bool,

    /// Session length in seconds for synthesized tracks
    #[arg(long)]
    seconds: Option<f64>,

    /// Fixed seed for obstacle rolls and energy-mode spawns
    #[arg(long)]
    seed: Option<u64>,

    /// Play no MIDI even if a port is available
    #[arg(long)]
    no_midi: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut cfg = match &cli.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GameConfig::default(),
    };

    if let Some(track) = cli.track { cfg.session.user_track = Some(track); }
    if cli.pose_stdin { cfg.session.pose_feed = PoseFeedKind::Stdin; }
    if let Some(secs) = cli.seconds { cfg.session.session_seconds = secs; }
    if let Some(seed) = cli.seed { cfg.scheduler.seed = Some(seed); }
    if cli.no_midi { cfg.audio.enable_midi = false; }
    cfg.validate().context("invalid configuration")?;

    if cli.print_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    info!(
        feed = ?cfg.session.pose_feed,
        track = ?cfg.session.user_track,
        seconds = cfg.session.session_seconds,
        "starting"
    );
    app::run(cfg)?;
    Ok(())
}

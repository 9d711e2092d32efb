//! beat_export — write the stock groove to a standard MIDI file.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use beat_midi::{Pattern, Spawn, STEPS_PER_BAR};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "beat_export", about = "Export the slicer groove as a MIDI file")]
struct Cli {
    /// Tempo in beats per minute
    #[arg(long, default_value_t = 120)]
    bpm: u32,

    /// Number of bars to write
    #[arg(long, default_value_t = 8)]
    bars: u32,

    /// Ticks per quarter note
    #[arg(long, default_value_t = 480)]
    tpq: u16,

    /// Output path
    #[arg(short, long, default_value = "groove.mid")]
    out: PathBuf,

    /// Print the step grid before writing
    #[arg(long)]
    grid: bool,

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

    ensure!((20..=300).contains(&cli.bpm), "bpm must be 20-300, got {}", cli.bpm);
    ensure!(cli.bars > 0, "need at least one bar");
    ensure!(cli.tpq >= 4, "ticks per quarter must be at least 4");

    let pattern = Pattern::authored();
    if cli.grid {
        print_grid(&pattern);
    }

    let track = pattern.to_midi(cli.bars, cli.bpm, cli.tpq);
    track.write_file(&cli.out)
        .with_context(|| format!("writing {}", cli.out.display()))?;

    info!(
        path = %cli.out.display(),
        bars = cli.bars,
        bpm = cli.bpm,
        notes = track.note_count(),
        "groove exported"
    );
    Ok(())
}

fn print_grid(pattern: &Pattern) {
    println!();
    println!("  step   {}", (0..STEPS_PER_BAR).map(|s| format!("{:X} ", s)).collect::<String>());
    let row = |label: &str, f: &dyn Fn(usize) -> char| {
        let cells: String = (0..STEPS_PER_BAR).map(|s| format!("{} ", f(s))).collect();
        println!("  {:<6} {}", label, cells);
    };
    row("sound", &|s| if pattern.step(s).hits.is_empty() { '.' } else { 'x' });
    row("note", &|s| {
        let n = pattern.step(s).spawns.iter().filter(|sp| matches!(sp, Spawn::Note { .. })).count();
        match n { 0 => '.', 1 => '1', _ => '2' }
    });
    row("bomb", &|s| {
        if pattern.step(s).spawns.iter().any(|sp| matches!(sp, Spawn::Hazard { .. })) { 'x' } else { '.' }
    });
    row("obst", &|s| if pattern.step(s).obstacle_roll { '?' } else { '.' });
    println!();
}

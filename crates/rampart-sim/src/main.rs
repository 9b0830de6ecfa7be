//! Rampart arena simulation.
//!
//! Runs waves of NPC agents against a scripted target dummy without a
//! renderer and logs what happened.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod dummy;
mod scenario;
mod timing;

use anyhow::Result;
use clap::Parser;
use rampart_agents::AudioCue;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{SimConfig, CONFIG_FILE};
use scenario::Scenario;

/// Headless arena simulation for Rampart NPC agents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML)
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Override the simulated duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Override the clip selection seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the effective scenario to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with((!args.json).then(fmt::layer))
        .with(args.json.then(|| fmt::layer().json()))
        .with(EnvFilter::from_default_env().add_directive("rampart=info".parse()?))
        .init();

    info!("Rampart simulation starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = SimConfig::load_from(&args.config);
    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate();

    if let Some(path) = args.write_config {
        config.save_to(&path)?;
        return Ok(());
    }

    info!(
        duration = config.duration_secs,
        waves = config.waves.len(),
        seed = config.seed,
        fixed_dt = config.fixed_dt(),
        frame_dt = config.frame_dt(),
        "Scenario loaded"
    );

    let mut scenario = Scenario::new(config)?;
    let stats = scenario.run()?;

    info!(
        time = scenario.now(),
        frames = stats.frames,
        physics_steps = stats.physics_steps,
        "Simulation finished"
    );
    info!(
        kills = stats.kills,
        respawns = stats.respawns,
        waves_cleared = stats.waves_cleared,
        arena_cleared = scenario.director().is_finished(),
        "Arena"
    );
    info!(
        melee_hits = stats.melee_hits,
        projectiles_fired = stats.projectiles_fired,
        projectile_hits = stats.projectile_hits,
        agent_hits = stats.agent_hits,
        ignored_hits = stats.ignored_hits,
        dummy_swings = scenario.dummy().swings(),
        dummy_knockouts = scenario.dummy().knockouts(),
        dummy_health = scenario.dummy().health(),
        "Combat"
    );
    info!(
        transitions = stats.transitions,
        voice_lines = stats.voice_lines,
        alert_lines = scenario.audio().count(AudioCue::Alert),
        sounds = stats.sounds,
        alive = scenario.registry().alive_count(),
        "Agents"
    );

    Ok(())
}

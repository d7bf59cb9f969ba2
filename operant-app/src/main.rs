mod app;
mod cli;

use anyhow::{Context, Result};
use app::{App, AppOptions};
use clap::Parser;
use cli::Args;
use operant_experiment::{SessionConfig, SessionStateMachine};
use operant_hw::{HopperCalibration, OperantBox, Peripherals, SimulatedPeripherals};
use operant_render::SkiaSurface;
use operant_timing::HighPrecisionTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.session_config()?;
    info!(
        "{} session: subject {}, condition {}, {} trials, data {}",
        config.experiment_id,
        config.subject,
        config.condition,
        config.max_trials,
        if config.record_data { "recorded" } else { "not recorded" }
    );
    if config.record_data {
        config.ensure_subject_dir()?;
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    if args.hardware {
        run_in_chamber(&args, config, interrupted)
    } else {
        let hopper = if args.hopper_vals.exists() {
            HopperCalibration::load(&args.hopper_vals)?
        } else {
            HopperCalibration::default()
        };
        run(&args, config, SimulatedPeripherals::new(), hopper, interrupted)
    }
}

#[cfg(feature = "rpi")]
fn run_in_chamber(args: &Args, config: SessionConfig, interrupted: Arc<AtomicBool>) -> Result<()> {
    let peripherals = operant_hw::RpiPeripherals::open().context("opening chamber GPIO")?;
    let hopper = HopperCalibration::load(&args.hopper_vals)?;
    run(args, config, peripherals, hopper, interrupted)
}

#[cfg(not(feature = "rpi"))]
fn run_in_chamber(
    _args: &Args,
    _config: SessionConfig,
    _interrupted: Arc<AtomicBool>,
) -> Result<()> {
    anyhow::bail!("--hardware needs a build with the `rpi` feature (GPIO driver unavailable)")
}

fn run<P: Peripherals>(
    args: &Args,
    config: SessionConfig,
    peripherals: P,
    hopper: HopperCalibration,
    interrupted: Arc<AtomicBool>,
) -> Result<()> {
    let font = match args.font_path(config.show_operator_text)? {
        Some(path) => {
            info!("On-screen text font {}", path.display());
            Some(SkiaSurface::load_font(&path)?)
        }
        None => {
            warn!("No font found; the reward screen shows no text");
            None
        }
    };
    let surface = SkiaSurface::new(font)?;
    let timer = HighPrecisionTimer::new();
    let chamber = OperantBox::new(peripherals, hopper);
    let rng = StdRng::from_os_rng();
    let session = SessionStateMachine::new(config, chamber, surface, timer.clone(), rng)?;

    let options = AppOptions {
        hardware: args.hardware,
        stimuli_dir: args.stimuli_dir.clone(),
    };
    let summary = App::new(session, timer, options, interrupted).run()?;
    info!(
        "Session over ({:?}): {} trial(s), {} reinforced",
        summary.reason, summary.trials_completed, summary.reinforced_trials
    );
    Ok(())
}

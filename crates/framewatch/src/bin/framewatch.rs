//! framewatch - inspect configuration and exercise the capture trigger
//!
//! Subcommands:
//! - `framewatch config` - Print the effective configuration and its sources
//! - `framewatch replay` - Run the trigger over a synthetic frame sequence

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framewatch::{CaptureTrigger, DryRun, FrameSample, TriggerPolicy};
use framewatch_conf::FramewatchConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "framewatch")]
#[command(about = "Frame-timing capture trigger tools")]
#[command(version)]
struct Cli {
    /// Config file replacing ./framewatch.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Replay frame times through the trigger against a dry-run service
    Replay {
        /// Frame times in milliseconds (e.g., 16,20,5,5)
        #[arg(short, long, value_delimiter = ',', required = true)]
        durations: Vec<f64>,

        /// Time between frames in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = FramewatchConfig::load_with_sources_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    framewatch::telemetry::init(&config.telemetry.log_level)?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml());
            println!();
            if sources.files.is_empty() {
                println!("# sources: defaults only");
            }
            for file in &sources.files {
                println!("# file: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
        }
        Commands::Replay {
            durations,
            interval_ms,
        } => replay(&config, &durations, Duration::from_millis(interval_ms))?,
    }

    Ok(())
}

fn replay(config: &FramewatchConfig, durations: &[f64], interval: Duration) -> Result<()> {
    let policy = TriggerPolicy::from_config(&config.trigger);
    info!(
        "replaying {} frames, threshold {:.3}ms, capture length {}s",
        durations.len(),
        policy.frame_time_threshold_ms,
        policy.capture_length.as_secs()
    );

    let mut trigger = CaptureTrigger::new(policy);
    let mut control = DryRun::default();
    let base = Instant::now();

    for (index, &millis) in durations.iter().enumerate() {
        let frame_time = Duration::try_from_secs_f64(millis / 1000.0)
            .with_context(|| format!("frame {}: invalid duration {}ms", index, millis))?;
        let at = u32::try_from(index)
            .ok()
            .and_then(|i| interval.checked_mul(i))
            .and_then(|offset| base.checked_add(offset))
            .with_context(|| format!("frame {}: timestamp out of range at {:?} spacing", index, interval))?;
        let sample = if index == 0 {
            FrameSample::First { at }
        } else {
            FrameSample::Interval {
                at,
                duration: frame_time,
            }
        };

        let event = trigger.on_frame(sample, &mut control);
        println!(
            "{:>4}  {:>8.3}ms  {:<14}  {:?}",
            index,
            millis,
            trigger.state().to_string(),
            event
        );
    }

    let stats = trigger.stats();
    println!(
        "\n{} frames, {} over threshold, {} captures started, {} stopped",
        stats.frames_observed,
        stats.frames_over_threshold,
        control.starts,
        control.stops
    );
    Ok(())
}

//! `sheetcount` CLI: scenario runs, replay of recorded detection logs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use tracing::info;
use tracker_core::counting::SheetCounter;
use tracker_core::metrics::{MetricsSummary, TrackingMetrics};
use tracker_core::pipeline::{Tracker, TrackerConfig};
use tracker_core::track::TrackStatus;

#[derive(Parser)]
#[command(name = "sheetcount", about = "Sheet counting tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, track it and report the count.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Tracker configuration JSON (missing fields take defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output the report to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the detection log for later replay
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Replay recorded detection logs, one tracker per log, in parallel.
    Replay {
        /// Paths to replay JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Tracker configuration JSON (missing fields take defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output the reports to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Result of tracking one stream.
#[derive(Debug, Serialize)]
struct StreamReport {
    scenario: String,
    seed: u64,
    frames: usize,
    counted: usize,
    true_count: usize,
    /// counted - true_count; positive means over-counting
    count_error: i64,
    births: usize,
    deletions: usize,
    elapsed_s: f64,
    /// Present only when the log carries ground truth
    metrics: Option<MetricsSummary>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            config,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(scenario, seed, &config, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Replay {
            inputs,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            run_replay(&inputs, &config, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: TrackerConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Run one tracker and one counter over a whole log.
fn track_stream(log: &ReplayLog, config: &TrackerConfig) -> Result<StreamReport> {
    let mut tracker = Tracker::new(config.clone())?;
    let mut counter = SheetCounter::new();
    let mut metrics = TrackingMetrics::default();
    let has_ground_truth = log.frames.iter().any(|f| !f.ground_truth.is_empty());
    let mut births = 0;
    let mut deletions = 0;

    let start = std::time::Instant::now();
    for frame in &log.frames {
        let out = tracker
            .update_frame(frame.index, &frame.detections)
            .with_context(|| format!("stream '{}'", log.scenario_name))?;
        births += out.stats.births;
        deletions += out.stats.deletions;
        counter.observe(&out.objects);
        if has_ground_truth {
            metrics.accumulate(&out.objects, &frame.ground_truth);
        }
    }
    let elapsed = start.elapsed();

    let policy = &config.registry;
    let confirmed = tracker
        .tracks()
        .iter()
        .filter(|t| t.status(policy.min_hits, policy.max_age) == TrackStatus::Confirmed)
        .count();
    info!(
        stream = %log.scenario_name,
        counted = counter.count(),
        live = tracker.live_tracks().len(),
        confirmed,
        "stream finished"
    );

    Ok(StreamReport {
        scenario: log.scenario_name.clone(),
        seed: log.seed,
        frames: log.frames.len(),
        counted: counter.count(),
        true_count: log.true_count,
        count_error: counter.count() as i64 - log.true_count as i64,
        births,
        deletions,
        elapsed_s: elapsed.as_secs_f64(),
        metrics: has_ground_truth.then(|| metrics.summary()),
    })
}

fn print_report(report: &StreamReport) {
    println!(
        "'{}' (seed={}): {} frames, counted {} sheets (truth {}, error {:+}), {} births, elapsed={:.3}s",
        report.scenario,
        report.seed,
        report.frames,
        report.counted,
        report.true_count,
        report.count_error,
        report.births,
        report.elapsed_s,
    );
    if let Some(m) = &report.metrics {
        println!(
            "  precision={:.3} recall={:.3} mean_iou={:.3} id_switches={} duplicate_ids={}",
            m.precision, m.recall, m.mean_iou, m.id_switches, m.duplicate_ids
        );
    }
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: &TrackerConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, frames={}, sheets={})...",
        scenario.name,
        seed,
        scenario.frames,
        scenario.sheets.len()
    );

    let log = scenario.record();
    let report = track_stream(&log, config)?;
    print_report(&report);

    // Save replay if requested
    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        std::fs::write(opath, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing {}", opath.display()))?;
        println!("Report saved to {}", opath.display());
    }

    Ok(())
}

fn run_replay(inputs: &[PathBuf], config: &TrackerConfig, output_path: Option<&Path>) -> Result<()> {
    println!("Replaying {} stream(s)...", inputs.len());

    // One tracker per stream; streams share nothing
    let reports = inputs
        .par_iter()
        .map(|path| {
            let log = load_replay(path)?;
            track_stream(&log, config)
        })
        .collect::<Result<Vec<_>>>()?;

    for report in &reports {
        print_report(report);
    }
    let total: usize = reports.iter().map(|r| r.counted).sum();
    println!("Total counted: {total}");

    if let Some(opath) = output_path {
        std::fs::write(opath, serde_json::to_string_pretty(&reports)?)
            .with_context(|| format!("writing {}", opath.display()))?;
        println!("Reports saved to {}", opath.display());
    }

    Ok(())
}

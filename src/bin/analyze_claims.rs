//! Run the provider-day anomaly pipeline over a claim event file
//!
//! Usage: cargo run --bin analyze_claims -- --input claims_events.csv --out-dir artifacts

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use claims_anomaly::{
    config::{IsolationForestParams, LofParams, PipelineConfig},
    data::{write_csv, EventLoader},
    pipeline::{run_pipeline, PipelineOutcome, PipelineReport},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Flag anomalous provider-days in a claims event stream")]
struct Args {
    /// Claim events file (CSV with event_ts,provider_id,allowed_amt)
    #[arg(short, long)]
    input: PathBuf,

    /// Input is a JSON array instead of CSV
    #[arg(long)]
    json: bool,

    /// Trailing window length in days
    #[arg(short, long, default_value_t = 7)]
    window_days: u32,

    /// Minimum feature rows required to score
    #[arg(long, default_value_t = 2000)]
    min_rows: usize,

    /// Isolation forest ensemble size
    #[arg(long, default_value_t = 200)]
    estimators: usize,

    /// Contamination fraction for both detectors
    #[arg(short, long, default_value_t = 0.02)]
    contamination: f64,

    /// Neighborhood size for the local outlier factor
    #[arg(short = 'k', long, default_value_t = 20)]
    neighbors: usize,

    /// Random seed (tree ensemble and sampling)
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Directory for CSV artifacts; nothing is written when omitted
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Show every flagged row
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_window_days(self.window_days)
            .with_min_rows(self.min_rows)
            .with_isolation(IsolationForestParams {
                n_estimators: self.estimators,
                contamination: self.contamination,
                seed: self.seed,
            })
            .with_lof(LofParams {
                neighbors: self.neighbors,
                contamination: self.contamination,
            })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let events = if args.json {
        EventLoader::load_json(&args.input)?
    } else {
        EventLoader::load_csv(&args.input)?
    };
    println!("Loaded {} claim events", events.len());

    let config = args.to_config();
    let report = match run_pipeline(&events, &config) {
        PipelineOutcome::InsufficientData { rows, min_rows } => {
            println!("Not enough provider-day rows yet: {rows} < {min_rows}. Nothing to score.");
            return Ok(());
        }
        PipelineOutcome::Completed(report) => report,
    };

    print_report(&report, args.verbose);

    if let Some(out_dir) = &args.out_dir {
        write_artifacts(&report, out_dir)?;
        println!("\nWrote artifacts to {}", out_dir.display());
    }

    Ok(())
}

fn print_report(report: &PipelineReport, verbose: bool) {
    let summary = &report.summary;

    println!("\nProvider-Day Anomaly Report");
    println!("===========================");
    println!("Feature rows: {}", report.features.n_rows());
    println!(
        "Isolation forest: {} flagged ({:.2}%)",
        report.iso.anomaly_count(),
        report.iso.anomaly_rate() * 100.0
    );
    match &report.lof {
        Ok(output) => println!(
            "Local outlier factor: {} flagged ({:.2}%)",
            output.anomaly_count(),
            output.anomaly_rate() * 100.0
        ),
        Err(err) => println!("Local outlier factor: skipped ({err})"),
    }

    println!("\nOverlap:");
    for record in summary.overlap.as_records() {
        println!("  {:<16} {}", record.metric, record.value);
    }

    println!("\nTop providers by flag count:");
    println!("{:>4} {:>12} {:>6} {:>6}", "#", "Provider", "ISO", "LOF");
    for (rank, entry) in summary.top_providers.iter().enumerate() {
        println!(
            "{:>4} {:>12} {:>6} {:>6}",
            rank + 1,
            entry.provider_id,
            entry.iso_count,
            entry.lof_count
        );
    }

    if verbose {
        println!("\nFlagged provider-days:");
        for row in report.flagged_rows() {
            println!(
                "  {} {} claims={} avg={:.2} iso={} lof={}",
                row.day, row.provider_id, row.claims_cnt, row.avg_allowed, row.anomaly_iso,
                row.anomaly_lof
            );
        }
    }
}

fn write_artifacts(report: &PipelineReport, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {out_dir:?}"))?;

    let flagged: Vec<_> = report.flagged_rows().into_iter().cloned().collect();

    write_csv(&report.joined, out_dir.join("features_labeled.csv"))?;
    write_csv(&flagged, out_dir.join("flagged.csv"))?;
    write_csv(
        &report.summary.overlap.as_records(),
        out_dir.join("overlap_summary.csv"),
    )?;
    write_csv(&report.summary.daily_rates, out_dir.join("daily_rates.csv"))?;
    write_csv(
        &report.summary.top_providers,
        out_dir.join("top_providers.csv"),
    )?;
    write_csv(&report.summary.sample, out_dir.join("sample.csv"))?;

    Ok(())
}

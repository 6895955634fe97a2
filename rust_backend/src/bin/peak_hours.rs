use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use shiftsync_peaks::config::AnalysisConfig;
use shiftsync_peaks::db::{services, LocalRepository};
use shiftsync_peaks::io::{ExportFormat, ResultExporter};
use shiftsync_peaks::services::{AnalysisRun, PeakHoursPipeline, VenueOutcome};

const DEFAULT_OUTPUT_DIR: &str = "peak_hours_output";

fn load_config() -> Result<AnalysisConfig> {
    match env::var("PEAK_HOURS_CONFIG") {
        Ok(path) => AnalysisConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path)),
        Err(_) => AnalysisConfig::from_default_location()
            .context("Failed to load default configuration"),
    }
}

fn print_report(run: &AnalysisRun) {
    println!("=== Peak Hours ===");
    for venue in run.output.venues() {
        let hours: Vec<String> = run
            .output
            .summary_for(&venue)
            .iter()
            .map(|r| format!("{:02}:00 ({})", r.hour, r.agreement_level))
            .collect();
        if hours.is_empty() {
            println!("{}: no hour reached medium agreement", venue);
        } else {
            println!("{}: {}", venue, hours.join(", "));
        }
    }

    for (venue, outcome) in &run.report.venues {
        match outcome {
            VenueOutcome::Complete => {}
            VenueOutcome::Partial { unavailable } => {
                for failure in unavailable {
                    println!("! {}: {} unavailable ({})", venue, failure.method, failure.error);
                }
            }
            VenueOutcome::Excluded { error } => {
                println!("! {}: excluded ({})", venue, error);
            }
        }
    }

    println!();
    println!(
        "Venues: {} complete, {} partial, {} excluded (seed {})",
        run.report.complete_count(),
        run.report.partial_count(),
        run.report.excluded_count(),
        run.seed
    );
}

async fn analyze(input: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config()?;
    let pipeline = PeakHoursPipeline::new(config)?;
    let run = pipeline.run_csv(input)?;

    let repo = LocalRepository::new();
    let metadata = services::publish_run(&repo, &run)
        .await
        .context("Failed to store analysis results")?;
    info!("Stored run {} (checksum {})", metadata.run_id, metadata.checksum);

    let mut written = ResultExporter::export(&run.output, output_dir, ExportFormat::Csv)?;
    written.extend(ResultExporter::export(&run.output, output_dir, ExportFormat::Json)?);
    for path in &written {
        info!("Wrote {}", path.display());
    }

    print_report(&run);
    println!("Checksum: {}", metadata.checksum);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(input) = args.get(1).map(PathBuf::from) else {
        eprintln!("Usage: peak-hours <input.csv> [output_dir]");
        std::process::exit(2);
    };
    let output_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    info!("Analyzing {}", input.display());
    match analyze(&input, &output_dir).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("✗ Analysis failed: {:#}", e);
            Err(e)
        }
    }
}

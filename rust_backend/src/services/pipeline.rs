//! End-to-end peak-hour analysis.
//!
//! `PeakHoursPipeline` wires the demand builder, the cluster engine, the agreement
//! analyzer and the result assembler together. A run never aborts because of one
//! venue: builder failures exclude the venue and clustering failures mark a single
//! method unavailable, both recorded in the [`RunReport`].

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::core::domain::{HourlyOrderCount, OrderRecord};
use crate::core::error::AnalysisResult;
use crate::parsing::{parse_demand_csv, ParsedDemand};
use crate::preprocessing::{DemandMatrix, DemandMatrixBuilder};
use crate::services::assembler::{AnalysisOutput, ResultAssembler, RunReport};
use crate::services::cluster_engine::ClusterEngine;

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub output: AnalysisOutput,
    pub report: RunReport,
    /// Run seed every task seed was derived from
    pub seed: u64,
}

/// Configured analysis pipeline.
///
/// # Example
///
/// ```
/// use shiftsync_peaks::config::AnalysisConfig;
/// use shiftsync_peaks::core::domain::{HourlyOrderCount, VenueId};
/// use shiftsync_peaks::services::PeakHoursPipeline;
///
/// let rows: Vec<HourlyOrderCount> = (0..24)
///     .map(|hour| HourlyOrderCount {
///         venue: VenueId::from("V1"),
///         hour,
///         order_count: match hour {
///             12 => 100.0,
///             18 => 95.0,
///             3 => 5.0,
///             _ => 10.0 + (hour % 4) as f64,
///         },
///     })
///     .collect();
///
/// let pipeline = PeakHoursPipeline::new(AnalysisConfig::default()).unwrap();
/// let run = pipeline.run_hourly(&rows);
/// assert_eq!(run.output.peak_hours_analysis.len(), 24);
/// ```
pub struct PeakHoursPipeline {
    config: AnalysisConfig,
    builder: DemandMatrixBuilder,
    engine: ClusterEngine,
    assembler: ResultAssembler,
}

impl PeakHoursPipeline {
    /// Create a pipeline from a validated configuration.
    ///
    /// # Errors
    /// `AnalysisError::InvalidConfig` if the configuration is out of range.
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            builder: DemandMatrixBuilder::new(config.demand.clone()),
            engine: ClusterEngine::new(&config.clustering),
            assembler: ResultAssembler::new(),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Seed of the next run: the configured seed, or a fresh one from entropy.
    pub fn resolve_seed(&self) -> u64 {
        self.config
            .clustering
            .random_seed
            .unwrap_or_else(rand::random)
    }

    /// Analyze per-order rows.
    pub fn run_orders(&self, orders: &[OrderRecord]) -> AnalysisRun {
        log::info!("Building demand matrix from {} order rows", orders.len());
        self.run_matrix(&self.builder.from_orders(orders))
    }

    /// Analyze pre-aggregated hourly counts.
    pub fn run_hourly(&self, rows: &[HourlyOrderCount]) -> AnalysisRun {
        log::info!("Building demand matrix from {} hourly rows", rows.len());
        self.run_matrix(&self.builder.from_hourly_counts(rows))
    }

    /// Analyze a parsed demand file; venues with rejected rows are excluded.
    pub fn run_input(&self, parsed: &ParsedDemand) -> AnalysisRun {
        log::info!(
            "Building demand matrix from {} rows ({} rejected)",
            parsed.len(),
            parsed.invalid_rows.len()
        );
        self.run_matrix(&self.builder.from_parsed(parsed))
    }

    /// Parse a demand CSV file and analyze it.
    pub fn run_csv(&self, path: &Path) -> Result<AnalysisRun> {
        let input = parse_demand_csv(path)
            .with_context(|| format!("Failed to load demand data from {}", path.display()))?;
        Ok(self.run_input(&input))
    }

    /// Cluster an already built demand matrix.
    pub fn run_matrix(&self, matrix: &DemandMatrix) -> AnalysisRun {
        let seed = self.resolve_seed();
        log::info!(
            "Clustering {} venues ({} excluded) with seed {}",
            matrix.profiles.len(),
            matrix.rejected.len(),
            seed
        );

        let engine_output = self.engine.run(&matrix.profiles, seed);
        let (output, report) = self.assembler.assemble(matrix, &engine_output);

        log::info!(
            "Analysis finished: {} complete, {} partial, {} excluded, {} summary rows",
            report.complete_count(),
            report.partial_count(),
            report.excluded_count(),
            output.peak_hours_summary.len()
        );

        AnalysisRun {
            output,
            report,
            seed,
        }
    }
}

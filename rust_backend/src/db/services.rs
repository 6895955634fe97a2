//! High-level storage service layer.
//!
//! Repository-agnostic operations that work with any `PeakHoursRepository`
//! implementation. They hold the logic that must be the same regardless of the
//! storage backend: health checks before writes and checksum verification after.
//!
//! # Usage
//!
//! ```no_run
//! use shiftsync_peaks::config::AnalysisConfig;
//! use shiftsync_peaks::db::{services, repositories::LocalRepository};
//! use shiftsync_peaks::services::PeakHoursPipeline;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = LocalRepository::new();
//!     let pipeline = PeakHoursPipeline::new(AnalysisConfig::default())?;
//!     let run = pipeline.run_csv(Path::new("orders.csv"))?;
//!
//!     let metadata = services::publish_run(&repo, &run).await?;
//!     println!("Stored run {} ({})", metadata.run_id, metadata.checksum);
//!     Ok(())
//! }
//! ```

use log::{info, warn};

use super::repository::{
    AnalysisRunMetadata, PeakHoursRepository, RepositoryError, RepositoryResult,
};
use crate::core::domain::{PeakHoursSummaryRecord, VenueId};
use crate::services::AnalysisRun;

/// Check if the storage backend is healthy.
pub async fn health_check<R: PeakHoursRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Publish the relations of a run, replacing whatever was stored before.
///
/// The run is refused when the backend reports itself unhealthy. After the write
/// the stored checksum is compared with the run's own fingerprint.
///
/// # Arguments
/// * `repo` - Repository implementation
/// * `run` - The analysis run to store
///
/// # Returns
/// * `Ok(AnalysisRunMetadata)` - metadata of the stored run
/// * `Err` if the backend is unavailable, the output is malformed or the write fails
pub async fn publish_run<R: PeakHoursRepository + ?Sized>(
    repo: &R,
    run: &AnalysisRun,
) -> RepositoryResult<AnalysisRunMetadata> {
    if !repo.health_check().await? {
        return Err(RepositoryError::ConnectionError(
            "Repository reported unhealthy".to_string(),
        ));
    }

    info!(
        "Service layer: publishing run (seed {}, {} venues, {} summary rows)",
        run.seed,
        run.output.venues().len(),
        run.output.peak_hours_summary.len()
    );

    let metadata = repo.replace_analysis(&run.output, run.seed).await?;
    let expected = run.output.checksum()?;
    if metadata.checksum != expected {
        warn!(
            "Service layer: stored checksum {} differs from run checksum {}",
            metadata.checksum, expected
        );
        return Err(RepositoryError::ValidationError(format!(
            "checksum mismatch for run {}",
            metadata.run_id
        )));
    }

    info!(
        "Service layer: stored run {} with checksum {}",
        metadata.run_id, metadata.checksum
    );
    Ok(metadata)
}

/// Reliable peak hours of one venue, as stored.
pub async fn venue_peak_hours<R: PeakHoursRepository + ?Sized>(
    repo: &R,
    venue: &VenueId,
) -> RepositoryResult<Vec<PeakHoursSummaryRecord>> {
    let rows = repo.fetch_peak_hours_summary(Some(venue)).await?;
    if rows.is_empty() {
        let analysed = repo.fetch_peak_hours_analysis(Some(venue)).await?;
        if analysed.is_empty() {
            return Err(RepositoryError::NotFound(format!(
                "venue {} has no stored analysis",
                venue
            )));
        }
    }
    Ok(rows)
}

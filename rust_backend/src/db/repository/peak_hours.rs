//! Repository trait for the published analysis relations.
//!
//! The three relations are always replaced together; readers never see a mix of
//! two runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{RepositoryError, RepositoryResult};
use crate::core::domain::{
    OverlapRecord, PeakHoursAnalysisRecord, PeakHoursSummaryRecord, VenueId, HOURS_PER_DAY,
};
use crate::services::AnalysisOutput;

/// Metadata of a stored analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRunMetadata {
    pub run_id: i64,
    pub seed: u64,
    /// SHA-256 fingerprint of the stored relations
    pub checksum: String,
    pub venue_count: usize,
    pub summary_rows: usize,
    pub stored_at: DateTime<Utc>,
}

impl AnalysisRunMetadata {
    pub fn stored_at_iso(&self) -> String {
        self.stored_at.to_rfc3339()
    }
}

/// Repository trait for peak-hour analysis results.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait PeakHoursRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the storage backend is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if the backend is reachable
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Writes ====================

    /// Replace all three relations with the output of one run.
    ///
    /// # Arguments
    /// * `output` - relations to store
    /// * `seed` - run seed, recorded with the metadata
    ///
    /// # Returns
    /// * `Ok(AnalysisRunMetadata)` - metadata of the stored run including its checksum
    /// * `Err(RepositoryError)` - if the output is malformed or the write fails
    async fn replace_analysis(
        &self,
        output: &AnalysisOutput,
        seed: u64,
    ) -> RepositoryResult<AnalysisRunMetadata>;

    // ==================== Reads ====================

    /// Rows of `peak_hours_analysis`, optionally for one venue, ordered by (venue, hour).
    async fn fetch_peak_hours_analysis(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<PeakHoursAnalysisRecord>>;

    /// Rows of `overlap_analysis`, optionally for one venue, ordered by (venue, hour).
    async fn fetch_overlap_analysis(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<OverlapRecord>>;

    /// Rows of `peak_hours_summary`, optionally for one venue, ordered by (venue, hour).
    async fn fetch_peak_hours_summary(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<PeakHoursSummaryRecord>>;

    /// Metadata of the most recent run, `None` before the first write.
    async fn latest_run(&self) -> RepositoryResult<Option<AnalysisRunMetadata>>;
}

/// Check the shape of an output before it replaces the stored relations.
///
/// Every venue needs exactly one `peak_hours_analysis` and one `overlap_analysis`
/// row per hour, and summary rows may only refer to venues in the analysis.
pub fn validate_output(output: &AnalysisOutput) -> RepositoryResult<()> {
    if output.overlap_analysis.len() != output.peak_hours_analysis.len() {
        return Err(RepositoryError::ValidationError(format!(
            "{} overlap rows for {} analysis rows",
            output.overlap_analysis.len(),
            output.peak_hours_analysis.len()
        )));
    }

    for chunk in output.peak_hours_analysis.chunks(HOURS_PER_DAY) {
        let venue = &chunk[0].venue;
        let complete = chunk.len() == HOURS_PER_DAY
            && chunk
                .iter()
                .enumerate()
                .all(|(h, r)| &r.venue == venue && r.hour as usize == h);
        if !complete {
            return Err(RepositoryError::ValidationError(format!(
                "venue {} does not have exactly one row per hour",
                venue
            )));
        }
    }

    let venues = output.venues();
    if venues.windows(2).any(|w| w[0] >= w[1]) {
        return Err(RepositoryError::ValidationError(
            "analysis rows are not ordered by venue".to_string(),
        ));
    }
    if let Some(orphan) = output
        .peak_hours_summary
        .iter()
        .find(|r| venues.binary_search(&r.venue).is_err())
    {
        return Err(RepositoryError::ValidationError(format!(
            "summary row for unknown venue {}",
            orphan.venue
        )));
    }
    Ok(())
}

//! In-memory local repository implementation.
//!
//! This module provides a local implementation of the repository trait suitable
//! for unit testing, local development and the command-line tool. All data is
//! stored in memory, providing fast, deterministic, and isolated execution.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::domain::{
    OverlapRecord, PeakHoursAnalysisRecord, PeakHoursSummaryRecord, VenueId,
};
use crate::db::repository::*;
use crate::services::AnalysisOutput;

/// In-memory local repository.
///
/// Cloning the repository shares the underlying storage.
///
/// # Example
/// ```
/// use shiftsync_peaks::db::repositories::LocalRepository;
/// use shiftsync_peaks::db::repository::PeakHoursRepository;
///
/// let repo = LocalRepository::new();
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let latest = runtime.block_on(repo.latest_run()).unwrap();
/// assert!(latest.is_none());
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    analysis: Vec<PeakHoursAnalysisRecord>,
    overlaps: Vec<OverlapRecord>,
    summary: Vec<PeakHoursSummaryRecord>,
    runs: Vec<AnalysisRunMetadata>,

    // ID counter
    next_run_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            analysis: Vec::new(),
            overlaps: Vec::new(),
            summary: Vec::new(),
            runs: Vec::new(),
            next_run_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Simulate a connection failure (or recovery) for testing.
    pub fn set_healthy(&self, healthy: bool) -> RepositoryResult<()> {
        self.write()?.is_healthy = healthy;
        Ok(())
    }

    /// Number of stored runs, including the ones whose rows were overwritten.
    pub fn run_count(&self) -> RepositoryResult<usize> {
        Ok(self.read()?.runs.len())
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        self.data
            .read()
            .map_err(|_| RepositoryError::InternalError("Repository lock poisoned".to_string()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        self.data
            .write()
            .map_err(|_| RepositoryError::InternalError("Repository lock poisoned".to_string()))
    }

    fn healthy_read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        let data = self.read()?;
        if !data.is_healthy {
            return Err(RepositoryError::ConnectionError(
                "Repository is not healthy".to_string(),
            ));
        }
        Ok(data)
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_venue<T: Clone>(
    rows: &[T],
    venue: Option<&VenueId>,
    key: impl Fn(&T) -> &VenueId,
) -> Vec<T> {
    rows.iter()
        .filter(|row| venue.map_or(true, |v| key(row) == v))
        .cloned()
        .collect()
}

#[async_trait]
impl PeakHoursRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.read()?.is_healthy)
    }

    async fn replace_analysis(
        &self,
        output: &AnalysisOutput,
        seed: u64,
    ) -> RepositoryResult<AnalysisRunMetadata> {
        validate_output(output)?;
        let checksum = output.checksum()?;

        let mut data = self.write()?;
        if !data.is_healthy {
            return Err(RepositoryError::ConnectionError(
                "Repository is not healthy".to_string(),
            ));
        }

        let metadata = AnalysisRunMetadata {
            run_id: data.next_run_id,
            seed,
            checksum,
            venue_count: output.venues().len(),
            summary_rows: output.peak_hours_summary.len(),
            stored_at: Utc::now(),
        };
        data.next_run_id += 1;

        data.analysis = output.peak_hours_analysis.clone();
        data.overlaps = output.overlap_analysis.clone();
        data.summary = output.peak_hours_summary.clone();
        data.runs.push(metadata.clone());

        Ok(metadata)
    }

    async fn fetch_peak_hours_analysis(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<PeakHoursAnalysisRecord>> {
        let data = self.healthy_read()?;
        Ok(filter_venue(&data.analysis, venue, |r| &r.venue))
    }

    async fn fetch_overlap_analysis(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<OverlapRecord>> {
        let data = self.healthy_read()?;
        Ok(filter_venue(&data.overlaps, venue, |r| &r.venue))
    }

    async fn fetch_peak_hours_summary(
        &self,
        venue: Option<&VenueId>,
    ) -> RepositoryResult<Vec<PeakHoursSummaryRecord>> {
        let data = self.healthy_read()?;
        Ok(filter_venue(&data.summary, venue, |r| &r.venue))
    }

    async fn latest_run(&self) -> RepositoryResult<Option<AnalysisRunMetadata>> {
        let data = self.healthy_read()?;
        Ok(data.runs.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{AgreementLevel, OverlapCategory, HOURS_PER_DAY};

    fn output_for(venues: &[&str]) -> AnalysisOutput {
        let mut output = AnalysisOutput::default();
        for venue in venues {
            for hour in 0..HOURS_PER_DAY as u8 {
                let peak = hour == 12;
                output.peak_hours_analysis.push(PeakHoursAnalysisRecord {
                    venue: VenueId::from(*venue),
                    hour,
                    kmeans_is_peak: Some(peak),
                    gmm_is_peak: Some(peak),
                    agglo_is_peak: None,
                    normalized_order_count: if peak { 1.0 } else { 0.1 },
                });
                output.overlap_analysis.push(OverlapRecord {
                    venue: VenueId::from(*venue),
                    hour,
                    methods_agreeing: if peak { 2 } else { 0 },
                    overlap_category: if peak {
                        OverlapCategory::Medium
                    } else {
                        OverlapCategory::None
                    },
                    normalized_order_count: if peak { 1.0 } else { 0.1 },
                });
                if peak {
                    output.peak_hours_summary.push(PeakHoursSummaryRecord {
                        venue: VenueId::from(*venue),
                        hour,
                        agreement_level: AgreementLevel::Medium,
                    });
                }
            }
        }
        output
    }

    #[tokio::test]
    async fn test_replace_and_fetch() {
        let repo = LocalRepository::new();
        let metadata = repo.replace_analysis(&output_for(&["A", "B"]), 42).await.unwrap();
        assert_eq!(metadata.run_id, 1);
        assert_eq!(metadata.venue_count, 2);
        assert_eq!(metadata.summary_rows, 2);

        let all = repo.fetch_peak_hours_analysis(None).await.unwrap();
        assert_eq!(all.len(), 48);

        let b = VenueId::from("B");
        let summary = repo.fetch_peak_hours_summary(Some(&b)).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].venue, b);
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_run() {
        let repo = LocalRepository::new();
        repo.replace_analysis(&output_for(&["A", "B"]), 1).await.unwrap();
        let second = repo.replace_analysis(&output_for(&["C"]), 2).await.unwrap();

        assert_eq!(second.run_id, 2);
        assert_eq!(repo.run_count().unwrap(), 2);
        let overlaps = repo.fetch_overlap_analysis(None).await.unwrap();
        assert!(overlaps.iter().all(|r| r.venue.as_str() == "C"));
        assert_eq!(repo.latest_run().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_malformed_output_rejected() {
        let repo = LocalRepository::new();
        let mut output = output_for(&["A"]);
        output.peak_hours_analysis.pop();
        output.overlap_analysis.pop();

        let err = repo.replace_analysis(&output, 1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
        assert!(repo.latest_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unhealthy_repository() {
        let repo = LocalRepository::new();
        repo.set_healthy(false).unwrap();
        assert!(!repo.health_check().await.unwrap());
        assert!(matches!(
            repo.fetch_peak_hours_summary(None).await,
            Err(RepositoryError::ConnectionError(_))
        ));
    }
}

//! Shaping of engine and agreement results into the three output relations.
//!
//! Also produces the per-venue run report so callers can see which venues were
//! excluded and which methods were unavailable without scanning logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::domain::{
    all_hours, MethodId, OverlapRecord, PeakHoursAnalysisRecord, PeakHoursSummaryRecord, VenueId,
    VenueProfile,
};
use crate::core::error::AnalysisError;
use crate::db::checksum::calculate_checksum;
use crate::preprocessing::DemandMatrix;
use crate::services::agreement::{AgreementAnalyzer, HourVotes};
use crate::services::cluster_engine::EngineOutput;

/// The three relations of one analysis run, each ordered by (venue, hour).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub peak_hours_analysis: Vec<PeakHoursAnalysisRecord>,
    pub overlap_analysis: Vec<OverlapRecord>,
    pub peak_hours_summary: Vec<PeakHoursSummaryRecord>,
}

impl AnalysisOutput {
    /// Venues present in the output, ascending.
    pub fn venues(&self) -> Vec<VenueId> {
        let mut venues: Vec<VenueId> = self
            .peak_hours_analysis
            .iter()
            .map(|r| r.venue.clone())
            .collect();
        venues.dedup();
        venues
    }

    /// Summary rows of one venue.
    pub fn summary_for(&self, venue: &VenueId) -> Vec<&PeakHoursSummaryRecord> {
        self.peak_hours_summary
            .iter()
            .filter(|r| &r.venue == venue)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.peak_hours_analysis.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// SHA-256 fingerprint of the serialized relations.
    ///
    /// Two runs with the same input, configuration and seed have the same checksum.
    pub fn checksum(&self) -> serde_json::Result<String> {
        Ok(calculate_checksum(&self.to_json()?))
    }
}

/// A method that produced no labels for a venue.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodFailure {
    pub method: MethodId,
    pub error: AnalysisError,
}

/// What happened to one input venue.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueOutcome {
    /// All methods produced labels.
    Complete,
    /// The venue is in the output but some methods are unavailable.
    Partial { unavailable: Vec<MethodFailure> },
    /// The venue failed demand building and is absent from every relation.
    Excluded { error: AnalysisError },
}

impl VenueOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VenueOutcome::Complete => "complete",
            VenueOutcome::Partial { .. } => "partial",
            VenueOutcome::Excluded { .. } => "excluded",
        }
    }
}

/// Per-venue outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub venues: BTreeMap<VenueId, VenueOutcome>,
}

impl RunReport {
    pub fn complete_count(&self) -> usize {
        self.count(|o| matches!(o, VenueOutcome::Complete))
    }

    pub fn partial_count(&self) -> usize {
        self.count(|o| matches!(o, VenueOutcome::Partial { .. }))
    }

    pub fn excluded_count(&self) -> usize {
        self.count(|o| matches!(o, VenueOutcome::Excluded { .. }))
    }

    /// `true` when every venue was analyzed by every method.
    pub fn is_clean(&self) -> bool {
        self.venues.len() == self.complete_count()
    }

    pub fn outcome(&self, venue: &VenueId) -> Option<&VenueOutcome> {
        self.venues.get(venue)
    }

    fn count(&self, predicate: impl Fn(&VenueOutcome) -> bool) -> usize {
        self.venues.values().filter(|o| predicate(o)).count()
    }
}

/// Joins label sets, overlap records and summary records into the output relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler {
    analyzer: AgreementAnalyzer,
}

impl ResultAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `peak_hours_analysis` rows of one venue, one per hour.
    pub fn analysis_rows(
        &self,
        profile: &VenueProfile,
        engine: &EngineOutput,
    ) -> Vec<PeakHoursAnalysisRecord> {
        all_hours()
            .map(|hour| {
                let votes = HourVotes::collect(engine, &profile.venue, hour);
                PeakHoursAnalysisRecord {
                    venue: profile.venue.clone(),
                    hour,
                    kmeans_is_peak: votes.kmeans,
                    gmm_is_peak: votes.gmm,
                    agglo_is_peak: votes.agglo,
                    normalized_order_count: profile.demand_at(hour),
                }
            })
            .collect()
    }

    /// Build the output relations and the run report.
    ///
    /// # Arguments
    /// * `matrix` - demand profiles and the venues rejected while building them
    /// * `engine` - label sets and failures of every (venue, method) task
    ///
    /// # Returns
    /// The three relations, ordered by (venue, hour), and one outcome per input venue.
    pub fn assemble(
        &self,
        matrix: &DemandMatrix,
        engine: &EngineOutput,
    ) -> (AnalysisOutput, RunReport) {
        let peak_hours_analysis = matrix
            .profiles
            .values()
            .flat_map(|profile| self.analysis_rows(profile, engine))
            .collect();
        let overlap_analysis = self.analyzer.analyze(&matrix.profiles, engine);
        let peak_hours_summary = self.analyzer.summarize(&overlap_analysis);

        let mut report = RunReport::default();
        for venue in matrix.profiles.keys() {
            let unavailable: Vec<MethodFailure> = engine
                .failures_for(venue)
                .into_iter()
                .map(|(method, error)| MethodFailure {
                    method,
                    error: error.clone(),
                })
                .collect();
            let outcome = if unavailable.is_empty() {
                VenueOutcome::Complete
            } else {
                VenueOutcome::Partial { unavailable }
            };
            report.venues.insert(venue.clone(), outcome);
        }
        for (venue, error) in &matrix.rejected {
            report.venues.insert(
                venue.clone(),
                VenueOutcome::Excluded {
                    error: error.clone(),
                },
            );
        }

        let output = AnalysisOutput {
            peak_hours_analysis,
            overlap_analysis,
            peak_hours_summary,
        };
        (output, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ClusterLabelSet, HOURS_PER_DAY};
    use crate::core::error::ClusteringError;

    fn profile(venue: &str) -> VenueProfile {
        let normalized: [f64; HOURS_PER_DAY] = std::array::from_fn(|h| h as f64 / 23.0);
        VenueProfile {
            venue: VenueId::from(venue),
            raw: normalized,
            normalized,
        }
    }

    fn label_set(venue: &str, method: MethodId) -> ClusterLabelSet {
        let mut peaks = [false; HOURS_PER_DAY];
        peaks[22] = true;
        peaks[23] = true;
        ClusterLabelSet {
            venue: VenueId::from(venue),
            method,
            peaks,
            cluster_count: 3,
            iterations: 4,
        }
    }

    fn fixture() -> (DemandMatrix, EngineOutput) {
        let mut matrix = DemandMatrix::default();
        for venue in ["B", "A"] {
            matrix.profiles.insert(VenueId::from(venue), profile(venue));
        }
        matrix.rejected.insert(
            VenueId::from("C"),
            AnalysisError::IncompleteData {
                venue: VenueId::from("C"),
                hours_present: 20,
            },
        );

        let mut engine = EngineOutput::default();
        for venue in ["A", "B"] {
            for method in MethodId::ALL {
                if venue == "B" && method == MethodId::Gmm {
                    continue;
                }
                engine
                    .label_sets
                    .insert((VenueId::from(venue), method), label_set(venue, method));
            }
        }
        engine.failures.insert(
            (VenueId::from("B"), MethodId::Gmm),
            AnalysisError::Convergence {
                venue: VenueId::from("B"),
                method: MethodId::Gmm,
                source: ClusteringError::NotConverged { iterations: 300 },
            },
        );
        (matrix, engine)
    }

    #[test]
    fn test_relations_sorted_and_complete() {
        let (matrix, engine) = fixture();
        let (output, _) = ResultAssembler::new().assemble(&matrix, &engine);

        assert_eq!(output.peak_hours_analysis.len(), 2 * HOURS_PER_DAY);
        assert_eq!(output.overlap_analysis.len(), 2 * HOURS_PER_DAY);
        assert_eq!(output.venues(), vec![VenueId::from("A"), VenueId::from("B")]);

        let keys: Vec<(VenueId, u8)> = output
            .peak_hours_analysis
            .iter()
            .map(|r| (r.venue.clone(), r.hour))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_unavailable_method_is_null() {
        let (matrix, engine) = fixture();
        let (output, _) = ResultAssembler::new().assemble(&matrix, &engine);

        let b_late = output
            .peak_hours_analysis
            .iter()
            .find(|r| r.venue.as_str() == "B" && r.hour == 23)
            .unwrap();
        assert_eq!(b_late.kmeans_is_peak, Some(true));
        assert_eq!(b_late.gmm_is_peak, None);
        assert_eq!(b_late.agglo_is_peak, Some(true));

        let b_summary = output.summary_for(&VenueId::from("B"));
        assert_eq!(b_summary.len(), 2);
        assert!(b_summary
            .iter()
            .all(|r| r.agreement_level == crate::core::domain::AgreementLevel::Medium));
    }

    #[test]
    fn test_report_outcomes() {
        let (matrix, engine) = fixture();
        let (output, report) = ResultAssembler::new().assemble(&matrix, &engine);

        assert_eq!(report.complete_count(), 1);
        assert_eq!(report.partial_count(), 1);
        assert_eq!(report.excluded_count(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.outcome(&VenueId::from("C")).unwrap().label(), "excluded");
        assert!(output.summary_for(&VenueId::from("C")).is_empty());
    }

    #[test]
    fn test_checksum_stable() {
        let (matrix, engine) = fixture();
        let assembler = ResultAssembler::new();
        let (first, _) = assembler.assemble(&matrix, &engine);
        let (second, _) = assembler.assemble(&matrix, &engine);
        assert_eq!(first.checksum().unwrap(), second.checksum().unwrap());
        assert_eq!(first.checksum().unwrap().len(), 64);
        assert_ne!(
            first.checksum().unwrap(),
            AnalysisOutput::default().checksum().unwrap()
        );
    }
}

//! Cross-method agreement per venue-hour.

use std::collections::BTreeMap;

use crate::core::domain::{
    all_hours, Hour, MethodId, OverlapCategory, OverlapRecord, PeakHoursSummaryRecord, VenueId,
    VenueProfile,
};
use crate::services::cluster_engine::EngineOutput;

/// Peak votes of the three methods for one venue-hour.
///
/// `None` marks a method that produced no labels for the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HourVotes {
    pub kmeans: Option<bool>,
    pub gmm: Option<bool>,
    pub agglo: Option<bool>,
}

impl HourVotes {
    /// Collect the votes of every method for `venue` at `hour`.
    pub fn collect(engine: &EngineOutput, venue: &VenueId, hour: Hour) -> Self {
        let vote = |method| engine.label_set(venue, method).map(|ls| ls.is_peak(hour));
        Self {
            kmeans: vote(MethodId::Kmeans),
            gmm: vote(MethodId::Gmm),
            agglo: vote(MethodId::Agglo),
        }
    }

    pub fn get(&self, method: MethodId) -> Option<bool> {
        match method {
            MethodId::Kmeans => self.kmeans,
            MethodId::Gmm => self.gmm,
            MethodId::Agglo => self.agglo,
        }
    }

    /// Number of methods voting peak. A missing method counts as no vote.
    pub fn methods_agreeing(&self) -> u8 {
        MethodId::ALL
            .iter()
            .filter(|&&m| self.get(m) == Some(true))
            .count() as u8
    }
}

/// Derives overlap and summary records from the per-method label sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementAnalyzer;

impl AgreementAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Category of three peak votes.
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftsync_peaks::core::domain::OverlapCategory;
    /// use shiftsync_peaks::services::AgreementAnalyzer;
    ///
    /// assert_eq!(AgreementAnalyzer::overlap_category(true, true, false), OverlapCategory::Medium);
    /// ```
    pub fn overlap_category(kmeans: bool, gmm: bool, agglo: bool) -> OverlapCategory {
        let votes = [kmeans, gmm, agglo].iter().filter(|&&v| v).count() as u8;
        OverlapCategory::from_count(votes)
    }

    /// Overlap record of one venue-hour.
    pub fn overlap(&self, profile: &VenueProfile, hour: Hour, votes: HourVotes) -> OverlapRecord {
        let methods_agreeing = votes.methods_agreeing();
        OverlapRecord {
            venue: profile.venue.clone(),
            hour,
            methods_agreeing,
            overlap_category: OverlapCategory::from_count(methods_agreeing),
            normalized_order_count: profile.demand_at(hour),
        }
    }

    /// Overlap records of every hour of every venue, ordered by (venue, hour).
    pub fn analyze(
        &self,
        profiles: &BTreeMap<VenueId, VenueProfile>,
        engine: &EngineOutput,
    ) -> Vec<OverlapRecord> {
        profiles
            .values()
            .flat_map(|profile| {
                all_hours().map(move |hour| {
                    self.overlap(profile, hour, HourVotes::collect(engine, &profile.venue, hour))
                })
            })
            .collect()
    }

    /// Summary entry for a reliable overlap record, `None` for Low and None agreement.
    pub fn summarize_record(&self, record: &OverlapRecord) -> Option<PeakHoursSummaryRecord> {
        record
            .overlap_category
            .is_reliable()
            .then(|| PeakHoursSummaryRecord {
                venue: record.venue.clone(),
                hour: record.hour,
                agreement_level: record.overlap_category.into(),
            })
    }

    /// Summary entries of every High or Medium record, in input order.
    pub fn summarize(&self, overlaps: &[OverlapRecord]) -> Vec<PeakHoursSummaryRecord> {
        overlaps
            .iter()
            .filter_map(|record| self.summarize_record(record))
            .collect()
    }
}

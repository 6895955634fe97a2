//! Domain models for venue demand profiles, clustering labels and agreement results.
//!
//! This module provides the data structures that flow between the pipeline stages:
//! hourly demand records produced by the demand matrix builder, per-method label sets
//! produced by the cluster engine, and the overlap/summary records derived from them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hourly observations in a daily demand profile.
pub const HOURS_PER_DAY: usize = 24;

/// Hour of day, `0..=23`.
pub type Hour = u8;

/// Iterates over every hour of the day in ascending order.
pub fn all_hours() -> impl Iterator<Item = Hour> {
    (0..HOURS_PER_DAY).map(|h| h as Hour)
}

/// Venue identifier (one business location or concept).
///
/// # Examples
///
/// ```
/// use shiftsync_peaks::core::domain::VenueId;
///
/// let venue = VenueId::new("downtown");
/// assert_eq!(venue.as_str(), "downtown");
/// assert_eq!(venue.to_string(), "downtown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub String);

impl VenueId {
    pub fn new(value: impl Into<String>) -> Self {
        VenueId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VenueId {
    fn from(value: &str) -> Self {
        VenueId(value.to_string())
    }
}

impl From<String> for VenueId {
    fn from(value: String) -> Self {
        VenueId(value)
    }
}

/// Identifies one of the three clustering methods.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodId {
    Kmeans,
    Gmm,
    Agglo,
}

impl MethodId {
    /// All methods in output column order.
    pub const ALL: [MethodId; 3] = [MethodId::Kmeans, MethodId::Gmm, MethodId::Agglo];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodId::Kmeans => "kmeans",
            MethodId::Gmm => "gmm",
            MethodId::Agglo => "agglo",
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleansed order row at the input boundary.
///
/// `order_count` is the number of orders the row stands for; per-order exports
/// carry one row per order with a count of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub venue: VenueId,
    pub timestamp: NaiveDateTime,
    pub order_count: f64,
}

/// Pre-aggregated order count of one venue at one hour of day.
///
/// The hour is kept as read so out-of-range values can be reported against the
/// venue instead of failing the whole input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyOrderCount {
    pub venue: VenueId,
    pub hour: u32,
    pub order_count: f64,
}

/// Normalized demand of one venue at one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyDemandRecord {
    pub venue: VenueId,
    pub hour: Hour,
    pub normalized_order_count: f64,
}

/// Complete 24-hour demand profile of a single venue.
///
/// Holds both the averaged raw demand and its per-venue normalization. A profile
/// only exists for venues that passed completeness and variance checks, so both
/// arrays always have a value for every hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueProfile {
    pub venue: VenueId,
    pub raw: [f64; HOURS_PER_DAY],
    pub normalized: [f64; HOURS_PER_DAY],
}

impl VenueProfile {
    /// Normalized demand at the given hour.
    pub fn demand_at(&self, hour: Hour) -> f64 {
        self.normalized[hour as usize]
    }

    /// Expands the profile into one record per hour.
    pub fn records(&self) -> Vec<HourlyDemandRecord> {
        all_hours()
            .map(|hour| HourlyDemandRecord {
                venue: self.venue.clone(),
                hour,
                normalized_order_count: self.demand_at(hour),
            })
            .collect()
    }
}

/// Peak/non-peak labels produced by one method for one venue.
///
/// # Fields
///
/// * `peaks` - `true` for every hour assigned to the peak cluster
/// * `cluster_count` - number of clusters the method actually used
/// * `iterations` - iterations (or merges) the method needed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterLabelSet {
    pub venue: VenueId,
    pub method: MethodId,
    pub peaks: [bool; HOURS_PER_DAY],
    pub cluster_count: usize,
    pub iterations: usize,
}

impl ClusterLabelSet {
    pub fn is_peak(&self, hour: Hour) -> bool {
        self.peaks[hour as usize]
    }

    /// Hours labeled peak, ascending.
    pub fn peak_hours(&self) -> Vec<Hour> {
        all_hours().filter(|&h| self.is_peak(h)).collect()
    }
}

/// How many of the three methods agree that an hour is a peak.
///
/// # Examples
///
/// ```
/// use shiftsync_peaks::core::domain::OverlapCategory;
///
/// assert_eq!(OverlapCategory::from_count(3), OverlapCategory::High);
/// assert_eq!(OverlapCategory::from_count(0), OverlapCategory::None);
/// assert!(OverlapCategory::Medium.is_reliable());
/// assert!(!OverlapCategory::Low.is_reliable());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OverlapCategory {
    High,
    Medium,
    Low,
    None,
}

impl OverlapCategory {
    /// Maps a vote count to its category. Counts above three saturate to `High`.
    pub fn from_count(methods_agreeing: u8) -> Self {
        match methods_agreeing {
            0 => OverlapCategory::None,
            1 => OverlapCategory::Low,
            2 => OverlapCategory::Medium,
            _ => OverlapCategory::High,
        }
    }

    /// A venue-hour is reliable when at least two methods concur.
    pub fn is_reliable(&self) -> bool {
        matches!(self, OverlapCategory::High | OverlapCategory::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapCategory::High => "High",
            OverlapCategory::Medium => "Medium",
            OverlapCategory::Low => "Low",
            OverlapCategory::None => "None",
        }
    }
}

impl fmt::Display for OverlapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agreement level published in the summary relation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementLevel {
    High,
    Medium,
    Low,
    None,
}

impl AgreementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementLevel::High => "high",
            AgreementLevel::Medium => "medium",
            AgreementLevel::Low => "low",
            AgreementLevel::None => "none",
        }
    }
}

impl From<OverlapCategory> for AgreementLevel {
    fn from(category: OverlapCategory) -> Self {
        match category {
            OverlapCategory::High => AgreementLevel::High,
            OverlapCategory::Medium => AgreementLevel::Medium,
            OverlapCategory::Low => AgreementLevel::Low,
            OverlapCategory::None => AgreementLevel::None,
        }
    }
}

impl fmt::Display for AgreementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the `overlap_analysis` relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapRecord {
    pub venue: VenueId,
    pub hour: Hour,
    pub methods_agreeing: u8,
    pub overlap_category: OverlapCategory,
    pub normalized_order_count: f64,
}

/// Row of the `peak_hours_summary` relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakHoursSummaryRecord {
    pub venue: VenueId,
    pub hour: Hour,
    pub agreement_level: AgreementLevel,
}

/// Row of the `peak_hours_analysis` relation.
///
/// A `None` peak flag marks a method that was unavailable for the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakHoursAnalysisRecord {
    pub venue: VenueId,
    pub hour: Hour,
    pub kmeans_is_peak: Option<bool>,
    pub gmm_is_peak: Option<bool>,
    pub agglo_is_peak: Option<bool>,
    pub normalized_order_count: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_category_from_count() {
        assert_eq!(OverlapCategory::from_count(0), OverlapCategory::None);
        assert_eq!(OverlapCategory::from_count(1), OverlapCategory::Low);
        assert_eq!(OverlapCategory::from_count(2), OverlapCategory::Medium);
        assert_eq!(OverlapCategory::from_count(3), OverlapCategory::High);
    }

    #[test]
    fn test_agreement_level_mirrors_category() {
        assert_eq!(AgreementLevel::from(OverlapCategory::High), AgreementLevel::High);
        assert_eq!(AgreementLevel::from(OverlapCategory::None), AgreementLevel::None);
        assert_eq!(AgreementLevel::Medium.to_string(), "medium");
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&MethodId::Agglo).unwrap();
        assert_eq!(json, "\"agglo\"");
        let venue = serde_json::to_string(&VenueId::new("v1")).unwrap();
        assert_eq!(venue, "\"v1\"");
    }

    #[test]
    fn test_profile_records_cover_all_hours() {
        let profile = VenueProfile {
            venue: VenueId::new("v1"),
            raw: [1.0; HOURS_PER_DAY],
            normalized: [0.5; HOURS_PER_DAY],
        };
        let records = profile.records();
        assert_eq!(records.len(), HOURS_PER_DAY);
        assert_eq!(records[23].hour, 23);
    }
}

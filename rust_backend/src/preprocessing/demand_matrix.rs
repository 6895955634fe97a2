//! Demand matrix construction from cleansed order data.
//!
//! The builder aggregates order rows into one averaged 24-hour profile per venue,
//! rejects venues that cannot be clustered, and normalizes each remaining profile
//! independently so venue size does not bias cross-venue comparison.

use chrono::{NaiveDate, Timelike};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::DemandSettings;
use crate::core::domain::{
    HourlyDemandRecord, HourlyOrderCount, OrderRecord, VenueId, VenueProfile, HOURS_PER_DAY,
};
use crate::core::error::{AnalysisError, AnalysisResult};
use crate::parsing::{DemandInput, ParsedDemand};
use crate::preprocessing::normalize::{check_variation, normalize_profile, DemandStats};

/// Normalized demand profiles of every usable venue, plus the venues rejected.
#[derive(Debug, Clone, Default)]
pub struct DemandMatrix {
    pub profiles: BTreeMap<VenueId, VenueProfile>,
    pub rejected: BTreeMap<VenueId, AnalysisError>,
}

impl DemandMatrix {
    /// All hourly demand records, ordered by venue then hour.
    pub fn records(&self) -> Vec<HourlyDemandRecord> {
        self.profiles.values().flat_map(|p| p.records()).collect()
    }

    /// Venues seen in the input, rejected ones included.
    pub fn venue_count(&self) -> usize {
        self.profiles.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Per-hour running sum used while averaging.
#[derive(Debug, Clone, Copy, Default)]
struct HourAccumulator {
    sum: f64,
    samples: usize,
}

impl HourAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.samples += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

/// Builds the per-venue normalized demand matrix.
///
/// # Examples
///
/// ```
/// use shiftsync_peaks::config::DemandSettings;
/// use shiftsync_peaks::core::domain::{HourlyOrderCount, VenueId};
/// use shiftsync_peaks::preprocessing::DemandMatrixBuilder;
///
/// let rows: Vec<HourlyOrderCount> = (0..24)
///     .map(|hour| HourlyOrderCount {
///         venue: VenueId::new("v1"),
///         hour,
///         order_count: if hour == 12 { 40.0 } else { 5.0 + (hour % 3) as f64 },
///     })
///     .collect();
///
/// let matrix = DemandMatrixBuilder::new(DemandSettings::default()).from_hourly_counts(&rows);
/// assert_eq!(matrix.profiles.len(), 1);
/// assert_eq!(matrix.profiles[&VenueId::new("v1")].normalized[12], 1.0);
/// ```
pub struct DemandMatrixBuilder {
    settings: DemandSettings,
}

impl DemandMatrixBuilder {
    pub fn new(settings: DemandSettings) -> Self {
        Self { settings }
    }

    /// Build the matrix from per-order rows.
    ///
    /// Orders are summed per (venue, business date, hour); an hour's demand is the
    /// mean of its daily sums over the days on which that hour saw orders.
    pub fn from_orders(&self, orders: &[OrderRecord]) -> DemandMatrix {
        self.build_orders(orders, BTreeMap::new())
    }

    /// Build the matrix from a parsed demand file.
    ///
    /// Venues with a row the parser rejected are excluded with `InvalidRecord`,
    /// whatever their other rows contain.
    pub fn from_parsed(&self, parsed: &ParsedDemand) -> DemandMatrix {
        let mut invalid: BTreeMap<VenueId, AnalysisError> = BTreeMap::new();
        for row in &parsed.invalid_rows {
            invalid.entry(row.venue.clone()).or_insert_with(|| row.to_error());
        }

        match &parsed.input {
            DemandInput::Orders(orders) => self.build_orders(orders, invalid),
            DemandInput::Hourly(rows) => self.build_hourly(rows, invalid),
        }
    }

    fn build_orders(
        &self,
        orders: &[OrderRecord],
        mut invalid: BTreeMap<VenueId, AnalysisError>,
    ) -> DemandMatrix {
        let mut daily: BTreeMap<&VenueId, BTreeMap<(NaiveDate, u32), f64>> = BTreeMap::new();

        for order in orders {
            if let Err(err) = validate_row(&order.venue, order.order_count) {
                invalid.entry(order.venue.clone()).or_insert(err);
                continue;
            }
            let key = (order.timestamp.date(), order.timestamp.hour());
            *daily.entry(&order.venue).or_default().entry(key).or_insert(0.0) += order.order_count;
        }

        let mut hourly: BTreeMap<VenueId, [HourAccumulator; HOURS_PER_DAY]> = BTreeMap::new();
        for (venue, sums) in daily {
            let acc = hourly
                .entry(venue.clone())
                .or_insert([HourAccumulator::default(); HOURS_PER_DAY]);
            for ((_, hour), total) in sums {
                acc[hour as usize].add(total);
            }
        }

        log::debug!(
            "Aggregated {} order rows into {} venues",
            orders.len(),
            hourly.len()
        );
        self.finish(hourly, invalid)
    }

    /// Build the matrix from pre-aggregated (venue, hour, count) rows.
    ///
    /// Repeated (venue, hour) rows are averaged.
    pub fn from_hourly_counts(&self, rows: &[HourlyOrderCount]) -> DemandMatrix {
        self.build_hourly(rows, BTreeMap::new())
    }

    fn build_hourly(
        &self,
        rows: &[HourlyOrderCount],
        mut invalid: BTreeMap<VenueId, AnalysisError>,
    ) -> DemandMatrix {
        let mut hourly: BTreeMap<VenueId, [HourAccumulator; HOURS_PER_DAY]> = BTreeMap::new();

        for row in rows {
            let checked = validate_row(&row.venue, row.order_count).and_then(|_| {
                if (row.hour as usize) < HOURS_PER_DAY {
                    Ok(())
                } else {
                    Err(AnalysisError::InvalidRecord {
                        venue: row.venue.clone(),
                        reason: format!("hour {} outside 0..=23", row.hour),
                    })
                }
            });
            if let Err(err) = checked {
                invalid.entry(row.venue.clone()).or_insert(err);
                continue;
            }

            hourly
                .entry(row.venue.clone())
                .or_insert([HourAccumulator::default(); HOURS_PER_DAY])[row.hour as usize]
                .add(row.order_count);
        }

        self.finish(hourly, invalid)
    }

    /// Turn one venue's averaged hourly demand into a normalized profile.
    ///
    /// # Errors
    /// * `AnalysisError::IncompleteData` if any hour has no demand value
    /// * `AnalysisError::DegenerateVenue` if demand does not vary enough to cluster
    pub fn build_profile(
        &self,
        venue: &VenueId,
        hourly: &[Option<f64>; HOURS_PER_DAY],
    ) -> AnalysisResult<VenueProfile> {
        let hours_present = hourly.iter().filter(|v| v.is_some()).count();
        if hours_present < HOURS_PER_DAY {
            return Err(AnalysisError::IncompleteData {
                venue: venue.clone(),
                hours_present,
            });
        }

        let mut raw = [0.0; HOURS_PER_DAY];
        for (out, value) in raw.iter_mut().zip(hourly) {
            *out = value.unwrap_or_default();
        }

        let stats = DemandStats::compute(&raw);
        check_variation(venue, &stats, self.settings.min_variation)?;

        Ok(VenueProfile {
            venue: venue.clone(),
            raw,
            normalized: normalize_profile(&raw, &stats, self.settings.normalization),
        })
    }

    fn finish(
        &self,
        hourly: BTreeMap<VenueId, [HourAccumulator; HOURS_PER_DAY]>,
        mut rejected: BTreeMap<VenueId, AnalysisError>,
    ) -> DemandMatrix {
        let invalid_venues: BTreeSet<VenueId> = rejected.keys().cloned().collect();
        let mut profiles = BTreeMap::new();

        for (venue, acc) in hourly {
            // A single bad row excludes the whole venue
            if invalid_venues.contains(&venue) {
                continue;
            }

            let means: [Option<f64>; HOURS_PER_DAY] = std::array::from_fn(|h| acc[h].mean());
            match self.build_profile(&venue, &means) {
                Ok(profile) => {
                    profiles.insert(venue, profile);
                }
                Err(err) => {
                    rejected.insert(venue, err);
                }
            }
        }

        for (venue, err) in &rejected {
            log::warn!("Excluding venue {}: {}", venue, err);
        }

        DemandMatrix { profiles, rejected }
    }
}

fn validate_row(venue: &VenueId, order_count: f64) -> AnalysisResult<()> {
    if venue.as_str().trim().is_empty() {
        return Err(AnalysisError::InvalidRecord {
            venue: venue.clone(),
            reason: "empty venue id".to_string(),
        });
    }
    if !order_count.is_finite() || order_count < 0.0 {
        return Err(AnalysisError::InvalidRecord {
            venue: venue.clone(),
            reason: format!("order count {} is not a non-negative number", order_count),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizationMethod;
    use crate::parsing::InvalidRow;
    use chrono::NaiveDateTime;

    fn builder() -> DemandMatrixBuilder {
        DemandMatrixBuilder::new(DemandSettings::default())
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 10, 0)
            .unwrap()
    }

    fn hourly(venue: &str, values: &[f64]) -> Vec<HourlyOrderCount> {
        values
            .iter()
            .enumerate()
            .map(|(hour, &order_count)| HourlyOrderCount {
                venue: VenueId::new(venue),
                hour: hour as u32,
                order_count,
            })
            .collect()
    }

    fn peaked() -> Vec<f64> {
        (0..HOURS_PER_DAY)
            .map(|h| match h {
                12 => 30.0,
                18 => 28.0,
                _ => 4.0 + (h % 4) as f64,
            })
            .collect()
    }

    #[test]
    fn test_orders_are_averaged_over_days() {
        let mut orders = Vec::new();
        for hour in 0..24 {
            // Day 1: 2 orders per hour, day 2: 4 orders per hour, plus a rush at noon
            orders.push(OrderRecord {
                venue: VenueId::new("v1"),
                timestamp: ts(1, hour),
                order_count: if hour == 12 { 20.0 } else { 2.0 },
            });
            orders.push(OrderRecord {
                venue: VenueId::new("v1"),
                timestamp: ts(2, hour),
                order_count: 4.0,
            });
        }
        // Second order at hour 5 on day 1 is summed into the same daily bucket
        orders.push(OrderRecord {
            venue: VenueId::new("v1"),
            timestamp: ts(1, 5),
            order_count: 2.0,
        });

        let matrix = builder().from_orders(&orders);
        let profile = &matrix.profiles[&VenueId::new("v1")];
        assert_eq!(profile.raw[0], 3.0);
        assert_eq!(profile.raw[5], 4.0);
        assert_eq!(profile.raw[12], 12.0);
        assert_eq!(profile.normalized[12], 1.0);
        assert_eq!(profile.normalized[0], 0.0);
    }

    #[test]
    fn test_missing_hour_is_incomplete() {
        let mut rows = hourly("v1", &peaked());
        rows.retain(|r| r.hour != 3);
        let matrix = builder().from_hourly_counts(&rows);
        assert!(matrix.profiles.is_empty());
        assert!(matches!(
            matrix.rejected[&VenueId::new("v1")],
            AnalysisError::IncompleteData {
                hours_present: 23,
                ..
            }
        ));
    }

    #[test]
    fn test_flat_venue_is_degenerate() {
        let rows = hourly("flat", &[7.0; HOURS_PER_DAY]);
        let matrix = builder().from_hourly_counts(&rows);
        assert!(matches!(
            matrix.rejected[&VenueId::new("flat")],
            AnalysisError::DegenerateVenue { .. }
        ));
    }

    #[test]
    fn test_failure_is_isolated_per_venue() {
        let mut rows = hourly("good", &peaked());
        rows.extend(hourly("flat", &[1.0; HOURS_PER_DAY]));
        let matrix = builder().from_hourly_counts(&rows);
        assert_eq!(matrix.profiles.len(), 1);
        assert_eq!(matrix.rejected.len(), 1);
        assert_eq!(matrix.venue_count(), 2);
        assert_eq!(matrix.records().len(), HOURS_PER_DAY);
    }

    #[test]
    fn test_out_of_range_hour_rejects_venue() {
        let mut rows = hourly("v1", &peaked());
        rows.push(HourlyOrderCount {
            venue: VenueId::new("v1"),
            hour: 24,
            order_count: 1.0,
        });
        let matrix = builder().from_hourly_counts(&rows);
        assert!(matrix.profiles.is_empty());
        assert!(matches!(
            matrix.rejected[&VenueId::new("v1")],
            AnalysisError::InvalidRecord { .. }
        ));
    }

    #[test]
    fn test_parser_rejected_row_excludes_only_its_venue() {
        let mut rows = hourly("good", &peaked());
        rows.extend(hourly("bad", &peaked()));
        let parsed = ParsedDemand {
            input: DemandInput::Hourly(rows),
            invalid_rows: vec![InvalidRow {
                venue: VenueId::new("bad"),
                line: 50,
                reason: "invalid hour '-1'".to_string(),
            }],
        };

        let matrix = builder().from_parsed(&parsed);
        assert_eq!(
            matrix.profiles.keys().collect::<Vec<_>>(),
            vec![&VenueId::new("good")]
        );
        match &matrix.rejected[&VenueId::new("bad")] {
            AnalysisError::InvalidRecord { reason, .. } => assert!(reason.contains("line 50")),
            other => panic!("expected invalid record, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_count_rejects_venue() {
        let mut rows = hourly("v1", &peaked());
        rows[4].order_count = -2.0;
        let matrix = builder().from_hourly_counts(&rows);
        assert!(matrix.profiles.is_empty());
    }

    #[test]
    fn test_duplicate_hours_are_averaged() {
        let mut rows = hourly("v1", &peaked());
        rows.push(HourlyOrderCount {
            venue: VenueId::new("v1"),
            hour: 12,
            order_count: 10.0,
        });
        let matrix = builder().from_hourly_counts(&rows);
        assert_eq!(matrix.profiles[&VenueId::new("v1")].raw[12], 20.0);
    }

    #[test]
    fn test_z_score_profile() {
        let settings = DemandSettings {
            normalization: NormalizationMethod::ZScore,
            ..DemandSettings::default()
        };
        let matrix = DemandMatrixBuilder::new(settings).from_hourly_counts(&hourly("v1", &peaked()));
        let profile = &matrix.profiles[&VenueId::new("v1")];
        assert!(profile.normalized.iter().all(|v| *v > 0.0 && *v < 1.0));
        assert!(profile.normalized[12] > profile.normalized[18]);
    }
}

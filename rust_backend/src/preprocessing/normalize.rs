//! Per-venue demand normalization and variance checks.

use statrs::function::erf::erf;
use std::f64::consts::SQRT_2;

use crate::config::NormalizationMethod;
use crate::core::domain::{VenueId, HOURS_PER_DAY};
use crate::core::error::{AnalysisError, AnalysisResult};

/// Summary statistics of one venue's hourly demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl DemandStats {
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return DemandStats {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / count;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        DemandStats {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Coefficient of variation; zero when the mean is not positive.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean > 0.0 {
            self.std_dev / self.mean
        } else {
            0.0
        }
    }
}

/// Reject a venue whose demand is constant or varies too little to cluster.
pub fn check_variation(
    venue: &VenueId,
    stats: &DemandStats,
    min_variation: f64,
) -> AnalysisResult<()> {
    let scale = stats.max.abs().max(1.0);
    if stats.range() <= f64::EPSILON * scale {
        return Err(AnalysisError::DegenerateVenue {
            venue: venue.clone(),
            reason: format!("constant demand of {:.4} across all hours", stats.mean),
        });
    }

    let cv = stats.coefficient_of_variation();
    if cv < min_variation {
        return Err(AnalysisError::DegenerateVenue {
            venue: venue.clone(),
            reason: format!(
                "coefficient of variation {:.4} below minimum {:.4}",
                cv, min_variation
            ),
        });
    }

    Ok(())
}

/// Normalize a raw hourly profile into `[0, 1]`.
///
/// The caller must have checked the profile with [`check_variation`], so the range
/// and standard deviation are non-zero.
pub fn normalize_profile(
    values: &[f64; HOURS_PER_DAY],
    stats: &DemandStats,
    method: NormalizationMethod,
) -> [f64; HOURS_PER_DAY] {
    let mut normalized = [0.0; HOURS_PER_DAY];
    match method {
        NormalizationMethod::MinMax => {
            let range = stats.range();
            for (out, v) in normalized.iter_mut().zip(values) {
                *out = ((v - stats.min) / range).clamp(0.0, 1.0);
            }
        }
        NormalizationMethod::ZScore => {
            // Standard normal CDF keeps z-scores inside (0, 1)
            for (out, v) in normalized.iter_mut().zip(values) {
                let z = (v - stats.mean) / stats.std_dev;
                *out = (0.5 * (1.0 + erf(z / SQRT_2))).clamp(0.0, 1.0);
            }
        }
    }
    normalized
}

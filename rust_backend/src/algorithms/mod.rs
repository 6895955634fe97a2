//! Clustering strategies for peak-hour detection.
//!
//! Each strategy partitions one venue's 24 hourly demand values into clusters and
//! marks the cluster with the highest mean demand as the peak. Strategies never see
//! each other's output, which is what makes their agreement meaningful.
//!
//! # Components
//!
//! - [`kmeans`]: Centroid clustering (k-means++ seeding, Lloyd iterations, restarts)
//! - [`gmm`]: One-dimensional Gaussian mixture fitted by expectation-maximization
//! - [`agglomerative`]: Average-linkage dendrogram cut at `k` clusters
//!
//! # Example
//!
//! ```
//! use shiftsync_peaks::algorithms::{ClusterParams, ClusteringStrategy, KMeans};
//!
//! let mut values = vec![0.1; 24];
//! values[12] = 0.9;
//! values[18] = 0.85;
//! values[3] = 0.15;
//!
//! let params = ClusterParams { k: 2, ..ClusterParams::default() };
//! let clustering = KMeans::new(params).assign_labels(&values, 42).unwrap();
//! assert_eq!(clustering.peak_indices(), vec![12, 18]);
//! ```

pub mod agglomerative;
pub mod gmm;
pub mod kmeans;

pub use agglomerative::{AgglomerativeClustering, Dendrogram, Merge};
pub use gmm::GaussianMixture;
pub use kmeans::KMeans;

use crate::config::ClusteringSettings;
use crate::core::domain::MethodId;
use crate::core::error::ClusteringError;

/// Values closer than this are treated as the same demand level.
pub const VALUE_EPSILON: f64 = 1e-12;

/// Parameters shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    pub k: usize,
    pub max_iterations: usize,
    pub n_init: usize,
    pub tolerance: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams::from(&ClusteringSettings::default())
    }
}

impl From<&ClusteringSettings> for ClusterParams {
    fn from(settings: &ClusteringSettings) -> Self {
        Self {
            k: settings.k,
            max_iterations: settings.max_iterations,
            n_init: settings.n_init,
            tolerance: settings.tolerance,
        }
    }
}

/// A clustering method that labels observations peak or non-peak.
pub trait ClusteringStrategy: Send + Sync {
    /// Which method this strategy implements.
    fn method(&self) -> MethodId;

    /// Partition `values` and select the peak cluster.
    ///
    /// `seed` drives any randomized initialization; deterministic strategies ignore it.
    fn assign_labels(&self, values: &[f64], seed: u64) -> Result<Clustering, ClusteringError>;
}

/// Outcome of one strategy run.
///
/// # Fields
///
/// * `labels` - cluster index per observation
/// * `cluster_count` - number of non-empty clusters
/// * `peak_cluster` - label of the cluster selected as peak
/// * `iterations` - iterations (or merges) the strategy performed
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub labels: Vec<usize>,
    pub cluster_count: usize,
    pub peak_cluster: usize,
    pub iterations: usize,
}

impl Clustering {
    /// Select the peak cluster from a labelling.
    ///
    /// The peak is the non-empty cluster with the highest mean value. Ties go to the
    /// cluster with fewer members, then to the lower label.
    ///
    /// # Errors
    /// `ClusteringError::Collapsed` when fewer than two clusters are non-empty, since
    /// the peak would then cover every observation.
    pub fn from_labels(
        values: &[f64],
        labels: Vec<usize>,
        iterations: usize,
    ) -> Result<Self, ClusteringError> {
        if values.len() != labels.len() {
            return Err(ClusteringError::InsufficientData(format!(
                "{} labels for {} values",
                labels.len(),
                values.len()
            )));
        }

        let groups = labels.iter().copied().max().map_or(0, |m| m + 1);
        let mut sums = vec![0.0; groups];
        let mut sizes = vec![0usize; groups];
        for (&label, &value) in labels.iter().zip(values) {
            sums[label] += value;
            sizes[label] += 1;
        }

        let mut peak: Option<(usize, f64)> = None;
        for label in (0..groups).filter(|&l| sizes[l] > 0) {
            let mean = sums[label] / sizes[label] as f64;
            peak = match peak {
                None => Some((label, mean)),
                Some((best, best_mean)) => {
                    let better = mean > best_mean + VALUE_EPSILON
                        || ((mean - best_mean).abs() <= VALUE_EPSILON && sizes[label] < sizes[best]);
                    if better {
                        Some((label, mean))
                    } else {
                        Some((best, best_mean))
                    }
                }
            };
        }

        let cluster_count = sizes.iter().filter(|&&s| s > 0).count();
        match peak {
            Some((peak_cluster, _)) if cluster_count >= 2 => Ok(Clustering {
                labels,
                cluster_count,
                peak_cluster,
                iterations,
            }),
            _ => Err(ClusteringError::Collapsed),
        }
    }

    /// `true` for every observation in the peak cluster.
    pub fn peak_mask(&self) -> Vec<bool> {
        self.labels.iter().map(|&l| l == self.peak_cluster).collect()
    }

    /// Indices of the observations in the peak cluster, ascending.
    pub fn peak_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == self.peak_cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Number of distinct demand levels in `values`.
pub fn distinct_levels(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut count = 0;
    let mut last: Option<f64> = None;
    for v in sorted {
        if last.map_or(true, |l| v - l > VALUE_EPSILON) {
            count += 1;
            last = Some(v);
        }
    }
    count
}

/// Cluster count a strategy can actually realize on `values`.
///
/// `k` is clamped to the number of distinct values, so a profile with two demand
/// levels is split in two regardless of the configured `k`.
pub fn effective_k(values: &[f64], k: usize) -> Result<usize, ClusteringError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ClusteringError::InsufficientData(
            "non-finite demand value".to_string(),
        ));
    }
    let levels = distinct_levels(values);
    if levels < 2 {
        return Err(ClusteringError::InsufficientData(format!(
            "{} distinct demand level(s), need at least 2",
            levels
        )));
    }
    Ok(k.min(levels))
}

/// Population variance of `values`.
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// The three strategies in output column order, configured from `settings`.
pub fn default_strategies(settings: &ClusteringSettings) -> Vec<Box<dyn ClusteringStrategy>> {
    let params = ClusterParams::from(settings);
    vec![
        Box::new(KMeans::new(params)),
        Box::new(GaussianMixture::new(params)),
        Box::new(AgglomerativeClustering::new(params)),
    ]
}

//! Fan-out of every clustering strategy over every venue profile.
//!
//! Each (venue, method) pair is an independent task with its own seed, so the
//! labels a method produces never depend on scheduling order or on the other
//! methods. Results are keyed by (venue, method) in ordered maps.

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::algorithms::{default_strategies, ClusteringStrategy};
use crate::config::ClusteringSettings;
use crate::core::domain::{ClusterLabelSet, MethodId, VenueId, VenueProfile, HOURS_PER_DAY};
use crate::core::error::{AnalysisError, AnalysisResult};

/// Key of one clustering task.
pub type TaskKey = (VenueId, MethodId);

/// Label sets of the tasks that succeeded and errors of those that did not.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub label_sets: BTreeMap<TaskKey, ClusterLabelSet>,
    pub failures: BTreeMap<TaskKey, AnalysisError>,
}

impl EngineOutput {
    /// Label set of `method` for `venue`, if the method succeeded.
    pub fn label_set(&self, venue: &VenueId, method: MethodId) -> Option<&ClusterLabelSet> {
        self.label_sets.get(&(venue.clone(), method))
    }

    /// Failed methods of `venue` with their errors, in method order.
    pub fn failures_for(&self, venue: &VenueId) -> Vec<(MethodId, &AnalysisError)> {
        self.failures
            .iter()
            .filter(|((v, _), _)| v == venue)
            .map(|((_, method), err)| (*method, err))
            .collect()
    }
}

/// Runs the configured strategies over venue profiles.
pub struct ClusterEngine {
    strategies: Vec<Box<dyn ClusteringStrategy>>,
    parallel: bool,
}

impl ClusterEngine {
    /// Engine with the k-means, Gaussian mixture and agglomerative strategies.
    pub fn new(settings: &ClusteringSettings) -> Self {
        Self::with_strategies(default_strategies(settings), settings.parallel)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ClusteringStrategy>>, parallel: bool) -> Self {
        Self {
            strategies,
            parallel,
        }
    }

    /// Methods this engine runs, in output column order.
    pub fn methods(&self) -> Vec<MethodId> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Cluster one venue with one strategy.
    ///
    /// # Errors
    /// `AnalysisError::Convergence` wrapping the strategy's failure.
    pub fn cluster_venue(
        &self,
        profile: &VenueProfile,
        strategy: &dyn ClusteringStrategy,
        run_seed: u64,
    ) -> AnalysisResult<ClusterLabelSet> {
        let method = strategy.method();
        let seed = task_seed(run_seed, &profile.venue, method);

        let clustering = strategy
            .assign_labels(&profile.normalized, seed)
            .map_err(|source| AnalysisError::Convergence {
                venue: profile.venue.clone(),
                method,
                source,
            })?;

        let mut peaks = [false; HOURS_PER_DAY];
        for (slot, is_peak) in peaks.iter_mut().zip(clustering.peak_mask()) {
            *slot = is_peak;
        }

        log::debug!(
            "{} on venue {}: {} clusters after {} iterations, {} peak hours",
            method,
            profile.venue,
            clustering.cluster_count,
            clustering.iterations,
            peaks.iter().filter(|&&p| p).count()
        );

        Ok(ClusterLabelSet {
            venue: profile.venue.clone(),
            method,
            peaks,
            cluster_count: clustering.cluster_count,
            iterations: clustering.iterations,
        })
    }

    /// Run every strategy on every profile.
    ///
    /// # Arguments
    /// * `profiles` - normalized demand per venue
    /// * `run_seed` - seed from which every task seed is derived
    ///
    /// # Returns
    /// `EngineOutput` with one entry per (venue, method), either a label set or an error.
    pub fn run(&self, profiles: &BTreeMap<VenueId, VenueProfile>, run_seed: u64) -> EngineOutput {
        let tasks: Vec<(&VenueProfile, &dyn ClusteringStrategy)> = profiles
            .values()
            .flat_map(|profile| self.strategies.iter().map(move |s| (profile, &**s)))
            .collect();

        let results: Vec<(TaskKey, AnalysisResult<ClusterLabelSet>)> = if self.parallel {
            tasks
                .par_iter()
                .map(|&(profile, strategy)| self.run_task(profile, strategy, run_seed))
                .collect()
        } else {
            tasks
                .iter()
                .map(|&(profile, strategy)| self.run_task(profile, strategy, run_seed))
                .collect()
        };

        let mut output = EngineOutput::default();
        for (key, result) in results {
            match result {
                Ok(label_set) => {
                    output.label_sets.insert(key, label_set);
                }
                Err(err) => {
                    log::warn!("Method unavailable: {}", err);
                    output.failures.insert(key, err);
                }
            }
        }
        output
    }

    fn run_task(
        &self,
        profile: &VenueProfile,
        strategy: &dyn ClusteringStrategy,
        run_seed: u64,
    ) -> (TaskKey, AnalysisResult<ClusterLabelSet>) {
        let key = (profile.venue.clone(), strategy.method());
        (key, self.cluster_venue(profile, strategy, run_seed))
    }
}

/// Seed of one (venue, method) task.
///
/// The first eight bytes of `SHA-256(run_seed || method || venue)`.
pub fn task_seed(run_seed: u64, venue: &VenueId, method: MethodId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(run_seed.to_le_bytes());
    hasher.update(method.as_str().as_bytes());
    hasher.update(venue.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::Clustering;
    use crate::core::error::ClusteringError;

    fn profile(venue: &str) -> VenueProfile {
        let mut normalized = [0.1; HOURS_PER_DAY];
        normalized[12] = 1.0;
        normalized[18] = 0.95;
        normalized[3] = 0.0;
        normalized[7] = 0.5;
        VenueProfile {
            venue: VenueId::from(venue),
            raw: normalized,
            normalized,
        }
    }

    struct AlwaysFails;

    impl ClusteringStrategy for AlwaysFails {
        fn method(&self) -> MethodId {
            MethodId::Gmm
        }

        fn assign_labels(&self, _values: &[f64], _seed: u64) -> Result<Clustering, ClusteringError> {
            Err(ClusteringError::NotConverged { iterations: 5 })
        }
    }

    #[test]
    fn test_task_seed_depends_on_every_input() {
        let venue = VenueId::from("V1");
        let base = task_seed(42, &venue, MethodId::Kmeans);
        assert_eq!(base, task_seed(42, &venue, MethodId::Kmeans));
        assert_ne!(base, task_seed(43, &venue, MethodId::Kmeans));
        assert_ne!(base, task_seed(42, &venue, MethodId::Gmm));
        assert_ne!(base, task_seed(42, &VenueId::from("V2"), MethodId::Kmeans));
    }

    #[test]
    fn test_run_covers_every_task() {
        let mut profiles = BTreeMap::new();
        for venue in ["A", "B"] {
            profiles.insert(VenueId::from(venue), profile(venue));
        }
        let engine = ClusterEngine::new(&ClusteringSettings::default());
        let output = engine.run(&profiles, 42);

        assert_eq!(output.label_sets.len() + output.failures.len(), 6);
        for label_set in output.label_sets.values() {
            let peaks = label_set.peak_hours();
            assert!(!peaks.is_empty() && peaks.len() < HOURS_PER_DAY);
        }
        let kmeans = output
            .label_set(&VenueId::from("A"), MethodId::Kmeans)
            .unwrap();
        assert!(kmeans.is_peak(12));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut profiles = BTreeMap::new();
        for venue in ["A", "B", "C"] {
            profiles.insert(VenueId::from(venue), profile(venue));
        }
        let mut settings = ClusteringSettings::default();
        let parallel = ClusterEngine::new(&settings).run(&profiles, 9);
        settings.parallel = false;
        let sequential = ClusterEngine::new(&settings).run(&profiles, 9);

        assert_eq!(parallel.label_sets, sequential.label_sets);
        assert_eq!(parallel.failures, sequential.failures);
    }

    #[test]
    fn test_failure_is_isolated_to_method() {
        let mut profiles = BTreeMap::new();
        profiles.insert(VenueId::from("A"), profile("A"));
        let params = crate::algorithms::ClusterParams::default();
        let engine = ClusterEngine::with_strategies(
            vec![
                Box::new(crate::algorithms::KMeans::new(params)),
                Box::new(AlwaysFails),
            ],
            false,
        );
        let output = engine.run(&profiles, 1);
        let venue = VenueId::from("A");

        assert!(output.label_set(&venue, MethodId::Kmeans).is_some());
        assert!(output.label_set(&venue, MethodId::Gmm).is_none());

        let failures = output.failures_for(&venue);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, MethodId::Gmm);
        assert!(matches!(failures[0].1, AnalysisError::Convergence { .. }));
    }

    #[test]
    fn test_engine_methods_order() {
        let engine = ClusterEngine::new(&ClusteringSettings::default());
        assert_eq!(engine.methods(), MethodId::ALL.to_vec());
    }
}

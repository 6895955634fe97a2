use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::{Continuous, Normal};

use super::kmeans::kmeans_plus_plus;
use super::{effective_k, variance, ClusterParams, Clustering, ClusteringStrategy};
use crate::core::domain::MethodId;
use crate::core::error::ClusteringError;

/// Variance floor added to every component.
const REG_COVAR: f64 = 1e-6;

/// Convergence threshold on the change of the mean log-likelihood.
const LOG_LIKELIHOOD_TOLERANCE: f64 = 1e-3;

/// One-dimensional Gaussian mixture fitted by expectation-maximization.
///
/// Observations are hard-assigned to the component with the highest posterior
/// probability once the log-likelihood has converged.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    params: ClusterParams,
}

/// Mixture parameters, one entry per component
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureComponents {
    pub weights: Vec<f64>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
}

impl MixtureComponents {
    fn initial(values: &[f64], means: Vec<f64>) -> Self {
        let k = means.len();
        let spread = variance(values) + REG_COVAR;
        Self {
            weights: vec![1.0 / k as f64; k],
            means,
            variances: vec![spread; k],
        }
    }

    fn densities(&self) -> Result<Vec<Normal>, ClusteringError> {
        self.means
            .iter()
            .zip(&self.variances)
            .map(|(&mean, &var)| {
                Normal::new(mean, var.sqrt())
                    .map_err(|e| ClusteringError::NumericalFailure(e.to_string()))
            })
            .collect()
    }

    /// E-step: posterior responsibilities and the mean log-likelihood.
    pub fn responsibilities(
        &self,
        values: &[f64],
    ) -> Result<(Vec<Vec<f64>>, f64), ClusteringError> {
        let densities = self.densities()?;
        let mut resp = Vec::with_capacity(values.len());
        let mut total = 0.0;

        for &x in values {
            let log_probs: Vec<f64> = densities
                .iter()
                .zip(&self.weights)
                .map(|(d, &w)| w.ln() + d.ln_pdf(x))
                .collect();
            let max = log_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !max.is_finite() {
                return Err(ClusteringError::NumericalFailure(format!(
                    "zero likelihood for value {}",
                    x
                )));
            }
            let log_norm = max + log_probs.iter().map(|lp| (lp - max).exp()).sum::<f64>().ln();
            total += log_norm;
            resp.push(log_probs.iter().map(|lp| (lp - log_norm).exp()).collect());
        }

        Ok((resp, total / values.len() as f64))
    }

    /// M-step: re-estimate weights, means and variances from responsibilities.
    fn update(&mut self, values: &[f64], resp: &[Vec<f64>]) {
        let n = values.len() as f64;
        for j in 0..self.means.len() {
            let nk = resp.iter().map(|r| r[j]).sum::<f64>() + 10.0 * f64::EPSILON;
            let mean = resp.iter().zip(values).map(|(r, x)| r[j] * x).sum::<f64>() / nk;
            let var = resp
                .iter()
                .zip(values)
                .map(|(r, x)| r[j] * (x - mean) * (x - mean))
                .sum::<f64>()
                / nk;
            self.weights[j] = nk / n;
            self.means[j] = mean;
            self.variances[j] = var + REG_COVAR;
        }
    }
}

impl GaussianMixture {
    pub fn new(params: ClusterParams) -> Self {
        Self { params }
    }

    /// Fit the mixture, returning the converged components and the iteration count.
    pub fn fit(
        &self,
        values: &[f64],
        seed: u64,
    ) -> Result<(MixtureComponents, usize), ClusteringError> {
        let k = effective_k(values, self.params.k)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let means = kmeans_plus_plus(values, k, &mut rng);
        let mut components = MixtureComponents::initial(values, means);

        let mut previous = f64::NEG_INFINITY;
        for iteration in 1..=self.params.max_iterations {
            let (resp, log_likelihood) = components.responsibilities(values)?;
            components.update(values, &resp);

            if (log_likelihood - previous).abs() < LOG_LIKELIHOOD_TOLERANCE {
                return Ok((components, iteration));
            }
            previous = log_likelihood;
        }

        Err(ClusteringError::NotConverged {
            iterations: self.params.max_iterations,
        })
    }
}

impl ClusteringStrategy for GaussianMixture {
    fn method(&self) -> MethodId {
        MethodId::Gmm
    }

    fn assign_labels(&self, values: &[f64], seed: u64) -> Result<Clustering, ClusteringError> {
        let (components, iterations) = self.fit(values, seed)?;

        // Final E-step so labels match the fitted parameters
        let (resp, _) = components.responsibilities(values)?;
        let labels = resp
            .iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(bi, bp), (i, &p)| {
                        if p > bp {
                            (i, p)
                        } else {
                            (bi, bp)
                        }
                    })
                    .0
            })
            .collect();

        Clustering::from_labels(values, labels, iterations)
    }
}

use serde::{Deserialize, Serialize};

use super::{effective_k, ClusterParams, Clustering, ClusteringStrategy};
use crate::core::domain::MethodId;
use crate::core::error::ClusteringError;

/// Average-linkage agglomerative clustering.
///
/// Builds the full dendrogram over the observations and cuts it at `k` clusters.
/// Fully deterministic: the seed is ignored and distance ties merge the pair with
/// the lowest cluster ids.
#[derive(Debug, Clone)]
pub struct AgglomerativeClustering {
    params: ClusterParams,
}

/// One merge step of a dendrogram.
///
/// Leaves are numbered `0..n`; the cluster created by the `i`-th merge has id `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// Complete merge history over `leaves` observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    pub leaves: usize,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    /// Build the dendrogram with average linkage on absolute value distance.
    ///
    /// # Errors
    /// `ClusteringError::NotConverged` if more than `max_merges` merges are needed.
    pub fn build(values: &[f64], max_merges: usize) -> Result<Self, ClusteringError> {
        let n = values.len();
        let total = (2 * n).saturating_sub(1);

        // Distances between every pair of cluster ids, leaves and merged clusters alike
        let mut dist = vec![vec![0.0; total]; total];
        for i in 0..n {
            for j in 0..n {
                dist[i][j] = (values[i] - values[j]).abs();
            }
        }

        let mut sizes = vec![1usize; total];
        let mut active: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        while active.len() > 1 {
            if merges.len() >= max_merges {
                return Err(ClusteringError::NotConverged {
                    iterations: max_merges,
                });
            }

            let mut closest: Option<(usize, usize, f64)> = None;
            for (ai, &a) in active.iter().enumerate() {
                for &b in &active[ai + 1..] {
                    let d = dist[a][b];
                    if closest.map_or(true, |(_, _, best)| d < best) {
                        closest = Some((a, b, d));
                    }
                }
            }
            let Some((a, b, distance)) = closest else {
                break;
            };

            let merged = n + merges.len();
            let size = sizes[a] + sizes[b];
            sizes[merged] = size;

            // Lance-Williams update for average linkage
            for &c in active.iter().filter(|&&c| c != a && c != b) {
                let d = (sizes[a] as f64 * dist[a][c] + sizes[b] as f64 * dist[b][c])
                    / size as f64;
                dist[merged][c] = d;
                dist[c][merged] = d;
            }

            active.retain(|&c| c != a && c != b);
            active.push(merged);
            merges.push(Merge {
                left: a,
                right: b,
                distance,
                size,
            });
        }

        Ok(Dendrogram { leaves: n, merges })
    }

    /// Cut the dendrogram into `k` clusters by replaying the first `leaves - k` merges.
    ///
    /// Labels are numbered in order of each cluster's first leaf.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let n = self.leaves;
        let mut parent: Vec<usize> = (0..(2 * n).saturating_sub(1).max(n)).collect();

        let replay = n.saturating_sub(k.max(1)).min(self.merges.len());
        for (i, merge) in self.merges.iter().take(replay).enumerate() {
            parent[merge.left] = n + i;
            parent[merge.right] = n + i;
        }

        let root = |mut id: usize| {
            while parent[id] != id {
                id = parent[id];
            }
            id
        };

        let mut roots: Vec<usize> = Vec::new();
        (0..n)
            .map(|leaf| {
                let r = root(leaf);
                match roots.iter().position(|&x| x == r) {
                    Some(label) => label,
                    None => {
                        roots.push(r);
                        roots.len() - 1
                    }
                }
            })
            .collect()
    }
}

impl AgglomerativeClustering {
    pub fn new(params: ClusterParams) -> Self {
        Self { params }
    }
}

impl ClusteringStrategy for AgglomerativeClustering {
    fn method(&self) -> MethodId {
        MethodId::Agglo
    }

    fn assign_labels(&self, values: &[f64], _seed: u64) -> Result<Clustering, ClusteringError> {
        let k = effective_k(values, self.params.k)?;
        let dendrogram = Dendrogram::build(values, self.params.max_iterations)?;
        let labels = dendrogram.cut(k);
        Clustering::from_labels(values, labels, dendrogram.merges.len())
    }
}

//! Agglomerative hierarchical clustering with Ward linkage
//!
//! Builds the merge tree with the nearest-neighbor chain algorithm and
//! Lance-Williams updates on squared Euclidean distances, then cuts it
//! at the requested number of clusters. Fitted models keep per-cluster
//! centroids so unseen rows can be assigned to the nearest cluster.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// Agglomerative Clustering
// ═══════════════════════════════════════════════════════════════════════════

/// Ward-linkage agglomerative clustering.
///
/// Cluster ids are assigned by ascending lowest member index and carry
/// no inherent meaning: there is no guarantee that any particular id
/// corresponds to the dangerous class. Callers comparing cluster ids
/// against labels must account for that themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgglomerativeClustering {
    n_clusters: usize,
    labels: Option<Array1<usize>>,
    centroids: Option<Array2<f64>>,
    is_fitted: bool,
}

impl Default for AgglomerativeClustering {
    fn default() -> Self {
        Self::new(2)
    }
}

impl AgglomerativeClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            labels: None,
            centroids: None,
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Cluster the rows of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if self.n_clusters == 0 {
            return Err(AvalancheError::Validation(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if n < self.n_clusters {
            return Err(AvalancheError::Training(format!(
                "cannot form {} clusters from {} samples",
                self.n_clusters, n
            )));
        }

        let mut distances = pairwise_squared_distances(x);
        let mut active = vec![true; n];
        let mut sizes = vec![1usize; n];
        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut n_active = n;

        // Nearest-neighbor chain. Ward linkage is reducible, so merging
        // reciprocal nearest neighbors reproduces the greedy dendrogram.
        let mut chain: Vec<usize> = Vec::new();
        while n_active > self.n_clusters {
            if chain.is_empty() {
                let start = (0..n).find(|&i| active[i]).ok_or_else(|| {
                    AvalancheError::Training("no active clusters remain".to_string())
                })?;
                chain.push(start);
            }

            loop {
                let tip = match chain.last() {
                    Some(&t) => t,
                    None => break,
                };

                // Seed the candidate with the previous chain element so
                // distance ties resolve toward a reciprocal pair.
                let mut next = None;
                let mut best = f64::INFINITY;
                if chain.len() >= 2 {
                    let prev = chain[chain.len() - 2];
                    next = Some(prev);
                    best = distances[[tip, prev]];
                }
                for j in 0..n {
                    if j != tip && active[j] && distances[[tip, j]] < best {
                        best = distances[[tip, j]];
                        next = Some(j);
                    }
                }

                let next = next.ok_or_else(|| {
                    AvalancheError::Training("isolated cluster in merge chain".to_string())
                })?;

                if chain.len() >= 2 && chain[chain.len() - 2] == next {
                    chain.pop();
                    chain.pop();
                    let (a, b) = if tip < next { (tip, next) } else { (next, tip) };
                    merge_clusters(&mut distances, &mut active, &mut sizes, a, b);
                    let moved = std::mem::take(&mut members[b]);
                    members[a].extend(moved);
                    n_active -= 1;
                    break;
                }

                chain.push(next);
            }
        }

        // Surviving clusters become ids 0..k by ascending lowest member
        // index, which keeps labeling deterministic for a given input.
        let mut surviving: Vec<usize> = (0..n).filter(|&i| active[i]).collect();
        surviving.sort_by_key(|&slot| members[slot].iter().min().copied().unwrap_or(usize::MAX));

        let mut labels = Array1::zeros(n);
        let mut centroids = Array2::zeros((surviving.len(), x.ncols()));
        for (cluster_id, &slot) in surviving.iter().enumerate() {
            for &row in &members[slot] {
                labels[row] = cluster_id;
                for (col, &value) in x.row(row).iter().enumerate() {
                    centroids[[cluster_id, col]] += value;
                }
            }
            let count = members[slot].len() as f64;
            for col in 0..x.ncols() {
                centroids[[cluster_id, col]] /= count;
            }
        }

        self.labels = Some(labels);
        self.centroids = Some(centroids);
        self.is_fitted = true;
        Ok(self)
    }

    /// Fit and return the training labels
    pub fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.fit(x)?;
        self.labels().cloned()
    }

    /// Training labels, one cluster id per fitted row
    pub fn labels(&self) -> Result<&Array1<usize>> {
        self.labels.as_ref().ok_or(AvalancheError::NotFitted)
    }

    /// Per-cluster centroids in feature space
    pub fn cluster_centers(&self) -> Result<&Array2<f64>> {
        self.centroids.as_ref().ok_or(AvalancheError::NotFitted)
    }

    /// Assign each row of `x` to the nearest fitted centroid
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let centroids = self.centroids.as_ref().ok_or(AvalancheError::NotFitted)?;
        if x.ncols() != centroids.ncols() {
            return Err(AvalancheError::Shape {
                expected: centroids.ncols(),
                actual: x.ncols(),
            });
        }

        let labels = x
            .rows()
            .into_iter()
            .map(|row| nearest_centroid(row, centroids))
            .collect();
        Ok(labels)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn pairwise_squared_distances(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| squared_distance(x.row(i), x.row(j)))
                .collect()
        })
        .collect();

    let mut distances = Array2::zeros((n, n));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, value) in row.into_iter().enumerate() {
            distances[[i, j]] = value;
        }
    }
    distances
}

/// Merge cluster `b` into cluster `a` and refresh distances with the
/// Lance-Williams formula for Ward linkage.
fn merge_clusters(
    distances: &mut Array2<f64>,
    active: &mut [bool],
    sizes: &mut [usize],
    a: usize,
    b: usize,
) {
    let n = active.len();
    let na = sizes[a] as f64;
    let nb = sizes[b] as f64;
    let dab = distances[[a, b]];

    for k in 0..n {
        if k == a || k == b || !active[k] {
            continue;
        }
        let nk = sizes[k] as f64;
        let updated = ((na + nk) * distances[[a, k]] + (nb + nk) * distances[[b, k]]
            - nk * dab)
            / (na + nb + nk);
        distances[[a, k]] = updated;
        distances[[k, a]] = updated;
    }

    sizes[a] += sizes[b];
    active[b] = false;
}

fn nearest_centroid(row: ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (id, centroid) in centroids.rows().into_iter().enumerate() {
        let distance = squared_distance(row, centroid);
        if distance < best_distance {
            best_distance = distance;
            best = id;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(vec![0.0 + (i as f64) * 0.01, 0.0 - (i as f64) * 0.01]);
        }
        for i in 0..10 {
            rows.push(vec![5.0 + (i as f64) * 0.01, 5.0 - (i as f64) * 0.01]);
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((20, 2), flat).unwrap()
    }

    #[test]
    fn test_separates_two_blobs() {
        let x = two_blobs();
        let mut model = AgglomerativeClustering::new(2);
        assert_eq!(model.n_clusters(), 2);
        assert!(!model.is_fitted());
        let labels = model.fit_predict(&x).unwrap();
        assert!(model.is_fitted());

        assert_eq!(labels.len(), 20);
        let first = labels[0];
        let second = labels[10];
        assert_ne!(first, second);
        for i in 0..10 {
            assert_eq!(labels[i], first);
            assert_eq!(labels[10 + i], second);
        }
    }

    #[test]
    fn test_centroids_near_blob_means() {
        let x = two_blobs();
        let mut model = AgglomerativeClustering::new(2);
        model.fit(&x).unwrap();

        let centers = model.cluster_centers().unwrap();
        assert_eq!(centers.dim(), (2, 2));
        // Lowest member index is 0, so cluster 0 is the origin blob.
        assert!((centers[[0, 0]] - 0.045).abs() < 0.01);
        assert!((centers[[1, 0]] - 5.045).abs() < 0.01);
    }

    #[test]
    fn test_predict_matches_fit_labels_on_separated_data() {
        let x = two_blobs();
        let mut model = AgglomerativeClustering::new(2);
        let fit_labels = model.fit_predict(&x).unwrap();
        let predicted = model.predict(&x).unwrap();

        for (a, b) in fit_labels.iter().zip(predicted.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_merge_order_on_line() {
        let x = array![[0.0], [0.1], [10.0]];
        let mut model = AgglomerativeClustering::new(2);
        let labels = model.fit_predict(&x).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 0, 1]);
    }

    #[test]
    fn test_deterministic_across_fits() {
        let x = two_blobs();
        let mut a = AgglomerativeClustering::new(2);
        let mut b = AgglomerativeClustering::new(2);
        assert_eq!(a.fit_predict(&x).unwrap(), b.fit_predict(&x).unwrap());
    }

    #[test]
    fn test_too_few_samples_fails() {
        let x = array![[1.0, 2.0]];
        let mut model = AgglomerativeClustering::new(2);
        assert!(matches!(
            model.fit(&x),
            Err(AvalancheError::Training(_))
        ));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = AgglomerativeClustering::new(2);
        let x = array![[1.0, 2.0]];
        assert!(matches!(
            model.predict(&x),
            Err(AvalancheError::NotFitted)
        ));
    }

    #[test]
    fn test_as_many_clusters_as_samples() {
        let x = array![[0.0], [1.0], [2.0]];
        let mut model = AgglomerativeClustering::new(3);
        let labels = model.fit_predict(&x).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 1, 2]);
    }
}

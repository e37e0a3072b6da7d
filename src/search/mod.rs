//! Recursive feature-subset search
//!
//! Exhaustive elimination over feature subsets: evaluate the current
//! subset, then recurse once per single-feature removal and keep the
//! best score seen anywhere in the tree. Visited subsets are memoized
//! as column bit-masks so each distinct subset is scored exactly once,
//! giving at most `2^F - 1` evaluations for `F` starting features.
//!
//! Two objectives mirror the offline analysis jobs:
//! - cluster agreement: how far the 2-cluster split drifts from a coin
//!   flip against the danger labels,
//! - classifier accuracy: mean held-out accuracy of repeated network
//!   fits on a fixed split of the subset.

use std::collections::HashSet;

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AvalancheError, Result};
use crate::models::{
    train_test_split, AgglomerativeClustering, MLPClassifier, MLPConfig,
};

/// Scoring strategy for a candidate subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchObjective {
    /// Deviation of cluster/label agreement from 0.5
    ClusterAgreement,
    /// Mean held-out accuracy over repeated network fits
    ClassifierAccuracy { repeats: usize },
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub objective: SearchObjective,
    /// Master seed for splits and network initialization; `None` draws
    /// from entropy
    pub seed: Option<u64>,
}

impl SearchConfig {
    pub fn new(objective: SearchObjective) -> Self {
        Self {
            objective,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of a completed search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Best score found, or `None` when nothing was evaluated
    pub score: Option<f64>,
    /// Header names of the best subset
    pub headers: Vec<String>,
    /// Number of subsets actually scored
    pub evaluations: usize,
}

/// Exhaustive memoized subset search over a labeled matrix
pub struct SubsetSearch<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    config: SearchConfig,
    visited: HashSet<u64>,
    evaluations: usize,
    initial_features: usize,
    rng: ChaCha8Rng,
}

impl<'a> SubsetSearch<'a> {
    pub fn new(x: &'a Array2<f64>, y: &'a Array1<f64>, config: SearchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            x,
            y,
            config,
            visited: HashSet::new(),
            evaluations: 0,
            initial_features: 0,
            rng,
        }
    }

    /// Search every reachable subset of `columns` and keep the best
    pub fn run(&mut self, headers: &[String], columns: &[usize]) -> Result<SearchOutcome> {
        if headers.len() != columns.len() {
            return Err(AvalancheError::Validation(format!(
                "{} headers given for {} columns",
                headers.len(),
                columns.len()
            )));
        }
        if self.x.nrows() != self.y.len() {
            return Err(AvalancheError::Validation(format!(
                "matrix has {} rows but labels have {}",
                self.x.nrows(),
                self.y.len()
            )));
        }
        for &column in columns {
            if column >= self.x.ncols() {
                return Err(AvalancheError::Validation(format!(
                    "column index {} out of range for {} columns",
                    column,
                    self.x.ncols()
                )));
            }
        }

        self.visited.clear();
        self.evaluations = 0;
        self.initial_features = columns.len();

        let (score, best_headers) = self.search(headers, columns)?;
        Ok(SearchOutcome {
            score,
            headers: best_headers,
            evaluations: self.evaluations,
        })
    }

    fn search(
        &mut self,
        headers: &[String],
        columns: &[usize],
    ) -> Result<(Option<f64>, Vec<String>)> {
        // Empty or already-visited subsets contribute no candidate.
        if columns.is_empty() {
            return Ok((None, Vec::new()));
        }
        let key = subset_key(columns)?;
        if !self.visited.insert(key) {
            return Ok((None, Vec::new()));
        }

        let score = self.evaluate(columns)?;
        self.evaluations += 1;
        debug!(subset = ?headers, score, "scored feature subset");

        let mut best_score = score;
        let mut best_headers = headers.to_vec();

        for index in 0..columns.len() {
            let mut sub_headers = headers.to_vec();
            sub_headers.remove(index);
            let mut sub_columns = columns.to_vec();
            sub_columns.remove(index);

            let (candidate, candidate_headers) = self.search(&sub_headers, &sub_columns)?;
            if let Some(candidate) = candidate {
                if candidate > best_score {
                    best_score = candidate;
                    best_headers = candidate_headers;
                }
            }
        }

        Ok((Some(best_score), best_headers))
    }

    fn evaluate(&mut self, columns: &[usize]) -> Result<f64> {
        let subset = select_columns(self.x, columns);
        match self.config.objective {
            SearchObjective::ClusterAgreement => self.cluster_agreement(&subset),
            SearchObjective::ClassifierAccuracy { repeats } => {
                self.classifier_accuracy(&subset, repeats)
            }
        }
    }

    fn cluster_agreement(&mut self, subset: &Array2<f64>) -> Result<f64> {
        let mut clusterer = AgglomerativeClustering::new(2);
        let cluster_labels = clusterer.fit_predict(subset)?;

        let matches = cluster_labels
            .iter()
            .zip(self.y.iter())
            .filter(|(&cluster, &label)| (cluster == 1) == (label == 1.0))
            .count();
        let agreement = matches as f64 / self.y.len() as f64;
        Ok((agreement - 0.5).abs())
    }

    fn classifier_accuracy(&mut self, subset: &Array2<f64>, repeats: usize) -> Result<f64> {
        if repeats == 0 {
            return Err(AvalancheError::Validation(
                "repeats must be at least 1".to_string(),
            ));
        }

        // One split per subset. Only the network initialization varies
        // across repeats.
        let split_seed = self.rng.gen();
        let (x_train, x_test, y_train, y_test) =
            train_test_split(subset, self.y, 0.25, split_seed)?;

        let width = self.initial_features;
        let mut total = 0.0;
        for _ in 0..repeats {
            let mut mlp = MLPClassifier::new(MLPConfig {
                hidden_layers: vec![width; width],
                max_epochs: 200,
                random_state: Some(self.rng.gen()),
                ..Default::default()
            });
            mlp.fit(&x_train, &y_train)?;
            total += mlp.score(&x_test, &y_test)?;
        }
        Ok(total / repeats as f64)
    }
}

fn subset_key(columns: &[usize]) -> Result<u64> {
    let mut key = 0u64;
    for &column in columns {
        if column >= 64 {
            return Err(AvalancheError::Validation(
                "subset search supports at most 64 columns".to_string(),
            ));
        }
        key |= 1u64 << column;
    }
    Ok(key)
}

fn select_columns(x: &Array2<f64>, columns: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((x.nrows(), columns.len()), |(row, col)| {
        x[[row, columns[col]]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One informative column, two noise-free constants.
    fn informative_data() -> (Array2<f64>, Array1<f64>, Vec<String>) {
        let mut values = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            let dangerous = i >= 6;
            let signal = if dangerous { 10.0 } else { 0.0 };
            values.extend([signal + (i as f64) * 0.01, 1.0, 2.0]);
            labels.push(if dangerous { 1.0 } else { 0.0 });
        }
        let x = Array2::from_shape_vec((12, 3), values).unwrap();
        let y = Array1::from_vec(labels);
        let headers = vec!["signal".to_string(), "one".to_string(), "two".to_string()];
        (x, y, headers)
    }

    #[test]
    fn test_visits_every_subset_exactly_once() {
        let (x, y, headers) = informative_data();
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));
        let outcome = search.run(&headers, &[0, 1, 2]).unwrap();

        // 2^3 - 1 distinct non-empty subsets.
        assert_eq!(outcome.evaluations, 7);
        assert!(outcome.score.is_some());
    }

    #[test]
    fn test_finds_the_informative_feature() {
        let (x, y, headers) = informative_data();
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));
        let outcome = search.run(&headers, &[0, 1, 2]).unwrap();

        // Perfect agreement on either polarity scores 0.5.
        assert_eq!(outcome.score, Some(0.5));
        assert!(outcome.headers.contains(&"signal".to_string()));
    }

    #[test]
    fn test_empty_input_yields_no_candidate() {
        let (x, y, _) = informative_data();
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));
        let outcome = search.run(&[], &[]).unwrap();

        assert_eq!(outcome.score, None);
        assert!(outcome.headers.is_empty());
        assert_eq!(outcome.evaluations, 0);
    }

    #[test]
    fn test_seeded_classifier_search_is_reproducible() {
        let (x, y, headers) = informative_data();
        let config = SearchConfig::new(SearchObjective::ClassifierAccuracy { repeats: 2 })
            .with_seed(7);

        let mut first = SubsetSearch::new(&x, &y, config.clone());
        let a = first.run(&headers, &[0, 1, 2]).unwrap();
        let mut second = SubsetSearch::new(&x, &y, config);
        let b = second.run(&headers, &[0, 1, 2]).unwrap();

        assert_eq!(a.score, b.score);
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.evaluations, b.evaluations);
    }

    #[test]
    fn test_header_column_mismatch_fails() {
        let (x, y, headers) = informative_data();
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));
        assert!(matches!(
            search.run(&headers, &[0, 1]),
            Err(AvalancheError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_column_fails() {
        let (x, y, _) = informative_data();
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));
        let headers = vec!["beyond".to_string()];
        assert!(matches!(
            search.run(&headers, &[9]),
            Err(AvalancheError::Validation(_))
        ));
    }

    #[test]
    fn test_more_than_sixty_four_columns_fails() {
        let x = Array2::zeros((4, 65));
        let y = Array1::zeros(4);
        let mut search = SubsetSearch::new(&x, &y, SearchConfig::new(SearchObjective::ClusterAgreement));

        let headers: Vec<String> = (0..65).map(|i| format!("col{}", i)).collect();
        let columns: Vec<usize> = (0..65).collect();
        assert!(matches!(
            search.run(&headers, &columns),
            Err(AvalancheError::Validation(_))
        ));
    }
}

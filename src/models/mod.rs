//! Danger prediction models
//!
//! Three independently trained estimators over the scaled weather features:
//! - [`MLPClassifier`] - feed-forward network, hidden layers (64, 32)
//! - [`LogisticRegression`] - linear classifier
//! - [`AgglomerativeClustering`] - unsupervised 2-cluster Ward linkage
//!
//! [`ModelEnsemble`] owns all three and exposes the uniform prediction
//! contract; [`ModelKind`] is the closed set of selectable models.

mod ensemble;
mod hac;
mod logistic;
mod mlp;

pub use ensemble::{EnsembleConfig, EnsembleMetrics, ModelEnsemble, Prediction};
pub use hac::AgglomerativeClustering;
pub use logistic::LogisticRegression;
pub use mlp::{MLPClassifier, MLPConfig};

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};

/// The closed set of selectable models.
///
/// Request strings are parsed into this enum at the boundary; dispatch
/// never sees an unknown name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Mlp,
    Logistic,
    Hac,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Mlp, ModelKind::Logistic, ModelKind::Hac];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mlp => "mlp",
            ModelKind::Logistic => "logistic",
            ModelKind::Hac => "hac",
        }
    }
}

impl FromStr for ModelKind {
    type Err = AvalancheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mlp" => Ok(ModelKind::Mlp),
            "logistic" => Ok(ModelKind::Logistic),
            "hac" => Ok(ModelKind::Hac),
            other => Err(AvalancheError::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shuffle-split rows into train/test partitions.
///
/// The seed fully determines the partition, so repeated runs on identical
/// input are bit-reproducible. The test partition holds
/// `ceil(n * test_fraction)` rows.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_fraction: f64,
    seed: u64,
) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)> {
    let n = x.nrows();
    if n != y.len() {
        return Err(AvalancheError::Validation(format!(
            "matrix has {} rows but labels have {}",
            n,
            y.len()
        )));
    }
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(AvalancheError::Validation(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AvalancheError::Training(format!(
            "cannot split {} rows with test_fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((
        gather_rows(x, train_idx),
        gather_rows(x, test_idx),
        gather_values(y, train_idx),
        gather_values(y, test_idx),
    ))
}

/// Copy the given rows into a new matrix
pub(crate) fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let n_cols = x.ncols();
    let mut rows = Vec::with_capacity(indices.len() * n_cols);
    for &i in indices {
        rows.extend(x.row(i).iter().copied());
    }
    Array2::from_shape_vec((indices.len(), n_cols), rows)
        .unwrap_or_else(|_| Array2::zeros((0, n_cols)))
}

pub(crate) fn gather_values(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| y[i]).collect()
}

/// Fraction of rows where prediction matches the label
pub(crate) fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_model_kind_parse() {
        assert_eq!("mlp".parse::<ModelKind>().unwrap(), ModelKind::Mlp);
        assert_eq!("logistic".parse::<ModelKind>().unwrap(), ModelKind::Logistic);
        assert_eq!("hac".parse::<ModelKind>().unwrap(), ModelKind::Hac);

        let err = "unknown".parse::<ModelKind>();
        assert!(matches!(err, Err(AvalancheError::UnknownModel(_))));
    }

    #[test]
    fn test_model_kind_rejects_case_variants() {
        assert!("MLP".parse::<ModelKind>().is_err());
        assert!("".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_split_proportions() {
        let x = Array2::from_shape_fn((100, 3), |(i, j)| (i * 3 + j) as f64);
        let y = Array1::from_shape_fn(100, |i| (i % 2) as f64);

        let (x_train, x_test, y_train, y_test) = train_test_split(&x, &y, 0.25, 42).unwrap();
        assert_eq!(x_train.nrows(), 75);
        assert_eq!(x_test.nrows(), 25);
        assert_eq!(y_train.len(), 75);
        assert_eq!(y_test.len(), 25);
    }

    #[test]
    fn test_split_is_deterministic() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 2) as f64);

        let (a_train, _, _, a_ytest) = train_test_split(&x, &y, 0.25, 42).unwrap();
        let (b_train, _, _, b_ytest) = train_test_split(&x, &y, 0.25, 42).unwrap();
        assert_eq!(a_train, b_train);
        assert_eq!(a_ytest, b_ytest);

        let (c_train, _, _, _) = train_test_split(&x, &y, 0.25, 7).unwrap();
        assert_ne!(a_train, c_train);
    }

    #[test]
    fn test_split_rows_are_disjoint_and_complete() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::zeros(20);

        let (x_train, x_test, _, _) = train_test_split(&x, &y, 0.25, 1).unwrap();
        let mut seen: Vec<f64> = x_train.column(0).to_vec();
        seen.extend(x_test.column(0).iter());
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_split_too_small_fails() {
        let x = array![[1.0]];
        let y = array![1.0];
        assert!(train_test_split(&x, &y, 0.25, 42).is_err());
    }

    #[test]
    fn test_accuracy() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let p = array![1.0, 0.0, 0.0, 0.0];
        assert!((accuracy(&y, &p) - 0.75).abs() < 1e-12);
    }
}

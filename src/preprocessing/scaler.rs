//! Z-score standardization over ndarray feature matrices

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};

/// Standard scaler: (x - mean) / std per feature column.
///
/// Uses the population standard deviation (ddof = 0). Fitting replaces any
/// previous state entirely; there is no incremental update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Option<Array1<f64>>,
    stds: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            means: None,
            stds: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.means.is_some()
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> Option<usize> {
        self.means.as_ref().map(|m| m.len())
    }

    /// Learn per-column mean and std from the full matrix
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(AvalancheError::Validation(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let mut means = Array1::zeros(x.ncols());
        let mut stds = Array1::zeros(x.ncols());

        for j in 0..x.ncols() {
            let col = x.column(j);
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            means[j] = mean;
            // Constant columns pass through as a pure shift
            stds[j] = if std == 0.0 { 1.0 } else { std };
        }

        self.means = Some(means);
        self.stds = Some(stds);
        Ok(self)
    }

    /// Standardize a matrix with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, stds) = self.state()?;
        if x.ncols() != means.len() {
            return Err(AvalancheError::Shape {
                expected: means.len(),
                actual: x.ncols(),
            });
        }

        let mut out = x.clone();
        for j in 0..out.ncols() {
            let mean = means[j];
            let std = stds[j];
            out.column_mut(j).mapv_inplace(|v| (v - mean) / std);
        }
        Ok(out)
    }

    /// Standardize a single observation vector
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        let (means, stds) = self.state()?;
        if row.len() != means.len() {
            return Err(AvalancheError::Shape {
                expected: means.len(),
                actual: row.len(),
            });
        }
        Ok(Array1::from_shape_fn(row.len(), |j| {
            (row[j] - means[j]) / stds[j]
        }))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn state(&self) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (self.means.as_ref(), self.stds.as_ref()) {
            (Some(means), Some(stds)) => Ok((means, stds)),
            _ => Err(AvalancheError::NotFitted),
        }
    }
}

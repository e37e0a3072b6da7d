//! Logistic regression trained by gradient descent

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};

/// Binary logistic regression with optional L2 regularization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iter: usize,
    l2_penalty: f64,
    weights: Option<Array1<f64>>,
    intercept: f64,
    is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            l2_penalty: 0.0,
            weights: None,
            intercept: 0.0,
            is_fitted: false,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_l2_penalty(mut self, l2_penalty: f64) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(AvalancheError::Training(
                "cannot fit on an empty matrix".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(AvalancheError::Validation(format!(
                "matrix has {} rows but labels have {}",
                n_samples,
                y.len()
            )));
        }

        let n = n_samples as f64;
        let mut weights: Array1<f64> = Array1::zeros(x.ncols());
        let mut intercept = 0.0;

        for _ in 0..self.max_iter {
            let z = x.dot(&weights) + intercept;
            let p = z.mapv(sigmoid);
            let error = &p - y;

            let grad_w = x.t().dot(&error) / n + self.l2_penalty * &weights;
            let grad_b = error.sum() / n;

            weights = weights - self.learning_rate * grad_w;
            intercept -= self.learning_rate * grad_b;
        }

        self.weights = Some(weights);
        self.intercept = intercept;
        self.is_fitted = true;
        Ok(self)
    }

    /// Probability of the positive class for each row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(AvalancheError::NotFitted)?;
        if x.ncols() != weights.len() {
            return Err(AvalancheError::Shape {
                expected: weights.len(),
                actual: x.ncols(),
            });
        }
        let z = x.dot(weights) + self.intercept;
        Ok(z.mapv(sigmoid))
    }

    /// Predict 0/1 labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Accuracy on a labeled set
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(crate::models::accuracy(y, &y_pred))
    }

    /// Fitted coefficients, one per feature
    pub fn coefficients(&self) -> Result<&Array1<f64>> {
        self.weights.as_ref().ok_or(AvalancheError::NotFitted)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

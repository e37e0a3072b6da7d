//! Feed-forward neural network for binary danger classification
//!
//! ReLU hidden layers, a sigmoid output unit, and mini-batch gradient
//! descent with momentum on the cross-entropy loss.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};
use crate::models::gather_rows;

/// Network hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of passes over the training set
    pub max_epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// L2 regularization strength
    pub alpha: f64,
    /// Momentum coefficient
    pub momentum: f64,
    /// Seed for weight initialization and batch shuffling; `None` draws
    /// from entropy
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            learning_rate: 0.01,
            max_epochs: 300,
            batch_size: 32,
            alpha: 0.0001,
            momentum: 0.9,
            random_state: Some(42),
        }
    }
}

/// Multi-layer perceptron classifier with a single sigmoid output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    is_fitted: bool,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
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

        self.n_features = x.ncols();
        self.initialize_weights();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let y_col = y.clone().insert_axis(Axis(1));

        let mut velocities_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.len()))
            .collect();

        for _epoch in 0..self.config.max_epochs {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);

            for batch_start in (0..n_samples).step_by(self.config.batch_size) {
                let batch_end = (batch_start + self.config.batch_size).min(n_samples);
                let batch_indices = &indices[batch_start..batch_end];

                let x_batch = gather_rows(x, batch_indices);
                let y_batch = gather_rows(&y_col, batch_indices);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum
                        - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum
                        - &grad_b * self.config.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];

                    self.weights[i] =
                        &self.weights[i] * (1.0 - self.config.alpha * self.config.learning_rate);
                }
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Class probabilities, one row per sample: [P(safe), P(dangerous)]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AvalancheError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(AvalancheError::Shape {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let (activations, _) = self.forward(x);
        let p = activations.last().map(|a| a.column(0).to_owned());
        let p = p.ok_or(AvalancheError::NotFitted)?;

        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &pi) in p.iter().enumerate() {
            proba[[i, 0]] = 1.0 - pi;
            proba[[i, 1]] = pi;
        }
        Ok(proba)
    }

    /// Predict 0/1 labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .column(1)
            .iter()
            .map(|&p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    /// Accuracy on a labeled set
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(crate::models::accuracy(y, &y_pred))
    }

    fn initialize_weights(&mut self) {
        self.weights.clear();
        self.biases.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for i in 0..layer_sizes.len() - 1 {
            let n_in = layer_sizes[i];
            let n_out = layer_sizes[i + 1];

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(
                Array2::from_shape_vec((n_in, n_out), weights)
                    .unwrap_or_else(|_| Array2::zeros((n_in, n_out))),
            );
            self.biases.push(Array1::zeros(n_out));
        }
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::new();

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let prev = activations.last().cloned().unwrap_or_else(|| x.clone());
            let z = prev.dot(w) + b;
            z_values.push(z.clone());

            let a = if i < self.weights.len() - 1 {
                z.mapv(|v| v.max(0.0))
            } else {
                z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
            };
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y_batch: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_batch.nrows() as f64;
        let mut gradients = Vec::new();

        // Sigmoid + cross-entropy collapses to (p - y) / n at the output
        let output = &activations[activations.len() - 1];
        let mut delta = (output - y_batch) / n;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];

            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let z = &z_values[i - 1];
                let relu_grad = z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.weights[i].t()) * relu_grad;
            }
        }

        gradients.reverse();
        gradients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (100, 2),
            (0..200).map(|i| (i as f64) * 0.05 - 2.5).collect(),
        )
        .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 0.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_fit_and_predict_separable() {
        let (x, y) = separable_data();
        let config = MLPConfig {
            hidden_layers: vec![16, 8],
            max_epochs: 200,
            ..Default::default()
        };
        let mut mlp = MLPClassifier::new(config);
        assert!(!mlp.is_fitted());
        mlp.fit(&x, &y).unwrap();
        assert!(mlp.is_fitted());

        let acc = mlp.score(&x, &y).unwrap();
        assert!(acc > 0.8, "accuracy {} should beat 0.8", acc);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = separable_data();
        let mut mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: vec![8],
            max_epochs: 50,
            ..Default::default()
        });
        mlp.fit(&x, &y).unwrap();

        let proba = mlp.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (100, 2));
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9);
            assert!(row[0] >= 0.0 && row[0] <= 1.0);
        }
    }

    #[test]
    fn test_same_seed_same_weights() {
        let (x, y) = separable_data();
        let config = MLPConfig {
            hidden_layers: vec![8],
            max_epochs: 20,
            random_state: Some(7),
            ..Default::default()
        };

        let mut a = MLPClassifier::new(config.clone());
        a.fit(&x, &y).unwrap();
        let mut b = MLPClassifier::new(config);
        b.fit(&x, &y).unwrap();

        let pa = a.predict_proba(&x).unwrap();
        let pb = b.predict_proba(&x).unwrap();
        for (va, vb) in pa.iter().zip(pb.iter()) {
            assert_eq!(va, vb);
        }
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let mlp = MLPClassifier::new(MLPConfig::default());
        let x = Array2::zeros((1, 2));
        assert!(matches!(
            mlp.predict(&x),
            Err(AvalancheError::NotFitted)
        ));
    }

    #[test]
    fn test_feature_count_mismatch_fails() {
        let (x, y) = separable_data();
        let mut mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: vec![4],
            max_epochs: 5,
            ..Default::default()
        });
        mlp.fit(&x, &y).unwrap();

        let bad = Array2::zeros((1, 5));
        assert!(matches!(
            mlp.predict(&bad),
            Err(AvalancheError::Shape { expected: 2, actual: 5 })
        ));
    }
}

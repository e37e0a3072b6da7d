//! Side-by-side training of the three danger models
//!
//! The ensemble holds one instance of each model behind a single train
//! call: the classifiers fit on a reproducible 75/25 split and report
//! held-out accuracy, while the clusterer fits unsupervised on the full
//! scaled matrix. Prediction dispatches on [`ModelKind`] with no
//! parameter sharing between estimators.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AvalancheError, Result};
use crate::models::{
    train_test_split, AgglomerativeClustering, LogisticRegression, MLPClassifier, MLPConfig,
    ModelKind,
};

/// Training knobs shared by the ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Hidden layer sizes for the network
    pub hidden_layers: Vec<usize>,
    /// Training epochs for the network
    pub max_epochs: usize,
    /// Fraction of rows held out for accuracy reporting
    pub test_fraction: f64,
    /// Seed for the split and for network initialization
    pub seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            max_epochs: 300,
            test_fraction: 0.25,
            seed: 42,
        }
    }
}

/// Held-out accuracy recorded at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMetrics {
    pub mlp_accuracy: f64,
    pub logistic_accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// A single model's answer for one observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Whether the observation is classified as dangerous
    #[serde(rename = "prediction")]
    pub dangerous: bool,
    /// Probability of the predicted class; absent for the clusterer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// The three models trained over one dataset.
///
/// The clusterer arm reports cluster id 1 as dangerous. Cluster ids
/// carry no inherent danger polarity, so that mapping is a documented
/// limitation of unsupervised prediction rather than a calibrated
/// output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEnsemble {
    config: EnsembleConfig,
    mlp: MLPClassifier,
    logistic: LogisticRegression,
    clusterer: AgglomerativeClustering,
    metrics: Option<EnsembleMetrics>,
    is_fitted: bool,
}

impl Default for ModelEnsemble {
    fn default() -> Self {
        Self::new(EnsembleConfig::default())
    }
}

impl ModelEnsemble {
    pub fn new(config: EnsembleConfig) -> Self {
        let mlp = MLPClassifier::new(MLPConfig {
            hidden_layers: config.hidden_layers.clone(),
            max_epochs: config.max_epochs,
            random_state: Some(config.seed),
            ..Default::default()
        });

        Self {
            config,
            mlp,
            logistic: LogisticRegression::new(),
            clusterer: AgglomerativeClustering::new(2),
            metrics: None,
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Train all three models on a scaled matrix and 0/1 labels
    pub fn train(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(AvalancheError::Training(
                "cannot train on an empty dataset".to_string(),
            ));
        }

        let positives = y.iter().filter(|&&v| v == 1.0).count();
        if positives == 0 || positives == y.len() {
            return Err(AvalancheError::Training(
                "training labels contain a single class".to_string(),
            ));
        }

        let (x_train, x_test, y_train, y_test) =
            train_test_split(x, y, self.config.test_fraction, self.config.seed)?;

        self.mlp.fit(&x_train, &y_train)?;
        self.logistic.fit(&x_train, &y_train)?;

        let mlp_accuracy = self.mlp.score(&x_test, &y_test)?;
        let logistic_accuracy = self.logistic.score(&x_test, &y_test)?;

        // Unsupervised arm sees every row, not the split.
        self.clusterer.fit(x)?;

        self.metrics = Some(EnsembleMetrics {
            mlp_accuracy,
            logistic_accuracy,
            n_train: x_train.nrows(),
            n_test: x_test.nrows(),
        });
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict one scaled observation with the requested model
    pub fn predict(&self, kind: ModelKind, row: ArrayView1<f64>) -> Result<Prediction> {
        if !self.is_fitted {
            return Err(AvalancheError::NotFitted);
        }

        let matrix = row.insert_axis(Axis(0)).to_owned();
        match kind {
            ModelKind::Mlp => {
                let proba = self.mlp.predict_proba(&matrix)?;
                Ok(class_prediction(proba[[0, 1]]))
            }
            ModelKind::Logistic => {
                let proba = self.logistic.predict_proba(&matrix)?;
                Ok(class_prediction(proba[0]))
            }
            ModelKind::Hac => {
                let labels = self.clusterer.predict(&matrix)?;
                Ok(Prediction {
                    dangerous: labels[0] == 1,
                    confidence: None,
                })
            }
        }
    }

    /// Held-out metrics from the last training run
    pub fn metrics(&self) -> Result<&EnsembleMetrics> {
        self.metrics.as_ref().ok_or(AvalancheError::NotFitted)
    }
}

fn class_prediction(p_dangerous: f64) -> Prediction {
    let dangerous = p_dangerous >= 0.5;
    let confidence = if dangerous {
        p_dangerous
    } else {
        1.0 - p_dangerous
    };
    Prediction {
        dangerous,
        confidence: Some(confidence),
    }
}

//! Avalanche danger estimation from weather history
//!
//! Everything between a raw observation CSV and a danger prediction:
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV ingestion, cleaning, and aggregate statistics
//! - [`preprocessing`] - Feature standardization
//!
//! ## Modeling
//! - [`models`] - Neural network, logistic regression, agglomerative
//!   clustering, and the ensemble that trains them together
//! - [`search`] - Recursive feature-subset search
//!
//! ## Serving
//! - [`service`] - Lazy-initializing prediction façade
//! - [`server`] - REST API over the service

pub mod data;
pub mod error;
pub mod models;
pub mod preprocessing;
pub mod search;
pub mod server;
pub mod service;

pub use error::{AvalancheError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::data::{Dataset, WeatherObservation, FEATURE_COLUMNS, LABEL_COLUMN};
    pub use crate::error::{AvalancheError, Result};
    pub use crate::models::{
        AgglomerativeClustering, EnsembleConfig, LogisticRegression, MLPClassifier, MLPConfig,
        ModelEnsemble, ModelKind, Prediction,
    };
    pub use crate::preprocessing::StandardScaler;
    pub use crate::search::{SearchConfig, SearchObjective, SearchOutcome, SubsetSearch};
    pub use crate::service::{PredictionService, ServiceConfig, ServiceStatus};
}

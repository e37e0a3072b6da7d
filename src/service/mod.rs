//! Lazy-initializing prediction façade
//!
//! [`PredictionService`] owns everything the serving path needs: the
//! cleaned dataset, the fitted scaler, and the trained ensemble. The
//! first caller that needs them triggers load and training under a
//! write lock; every later caller shares the same immutable state
//! through an `Arc`. A failed initialization is sticky for the process
//! lifetime and keeps reporting the original failure class.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::data::{
    Dataset, DatasetSummary, LocationProfile, WeatherFeatureStats, WeatherObservation,
};
use crate::error::{AvalancheError, Result};
use crate::models::{EnsembleConfig, EnsembleMetrics, ModelEnsemble, ModelKind, Prediction};
use crate::preprocessing::StandardScaler;

/// Everything the service needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the cleaned-or-raw avalanche CSV
    pub data_path: PathBuf,
    /// Training knobs passed through to the ensemble
    pub ensemble: EnsembleConfig,
}

impl ServiceConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            ensemble: EnsembleConfig::default(),
        }
    }

    pub fn with_ensemble(mut self, ensemble: EnsembleConfig) -> Self {
        self.ensemble = ensemble;
        self
    }
}

/// Lifecycle of the lazily trained state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset, scaler, and models once training has succeeded
#[derive(Debug)]
pub struct ReadyState {
    pub dataset: Dataset,
    pub scaler: StandardScaler,
    pub ensemble: ModelEnsemble,
}

/// Which phase a sticky initialization failure came from
#[derive(Debug, Clone)]
enum InitFailure {
    Data(String),
    Training(String),
}

impl InitFailure {
    fn classify(error: &AvalancheError) -> Self {
        match error {
            AvalancheError::Load(_)
            | AvalancheError::MissingColumn(_)
            | AvalancheError::Io(_)
            | AvalancheError::DataUnavailable(_) => Self::Data(error.to_string()),
            other => Self::Training(other.to_string()),
        }
    }

    fn to_error(&self) -> AvalancheError {
        match self {
            Self::Data(message) => AvalancheError::DataUnavailable(message.clone()),
            Self::Training(message) => AvalancheError::Training(message.clone()),
        }
    }
}

enum ServiceState {
    Uninitialized,
    Loading,
    Ready(Arc<ReadyState>),
    Failed(InitFailure),
}

/// Thread-safe façade over load, training, and prediction
pub struct PredictionService {
    config: ServiceConfig,
    state: RwLock<ServiceState>,
}

impl PredictionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ServiceState::Uninitialized),
        }
    }

    /// Current lifecycle phase without forcing initialization.
    ///
    /// A write-locked state means another caller is mid-initialization.
    pub fn status(&self) -> ServiceStatus {
        match self.state.try_read() {
            Some(guard) => match &*guard {
                ServiceState::Uninitialized => ServiceStatus::Uninitialized,
                ServiceState::Loading => ServiceStatus::Loading,
                ServiceState::Ready(_) => ServiceStatus::Ready,
                ServiceState::Failed(_) => ServiceStatus::Failed,
            },
            None => ServiceStatus::Loading,
        }
    }

    /// Load and train on first use; return the shared trained state.
    ///
    /// Concurrent first callers block on the write lock and then observe
    /// the one state the winner produced. Both load and training run at
    /// most once per process.
    pub fn ensure_ready(&self) -> Result<Arc<ReadyState>> {
        {
            let state = self.state.read();
            match &*state {
                ServiceState::Ready(ready) => return Ok(Arc::clone(ready)),
                ServiceState::Failed(failure) => return Err(failure.to_error()),
                _ => {}
            }
        }

        let mut state = self.state.write();
        match &*state {
            ServiceState::Ready(ready) => return Ok(Arc::clone(ready)),
            ServiceState::Failed(failure) => return Err(failure.to_error()),
            _ => {}
        }

        *state = ServiceState::Loading;
        match self.initialize() {
            Ok(ready) => {
                let ready = Arc::new(ready);
                *state = ServiceState::Ready(Arc::clone(&ready));
                Ok(ready)
            }
            Err(err) => {
                error!(error = %err, "service initialization failed");
                let failure = InitFailure::classify(&err);
                let surfaced = failure.to_error();
                *state = ServiceState::Failed(failure);
                Err(surfaced)
            }
        }
    }

    fn initialize(&self) -> Result<ReadyState> {
        info!(path = %self.config.data_path.display(), "loading avalanche dataset");
        let dataset = Dataset::load_csv(&self.config.data_path)?;
        info!(rows = dataset.height(), "dataset cleaned");

        if dataset.is_empty() {
            return Err(AvalancheError::Training(
                "no trainable rows survived cleaning".to_string(),
            ));
        }

        let features = dataset.feature_matrix()?;
        let labels = dataset.labels()?;

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&features)?;

        let mut ensemble = ModelEnsemble::new(self.config.ensemble.clone());
        ensemble.train(&scaled, &labels)?;
        let metrics = ensemble.metrics()?;
        info!(
            mlp_accuracy = metrics.mlp_accuracy,
            logistic_accuracy = metrics.logistic_accuracy,
            n_train = metrics.n_train,
            n_test = metrics.n_test,
            "models trained"
        );

        Ok(ReadyState {
            dataset,
            scaler,
            ensemble,
        })
    }

    /// Predict one observation with the named model.
    ///
    /// The model name is validated before anything else, so a caller
    /// typo never triggers dataset loading or training.
    pub fn predict(&self, model: &str, observation: &WeatherObservation) -> Result<Prediction> {
        let kind: ModelKind = model.parse()?;
        let ready = self.ensure_ready()?;

        let vector = observation.to_feature_vector();
        let scaled = ready.scaler.transform_row(vector.view())?;
        ready.ensemble.predict(kind, scaled.view())
    }

    pub fn summary(&self) -> Result<DatasetSummary> {
        self.ensure_ready()?.dataset.summary()
    }

    pub fn location_profiles(&self) -> Result<Vec<LocationProfile>> {
        self.ensure_ready()?.dataset.location_profiles()
    }

    pub fn weather_stats(&self) -> Result<BTreeMap<String, WeatherFeatureStats>> {
        self.ensure_ready()?.dataset.weather_stats()
    }

    pub fn correlation_matrix(&self) -> Result<BTreeMap<String, BTreeMap<String, f64>>> {
        self.ensure_ready()?.dataset.correlation_matrix()
    }

    /// Held-out metrics recorded when the ensemble trained
    pub fn metrics(&self) -> Result<EnsembleMetrics> {
        Ok(self.ensure_ready()?.ensemble.metrics()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_csv() -> String {
        let mut csv = String::from(
            "Date,Location,Area,latitude,longitude,Depth,Width,maxtempC,mintempC,totalSnow_cm,\
             tempC,windspeedKmph,winddirDegree,precipMM,humidity,Dangerous\n",
        );
        for i in 0..20 {
            let dangerous = i < 10;
            let (snow, temp, label) = if dangerous {
                (40.0 + i as f64, -12.0, "TRUE")
            } else {
                (2.0 + i as f64 * 0.1, 4.0, "FALSE")
            };
            csv.push_str(&format!(
                "2020-01-{:02},North Bowl,North Bowl,61.1,-149.9,1.5,12,{},{},{},{},{},{},{},{},{}\n",
                (i % 28) + 1,
                temp + 3.0,
                temp - 3.0,
                snow,
                temp,
                15 + i,
                180,
                2.5,
                70 + (i % 20),
                label
            ));
        }
        csv
    }

    /// The returned file guard must outlive the service: the CSV is read
    /// lazily on first use.
    fn service_over(csv: &str) -> (PredictionService, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(csv.as_bytes()).unwrap();
        let config = ServiceConfig::new(file.path()).with_ensemble(EnsembleConfig {
            hidden_layers: vec![8],
            max_epochs: 100,
            ..Default::default()
        });
        (PredictionService::new(config), file)
    }

    #[test]
    fn test_predict_happy_path() {
        let (service, _csv) = service_over(&sample_csv());
        assert_eq!(service.status(), ServiceStatus::Uninitialized);

        let dangerous_day = WeatherObservation {
            total_snow_cm: 55.0,
            temp_c: -12.0,
            max_temp_c: -9.0,
            min_temp_c: -15.0,
            windspeed_kmph: 20.0,
            winddir_degree: 180.0,
            precip_mm: 2.5,
            humidity: 80.0,
        };

        let prediction = service.predict("mlp", &dangerous_day).unwrap();
        assert!(prediction.dangerous);
        let confidence = prediction.confidence.unwrap();
        assert!((0.5..=1.0).contains(&confidence));
        assert_eq!(service.status(), ServiceStatus::Ready);

        let hac = service.predict("hac", &dangerous_day).unwrap();
        assert!(hac.confidence.is_none());
    }

    #[test]
    fn test_unknown_model_does_not_initialize() {
        let service = PredictionService::new(ServiceConfig::new("/nonexistent/data.csv"));
        let result = service.predict("gradient boost", &WeatherObservation::default());

        assert!(matches!(result, Err(AvalancheError::UnknownModel(_))));
        assert_eq!(service.status(), ServiceStatus::Uninitialized);
    }

    #[test]
    fn test_missing_file_fails_sticky() {
        let service = PredictionService::new(ServiceConfig::new("/nonexistent/data.csv"));

        // First and later callers agree on the failure class.
        let first = service.predict("mlp", &WeatherObservation::default());
        assert!(matches!(first, Err(AvalancheError::DataUnavailable(_))));
        assert_eq!(service.status(), ServiceStatus::Failed);

        let second = service.predict("mlp", &WeatherObservation::default());
        assert!(matches!(second, Err(AvalancheError::DataUnavailable(_))));
    }

    #[test]
    fn test_concurrent_callers_share_one_state() {
        let (service, _csv) = service_over(&sample_csv());
        let service = Arc::new(service);

        let states: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let service = Arc::clone(&service);
                    scope.spawn(move || service.ensure_ready().unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for state in &states[1..] {
            assert!(Arc::ptr_eq(&states[0], state));
        }
    }

    #[test]
    fn test_statistics_pass_throughs() {
        let (service, _csv) = service_over(&sample_csv());

        let summary = service.summary().unwrap();
        assert_eq!(summary.total_records, 20);
        assert_eq!(summary.dangerous_count, 10);
        assert_eq!(summary.locations, 1);

        let profiles = service.location_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].location, "North Bowl");

        let stats = service.weather_stats().unwrap();
        assert_eq!(stats.len(), 8);
        assert!(stats.contains_key("totalSnow_cm"));

        let correlation = service.correlation_matrix().unwrap();
        assert_eq!(correlation.len(), 9);
    }

    #[test]
    fn test_metrics_report_split_sizes() {
        let (service, _csv) = service_over(&sample_csv());
        let metrics = service.metrics().unwrap();
        assert_eq!(metrics.n_train + metrics.n_test, 20);
        assert_eq!(metrics.n_test, 5);
    }
}

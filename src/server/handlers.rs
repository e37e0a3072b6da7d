//! Request handlers
//!
//! Every handler is a thin pass-through to [`PredictionService`]; the
//! service owns lazy initialization, so the first data or predict
//! request triggers load and training.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::Result;
use crate::data::{DatasetSummary, LocationProfile, WeatherFeatureStats, WeatherObservation};
use crate::models::Prediction;
use crate::service::{PredictionService, ServiceStatus};

// ============================================================================
// Health
// ============================================================================

pub async fn health(
    State(service): State<Arc<PredictionService>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let status = service.status();
    let code = match status {
        ServiceStatus::Failed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

// ============================================================================
// Dataset statistics
// ============================================================================

pub async fn data_summary(
    State(service): State<Arc<PredictionService>>,
) -> Result<Json<DatasetSummary>> {
    Ok(Json(service.summary()?))
}

pub async fn locations(
    State(service): State<Arc<PredictionService>>,
) -> Result<Json<Vec<LocationProfile>>> {
    Ok(Json(service.location_profiles()?))
}

pub async fn weather_stats(
    State(service): State<Arc<PredictionService>>,
) -> Result<Json<BTreeMap<String, WeatherFeatureStats>>> {
    Ok(Json(service.weather_stats()?))
}

pub async fn correlation(
    State(service): State<Arc<PredictionService>>,
) -> Result<Json<BTreeMap<String, BTreeMap<String, f64>>>> {
    Ok(Json(service.correlation_matrix()?))
}

// ============================================================================
// Prediction
// ============================================================================

fn default_model() -> String {
    "mlp".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Which model answers; defaults to the network
    #[serde(default = "default_model")]
    pub model: String,
    /// Weather fields at the top level of the request body
    #[serde(flatten)]
    pub observation: WeatherObservation,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub model: String,
    #[serde(flatten)]
    pub prediction: Prediction,
}

pub async fn predict(
    State(service): State<Arc<PredictionService>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let prediction = service.predict(&request.model, &request.observation)?;
    Ok(Json(PredictResponse {
        model: request.model,
        prediction,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_request_defaults_to_mlp() {
        let request: PredictRequest =
            serde_json::from_str(r#"{"totalSnow_cm": 40.0}"#).unwrap();
        assert_eq!(request.model, "mlp");
        assert_eq!(request.observation.total_snow_cm, 40.0);
        assert_eq!(request.observation.humidity, 0.0);
    }

    #[test]
    fn test_predict_request_flattens_observation() {
        let request: PredictRequest = serde_json::from_str(
            r#"{"model": "hac", "tempC": -5.0, "humidity": 80.0}"#,
        )
        .unwrap();
        assert_eq!(request.model, "hac");
        assert_eq!(request.observation.temp_c, -5.0);
        assert_eq!(request.observation.humidity, 80.0);
    }

    #[test]
    fn test_predict_response_shape() {
        let response = PredictResponse {
            model: "mlp".to_string(),
            prediction: Prediction {
                dangerous: true,
                confidence: Some(0.9),
            },
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["model"], "mlp");
        assert_eq!(value["prediction"], true);
        assert_eq!(value["confidence"], 0.9);
    }

    #[test]
    fn test_cluster_response_omits_confidence() {
        let response = PredictResponse {
            model: "hac".to_string(),
            prediction: Prediction {
                dangerous: false,
                confidence: None,
            },
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["prediction"], false);
        assert!(value.get("confidence").is_none());
    }
}

//! Avalanche observation data: loading, cleaning, and aggregate statistics
//!
//! One row = one avalanche-adjacent event: a date, a location, eight numeric
//! weather measurements, and a boolean danger label. Everything downstream
//! (scaler, models, search) consumes the feature columns in the fixed order
//! defined here.

mod dataset;
mod ingest;

pub use dataset::{
    Dataset, DatasetSummary, DateRange, LocationProfile, WeatherFeatureStats,
};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Weather feature columns in model-input order.
///
/// This ordering is load-bearing: the scaler and every model are fitted
/// against it, so any code building a feature vector must follow it.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "maxtempC",
    "mintempC",
    "totalSnow_cm",
    "tempC",
    "windspeedKmph",
    "winddirDegree",
    "precipMM",
    "humidity",
];

/// Ground-truth danger label column
pub const LABEL_COLUMN: &str = "Dangerous";

/// Auxiliary dimensional columns: zero-filled when uncoercible, never
/// required for the feature vector
pub const AUX_COLUMNS: [&str; 2] = ["Depth", "Width"];

/// A single weather observation for prediction.
///
/// Field names mirror the dataset columns so JSON request bodies
/// deserialize directly. Missing fields default to `0.0`, matching the
/// dashboard's partial-form behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherObservation {
    #[serde(default, rename = "maxtempC")]
    pub max_temp_c: f64,
    #[serde(default, rename = "mintempC")]
    pub min_temp_c: f64,
    #[serde(default, rename = "totalSnow_cm")]
    pub total_snow_cm: f64,
    #[serde(default, rename = "tempC")]
    pub temp_c: f64,
    #[serde(default, rename = "windspeedKmph")]
    pub windspeed_kmph: f64,
    #[serde(default, rename = "winddirDegree")]
    pub winddir_degree: f64,
    #[serde(default, rename = "precipMM")]
    pub precip_mm: f64,
    #[serde(default)]
    pub humidity: f64,
}

impl WeatherObservation {
    /// Flatten into a feature vector ordered as [`FEATURE_COLUMNS`]
    pub fn to_feature_vector(&self) -> Array1<f64> {
        Array1::from_vec(vec![
            self.max_temp_c,
            self.min_temp_c,
            self.total_snow_cm,
            self.temp_c,
            self.windspeed_kmph,
            self.winddir_degree,
            self.precip_mm,
            self.humidity,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_ordering() {
        let obs = WeatherObservation {
            max_temp_c: 1.0,
            min_temp_c: 2.0,
            total_snow_cm: 3.0,
            temp_c: 4.0,
            windspeed_kmph: 5.0,
            winddir_degree: 6.0,
            precip_mm: 7.0,
            humidity: 8.0,
        };
        let v = obs.to_feature_vector();
        assert_eq!(v.len(), FEATURE_COLUMNS.len());
        for (i, &x) in v.iter().enumerate() {
            assert_eq!(x, (i + 1) as f64);
        }
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let obs: WeatherObservation =
            serde_json::from_str(r#"{"maxtempC": 5.0, "humidity": 80.0}"#).unwrap();
        assert_eq!(obs.max_temp_c, 5.0);
        assert_eq!(obs.humidity, 80.0);
        assert_eq!(obs.temp_c, 0.0);
        assert_eq!(obs.precip_mm, 0.0);
    }

    #[test]
    fn test_observation_roundtrip_keys() {
        let obs = WeatherObservation::default();
        let json = serde_json::to_value(&obs).unwrap();
        for col in FEATURE_COLUMNS {
            assert!(json.get(col).is_some(), "missing key {col}");
        }
    }
}

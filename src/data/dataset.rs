//! The cleaned dataset and its read-only aggregate statistics

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{ingest, FEATURE_COLUMNS, LABEL_COLUMN};
use crate::error::{AvalancheError, Result};

const DATE_COLUMN: &str = "Date";
const LOCATION_COLUMN: &str = "Location";
const AREA_COLUMN: &str = "Area";
const LATITUDE_COLUMN: &str = "latitude";
const LONGITUDE_COLUMN: &str = "longitude";
const DEPTH_COLUMN: &str = "Depth";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Summary statistics over the cleaned dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub dangerous_count: usize,
    pub safe_count: usize,
    pub locations: usize,
    pub date_range: DateRange,
}

/// Observed date span, ISO-formatted when parseable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Per-location aggregates for the dashboard map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationProfile {
    #[serde(rename = "Location")]
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_events: usize,
    pub dangerous_events: usize,
    pub avg_depth: f64,
    pub danger_rate: f64,
}

/// Descriptive statistics for one weather feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherFeatureStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// A cleaned, immutable avalanche observation table.
///
/// Construction always runs the full cleaning pass, so every accessor can
/// rely on the required columns being non-null f64 and the label boolean.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

impl Dataset {
    /// Load and clean a CSV file
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let raw = ingest::read_csv(path.as_ref())?;
        Self::from_dataframe(raw)
    }

    /// Clean an in-memory frame (shared entry point for tests and loaders)
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        let df = ingest::clean(df)?;
        Ok(Self { df })
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Access the underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Feature matrix (rows × [`FEATURE_COLUMNS`]) for the modeling path
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        let mut columns: Vec<Float64Chunked> = Vec::with_capacity(FEATURE_COLUMNS.len());
        for col in FEATURE_COLUMNS {
            let ca = self.float_column(col)?;
            columns.push(ca);
        }

        Ok(Array2::from_shape_fn(
            (self.df.height(), columns.len()),
            |(i, j)| columns[j].get(i).unwrap_or(0.0),
        ))
    }

    /// Danger labels as 0.0/1.0
    pub fn labels(&self) -> Result<Array1<f64>> {
        let series = self.df.column(LABEL_COLUMN)?.as_materialized_series();
        let ca = series
            .bool()
            .map_err(|e| AvalancheError::Load(e.to_string()))?;
        Ok(ca
            .into_iter()
            .map(|opt| if opt.unwrap_or(false) { 1.0 } else { 0.0 })
            .collect())
    }

    /// Headline counts and the observed date span
    pub fn summary(&self) -> Result<DatasetSummary> {
        let dangerous_count = self.dangerous_count()?;
        let total_records = self.df.height();

        Ok(DatasetSummary {
            total_records,
            dangerous_count,
            safe_count: total_records - dangerous_count,
            locations: self.distinct_locations()?,
            date_range: self.date_range()?,
        })
    }

    /// Aggregates grouped by (area, latitude, longitude)
    pub fn location_profiles(&self) -> Result<Vec<LocationProfile>> {
        let area = self.string_column(AREA_COLUMN)?;
        let latitude = self.float_column(LATITUDE_COLUMN)?;
        let longitude = self.float_column(LONGITUDE_COLUMN)?;
        let label = self
            .df
            .column(LABEL_COLUMN)?
            .as_materialized_series()
            .bool()
            .map_err(|e| AvalancheError::Load(e.to_string()))?
            .clone();
        let depth = if self.df.column(DEPTH_COLUMN).is_ok() {
            Some(self.float_column(DEPTH_COLUMN)?)
        } else {
            None
        };

        struct Acc {
            total: usize,
            dangerous: usize,
            depth_sum: f64,
        }

        let mut groups: BTreeMap<(String, u64, u64), (f64, f64, Acc)> = BTreeMap::new();
        for i in 0..self.df.height() {
            let (name, lat, lon) = match (area.get(i), latitude.get(i), longitude.get(i)) {
                (Some(name), Some(lat), Some(lon)) => (name.to_string(), lat, lon),
                _ => continue,
            };
            let entry = groups
                .entry((name, lat.to_bits(), lon.to_bits()))
                .or_insert((
                    lat,
                    lon,
                    Acc {
                        total: 0,
                        dangerous: 0,
                        depth_sum: 0.0,
                    },
                ));
            entry.2.total += 1;
            if label.get(i).unwrap_or(false) {
                entry.2.dangerous += 1;
            }
            if let Some(ref depth_ca) = depth {
                entry.2.depth_sum += depth_ca.get(i).unwrap_or(0.0);
            }
        }

        let mut profiles: Vec<LocationProfile> = groups
            .into_iter()
            .map(|((name, _, _), (lat, lon, acc))| LocationProfile {
                location: name,
                latitude: lat,
                longitude: lon,
                total_events: acc.total,
                dangerous_events: acc.dangerous,
                avg_depth: acc.depth_sum / acc.total as f64,
                danger_rate: acc.dangerous as f64 / acc.total as f64,
            })
            .collect();
        profiles.sort_by(|a, b| {
            a.location
                .cmp(&b.location)
                .then(a.latitude.total_cmp(&b.latitude))
                .then(a.longitude.total_cmp(&b.longitude))
        });
        Ok(profiles)
    }

    /// Mean/std/min/max per weather feature (sample std, as the dashboard
    /// always displayed)
    pub fn weather_stats(&self) -> Result<BTreeMap<String, WeatherFeatureStats>> {
        let mut stats = BTreeMap::new();
        for col in FEATURE_COLUMNS {
            let ca = self.float_column(col)?;
            stats.insert(
                col.to_string(),
                WeatherFeatureStats {
                    mean: ca.mean().unwrap_or(0.0),
                    std: ca.std(1).unwrap_or(0.0),
                    min: ca.min().unwrap_or(0.0),
                    max: ca.max().unwrap_or(0.0),
                },
            );
        }
        Ok(stats)
    }

    /// Pairwise Pearson correlation over the features plus the label.
    ///
    /// Zero-variance columns correlate 0.0 with everything rather than NaN,
    /// so the result always serializes.
    pub fn correlation_matrix(&self) -> Result<BTreeMap<String, BTreeMap<String, f64>>> {
        let mut named: Vec<(String, Vec<f64>)> = Vec::with_capacity(FEATURE_COLUMNS.len() + 1);
        for col in FEATURE_COLUMNS {
            let ca = self.float_column(col)?;
            let values: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            named.push((col.to_string(), values));
        }
        named.push((LABEL_COLUMN.to_string(), self.labels()?.to_vec()));

        let mut matrix = BTreeMap::new();
        for (name_a, values_a) in &named {
            let mut row = BTreeMap::new();
            for (name_b, values_b) in &named {
                row.insert(name_b.clone(), pearson(values_a, values_b));
            }
            matrix.insert(name_a.clone(), row);
        }
        Ok(matrix)
    }

    fn dangerous_count(&self) -> Result<usize> {
        let series = self.df.column(LABEL_COLUMN)?.as_materialized_series();
        let ca = series
            .bool()
            .map_err(|e| AvalancheError::Load(e.to_string()))?;
        Ok(ca.into_iter().filter(|v| v.unwrap_or(false)).count())
    }

    fn distinct_locations(&self) -> Result<usize> {
        let ca = self.string_column(LOCATION_COLUMN)?;
        let mut seen: HashSet<&str> = HashSet::new();
        for opt in ca.into_iter() {
            if let Some(v) = opt {
                seen.insert(v);
            }
        }
        Ok(seen.len())
    }

    fn date_range(&self) -> Result<DateRange> {
        let ca = self.string_column(DATE_COLUMN)?;

        let mut parsed: Vec<NaiveDate> = Vec::new();
        let mut raw: Vec<&str> = Vec::new();
        for opt in ca.into_iter() {
            let Some(text) = opt else { continue };
            raw.push(text);
            for fmt in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                    parsed.push(date);
                    break;
                }
            }
        }

        if let (Some(start), Some(end)) = (parsed.iter().min(), parsed.iter().max()) {
            return Ok(DateRange {
                start: Some(start.format("%Y-%m-%d").to_string()),
                end: Some(end.format("%Y-%m-%d").to_string()),
            });
        }

        // Unparseable formats fall back to lexicographic order
        Ok(DateRange {
            start: raw.iter().min().map(|s| s.to_string()),
            end: raw.iter().max().map(|s| s.to_string()),
        })
    }

    fn float_column(&self, name: &str) -> Result<Float64Chunked> {
        let series = self
            .df
            .column(name)
            .map_err(|_| AvalancheError::MissingColumn(name.to_string()))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| AvalancheError::Load(e.to_string()))?;
        Ok(series
            .f64()
            .map_err(|e| AvalancheError::Load(e.to_string()))?
            .clone())
    }

    fn string_column(&self, name: &str) -> Result<StringChunked> {
        let series = self
            .df
            .column(name)
            .map_err(|_| AvalancheError::MissingColumn(name.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)
            .map_err(|e| AvalancheError::Load(e.to_string()))?;
        Ok(series
            .str()
            .map_err(|e| AvalancheError::Load(e.to_string()))?
            .clone())
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n == 0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&xa, &xb) in a.iter().zip(b.iter()) {
        let da = xa - mean_a;
        let db = xb - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov / denom
    }
}

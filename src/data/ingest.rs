//! CSV loading and the cleaning rules that turn raw scraped rows into a
//! modeling-ready table

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::data::{AUX_COLUMNS, FEATURE_COLUMNS, LABEL_COLUMN};
use crate::error::{AvalancheError, Result};

/// Read a CSV file with header inference
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| AvalancheError::Load(format!("{}: {}", path.display(), e)))?;

    let reader = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file);

    reader
        .finish()
        .map_err(|e| AvalancheError::Load(e.to_string()))
}

/// Apply the cleaning rules, in order:
///
/// 1. every feature column and the label column must exist;
/// 2. rows with missing required values are dropped;
/// 3. the label is normalized to boolean (`"TRUE"`/`"FALSE"` text, an
///    existing boolean, or a numeric zero/nonzero; anything else fails);
/// 4. feature columns are coerced to f64 with failed parses becoming
///    missing; `Depth`/`Width` zero-fill instead;
/// 5. rows left with missing or NaN required values are dropped again.
pub(crate) fn clean(mut df: DataFrame) -> Result<DataFrame> {
    let required = required_columns();

    for col in &required {
        if df.column(col).is_err() {
            return Err(AvalancheError::MissingColumn((*col).to_string()));
        }
    }

    df = drop_incomplete_rows(&df, &required)?;
    df = normalize_label(df)?;

    for col in FEATURE_COLUMNS {
        let coerced = df
            .column(col)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        df.with_column(coerced)?;
    }

    for col in AUX_COLUMNS {
        if df.column(col).is_err() {
            continue;
        }
        let filled = {
            let coerced = df
                .column(col)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let ca = coerced
                .f64()
                .map_err(|e| AvalancheError::Load(e.to_string()))?;
            let filled: Float64Chunked = ca
                .into_iter()
                .map(|opt| match opt {
                    Some(v) if !v.is_nan() => Some(v),
                    _ => Some(0.0),
                })
                .collect();
            filled.with_name(col.into()).into_series()
        };
        df.with_column(filled)?;
    }

    drop_incomplete_rows(&df, &required)
}

fn required_columns() -> Vec<&'static str> {
    let mut cols = FEATURE_COLUMNS.to_vec();
    cols.push(LABEL_COLUMN);
    cols
}

/// Keep only rows where every listed column is non-null (and non-NaN for
/// float columns)
fn drop_incomplete_rows(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let mut mask: Option<BooleanChunked> = None;

    for col in columns {
        let series = df.column(col)?.as_materialized_series();
        let mut keep = series.is_not_null();
        if let Ok(ca) = series.f64() {
            keep = &keep & &ca.is_not_nan();
        }
        mask = Some(match mask {
            Some(acc) => &acc & &keep,
            None => keep,
        });
    }

    let mask = match mask {
        Some(m) => m,
        None => return Ok(df.clone()),
    };

    df.filter(&mask)
        .map_err(|e| AvalancheError::Load(e.to_string()))
}

/// Normalize the danger label to a boolean column
fn normalize_label(mut df: DataFrame) -> Result<DataFrame> {
    let normalized = {
        let series = df.column(LABEL_COLUMN)?.as_materialized_series();

        match series.dtype() {
            DataType::Boolean => series
                .bool()
                .map_err(|e| AvalancheError::Load(e.to_string()))?
                .clone(),
            DataType::String => {
                let ca = series
                    .str()
                    .map_err(|e| AvalancheError::Load(e.to_string()))?;
                let mut values: Vec<Option<bool>> = Vec::with_capacity(ca.len());
                for opt in ca.into_iter() {
                    match opt {
                        Some("TRUE") => values.push(Some(true)),
                        Some("FALSE") => values.push(Some(false)),
                        Some(other) => {
                            return Err(AvalancheError::Load(format!(
                                "unrecognized danger label {:?} (expected TRUE or FALSE)",
                                other
                            )))
                        }
                        None => values.push(None),
                    }
                }
                values.into_iter().collect()
            }
            dtype => {
                let coerced = series.cast(&DataType::Float64).map_err(|_| {
                    AvalancheError::Load(format!(
                        "label column '{}' has unsupported type {}",
                        LABEL_COLUMN, dtype
                    ))
                })?;
                let ca = coerced
                    .f64()
                    .map_err(|e| AvalancheError::Load(e.to_string()))?;
                ca.into_iter().map(|opt| opt.map(|v| v != 0.0)).collect()
            }
        }
    };

    df.with_column(normalized.with_name(LABEL_COLUMN.into()).into_series())?;
    Ok(df)
}

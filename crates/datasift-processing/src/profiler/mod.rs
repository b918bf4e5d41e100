//! Data profiling module for dataset analysis.
//!
//! Produces the [`DatasetProfile`] rendered by the HTML report: shape,
//! duplicate and missing-cell counts, and per-column statistics.

mod statistics;

use crate::types::{ColumnProfile, DatasetProfile};
use crate::utils::{DtypeCategory, cell_text, get_dtype_category};
use anyhow::Result;
use polars::prelude::*;
use rand::prelude::*;

pub(crate) use statistics::extract_column_characteristics;

/// Maximum number of sampled values per column.
pub const SAMPLE_SIZE: usize = 10;

/// String columns with at most this many distinct values are categorical.
const CATEGORICAL_MAX_UNIQUE: usize = 20;

/// Data profiler for analyzing dataset structure and characteristics.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile an entire dataset.
    pub fn profile_dataset(df: &DataFrame) -> Result<DatasetProfile> {
        let mut column_profiles = Vec::with_capacity(df.width());
        for col_name in df.get_column_names() {
            column_profiles.push(Self::profile_column(df, col_name)?);
        }

        let duplicate_count = if df.height() > 1 && df.width() > 0 {
            df.height()
                - df.unique_stable(None, UniqueKeepStrategy::First, None)?
                    .height()
        } else {
            0
        };

        let missing_cells: usize = column_profiles.iter().map(|c| c.null_count).sum();
        let total_cells = df.height() * df.width();

        Ok(DatasetProfile {
            shape: (df.height(), df.width()),
            column_profiles,
            missing_cells,
            missing_cells_percentage: percentage(missing_cells, total_cells),
            duplicate_count,
            duplicate_percentage: percentage(duplicate_count, df.height()),
            estimated_size_bytes: df.estimated_size(),
        })
    }

    fn profile_column(df: &DataFrame, col_name: &str) -> Result<ColumnProfile> {
        let series = df.column(col_name)?.as_materialized_series();
        let dtype = format!("{}", series.dtype());
        let null_count = series.null_count();
        let unique_count = series.drop_nulls().n_unique()?;

        let inferred_type = infer_kind(series.dtype(), unique_count, df.height() - null_count);
        let characteristics =
            extract_column_characteristics(series, inferred_type, unique_count)?;

        Ok(ColumnProfile {
            name: col_name.to_string(),
            dtype,
            inferred_type: inferred_type.to_string(),
            unique_count,
            null_count,
            null_percentage: percentage(null_count, df.height()),
            sample_values: Self::sample_values(series),
            characteristics,
        })
    }

    /// Up to [`SAMPLE_SIZE`] non-null values, chosen with a fixed seed so
    /// the same table always yields the same sample.
    pub fn sample_values(series: &Series) -> Vec<String> {
        let non_null = series.drop_nulls();
        if non_null.is_empty() {
            return Vec::new();
        }

        let sample_size = SAMPLE_SIZE.min(non_null.len());
        let mut rng = StdRng::seed_from_u64(42);
        let indices: Vec<usize> = (0..non_null.len()).collect();
        let mut sampled: Vec<usize> = indices
            .choose_multiple(&mut rng, sample_size)
            .copied()
            .collect();
        sampled.sort_unstable();

        sampled
            .into_iter()
            .filter_map(|idx| cell_text(&non_null, idx))
            .collect()
    }
}

fn infer_kind(dtype: &DataType, unique_count: usize, non_null: usize) -> &'static str {
    if non_null == 0 {
        return "empty";
    }
    match get_dtype_category(dtype) {
        DtypeCategory::Numeric => "numeric",
        DtypeCategory::Boolean => "boolean",
        DtypeCategory::String if unique_count <= CATEGORICAL_MAX_UNIQUE => "categorical",
        DtypeCategory::String | DtypeCategory::Other => "text",
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

//! Shared utilities for the ingestion pipeline.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for profiling purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Cell Parsing Utilities
// =============================================================================

/// Values read as missing by default (pandas `na_values`).
pub const DEFAULT_MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parse a boolean literal.
///
/// Only the spellings `True`, `TRUE`, `true` and their `False` counterparts
/// are accepted; "yes", "1" and friends stay numeric or text.
pub fn parse_bool_literal(s: &str) -> Option<bool> {
    match s.trim() {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Parse an integer cell, ignoring surrounding whitespace.
pub fn parse_int_cell(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

/// Parse a floating point cell, ignoring surrounding whitespace.
pub fn parse_float_cell(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

// =============================================================================
// Series Access Utilities
// =============================================================================

/// Render one cell as plain text (`None` for nulls).
///
/// Strings are returned without the quoting that `AnyValue`'s `Display`
/// adds, so the text can be written into HTML or compared directly.
pub fn cell_text(series: &Series, idx: usize) -> Option<String> {
    match series.dtype() {
        DataType::String => series
            .str()
            .ok()
            .and_then(|ca| ca.get(idx))
            .map(str::to_string),
        DataType::Boolean => series
            .bool()
            .ok()
            .and_then(|ca| ca.get(idx))
            .map(|v| if v { "True" } else { "False" }.to_string()),
        DataType::Int64 => series
            .i64()
            .ok()
            .and_then(|ca| ca.get(idx))
            .map(|v| v.to_string()),
        DataType::Float64 => series
            .f64()
            .ok()
            .and_then(|ca| ca.get(idx))
            .map(format_float),
        _ => match series.get(idx) {
            Ok(AnyValue::Null) | Err(_) => None,
            Ok(val) => Some(format!("{}", val)),
        },
    }
}

/// Format a float for display, trimming noise past six decimals.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else if value.is_finite() {
        let text = format!("{:.6}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        value.to_string()
    }
}

/// Collect the non-null values of a numeric Series as f64.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let float_series = series.drop_nulls().cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().flatten().collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(
            get_dtype_category(&DataType::Boolean),
            DtypeCategory::Boolean
        );
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Other);
    }

    #[test]
    fn test_parse_bool_literal() {
        assert_eq!(parse_bool_literal("True"), Some(true));
        assert_eq!(parse_bool_literal("FALSE"), Some(false));
        assert_eq!(parse_bool_literal(" true "), Some(true));
        assert_eq!(parse_bool_literal("yes"), None);
        assert_eq!(parse_bool_literal("1"), None);
    }

    #[test]
    fn test_parse_numeric_cells() {
        assert_eq!(parse_int_cell("42"), Some(42));
        assert_eq!(parse_int_cell(" -7 "), Some(-7));
        assert_eq!(parse_int_cell("4.2"), None);
        assert_eq!(parse_float_cell("4.2"), Some(4.2));
        assert_eq!(parse_float_cell("1e3"), Some(1000.0));
        assert_eq!(parse_float_cell(""), None);
        assert_eq!(parse_float_cell("abc"), None);
    }

    #[test]
    fn test_cell_text() {
        let strings = Series::new("s".into(), &[Some("a"), None]);
        assert_eq!(cell_text(&strings, 0), Some("a".to_string()));
        assert_eq!(cell_text(&strings, 1), None);

        let floats = Series::new("f".into(), &[Some(2.0f64), Some(0.125)]);
        assert_eq!(cell_text(&floats, 0), Some("2.0".to_string()));
        assert_eq!(cell_text(&floats, 1), Some("0.125".to_string()));

        let bools = Series::new("b".into(), &[true]);
        assert_eq!(cell_text(&bools, 0), Some("True".to_string()));
    }

    #[test]
    fn test_numeric_values_skips_nulls() {
        let series = Series::new("n".into(), &[Some(1i64), None, Some(3)]);
        assert_eq!(numeric_values(&series).unwrap(), vec![1.0, 3.0]);
    }
}

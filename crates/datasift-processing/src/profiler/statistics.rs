//! Statistical analysis functions for column profiling.

use crate::utils::{cell_text, numeric_values};
use anyhow::Result;
use polars::prelude::*;
use serde_json::json;
use std::collections::HashMap;

/// Number of most frequent values kept for string columns.
pub(crate) const TOP_VALUES: usize = 5;

/// Extract statistical characteristics from a column.
///
/// `kind` is the profiler's kind label ("numeric", "boolean", "categorical",
/// "text" or "empty").
pub(crate) fn extract_column_characteristics(
    series: &Series,
    kind: &str,
    unique_count: usize,
) -> Result<HashMap<String, serde_json::Value>> {
    let mut characteristics = HashMap::new();

    let cardinality = if unique_count < 10 {
        "low"
    } else if unique_count < 50 {
        "medium"
    } else {
        "high"
    };
    characteristics.insert("cardinality".to_string(), json!(cardinality));

    match kind {
        "numeric" => {
            let values = numeric_values(series)?;
            if !values.is_empty() {
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);

                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let std = calculate_std(&values);
                let skewness = calculate_skewness(&values);

                characteristics.insert("min".to_string(), json!(sorted[0]));
                characteristics.insert("max".to_string(), json!(sorted[sorted.len() - 1]));
                characteristics.insert("mean".to_string(), json!(mean));
                characteristics.insert("median".to_string(), json!(median(&sorted)));
                characteristics.insert("std".to_string(), json!(std));
                characteristics.insert("skewness".to_string(), json!(skewness));
                characteristics.insert("has_outliers".to_string(), json!(detect_outliers(&sorted)));

                let distribution = if skewness.abs() < 1.0 {
                    "normal"
                } else {
                    "skewed"
                };
                characteristics.insert("distribution".to_string(), json!(distribution));
            }
        }
        "boolean" => {
            if let Ok(ca) = series.bool() {
                let true_count = ca.into_iter().filter(|v| *v == Some(true)).count();
                let false_count = ca.into_iter().filter(|v| *v == Some(false)).count();
                characteristics.insert("true_count".to_string(), json!(true_count));
                characteristics.insert("false_count".to_string(), json!(false_count));
            }
        }
        "categorical" | "text" => {
            let frequencies = value_frequencies(series)?;
            if let Some((most_frequent, _)) = frequencies.first() {
                characteristics.insert("most_frequent".to_string(), json!(most_frequent));

                let counts: Vec<f64> = frequencies.iter().map(|(_, c)| *c as f64).collect();
                if counts.len() > 1 {
                    let counts_mean: f64 = counts.iter().sum::<f64>() / counts.len() as f64;
                    let variance: f64 = counts
                        .iter()
                        .map(|c| (c - counts_mean).powi(2))
                        .sum::<f64>()
                        / counts.len() as f64;

                    let freq_dist = if variance.sqrt() < counts_mean {
                        "balanced"
                    } else {
                        "imbalanced"
                    };
                    characteristics.insert("frequency_distribution".to_string(), json!(freq_dist));
                }

                let top: Vec<serde_json::Value> = frequencies
                    .iter()
                    .take(TOP_VALUES)
                    .map(|(value, count)| json!([value, count]))
                    .collect();
                characteristics.insert("top_values".to_string(), json!(top));
            }
        }
        _ => {}
    }

    Ok(characteristics)
}

/// Non-null values with their counts, most frequent first.
///
/// Ties are broken by value so the order does not depend on hashing.
pub(crate) fn value_frequencies(series: &Series) -> Result<Vec<(String, usize)>> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return Ok(Vec::new());
    }

    let value_counts = non_null.value_counts(true, false, "count".into(), false)?;
    let values = value_counts
        .column(non_null.name())?
        .as_materialized_series()
        .clone();
    let counts = value_counts
        .column("count")?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    let counts = counts.u64()?;

    let mut frequencies: Vec<(String, usize)> = (0..value_counts.height())
        .filter_map(|idx| {
            let value = cell_text(&values, idx)?;
            let count = counts.get(idx)? as usize;
            Some((value, count))
        })
        .collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(frequencies)
}

/// Sample standard deviation.
pub(crate) fn calculate_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n <= 1.0 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / n;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Skewness (third standardized moment, using the sample std).
pub(crate) fn calculate_skewness(values: &[f64]) -> f64 {
    let std = calculate_std(values);
    if std == 0.0 {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let skew_sum: f64 = values.iter().map(|v| ((v - mean) / std).powi(3)).sum();
    skew_sum / n
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Whether more than 5% of values fall outside 1.5 IQR. Expects sorted input.
pub(crate) fn detect_outliers(sorted: &[f64]) -> bool {
    let n = sorted.len();
    if n < 4 {
        return false;
    }

    let q1 = sorted[(n as f64 * 0.25) as usize];
    let q3 = sorted[(n as f64 * 0.75) as usize];
    let iqr = q3 - q1;

    let lower_bound = q1 - 1.5 * iqr;
    let upper_bound = q3 + 1.5 * iqr;

    let outlier_count = sorted
        .iter()
        .filter(|v| **v < lower_bound || **v > upper_bound)
        .count();

    outlier_count > n / 20
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== calculate_std tests ====================

    #[test]
    fn test_calculate_std_basic() {
        // Mean 3, variance 10/4, std ~1.58
        let std = calculate_std(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((std - 1.58).abs() < 0.01);
    }

    #[test]
    fn test_calculate_std_degenerate() {
        assert_eq!(calculate_std(&[5.0]), 0.0);
        assert_eq!(calculate_std(&[]), 0.0);
        assert_eq!(calculate_std(&[5.0, 5.0, 5.0]), 0.0);
    }

    // ==================== calculate_skewness tests ====================

    #[test]
    fn test_calculate_skewness() {
        assert!(calculate_skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]).abs() < 0.1);
        assert!(calculate_skewness(&[1.0, 1.0, 1.0, 1.0, 10.0]) > 0.0);
        assert_eq!(calculate_skewness(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    // ==================== detect_outliers tests ====================

    #[test]
    fn test_detect_outliers() {
        assert!(detect_outliers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0]));
        assert!(!detect_outliers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]));
        assert!(!detect_outliers(&[1.0, 2.0, 100.0]));
        assert!(!detect_outliers(&[5.0, 5.0, 5.0, 5.0, 5.0]));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    // ==================== characteristics tests ====================

    #[test]
    fn test_characteristics_numeric_column() {
        let series = Series::new("price".into(), &[Some(10i64), Some(20), None, Some(30)]);
        let chars = extract_column_characteristics(&series, "numeric", 3).unwrap();

        assert_eq!(chars["cardinality"], json!("low"));
        assert_eq!(chars["min"], json!(10.0));
        assert_eq!(chars["max"], json!(30.0));
        assert!((chars["mean"].as_f64().unwrap() - 20.0).abs() < 1e-9);
        assert!(chars.contains_key("std"));
        assert!(chars.contains_key("has_outliers"));
    }

    #[test]
    fn test_characteristics_text_column() {
        let series = Series::new("category".into(), &["b", "a", "b", "a", "b", "c"]);
        let chars = extract_column_characteristics(&series, "categorical", 3).unwrap();

        assert_eq!(chars["most_frequent"], json!("b"));
        assert_eq!(chars["top_values"], json!([["b", 3], ["a", 2], ["c", 1]]));
        assert!(chars.contains_key("frequency_distribution"));
    }

    #[test]
    fn test_characteristics_boolean_column() {
        let series = Series::new("flag".into(), &[Some(true), Some(false), Some(true), None]);
        let chars = extract_column_characteristics(&series, "boolean", 2).unwrap();
        assert_eq!(chars["true_count"], json!(2));
        assert_eq!(chars["false_count"], json!(1));
    }

    #[test]
    fn test_cardinality_bands() {
        let series = Series::new("val".into(), &[1.0f64, 2.0, 3.0]);
        let medium = extract_column_characteristics(&series, "numeric", 25).unwrap();
        let high = extract_column_characteristics(&series, "numeric", 100).unwrap();
        assert_eq!(medium["cardinality"], json!("medium"));
        assert_eq!(high["cardinality"], json!("high"));
    }

    #[test]
    fn test_characteristics_all_null_numeric() {
        let series = Series::new("val".into(), &[None::<f64>, None]);
        let chars = extract_column_characteristics(&series, "numeric", 0).unwrap();
        assert!(chars.contains_key("cardinality"));
        assert!(!chars.contains_key("mean"));
    }
}

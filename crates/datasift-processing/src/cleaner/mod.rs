//! Row-level cleaning of loaded tables.
//!
//! Two filters, applied in order and each gated by [`CleaningPolicy`]:
//! - exact duplicate rows are removed, keeping the first occurrence
//! - rows with at least one missing cell are removed
//!
//! Both preserve the relative order of the surviving rows and are
//! idempotent, so cleaning an already cleaned table is a no-op.

use crate::config::CleaningPolicy;
use crate::error::{Result, ResultExt};
use crate::types::CleaningSummary;
use polars::prelude::*;
use tracing::{debug, info};

/// Applies a [`CleaningPolicy`] to tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner {
    policy: CleaningPolicy,
}

impl Cleaner {
    pub fn new(policy: CleaningPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CleaningPolicy {
        self.policy
    }

    /// Clean `df` according to the policy.
    pub fn clean(&self, df: DataFrame) -> Result<(DataFrame, CleaningSummary)> {
        let rows_before = df.height();
        let mut summary = CleaningSummary {
            rows_before,
            ..Default::default()
        };
        let mut df = df;

        info!("Cleaning {} rows...", rows_before);

        if self.policy.remove_duplicates {
            let before = df.height();
            df = drop_duplicate_rows(&df)?;
            summary.duplicates_removed = before - df.height();

            if summary.duplicates_removed > 0 {
                summary.actions.push(format!(
                    "Removed {} duplicate rows ({:.1}%)",
                    summary.duplicates_removed,
                    percentage(summary.duplicates_removed, before)
                ));
                debug!("Removed {} duplicate rows", summary.duplicates_removed);
            } else {
                summary.actions.push("No duplicate rows found".to_string());
                debug!("No duplicate rows found");
            }
        }

        if self.policy.drop_missing_rows {
            let before = df.height();
            df = drop_missing_rows(&df)?;
            summary.missing_removed = before - df.height();

            if summary.missing_removed > 0 {
                summary.actions.push(format!(
                    "Removed {} rows with missing values ({:.1}%)",
                    summary.missing_removed,
                    percentage(summary.missing_removed, before)
                ));
                debug!("Removed {} rows with missing values", summary.missing_removed);
            } else {
                summary
                    .actions
                    .push("No rows with missing values found".to_string());
            }
        }

        if !self.policy.is_enabled() {
            summary.actions.push("Cleaning disabled".to_string());
        }

        summary.rows_after = df.height();
        Ok((df, summary))
    }
}

/// Remove exact duplicate rows, keeping the first occurrence in input order.
pub fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame> {
    if df.height() < 2 || df.width() == 0 {
        return Ok(df.clone());
    }
    df.unique_stable(None, UniqueKeepStrategy::First, None)
        .context("Failed to drop duplicate rows")
}

/// Remove every row that has a null in any column.
pub fn drop_missing_rows(df: &DataFrame) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }

    let mut keep = BooleanChunked::full("keep".into(), true, df.height());
    for col in df.get_columns() {
        if col.null_count() > 0 {
            keep = &keep & &col.as_materialized_series().is_not_null();
        }
    }

    df.filter(&keep).context("Failed to drop rows with missing values")
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

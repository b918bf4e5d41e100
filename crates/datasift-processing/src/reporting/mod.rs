//! Report generation module.
//!
//! The pipeline hands the cleaned table to a [`ReportGenerator`] and persists
//! whatever HTML document it returns. [`HtmlReportGenerator`] is the default
//! implementation; callers may plug in their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use datasift_processing::reporting::{HtmlReportGenerator, ReportContext, ReportGenerator};
//!
//! let html = HtmlReportGenerator::new().generate(&df, &context)?;
//! ```

mod generator;

pub use generator::{HtmlReportGenerator, escape_html};

use crate::types::RunId;
use anyhow::Result;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Renders a profiling report for a table.
///
/// Implementations must be `Send + Sync` so one pipeline can be shared by
/// request handlers. Errors are returned via `anyhow::Result`; the pipeline
/// turns them into `ReportGenerationFailed`.
pub trait ReportGenerator: Send + Sync {
    /// Produce a complete HTML document describing `df`.
    fn generate(&self, df: &DataFrame, context: &ReportContext) -> Result<String>;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// Metadata shown in the report header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    pub title: String,
    pub run_id: RunId,
    /// Human-readable description of where the data came from.
    pub source: String,
    /// Label of the encoding the source was decoded with.
    pub encoding: String,
    /// Link target for downloading the cleaned CSV, if any.
    pub download_href: Option<String>,
}

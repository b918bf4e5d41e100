//! CSV Ingestion Pipeline Library
//!
//! A CSV ingestion, cleaning and profiling library built with Rust and Polars.
//!
//! # Overview
//!
//! This library turns an uploaded file or a URL into two artifacts: a cleaned
//! CSV and an HTML profiling report.
//!
//! - **Source Resolution**: Uploads (staged to a scoped temp file) or URLs
//! - **Encoding Detection**: BOM sniffing with a statistical fallback
//! - **Loading**: Whole-file or chunked parsing with one schema per source
//! - **Cleaning**: Exact-duplicate removal, then removal of incomplete rows
//! - **Reporting**: Per-column statistics rendered as a self-contained page
//! - **Progress Reporting**: Stage-by-stage updates through a callback
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use datasift_processing::{FormSubmission, Pipeline, PipelineConfig, RunOutcome};
//!
//! let config = PipelineConfig::builder()
//!     .artifact_dir("static")
//!     .chunk_size(Some(10_000))
//!     .build()?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! match pipeline.run(FormSubmission::url("https://example.com/data.csv"))? {
//!     RunOutcome::Completed(result) => {
//!         println!("Cleaned CSV: {}", result.artifacts.csv.display());
//!         println!("Report:      {}", result.artifacts.report.display());
//!     }
//!     RunOutcome::NoData => println!("Nothing to do"),
//! }
//! ```
//!
//! # Report Generators
//!
//! The report is produced through the [`reporting::ReportGenerator`] trait.
//! [`reporting::HtmlReportGenerator`] is used unless the builder is given
//! another implementation.
//!
//! # URL Sources
//!
//! URLs are retrieved through the [`source::HttpFetcher`] trait. With the
//! default `http` feature the pipeline uses a blocking `reqwest` client; tests
//! and embedders can supply their own fetcher.

pub mod artifacts;
pub mod cleaner;
pub mod config;
pub mod encoding;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod source;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use artifacts::{ArtifactLayout, ArtifactWriter, StagedArtifact};
pub use cleaner::Cleaner;
pub use config::{CleaningPolicy, ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use encoding::{EncodingDetector, EncodingGuess, EncodingMethod};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use loader::{LoadMode, LoadOptions, LoadedTable, TableLoader};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use profiler::DataProfiler;
pub use reporting::{HtmlReportGenerator, ReportContext, ReportGenerator};
pub use source::{DisabledFetcher, FetchResponse, HttpFetcher, SourceResolver, read_local};
pub use types::{
    ArtifactPaths, CleaningSummary, ColumnProfile, DatasetProfile, FormSubmission, Provenance,
    RawPayload, RunId, RunOutcome, RunResult, UploadedFile,
};

#[cfg(feature = "http")]
pub use source::ReqwestFetcher;

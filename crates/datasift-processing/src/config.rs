//! Configuration types for the ingestion pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Every directory the pipeline
//! touches is carried here and handed to the components at construction
//! time; nothing is read from ambient globals.

use crate::utils::DEFAULT_MISSING_MARKERS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of rows per chunk in chunked loading.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Default timeout for URL retrieval in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default title of the generated profiling report.
pub const DEFAULT_REPORT_TITLE: &str = "Complete Data Profiling Report";

/// Which row reductions the cleaner applies.
///
/// The two reductions run in a fixed order: duplicates first, then rows
/// with missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningPolicy {
    /// Remove rows that exactly repeat an earlier row.
    pub remove_duplicates: bool,
    /// Remove rows containing at least one missing value.
    pub drop_missing_rows: bool,
}

impl Default for CleaningPolicy {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            drop_missing_rows: true,
        }
    }
}

impl CleaningPolicy {
    /// A policy that leaves the table untouched.
    pub fn disabled() -> Self {
        Self {
            remove_duplicates: false,
            drop_missing_rows: false,
        }
    }

    /// Whether any reduction is enabled.
    pub fn is_enabled(&self) -> bool {
        self.remove_duplicates || self.drop_missing_rows
    }
}

/// Configuration for the ingestion pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use datasift_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .chunk_size(Some(10_000))
///     .artifact_dir("static")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows per chunk when loading. `None` parses the whole file in one pass.
    /// Default: Some(5000)
    pub chunk_size: Option<usize>,

    /// Row reductions applied after loading.
    /// Default: both enabled
    pub cleaning: CleaningPolicy,

    /// Field delimiter.
    /// Default: b','
    pub delimiter: u8,

    /// Cell values treated as missing.
    /// Default: the pandas `na_values` list
    pub missing_markers: Vec<String>,

    /// Substitute U+FFFD for bytes that are invalid in the detected encoding
    /// instead of failing the run.
    /// Default: false
    pub lossy_decoding: bool,

    /// Encoding label that replaces detection (e.g. "windows-1252").
    /// Default: None
    pub encoding_override: Option<String>,

    /// Directory where uploaded files are staged while being read.
    /// Default: the system temporary directory
    pub upload_dir: PathBuf,

    /// Directory where the cleaned CSV and the report are written.
    /// Default: "static"
    pub artifact_dir: PathBuf,

    /// Write each run's artifacts under `<artifact_dir>/<run_id>/`.
    /// When false every run overwrites the same two files.
    /// Default: true
    pub namespace_artifacts: bool,

    /// Timeout for URL retrieval in seconds.
    /// Default: 30
    pub fetch_timeout_secs: u64,

    /// Title shown at the top of the report.
    /// Default: "Complete Data Profiling Report"
    pub report_title: String,

    /// Link target for the "download cleaned CSV" link inside the report.
    /// Default: None (no link)
    pub report_download_href: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: Some(DEFAULT_CHUNK_SIZE),
            cleaning: CleaningPolicy::default(),
            delimiter: b',',
            missing_markers: default_missing_markers(),
            lossy_decoding: false,
            encoding_override: None,
            upload_dir: std::env::temp_dir(),
            artifact_dir: PathBuf::from("static"),
            namespace_artifacts: true,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            report_title: DEFAULT_REPORT_TITLE.to_string(),
            report_download_href: None,
        }
    }
}

fn default_missing_markers() -> Vec<String> {
    DEFAULT_MISSING_MARKERS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.chunk_size == Some(0) {
            return Err(ConfigValidationError::InvalidChunkSize);
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        if matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(ConfigValidationError::InvalidDelimiter(self.delimiter as char));
        }

        if let Some(label) = &self.encoding_override
            && encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none()
        {
            return Err(ConfigValidationError::UnknownEncoding(label.clone()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid chunk size: must be at least 1 row")]
    InvalidChunkSize,

    #[error("Invalid fetch timeout: must be at least 1 second")]
    InvalidTimeout,

    #[error("Invalid delimiter {0:?}")]
    InvalidDelimiter(char),

    #[error("Unknown encoding label '{0}'")]
    UnknownEncoding(String),
}

impl From<ConfigValidationError> for crate::error::PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::PipelineError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    chunk_size: Option<Option<usize>>,
    cleaning: Option<CleaningPolicy>,
    delimiter: Option<u8>,
    missing_markers: Option<Vec<String>>,
    lossy_decoding: Option<bool>,
    encoding_override: Option<String>,
    upload_dir: Option<PathBuf>,
    artifact_dir: Option<PathBuf>,
    namespace_artifacts: Option<bool>,
    fetch_timeout_secs: Option<u64>,
    report_title: Option<String>,
    report_download_href: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the chunk size in rows; `None` loads the whole file in one pass.
    pub fn chunk_size(mut self, rows: Option<usize>) -> Self {
        self.chunk_size = Some(rows);
        self
    }

    /// Set the cleaning policy.
    pub fn cleaning(mut self, policy: CleaningPolicy) -> Self {
        self.cleaning = Some(policy);
        self
    }

    /// Set the field delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Replace the list of values treated as missing.
    pub fn missing_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable lossy decoding.
    pub fn lossy_decoding(mut self, lossy: bool) -> Self {
        self.lossy_decoding = Some(lossy);
        self
    }

    /// Force an encoding instead of detecting one.
    pub fn encoding_override(mut self, label: impl Into<String>) -> Self {
        self.encoding_override = Some(label.into());
        self
    }

    /// Set the directory used to stage uploads.
    pub fn upload_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(path.into());
        self
    }

    /// Set the output directory for artifacts.
    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(path.into());
        self
    }

    /// Enable or disable per-run artifact directories.
    pub fn namespace_artifacts(mut self, namespaced: bool) -> Self {
        self.namespace_artifacts = Some(namespaced);
        self
    }

    /// Set the URL retrieval timeout in seconds.
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = Some(secs);
        self
    }

    /// Set the report title.
    pub fn report_title(mut self, title: impl Into<String>) -> Self {
        self.report_title = Some(title.into());
        self
    }

    /// Set the download link embedded in the report.
    pub fn report_download_href(mut self, href: impl Into<String>) -> Self {
        self.report_download_href = Some(href.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            chunk_size: self.chunk_size.unwrap_or(Some(DEFAULT_CHUNK_SIZE)),
            cleaning: self.cleaning.unwrap_or_default(),
            delimiter: self.delimiter.unwrap_or(b','),
            missing_markers: self
                .missing_markers
                .unwrap_or_else(default_missing_markers),
            lossy_decoding: self.lossy_decoding.unwrap_or(false),
            encoding_override: self.encoding_override,
            upload_dir: self.upload_dir.unwrap_or_else(std::env::temp_dir),
            artifact_dir: self
                .artifact_dir
                .unwrap_or_else(|| PathBuf::from("static")),
            namespace_artifacts: self.namespace_artifacts.unwrap_or(true),
            fetch_timeout_secs: self
                .fetch_timeout_secs
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            report_title: self
                .report_title
                .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string()),
            report_download_href: self.report_download_href,
        };

        config.validate()?;
        Ok(config)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Source Types
// ============================================================================

/// Where a payload came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// A file uploaded through the form.
    Upload { filename: String },
    /// A resource retrieved over HTTP.
    Url { url: String },
    /// A file read from the local filesystem (CLI).
    LocalFile { path: PathBuf },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload { filename } => write!(f, "upload '{}'", filename),
            Self::Url { url } => write!(f, "{}", url),
            Self::LocalFile { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Raw bytes of a CSV source plus their provenance.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub bytes: Vec<u8>,
    pub provenance: Provenance,
}

impl RawPayload {
    pub fn new(bytes: impl Into<Vec<u8>>, provenance: Provenance) -> Self {
        Self {
            bytes: bytes.into(),
            provenance,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A file field from the input form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One submission of the input form. The file takes precedence over the URL.
#[derive(Debug, Clone, Default)]
pub struct FormSubmission {
    pub file: Option<UploadedFile>,
    pub url: Option<String>,
}

impl FormSubmission {
    /// A submission carrying only an uploaded file.
    pub fn upload(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file: Some(UploadedFile {
                filename: filename.into(),
                bytes: bytes.into(),
            }),
            url: None,
        }
    }

    /// A submission carrying only a URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            file: None,
            url: Some(url.into()),
        }
    }
}

// ============================================================================
// Run Identity
// ============================================================================

/// Identifier of one pipeline run, used to namespace its artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run id from its textual form, rejecting anything that is not
    /// a UUID (so ids can be joined onto paths safely).
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

// ============================================================================
// Profiling Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub inferred_type: String,
    pub unique_count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub sample_values: Vec<String>,
    pub characteristics: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub shape: (usize, usize),
    pub column_profiles: Vec<ColumnProfile>,
    pub missing_cells: usize,
    pub missing_cells_percentage: f64,
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    pub estimated_size_bytes: usize,
}

// ============================================================================
// Run Result Types
// ============================================================================

/// What the cleaner removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub rows_before: usize,
    pub duplicates_removed: usize,
    pub missing_removed: usize,
    pub rows_after: usize,
    /// Human-readable description of each cleaning step.
    #[serde(default)]
    pub actions: Vec<String>,
}

impl CleaningSummary {
    /// Total number of rows removed.
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }

    /// Percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_removed() as f64 / self.rows_before as f64) * 100.0
        }
    }
}

/// Paths of the two artifacts written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub csv: PathBuf,
    pub report: PathBuf,
}

/// Summary of a completed run.
///
/// Serialized as the CLI's `--json` output and logged by the web shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub source: Provenance,
    pub encoding: String,
    pub encoding_method: String,
    pub rows_loaded: usize,
    pub columns: usize,
    pub chunks: usize,
    pub cleaning: CleaningSummary,
    pub artifacts: ArtifactPaths,
    pub duration_ms: u64,
    pub processing_steps: Vec<String>,
}

/// Terminal state of a form submission.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Neither an acceptable file nor a URL was supplied.
    NoData,
    /// The pipeline produced both artifacts.
    Completed(RunResult),
}

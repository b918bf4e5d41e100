//! Resolution of a form submission into raw CSV bytes.
//!
//! An uploaded file wins over a URL. Uploads are accepted only when the
//! client-supplied filename ends in `.csv` (case-sensitive). Accepted uploads
//! are staged to a scoped temporary file under the upload directory; the
//! file is removed when the [`ResolvedSource`] is dropped.

mod fetch;

pub use fetch::{DisabledFetcher, FetchResponse, HttpFetcher};

#[cfg(feature = "http")]
pub use fetch::ReqwestFetcher;

use crate::error::{PipelineError, Result, ResultExt};
use crate::types::{FormSubmission, Provenance, RawPayload, UploadedFile};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Suffix an upload's filename must carry.
pub const CSV_SUFFIX: &str = ".csv";

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("Invalid regex: filename chars"));

/// Whether an upload filename is accepted.
pub fn is_csv_filename(filename: &str) -> bool {
    filename.ends_with(CSV_SUFFIX)
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_` and leading dots are stripped. An empty result falls back to
/// `upload.csv`.
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload.csv".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An upload written to the upload directory. Deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Payload obtained from a submission, plus the staged upload (if any) that
/// must outlive the run.
#[derive(Debug)]
pub struct ResolvedSource {
    pub payload: RawPayload,
    staged: Option<StagedUpload>,
}

impl ResolvedSource {
    pub fn staged_upload(&self) -> Option<&StagedUpload> {
        self.staged.as_ref()
    }

    /// Split into the payload and the staging guard. The staged file is
    /// removed when the guard is dropped.
    pub fn into_parts(self) -> (RawPayload, Option<StagedUpload>) {
        (self.payload, self.staged)
    }
}

/// Turns form submissions into payloads.
#[derive(Clone)]
pub struct SourceResolver {
    upload_dir: PathBuf,
    fetcher: Arc<dyn HttpFetcher>,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("upload_dir", &self.upload_dir)
            .field("fetcher", &self.fetcher.name())
            .finish()
    }
}

impl SourceResolver {
    pub fn new(upload_dir: impl Into<PathBuf>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            fetcher,
        }
    }

    /// Resolve a submission.
    ///
    /// Returns `Ok(None)` when neither an acceptable file nor a non-empty URL
    /// was supplied.
    pub fn resolve(&self, submission: FormSubmission) -> Result<Option<ResolvedSource>> {
        if let Some(file) = submission.file {
            if is_csv_filename(&file.filename) {
                return self.stage_upload(file).map(Some);
            }
            if !file.filename.is_empty() {
                debug!("Ignoring upload '{}': not a .csv file", file.filename);
            }
        }

        let url = submission
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        match url {
            Some(url) => self.fetch(url).map(Some),
            None => Ok(None),
        }
    }

    fn stage_upload(&self, file: UploadedFile) -> Result<ResolvedSource> {
        fs::create_dir_all(&self.upload_dir).context("Failed to create upload directory")?;

        let name = secure_filename(&file.filename);
        let mut staged = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(&format!("-{}", name))
            .tempfile_in(&self.upload_dir)
            .context("Failed to stage upload")?;

        staged
            .write_all(&file.bytes)
            .and_then(|_| staged.flush())
            .context("Failed to stage upload")?;

        let bytes = fs::read(staged.path()).context("Failed to read staged upload")?;
        info!(
            "Staged upload '{}' ({} bytes) at {}",
            file.filename,
            bytes.len(),
            staged.path().display()
        );

        Ok(ResolvedSource {
            payload: RawPayload::new(
                bytes,
                Provenance::Upload {
                    filename: file.filename,
                },
            ),
            staged: Some(StagedUpload { file: staged }),
        })
    }

    fn fetch(&self, url: &str) -> Result<ResolvedSource> {
        info!("Fetching {} via {}", url, self.fetcher.name());

        let response = self
            .fetcher
            .fetch(url)
            .map_err(|e| PipelineError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if response.status != 200 {
            return Err(PipelineError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status),
            });
        }

        Ok(ResolvedSource {
            payload: RawPayload::new(
                response.bytes,
                Provenance::Url {
                    url: url.to_string(),
                },
            ),
            staged: None,
        })
    }
}

/// Read a CSV file from the local filesystem.
pub fn read_local(path: impl AsRef<Path>) -> Result<RawPayload> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        PipelineError::SourceUnavailable(format!("cannot read '{}': {}", path.display(), e))
    })?;
    Ok(RawPayload::new(
        bytes,
        Provenance::LocalFile {
            path: path.to_path_buf(),
        },
    ))
}

//! Persistence of run artifacts: the cleaned CSV and the HTML report.
//!
//! Every artifact is written to a temporary file in its destination
//! directory and renamed into place, so readers never observe a partially
//! written file. A run stages both artifacts first and commits them only
//! once both are complete, so a failed run never replaces one artifact
//! without the other. With namespacing off, all runs share the same two
//! paths and concurrent runs overwrite each other (last rename wins).

use crate::error::{PipelineError, Result};
use crate::types::{ArtifactPaths, RunId};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const CSV_FILE_NAME: &str = "cleaned.csv";
pub const REPORT_FILE_NAME: &str = "report.html";

/// Where a run's artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub dir: PathBuf,
    /// Put each run's artifacts in `<dir>/<run_id>/`.
    pub namespaced: bool,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>, namespaced: bool) -> Self {
        Self {
            dir: dir.into(),
            namespaced,
        }
    }

    /// Artifact paths for `run_id` under this layout.
    pub fn paths_for(&self, run_id: &RunId) -> ArtifactPaths {
        if self.namespaced {
            Self::paths_in(&self.dir.join(run_id.to_string()))
        } else {
            self.fixed_paths()
        }
    }

    /// The shared, non-namespaced paths.
    pub fn fixed_paths(&self) -> ArtifactPaths {
        Self::paths_in(&self.dir)
    }

    fn paths_in(dir: &Path) -> ArtifactPaths {
        ArtifactPaths {
            csv: dir.join(CSV_FILE_NAME),
            report: dir.join(REPORT_FILE_NAME),
        }
    }
}

/// Writes artifacts atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `df` as CSV: header row, no index, nulls as empty fields.
    ///
    /// The caller's frame is not modified.
    pub fn write_csv(&self, df: &DataFrame, paths: &ArtifactPaths) -> Result<()> {
        self.stage_csv(df, paths)?.commit()
    }

    /// Write the HTML report.
    pub fn write_report(&self, html: &str, paths: &ArtifactPaths) -> Result<()> {
        self.stage_report(html, paths)?.commit()
    }

    /// Write the CSV next to its destination without making it visible.
    pub fn stage_csv(&self, df: &DataFrame, paths: &ArtifactPaths) -> Result<StagedArtifact> {
        let mut out = df.clone();
        stage(&paths.csv, |file| {
            CsvWriter::new(file)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .with_null_value(String::new())
                .finish(&mut out)
                .map_err(io::Error::other)
        })
    }

    /// Write the report next to its destination without making it visible.
    pub fn stage_report(&self, html: &str, paths: &ArtifactPaths) -> Result<StagedArtifact> {
        stage(&paths.report, |file| file.write_all(html.as_bytes()))
    }
}

/// A fully written artifact waiting in a temporary file beside its
/// destination. Dropping it without [`commit`](Self::commit) discards it and
/// leaves the destination untouched.
#[derive(Debug)]
pub struct StagedArtifact {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedArtifact {
    /// Final location once committed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rename the staged file onto its destination.
    pub fn commit(self) -> Result<()> {
        let Self { tmp, path } = self;
        tmp.persist(&path)
            .map_err(|e| persist_error(&path, e.error))?;
        info!("Saved {}", path.display());
        Ok(())
    }
}

fn persist_error(path: &Path, source: io::Error) -> PipelineError {
    PipelineError::PersistError {
        path: path.to_path_buf(),
        source,
    }
}

fn stage(path: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<StagedArtifact> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| persist_error(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| persist_error(path, e))?;
    write(tmp.as_file_mut()).map_err(|e| persist_error(path, e))?;
    tmp.as_file_mut()
        .sync_all()
        .map_err(|e| persist_error(path, e))?;

    Ok(StagedArtifact {
        tmp,
        path: path.to_path_buf(),
    })
}

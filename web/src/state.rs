//! Application State Management
//!
//! Everything the handlers share lives in [`AppState`]: the pipeline itself
//! and a small record of completed runs. There is no module-level state.
//!
//! # Thread Safety
//!
//! The run records sit behind `parking_lot::RwLock`. Locks are only held to
//! copy a record in or out, never across an `.await` or a pipeline run.
//!
//! # Session-Only State
//!
//! Run records are kept in memory only. After a restart `/report` and
//! `/download` answer 404 until the next run completes, even though older
//! artifacts may still be on disk.

use chrono::{DateTime, Local};
use datasift_processing::{ArtifactPaths, Pipeline, RunId, RunResult};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Maximum number of runs listed on the form page.
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// What the shell remembers about a completed run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Human-readable description of the source.
    pub source: String,
    pub rows_loaded: usize,
    pub rows_after: usize,
    pub artifacts: ArtifactPaths,
    pub finished_at: DateTime<Local>,
}

impl From<&RunResult> for RunRecord {
    fn from(result: &RunResult) -> Self {
        Self {
            run_id: result.run_id,
            source: result.source.to_string(),
            rows_loaded: result.rows_loaded,
            rows_after: result.cleaning.rows_after,
            artifacts: result.artifacts.clone(),
            finished_at: Local::now(),
        }
    }
}

#[derive(Debug, Default)]
struct RunHistory {
    /// Newest first.
    entries: VecDeque<RunRecord>,
}

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    history: Arc<RwLock<RunHistory>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            history: Arc::new(RwLock::new(RunHistory::default())),
            max_upload_bytes,
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Remember a completed run as the most recent one.
    pub fn record_run(&self, record: RunRecord) {
        let mut history = self.history.write();
        history.entries.push_front(record);
        history.entries.truncate(MAX_HISTORY_ENTRIES);
    }

    /// The most recently completed run, if any.
    pub fn latest_run(&self) -> Option<RunRecord> {
        self.history.read().entries.front().cloned()
    }

    /// Completed runs, newest first.
    pub fn recent_runs(&self) -> Vec<RunRecord> {
        self.history.read().entries.iter().cloned().collect()
    }

    /// Artifact paths of `run_id`.
    ///
    /// With per-run directories any id maps to its own paths (the files may
    /// or may not exist). With fixed paths only the latest run's artifacts
    /// are still on disk, so other ids resolve to nothing.
    pub fn artifacts_for(&self, run_id: &RunId) -> Option<ArtifactPaths> {
        let layout = self.pipeline.layout();
        if layout.namespaced {
            return Some(layout.paths_for(run_id));
        }
        self.latest_run()
            .filter(|run| &run.run_id == run_id)
            .map(|run| run.artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasift_processing::{DisabledFetcher, PipelineConfig};
    use std::path::PathBuf;

    fn state(namespaced: bool) -> AppState {
        let config = PipelineConfig::builder()
            .artifact_dir("artifacts")
            .namespace_artifacts(namespaced)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .fetcher(Arc::new(DisabledFetcher))
            .build()
            .unwrap();
        AppState::new(Arc::new(pipeline), 1024)
    }

    fn record(run_id: RunId, dir: &str) -> RunRecord {
        RunRecord {
            run_id,
            source: "upload 'a.csv'".to_string(),
            rows_loaded: 3,
            rows_after: 2,
            artifacts: ArtifactPaths {
                csv: PathBuf::from(dir).join("cleaned.csv"),
                report: PathBuf::from(dir).join("report.html"),
            },
            finished_at: Local::now(),
        }
    }

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let state = state(true);
        assert!(state.latest_run().is_none());

        let ids: Vec<RunId> = (0..MAX_HISTORY_ENTRIES + 3).map(|_| RunId::new()).collect();
        for id in &ids {
            state.record_run(record(*id, "artifacts"));
        }

        let recent = state.recent_runs();
        assert_eq!(recent.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(recent[0].run_id, *ids.last().unwrap());
        assert_eq!(state.latest_run().map(|r| r.run_id), ids.last().copied());
    }

    #[test]
    fn test_artifacts_for_namespaced_layout() {
        let state = state(true);
        let id = RunId::new();
        let paths = state.artifacts_for(&id).unwrap();
        assert_eq!(
            paths.report,
            PathBuf::from("artifacts").join(id.to_string()).join("report.html")
        );
    }

    #[test]
    fn test_artifacts_for_fixed_layout_only_knows_latest_run() {
        let state = state(false);
        let old = RunId::new();
        let new = RunId::new();
        state.record_run(record(old, "artifacts"));
        state.record_run(record(new, "artifacts"));

        assert!(state.artifacts_for(&old).is_none());
        assert!(state.artifacts_for(&new).is_some());
    }
}

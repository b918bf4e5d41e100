//! Main ingestion pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating source resolution, loading, cleaning and artifact writing.

use crate::artifacts::{ArtifactLayout, ArtifactWriter};
use crate::cleaner::Cleaner;
use crate::config::PipelineConfig;
use crate::encoding::{EncodingDetector, EncodingGuess};
use crate::error::{PipelineError, Result};
use crate::loader::{LoadOptions, LoadedTable, TableLoader};
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{HtmlReportGenerator, ReportContext, ReportGenerator};
use crate::source::{HttpFetcher, SourceResolver};
use crate::types::{FormSubmission, RawPayload, RunId, RunOutcome, RunResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The ingestion pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
/// A pipeline holds no per-run state, so one instance can serve many
/// concurrent requests.
///
/// # Example
///
/// ```rust,ignore
/// use datasift_processing::{FormSubmission, Pipeline, PipelineConfig, RunOutcome};
///
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::builder().artifact_dir("static").build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
///
/// match pipeline.run(FormSubmission::url("https://example.com/data.csv"))? {
///     RunOutcome::Completed(result) => println!("report at {}", result.artifacts.report.display()),
///     RunOutcome::NoData => println!("nothing submitted"),
/// }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    resolver: SourceResolver,
    detector: EncodingDetector,
    loader: TableLoader,
    cleaner: Cleaner,
    layout: ArtifactLayout,
    writer: ArtifactWriter,
    report_generator: Arc<dyn ReportGenerator>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Shared across request handlers and moved onto blocking worker threads.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Run a form submission end to end.
    ///
    /// Returns [`RunOutcome::NoData`] when neither an acceptable `.csv`
    /// upload nor a non-empty URL was supplied. A staged upload is removed
    /// before this returns, whatever the outcome.
    pub fn run(&self, submission: FormSubmission) -> Result<RunOutcome> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Resolving,
            0.0,
            "Resolving source...",
        ));

        let resolved = match self.resolver.resolve(submission) {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                info!("No CSV file or URL submitted");
                return Ok(RunOutcome::NoData);
            }
            Err(e) => return Err(self.fail(e)),
        };

        let (payload, _staged) = resolved.into_parts();
        self.run_payload(payload).map(RunOutcome::Completed)
    }

    /// Run every stage after source resolution on an already obtained payload.
    pub fn run_payload(&self, payload: RawPayload) -> Result<RunResult> {
        match self.process(payload) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Detect the encoding of a payload and parse it.
    pub fn load(&self, payload: &RawPayload) -> Result<(EncodingGuess, LoadedTable)> {
        let guess = self.detector.detect(&payload.bytes)?;
        let table = self.loader.load(&payload.bytes, &guess)?;
        Ok((guess, table))
    }

    fn fail(&self, e: PipelineError) -> PipelineError {
        self.report_progress(ProgressUpdate::failed(e.to_string()));
        error!("Pipeline error [{}]: {}", e.error_code(), e);
        e
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn process(&self, payload: RawPayload) -> Result<RunResult> {
        let start_time = Instant::now();
        let run_id = RunId::new();
        let mut processing_steps: Vec<String> = Vec::new();

        info!("Starting run {} for {} ({} bytes)", run_id, payload.provenance, payload.len());

        // Step 1: Encoding detection
        self.report_progress(ProgressUpdate::new(
            PipelineStage::DetectingEncoding,
            0.0,
            "Detecting encoding...",
        ));
        let guess = self.detector.detect(&payload.bytes)?;
        processing_steps.push(format!(
            "Detected encoding {} ({})",
            guess.label(),
            guess.method.as_str()
        ));

        // Step 2: Parse
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            "Loading CSV...",
        ));
        let RawPayload { bytes, provenance } = payload;
        let table = self.loader.load(&bytes, &guess)?;
        drop(bytes);

        let rows_loaded = table.df.height();
        let columns = table.df.width();
        processing_steps.push(format!(
            "Loaded {} rows x {} columns in {} chunk(s)",
            rows_loaded, columns, table.chunks
        ));
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} rows", rows_loaded),
        ));

        // Step 3: Cleaning
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            "Cleaning data...",
        ));
        let (df, cleaning) = self.cleaner.clean(table.df)?;
        processing_steps.extend(cleaning.actions.iter().cloned());
        debug!("Cleaned shape: {:?}", df.shape());

        // Step 4: Cleaned CSV. A failure here stops the run before any report is produced.
        // The file stays staged until the report is written too, so the
        // published CSV and report always come from the same run.
        self.report_progress(ProgressUpdate::new(
            PipelineStage::WritingArtifacts,
            0.0,
            "Writing cleaned CSV...",
        ));
        let artifacts = self.layout.paths_for(&run_id);
        let staged_csv = self.writer.stage_csv(&df, &artifacts)?;

        // Step 5: Report
        self.report_progress(ProgressUpdate::new(
            PipelineStage::GeneratingReport,
            0.0,
            "Generating profiling report...",
        ));
        let context = ReportContext {
            title: self.config.report_title.clone(),
            run_id,
            source: provenance.to_string(),
            encoding: guess.label().to_string(),
            download_href: self.config.report_download_href.clone(),
        };
        let html = self
            .report_generator
            .generate(&df, &context)
            .map_err(|e| PipelineError::ReportGenerationFailed(e.to_string()))?;
        let staged_report = self.writer.stage_report(&html, &artifacts)?;

        // Step 6: Publish both artifacts
        staged_csv.commit()?;
        staged_report.commit()?;
        processing_steps.push(format!("Wrote {}", artifacts.csv.display()));
        processing_steps.push(format!(
            "Wrote {} ({} generator)",
            artifacts.report.display(),
            self.report_generator.name()
        ));

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Run {} finished in {} ms", run_id, duration_ms);

        Ok(RunResult {
            run_id,
            source: provenance,
            encoding: guess.label().to_string(),
            encoding_method: guess.method.as_str().to_string(),
            rows_loaded,
            columns,
            chunks: table.chunks,
            cleaning,
            artifacts,
            duration_ms,
            processing_steps,
        })
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    report_generator: Option<Arc<dyn ReportGenerator>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the HTTP fetcher used for URL sources.
    ///
    /// Defaults to a reqwest client with the configured timeout when the
    /// `http` feature is enabled, and to
    /// [`DisabledFetcher`](crate::source::DisabledFetcher) otherwise.
    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the report generator. Defaults to [`HtmlReportGenerator`].
    pub fn report_generator(mut self, generator: Arc<dyn ReportGenerator>) -> Self {
        self.report_generator = Some(generator);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid or the default HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let detector = match &config.encoding_override {
            Some(label) => EncodingDetector::with_override(label)?,
            None => EncodingDetector::new(),
        };

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher(config.fetch_timeout_secs)?,
        };

        Ok(Pipeline {
            resolver: SourceResolver::new(config.upload_dir.clone(), fetcher),
            detector,
            loader: TableLoader::new(LoadOptions::from_config(&config)),
            cleaner: Cleaner::new(config.cleaning),
            layout: ArtifactLayout::new(config.artifact_dir.clone(), config.namespace_artifacts),
            writer: ArtifactWriter::new(),
            report_generator: self
                .report_generator
                .unwrap_or_else(|| Arc::new(HtmlReportGenerator::new())),
            progress_reporter: self.progress_reporter,
            config,
        })
    }
}

#[cfg(feature = "http")]
fn default_fetcher(timeout_secs: u64) -> Result<Arc<dyn HttpFetcher>> {
    let fetcher = crate::source::ReqwestFetcher::new(timeout_secs)?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "http"))]
fn default_fetcher(_timeout_secs: u64) -> Result<Arc<dyn HttpFetcher>> {
    Ok(Arc::new(crate::source::DisabledFetcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleaningPolicy;
    use crate::source::DisabledFetcher;
    use crate::types::Provenance;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::Path;

    struct FailingReport;

    impl ReportGenerator for FailingReport {
        fn generate(
            &self,
            _df: &polars::prelude::DataFrame,
            _context: &ReportContext,
        ) -> anyhow::Result<String> {
            anyhow::bail!("renderer exploded")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn pipeline_in(dir: &Path) -> PipelineBuilder {
        let config = PipelineConfig::builder()
            .artifact_dir(dir.join("static"))
            .upload_dir(dir.join("uploads"))
            .build()
            .unwrap();
        Pipeline::builder()
            .config(config)
            .fetcher(Arc::new(DisabledFetcher))
    }

    fn payload(csv: &str) -> RawPayload {
        RawPayload::new(
            csv.as_bytes().to_vec(),
            Provenance::Upload {
                filename: "t.csv".to_string(),
            },
        )
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder()
            .fetcher(Arc::new(DisabledFetcher))
            .build()
            .unwrap();
        assert_eq!(pipeline.config().chunk_size, Some(5000));
        assert!(pipeline.layout().namespaced);
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            chunk_size: Some(0),
            ..PipelineConfig::default()
        };
        let err = Pipeline::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_run_payload_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_in(dir.path()).build().unwrap();

        let result = pipeline
            .run_payload(payload("name,value\na,1\na,1\nb,\nc,2\n"))
            .unwrap();

        assert_eq!(result.rows_loaded, 4);
        assert_eq!(result.cleaning.rows_after, 2);
        assert_eq!(result.encoding_method, "heuristic");
        assert_eq!(
            fs::read_to_string(&result.artifacts.csv).unwrap(),
            "name,value\na,1\nc,2\n"
        );
        let html = fs::read_to_string(&result.artifacts.report).unwrap();
        assert!(html.contains("Complete Data Profiling Report"));
    }

    #[test]
    fn test_report_failure_leaves_previous_artifacts_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .artifact_dir(dir.path().join("static"))
            .upload_dir(dir.path().join("uploads"))
            .namespace_artifacts(false)
            .build()
            .unwrap();
        let working = Pipeline::builder()
            .config(config.clone())
            .fetcher(Arc::new(DisabledFetcher))
            .build()
            .unwrap();
        let failing = Pipeline::builder()
            .config(config)
            .fetcher(Arc::new(DisabledFetcher))
            .report_generator(Arc::new(FailingReport))
            .build()
            .unwrap();

        let first = working.run_payload(payload("first\n111\n")).unwrap();
        let err = failing.run_payload(payload("second\n222\n")).unwrap_err();
        assert_eq!(err.error_code(), "REPORT_GENERATION_FAILED");

        assert_eq!(
            fs::read_to_string(&first.artifacts.csv).unwrap(),
            "first\n111\n"
        );
        let html = fs::read_to_string(&first.artifacts.report).unwrap();
        assert!(html.contains("first"));
        assert!(!html.contains("second"));
        // No staged temporary file is left behind.
        assert_eq!(fs::read_dir(dir.path().join("static")).unwrap().count(), 2);
    }

    #[test]
    fn test_report_failure_in_fresh_directory_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_in(dir.path())
            .report_generator(Arc::new(FailingReport))
            .build()
            .unwrap();

        let err = pipeline.run_payload(payload("a\n1\n")).unwrap_err();
        assert_eq!(err.error_code(), "REPORT_GENERATION_FAILED");

        for entry in fs::read_dir(dir.path().join("static")).unwrap() {
            let run_dir = entry.unwrap().path();
            assert_eq!(fs::read_dir(&run_dir).unwrap().count(), 0, "{}", run_dir.display());
        }
    }

    #[test]
    fn test_csv_persist_error_skips_report_generation() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("static");
        fs::write(&blocker, "not a directory").unwrap();

        let calls = Arc::new(Mutex::new(0usize));
        struct CountingReport(Arc<Mutex<usize>>);
        impl ReportGenerator for CountingReport {
            fn generate(
                &self,
                _df: &polars::prelude::DataFrame,
                _context: &ReportContext,
            ) -> anyhow::Result<String> {
                *self.0.lock() += 1;
                Ok(String::new())
            }
            fn name(&self) -> &str {
                "counting"
            }
        }

        let pipeline = pipeline_in(dir.path())
            .report_generator(Arc::new(CountingReport(calls.clone())))
            .build()
            .unwrap();

        let err = pipeline.run_payload(payload("a\n1\n")).unwrap_err();
        assert_eq!(err.error_code(), "PERSIST_ERROR");
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_progress_reaches_complete() {
        let dir = tempfile::tempdir().unwrap();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        let pipeline = pipeline_in(dir.path())
            .on_progress(move |update| stages_clone.lock().push(update.stage))
            .build()
            .unwrap();
        pipeline
            .run(FormSubmission::upload("t.csv", "a\n1\n"))
            .unwrap();

        let stages = stages.lock();
        assert_eq!(stages.first(), Some(&PipelineStage::Resolving));
        assert_eq!(stages.last(), Some(&PipelineStage::Complete));
    }

    #[test]
    fn test_progress_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let last = Arc::new(Mutex::new(None));
        let last_clone = last.clone();

        let pipeline = pipeline_in(dir.path())
            .on_progress(move |update| *last_clone.lock() = Some(update.stage))
            .build()
            .unwrap();
        let err = pipeline.run(FormSubmission::url("https://example.com/a.csv"));

        assert!(err.is_err());
        assert_eq!(*last.lock(), Some(PipelineStage::Failed));
    }

    #[test]
    fn test_cleaning_policy_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .artifact_dir(dir.path())
            .cleaning(CleaningPolicy::disabled())
            .build()
            .unwrap();
        let pipeline = Pipeline::builder()
            .config(config)
            .fetcher(Arc::new(DisabledFetcher))
            .build()
            .unwrap();

        let result = pipeline.run_payload(payload("a\n1\n1\n\n")).unwrap();
        assert_eq!(result.cleaning.rows_after, 2);
    }
}

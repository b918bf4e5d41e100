//! CLI entry point for the CSV ingestion pipeline.

use anyhow::{Result, anyhow, bail};
use clap::{ArgGroup, Parser};
use datasift_processing::{
    CleaningPolicy, FormSubmission, Pipeline, PipelineConfig, RunOutcome, RunResult, read_local,
};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "CSV ingestion, cleaning and profiling pipeline",
    long_about = "Loads a CSV file or URL, removes duplicate and incomplete rows,\n\
                  and writes a cleaned CSV plus an HTML profiling report.\n\n\
                  EXAMPLES:\n  \
                  # Clean a local file into ./static/<run-id>/\n  \
                  datasift-processing -i data.csv\n\n  \
                  # Fetch a remote CSV, keep duplicates, machine-readable output\n  \
                  datasift-processing --url https://example.com/data.csv --keep-duplicates --json\n\n  \
                  # Latin-1 input with ';' separators, parsed in one pass\n  \
                  datasift-processing -i export.csv --encoding latin1 --delimiter ';' --whole-file"
)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "url"])))]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// URL of a CSV resource to fetch
    #[arg(short, long)]
    url: Option<String>,

    /// Directory for the cleaned CSV and the report
    #[arg(short, long, default_value = "static")]
    output: PathBuf,

    /// Write artifacts directly into the output directory instead of a
    /// per-run subdirectory
    #[arg(long)]
    flat: bool,

    /// Rows per chunk when loading
    #[arg(long, default_value_t = datasift_processing::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Parse the whole file in one pass (ignores --chunk-size)
    #[arg(long)]
    whole_file: bool,

    /// Keep rows that repeat an earlier row
    #[arg(long)]
    keep_duplicates: bool,

    /// Keep rows with missing values
    #[arg(long)]
    keep_missing: bool,

    /// Encoding label to use instead of detection (e.g. "windows-1252")
    #[arg(long)]
    encoding: Option<String>,

    /// Field delimiter (a single ASCII character)
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Replace undecodable bytes with U+FFFD instead of failing
    #[arg(long)]
    lossy: bool,

    /// Timeout for URL retrieval in seconds
    #[arg(long, default_value_t = datasift_processing::config::DEFAULT_FETCH_TIMEOUT_SECS)]
    timeout: u64,

    /// Title shown at the top of the report
    #[arg(long)]
    title: Option<String>,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all progress logs; only outputs the run result.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = build_config(&args)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let result = match execute(&pipeline, &args) {
        Ok(result) => result,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            return Err(anyhow!("Pipeline failed [{}]: {}", e.error_code(), e));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_human_readable_summary(&result);
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character, got {:?}", args.delimiter);
    }

    let chunk_size = if args.whole_file {
        None
    } else {
        Some(args.chunk_size)
    };

    let mut builder = PipelineConfig::builder()
        .chunk_size(chunk_size)
        .cleaning(CleaningPolicy {
            remove_duplicates: !args.keep_duplicates,
            drop_missing_rows: !args.keep_missing,
        })
        .delimiter(args.delimiter as u8)
        .lossy_decoding(args.lossy)
        .artifact_dir(&args.output)
        .namespace_artifacts(!args.flat)
        .fetch_timeout_secs(args.timeout);

    if let Some(label) = &args.encoding {
        builder = builder.encoding_override(label);
    }
    if let Some(title) = &args.title {
        builder = builder.report_title(title);
    }

    // The report sits next to the cleaned CSV in every layout.
    builder = builder.report_download_href(datasift_processing::artifacts::CSV_FILE_NAME);

    Ok(builder.build()?)
}

fn execute(pipeline: &Pipeline, args: &Args) -> datasift_processing::PipelineResult<RunResult> {
    if let Some(path) = &args.input {
        info!("Loading dataset from: {}", path.display());
        let payload = read_local(path)?;
        return pipeline.run_payload(payload);
    }

    let url = args.url.clone().unwrap_or_default();
    match pipeline.run(FormSubmission::url(url))? {
        RunOutcome::Completed(result) => Ok(result),
        RunOutcome::NoData => Err(datasift_processing::PipelineError::SourceUnavailable(
            "the URL is empty".to_string(),
        )),
    }
}

/// Print a human-readable summary of the run.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(result: &RunResult) {
    let cleaning = &result.cleaning;

    println!();
    println!("{}", "=".repeat(80));
    println!("INGESTION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Source:   {}", result.source);
    println!(
        "Encoding: {} ({})",
        result.encoding, result.encoding_method
    );
    println!(
        "Loaded:   {} rows x {} columns in {} chunk(s)",
        result.rows_loaded, result.columns, result.chunks
    );
    println!();

    println!("Cleaning Summary:");
    println!("  Duplicates removed: {}", cleaning.duplicates_removed);
    println!("  Incomplete rows removed: {}", cleaning.missing_removed);
    println!(
        "  Rows: {} -> {} ({:.1}% removed)",
        cleaning.rows_before,
        cleaning.rows_after,
        cleaning.rows_removed_percentage()
    );
    println!();

    println!("Artifacts:");
    println!("  CSV:    {}", result.artifacts.csv.display());
    println!("  Report: {}", result.artifacts.report.display());
    println!();

    println!("Run {} finished in {}ms", result.run_id, result.duration_ms);
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

//! Entry point for the datasift web shell.

use anyhow::Result;
use datasift_web::{ServerConfig, build_pipeline, serve};
use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    init_logging();

    let config = ServerConfig::from_env()?;
    let pipeline = Arc::new(build_pipeline(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(&config, pipeline.clone()))?;
    drop(runtime);

    // The blocking HTTP client inside the pipeline must be dropped outside
    // the async runtime.
    drop(pipeline);
    Ok(())
}

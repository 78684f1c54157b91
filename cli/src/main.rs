//! Ludics CLI - batch driver for the analysis service.
//!
//! Reads a JSON batch (designs plus requests) from the file given as the
//! first argument, or from stdin when the argument is missing or `-`, and
//! prints the responses as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tokio::io::{AsyncReadExt, stdin};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ludics_engine::{AnalysisService, Batch, LudicsConfig, run_batch};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries the JSON output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn read_input(arg: Option<String>) -> Result<String> {
    match arg.as_deref() {
        None | Some("-") => {
            let mut input = String::new();
            stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read batch from stdin")?;
            Ok(input)
        }
        Some(path) => {
            let path = PathBuf::from(path);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read batch from {}", path.display()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let input = read_input(env::args().nth(1)).await?;
    let batch: Batch = serde_json::from_str(&input).context("Batch is not valid JSON")?;

    let config = LudicsConfig::load_or_default();
    let service = AnalysisService::from_config(&config);
    tracing::info!(
        designs = batch.designs.len(),
        requests = batch.requests.len(),
        "running batch"
    );

    let output = run_batch(&service, batch).await;
    let failed = output
        .designs
        .iter()
        .chain(&output.responses)
        .filter(|r| !r.is_ok())
        .count();
    if failed > 0 {
        tracing::info!(failed, "some requests failed");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to encode responses")?
    );
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::types::ProbeSummary;
use crate::{config, output, prober};

/// Settings for the client binary, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub servers: PathBuf,
    pub output: PathBuf,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: PathBuf::from("servers.csv"),
            output: PathBuf::from("result.csv"),
            timeout: Duration::from_secs(2),
            concurrency: 5,
        }
    }
}

/// Validate the servers file, probe every target, write the result file and print the totals.
///
/// Only config and output file errors are returned; unreachable targets are just `closed` rows.
pub async fn run_client(cfg: ClientConfig) -> Result<ProbeSummary> {
    let targets = config::load_targets_from_path(&cfg.servers)
        .context("servers file validation failed")?;

    println!(
        "Starting port test with {} second timeout and {} concurrent requests",
        cfg.timeout.as_secs(),
        cfg.concurrency
    );
    info!(targets = targets.len(), servers = %cfg.servers.display(), "probing");

    let results = prober::probe_targets(&targets, cfg.timeout, cfg.concurrency).await?;
    output::write_results(&cfg.output, &results).context("error writing results to CSV")?;

    let summary = ProbeSummary::from_results(&results);
    println!(
        "Total Tests: {}, Success: {}, Failure: {}",
        summary.total, summary.open, summary.closed
    );
    info!(output = %cfg.output.display(), "results written");
    Ok(summary)
}

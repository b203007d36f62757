use crate::types::{ProbeResult, ProbeStatus, Target};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Probe every target with one HTTP GET each, at most `concurrency` in flight at a time.
///
/// - Limits concurrent requests using a `Semaphore`; dispatch follows input order.
/// - Each request is bounded by `timeout` (connect + response); a zero timeout means no limit.
/// - Results are fanned in over a channel and returned in completion order.
/// - Returns exactly `targets.len()` results; a failed request is a `Closed` result, never an error.
pub async fn probe_targets(
    targets: &[Target],
    timeout: Duration,
    concurrency: usize,
) -> Result<Vec<ProbeResult>> {
    let client = build_client(timeout)?;
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<ProbeResult>(targets.len().max(1));
    let mut set = JoinSet::new();

    for &target in targets {
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .context("probe semaphore closed")?;
        let client = client.clone();
        let tx = tx.clone();

        set.spawn(async move {
            let _permit = permit; // hold the slot until the result is handed off
            let result = probe_target(&client, target).await;
            // Receiver outlives every sender; a send error would mean the batch was abandoned.
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(targets.len());
    while let Some(result) = rx.recv().await {
        results.push(result);
    }

    while let Some(joined) = set.join_next().await {
        joined.context("probe task panicked")?;
    }

    debug_assert_eq!(results.len(), targets.len());
    Ok(results)
}

/// Issue a single GET against `http://{address}:{port}/`. Open iff the response status is exactly 200.
pub async fn probe_target(client: &Client, target: Target) -> ProbeResult {
    let status = match client.get(target.url()).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => ProbeStatus::Open,
        Ok(resp) => {
            debug!(addr = %target, status = %resp.status(), "non-200 response");
            ProbeStatus::Closed
        }
        Err(e) => {
            debug!(addr = %target, error = %e, "probe failed");
            ProbeStatus::Closed
        }
    };
    ProbeResult::new(target, status)
}

/// HTTP client shared by all probes of a batch. System proxy settings are ignored so that
/// reachability reflects the direct path to the target. A zero `timeout` leaves requests unbounded.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder().no_proxy();
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build HTTP client")
}

use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};

use crate::access_log::format_timestamp;
use crate::report::format_ports;
use crate::types::{ClientSummary, ProbeResult};

pub const REPORT_HEADER: [&str; 5] = ["Client IP", "Client Port", "Last Access", "Tries", "Server Ports"];

/// Write probe results as CSV with header `IP,Port,Status`, replacing any existing file.
pub fn write_results(path: impl AsRef<Path>, results: &[ProbeResult]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("failed to create result file: {}", path.display()))?;
    if results.is_empty() {
        // serialize() only emits the header alongside the first row
        wtr.write_record(["IP", "Port", "Status"])?;
    }
    for r in results {
        wtr.serialize(r)
            .with_context(|| format!("failed to write result row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush result file: {}", path.display()))?;
    Ok(())
}

/// Read back a result file written by [`write_results`].
pub fn read_results(path: impl AsRef<Path>) -> Result<Vec<ProbeResult>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open result file: {}", path.display()))?;
    let mut out = Vec::new();
    for row in rdr.deserialize::<ProbeResult>() {
        out.push(row.with_context(|| format!("malformed row in {}", path.display()))?);
    }
    Ok(out)
}

/// Write the access report: one row per client, server ports rendered as `[p1 p2 ...]`.
pub fn write_report(path: impl AsRef<Path>, report: &[ClientSummary]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    wtr.write_record(REPORT_HEADER)?;
    for entry in report {
        wtr.write_record([
            entry.client_address.clone(),
            entry.client_port.to_string(),
            format_timestamp(entry.last_access),
            entry.attempt_count.to_string(),
            format_ports(&entry.server_ports),
        ])
        .with_context(|| format!("failed to write report row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush report file: {}", path.display()))?;
    Ok(())
}

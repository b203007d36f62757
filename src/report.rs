use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::access_log::read_log;
use crate::output::write_report;
use crate::types::{AccessRecord, ClientSummary};

pub const DEFAULT_REPORT: &str = "report.csv";

/// Group access records by (client address, client port) in a single pass.
///
/// `last_access` is the maximum timestamp in the group, regardless of file order.
/// The order of the returned summaries is unspecified.
pub fn build_report(records: &[AccessRecord]) -> Vec<ClientSummary> {
    let mut groups: HashMap<(&str, u16), ClientSummary> = HashMap::new();

    for rec in records {
        let entry = groups
            .entry((rec.client_address.as_str(), rec.client_port))
            .or_insert_with(|| ClientSummary {
                client_address: rec.client_address.clone(),
                client_port: rec.client_port,
                last_access: rec.timestamp,
                attempt_count: 0,
                server_ports: BTreeSet::new(),
            });
        entry.attempt_count += 1;
        entry.server_ports.insert(rec.server_port);
        if rec.timestamp > entry.last_access {
            entry.last_access = rec.timestamp;
        }
    }

    groups.into_values().collect()
}

/// Render a port set as `[8080 8081]`.
pub fn format_ports(ports: &BTreeSet<u16>) -> String {
    let inner: Vec<String> = ports.iter().map(u16::to_string).collect();
    format!("[{}]", inner.join(" "))
}

/// Read the access log, build the per-client report and write it. Returns the number of rows.
pub fn generate_report(log_path: impl AsRef<Path>, report_path: impl AsRef<Path>) -> Result<usize> {
    let log_path = log_path.as_ref();
    let report_path = report_path.as_ref();

    let records = read_log(log_path).context("error reading log file")?;
    let report = build_report(&records);
    write_report(report_path, &report).context("error saving report to CSV")?;

    info!(
        records = records.len(),
        clients = report.len(),
        "report written to {}",
        report_path.display()
    );
    Ok(report.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn ports_render_bracketed_and_space_separated() {
        let ports: BTreeSet<u16> = [8081, 8080].into_iter().collect();
        assert_eq!(format_ports(&ports), "[8080 8081]");
        assert_eq!(format_ports(&BTreeSet::new()), "[]");
    }

    #[test]
    fn same_address_different_client_port_is_a_different_client() {
        let ts = datetime!(2024-01-01 0:00);
        let recs = vec![
            AccessRecord { timestamp: ts, client_address: "10.0.0.1".into(), client_port: 1, server_port: 80 },
            AccessRecord { timestamp: ts, client_address: "10.0.0.1".into(), client_port: 2, server_port: 80 },
        ];
        assert_eq!(build_report(&recs).len(), 2);
    }

    #[test]
    fn empty_log_gives_empty_report() {
        assert!(build_report(&[]).is_empty());
    }
}

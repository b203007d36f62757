use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// One (IP, port) pair the client probes, loaded from a row of the servers file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub address: IpAddr,
    pub port: u16,
}

impl Target {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Root URL probed for this target, e.g. `http://127.0.0.1:8080/` or `http://[::1]:80/`.
    pub fn url(&self) -> String {
        format!("http://{}/", self.socket_addr())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Open,
    Closed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Open => "open",
            ProbeStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one target. Field names map onto the result file header `IP,Port,Status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeResult {
    #[serde(rename = "IP")]
    pub address: IpAddr,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Status")]
    pub status: ProbeStatus,
}

impl ProbeResult {
    pub fn new(target: Target, status: ProbeStatus) -> Self {
        Self {
            address: target.address,
            port: target.port,
            status,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ProbeStatus::Open
    }
}

/// Aggregate counts over a finished probe batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
}

impl ProbeSummary {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let open = results.iter().filter(|r| r.is_open()).count();
        Self {
            total: results.len(),
            open,
            closed: results.len() - open,
        }
    }
}

/// A server port and the text body it answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub port: u16,
    pub text: String,
}

/// One inbound request as recorded in the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub timestamp: PrimitiveDateTime,
    pub client_address: String,
    pub client_port: u16,
    pub server_port: u16,
}

/// Per-client aggregate over the access log, keyed by (client address, client port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSummary {
    pub client_address: String,
    pub client_port: u16,
    pub last_access: PrimitiveDateTime,
    pub attempt_count: usize,
    pub server_ports: BTreeSet<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn ipv6_target_url_is_bracketed() {
        let t = Target::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 8080);
        assert_eq!(t.url(), "http://[::1]:8080/");
    }

    #[test]
    fn summary_counts_open_and_closed() {
        let t = Target::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 80);
        let results = vec![
            ProbeResult::new(t, ProbeStatus::Open),
            ProbeResult::new(t, ProbeStatus::Closed),
            ProbeResult::new(t, ProbeStatus::Closed),
        ];
        let s = ProbeSummary::from_results(&results);
        assert_eq!(s, ProbeSummary { total: 3, open: 1, closed: 2 });
    }
}

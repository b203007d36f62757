use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use portcheck_rs::client::{self, ClientConfig};
use portcheck_rs::logging;

const SERVERS_CSV_HELP: &str = "\
Expected CSV format for the servers file (no header row):
  servers.csv:
    127.0.0.1,8080
    192.168.1.10,8081";

/// Probe (IP, port) pairs over HTTP and record which answer 200.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portcheck-client",
    version,
    about = "Probe (IP, port) pairs over HTTP and record which answer 200.",
    long_about = None,
    after_help = SERVERS_CSV_HELP
)]
struct Cli {
    /// Path to servers and ports CSV file.
    #[arg(short, long, default_value = "servers.csv")]
    servers: PathBuf,

    /// Path to output result CSV file.
    #[arg(short, long, default_value = "result.csv")]
    output: PathBuf,

    /// Timeout for each request, in seconds (0 disables the timeout).
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,

    /// Number of concurrent requests.
    #[arg(short, long, default_value_t = 5, value_parser = parse_concurrency)]
    concurrency: usize,
}

impl From<Cli> for ClientConfig {
    fn from(cli: Cli) -> Self {
        ClientConfig {
            servers: cli.servers,
            output: cli.output,
            timeout: Duration::from_secs(cli.timeout),
            concurrency: cli.concurrency,
        }
    }
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // No arguments at all: show usage and the expected file layout, then exit cleanly.
    if std::env::args_os().len() < 2 {
        Cli::command().print_help()?;
        return Ok(());
    }

    let cli = Cli::parse();
    logging::init_tracing();

    client::run_client(cli.into()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["portcheck-client", "-t", "2"]).unwrap();
        let cfg: ClientConfig = cli.into();
        assert_eq!(cfg.servers, PathBuf::from("servers.csv"));
        assert_eq!(cfg.output, PathBuf::from("result.csv"));
        assert_eq!(cfg.timeout, Duration::from_secs(2));
        assert_eq!(cfg.concurrency, 5);
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "portcheck-client", "-s", "in.csv", "-o", "out.csv", "-t", "1", "-c", "1",
        ])
        .unwrap();
        assert_eq!(cli.servers, PathBuf::from("in.csv"));
        assert_eq!(cli.output, PathBuf::from("out.csv"));
        assert_eq!(cli.timeout, 1);
        assert_eq!(cli.concurrency, 1);
    }

    #[test]
    fn zero_concurrency_rejected() {
        assert!(Cli::try_parse_from(["portcheck-client", "-c", "0"]).is_err());
    }

    #[test]
    fn zero_timeout_disables_the_limit() {
        let cli = Cli::try_parse_from(["portcheck-client", "-t", "0"]).unwrap();
        let cfg: ClientConfig = cli.into();
        assert!(cfg.timeout.is_zero());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}

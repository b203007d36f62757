use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use portcheck_rs::logging;
use portcheck_rs::server::{self, ServerConfig};

const CONFIG_CSV_HELP: &str = "\
Expected CSV format for --config file (no header row):
  servers.csv:
    8080,Hello from port 8080
    8081,Welcome to port 8081";

/// Answer on several ports with a fixed text and report on who connected.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portcheck-server",
    version,
    about = "Answer on several ports with a fixed text and report on who connected.",
    long_about = None,
    after_help = CONFIG_CSV_HELP
)]
struct Cli {
    /// Start the server with the specified configuration.
    #[arg(short, long, default_value_t = false, conflicts_with = "report")]
    start: bool,

    /// Generate a connection report based on access logs.
    #[arg(short, long, default_value_t = false)]
    report: bool,

    /// Path to server configuration CSV file.
    #[arg(short, long, default_value = "servers.csv")]
    config: PathBuf,

    /// Access log every request is appended to.
    #[arg(long = "access-log", default_value = "access_log.csv")]
    access_log: PathBuf,

    /// Where --report writes its summary.
    #[arg(long = "report-output", default_value = "report.csv")]
    report_output: PathBuf,

    /// Address the listeners bind to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,
}

impl From<&Cli> for ServerConfig {
    fn from(cli: &Cli) -> Self {
        ServerConfig {
            config: cli.config.clone(),
            access_log: cli.access_log.clone(),
            report: cli.report_output.clone(),
            host: cli.host,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args_os().len() < 2 {
        Cli::command().print_help()?;
        return Ok(());
    }

    let cli = Cli::parse();
    logging::init_tracing();
    let cfg = ServerConfig::from(&cli);

    if cli.start {
        server::run_server(cfg).await?;
    } else if cli.report {
        server::run_report(&cfg)?;
    } else {
        Cli::command().print_help()?;
    }
    Ok(())
}

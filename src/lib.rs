//! Library crate for portcheck-rs: an HTTP reachability prober and a multi-port text server
//! that logs every client and reports on those logs.
pub mod access_log;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod prober;
pub mod report;
pub mod server;
pub mod types;

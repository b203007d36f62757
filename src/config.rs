use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::ConfigError;
use crate::types::{PortBinding, Target};

/// Parse servers file content (`IP,Port` rows, no header) into targets, preserving file order.
///
/// - blank lines are skipped
/// - the IP and port fields are trimmed, extra fields after the second are ignored
/// - a row with fewer than two fields, an unparsable IP literal or a port outside
///   `0..=65535` fails with [`ConfigError::Format`] carrying the 1-based line number
pub fn parse_targets_str(s: &str) -> Result<Vec<Target>, ConfigError> {
    let rows = read_rows(s.as_bytes()).map_err(csv_to_format)?;
    targets_from_rows(rows)
}

/// Load and validate a servers file from disk.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<Target>, ConfigError> {
    let path = path.as_ref();
    let rows = read_rows(open(path)?).map_err(|source| ConfigError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    targets_from_rows(rows)
}

/// Parse server config content (`Port,Text` rows, no header) into port bindings.
///
/// Only the port column is validated and trimmed. The text column is kept verbatim,
/// surrounding whitespace included; duplicate ports are passed through untouched.
pub fn parse_bindings_str(s: &str) -> Result<Vec<PortBinding>, ConfigError> {
    let rows = read_rows(s.as_bytes()).map_err(csv_to_format)?;
    bindings_from_rows(rows)
}

pub fn load_bindings_from_path(path: impl AsRef<Path>) -> Result<Vec<PortBinding>, ConfigError> {
    let path = path.as_ref();
    let rows = read_rows(open(path)?).map_err(|source| ConfigError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    bindings_from_rows(rows)
}

fn open(path: &Path) -> Result<File, ConfigError> {
    File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read every row as `(line_no, record)`. Rows may have differing field counts.
fn read_rows<R: Read>(input: R) -> Result<Vec<(usize, StringRecord)>, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let line_no = rec
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        rows.push((line_no, rec));
    }
    Ok(rows)
}

fn csv_to_format(err: csv::Error) -> ConfigError {
    let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
    ConfigError::format(line, err.to_string())
}

fn targets_from_rows(rows: Vec<(usize, StringRecord)>) -> Result<Vec<Target>, ConfigError> {
    let mut out = Vec::with_capacity(rows.len());
    for (line_no, rec) in rows {
        if rec.len() < 2 {
            return Err(ConfigError::format(line_no, "expected [IP, Port]"));
        }
        let address: IpAddr = rec[0]
            .trim()
            .parse()
            .map_err(|_| ConfigError::format(line_no, format!("invalid IP address: {}", &rec[0])))?;
        let port = parse_port(&rec[1])
            .map_err(|e| ConfigError::format(line_no, format!("invalid port {:?}: {e}", &rec[1])))?;
        out.push(Target::new(address, port));
    }
    Ok(out)
}

fn bindings_from_rows(rows: Vec<(usize, StringRecord)>) -> Result<Vec<PortBinding>, ConfigError> {
    let mut out = Vec::with_capacity(rows.len());
    for (line_no, rec) in rows {
        if rec.len() < 2 {
            return Err(ConfigError::format(line_no, "expected [Port, Text]"));
        }
        let port = parse_port(&rec[0])
            .map_err(|e| ConfigError::format(line_no, format!("invalid port {:?}: {e}", &rec[0])))?;
        out.push(PortBinding {
            port,
            text: rec[1].to_string(),
        });
    }
    Ok(out)
}

fn parse_port(s: &str) -> Result<u16, std::num::ParseIntError> {
    s.trim().parse::<u16>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn parse_targets_in_file_order() {
        let input = "127.0.0.1,8080\n192.168.1.10, 8081\n::1,80\n";
        let targets = parse_targets_str(input).unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
                Target::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 8081),
                Target::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 80),
            ]
        );
    }

    #[test]
    fn duplicate_targets_are_kept() {
        let targets = parse_targets_str("10.0.0.1,80\n10.0.0.1,80\n").unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn extra_fields_ignored() {
        let targets = parse_targets_str("10.0.0.1,80,web frontend\n").unwrap();
        assert_eq!(targets[0].port, 80);
    }

    #[test]
    fn invalid_ip_reports_line() {
        let err = parse_targets_str("127.0.0.1,80\nnot-an-ip,80\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn invalid_port_reports_line() {
        let err = parse_targets_str("127.0.0.1,80\n127.0.0.1,80\n127.0.0.1,http\n").unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn port_out_of_range_rejected() {
        assert!(parse_targets_str("127.0.0.1,70000\n").is_err());
    }

    #[test]
    fn short_row_rejected() {
        let err = parse_targets_str("127.0.0.1\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn bindings_keep_text_verbatim() {
        let input = "8080,Hello from port 8080\n8081,\"Welcome, friend\"\n";
        let bindings = parse_bindings_str(input).unwrap();
        assert_eq!(
            bindings,
            vec![
                PortBinding { port: 8080, text: "Hello from port 8080".into() },
                PortBinding { port: 8081, text: "Welcome, friend".into() },
            ]
        );
    }

    #[test]
    fn binding_text_whitespace_is_preserved() {
        let bindings = parse_bindings_str("8080,  Hello  \n 8081 ,tab\tend\t\n").unwrap();
        assert_eq!(bindings[0].text, "  Hello  ");
        assert_eq!(bindings[1].port, 8081);
        assert_eq!(bindings[1].text, "tab\tend\t");
    }

    #[test]
    fn binding_port_must_be_integer() {
        let err = parse_bindings_str("8080,ok\neighty,nope\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}

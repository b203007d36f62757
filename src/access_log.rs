use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use time::macros::{datetime, format_description};
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::types::AccessRecord;

pub const DEFAULT_ACCESS_LOG: &str = "access_log.csv";

/// Value substituted for timestamps that fail to parse when reading the log back.
pub const ZERO_TIMESTAMP: PrimitiveDateTime = datetime!(1-01-01 0:00);

/// Appends access records to a CSV file (`Timestamp,ClientIP,ClientPort,ServerPort`, no header).
///
/// Every append opens the file in append mode, writes the complete line with a single
/// `write_all`, and closes it again. There is no lock: concurrent appends rely on the
/// platform's append-mode semantics to keep lines whole, which holds for short lines on
/// local filesystems but is not guaranteed under heavy contention.
#[derive(Debug, Clone)]
pub struct AccessLogger {
    path: PathBuf,
}

impl AccessLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &AccessRecord) -> Result<()> {
        let line = encode_record(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open access log: {}", self.path.display()))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("failed to append to access log: {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

fn encode_record(record: &AccessRecord) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record([
        format_timestamp(record.timestamp),
        record.client_address.clone(),
        record.client_port.to_string(),
        record.server_port.to_string(),
    ])?;
    wtr.into_inner()
        .map_err(|e| e.into_error())
        .context("failed to encode access record")
}

/// Read the whole access log.
///
/// Malformed fields do not reject the row: an unparsable timestamp becomes
/// [`ZERO_TIMESTAMP`], an unparsable port becomes `0`, missing fields are empty, and
/// invalid UTF-8 is replaced field by field.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<AccessRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open access log: {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut out = Vec::new();
    for rec in rdr.byte_records() {
        let rec = rec.with_context(|| format!("failed to read access log: {}", path.display()))?;
        out.push(record_from_row(&rec));
    }
    Ok(out)
}

fn record_from_row(rec: &ByteRecord) -> AccessRecord {
    let field = |i: usize| String::from_utf8_lossy(rec.get(i).unwrap_or_default()).trim().to_string();
    AccessRecord {
        timestamp: parse_timestamp(&field(0)).unwrap_or(ZERO_TIMESTAMP),
        client_address: field(1),
        client_port: field(2).parse().unwrap_or(0),
        server_port: field(3).parse().unwrap_or(0),
    }
}

/// Current wall-clock time, local when the offset can be determined, UTC otherwise.
pub fn now_timestamp() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time().replace_nanosecond(0).unwrap_or(now.time()))
}

/// Render as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| String::from("0001-01-01 00:00:00"))
}

pub fn parse_timestamp(s: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")).ok()
}

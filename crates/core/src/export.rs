//! CSV export of batch results.
//!
//! Files are UTF-8 with a byte-order mark so spreadsheet applications pick
//! the right encoding. Latencies are written in seconds with millisecond
//! precision; absent values are blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use crate::error::{ExportError, ExportResult};
use crate::model::{BatchResult, ProbeResult};

/// UTF-8 byte-order mark written before the header row.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header row, in column order.
pub const COLUMNS: [&str; 7] = [
    "model",
    "success",
    "first_byte_s",
    "total_s",
    "response_length",
    "error",
    "timestamp",
];

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub model: String,
    pub success: bool,
    pub first_byte_s: Option<f64>,
    pub total_s: f64,
    pub response_length: usize,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ProbeResult> for ExportRow {
    fn from(result: &ProbeResult) -> Self {
        Self {
            model: result.model().to_string(),
            success: result.success(),
            first_byte_s: result.first_byte().map(|d| round_millis(d.as_secs_f64())),
            total_s: round_millis(result.total().as_secs_f64()),
            response_length: result.response_length(),
            error: result.error().map(str::to_string),
            timestamp: result.started_at(),
        }
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Write a batch as CSV (BOM, header, one row per result).
///
/// # Errors
///
/// Returns `ExportError::Empty` for a batch without results.
pub fn write_csv<W: Write>(batch: &BatchResult, mut writer: W) -> ExportResult<()> {
    if batch.is_empty() {
        return Err(ExportError::Empty);
    }

    writer.write_all(UTF8_BOM)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for result in batch {
        csv_writer.serialize(ExportRow::from(result))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a batch to a CSV file, replacing any existing file.
pub fn export_csv(batch: &BatchResult, path: impl AsRef<Path>) -> ExportResult<()> {
    let path = path.as_ref();
    if batch.is_empty() {
        return Err(ExportError::Empty);
    }

    let file = File::create(path)?;
    write_csv(batch, BufWriter::new(file))?;
    info!(path = %path.display(), rows = batch.len(), "Exported results");
    Ok(())
}

/// Read rows back from CSV produced by [`write_csv`]. A leading BOM is optional.
pub fn read_csv<R: Read>(mut reader: R) -> ExportResult<Vec<ExportRow>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut csv_reader = csv::Reader::from_reader(body);
    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<ExportRow>, csv::Error>>()?;
    Ok(rows)
}

/// Read rows back from a CSV file.
pub fn import_csv(path: impl AsRef<Path>) -> ExportResult<Vec<ExportRow>> {
    read_csv(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSpec;
    use std::time::Duration;

    fn sample_batch() -> BatchResult {
        let now = Utc::now();
        BatchResult::from_results(
            3,
            vec![
                ProbeResult::succeeded(
                    ModelSpec::from("doubao-lite"),
                    Duration::from_millis(201),
                    Duration::from_micros(1_000_400),
                    42,
                    now,
                ),
                ProbeResult::failed(
                    ModelSpec::from("doubao-pro"),
                    None,
                    Duration::from_secs(5),
                    0,
                    "timeout",
                    now,
                ),
                ProbeResult::failed(
                    ModelSpec::from("doubao-vl"),
                    Some(Duration::from_millis(300)),
                    Duration::from_millis(900),
                    7,
                    "stream error: reset, \"peer\" closed",
                    now,
                ),
            ],
        )
    }

    fn export_to_string(batch: &BatchResult) -> Vec<u8> {
        let mut buf = Vec::new();
        write_csv(batch, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_output_starts_with_bom_and_header() {
        let buf = export_to_string(&sample_batch());
        assert!(buf.starts_with(UTF8_BOM));

        let text = String::from_utf8(buf[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        let first = lines.next().unwrap();
        assert!(first.starts_with("doubao-lite,true,0.201,1.0,42,,"), "{}", first);
        let second = lines.next().unwrap();
        assert!(second.starts_with("doubao-pro,false,,5.0,0,timeout,"), "{}", second);
    }

    #[test]
    fn test_round_trip_preserves_rows() {
        let batch = sample_batch();
        let rows = read_csv(&export_to_string(&batch)[..]).unwrap();

        assert_eq!(rows.len(), batch.len());
        for (row, result) in rows.iter().zip(batch.iter()) {
            assert_eq!(row.model, result.model().as_str());
            assert_eq!(row.success, result.success());
            assert_eq!(row.response_length, result.response_length());
            assert_eq!(row.error.as_deref(), result.error());
            assert!((row.total_s - result.total().as_secs_f64()).abs() <= 0.0005);
            match (row.first_byte_s, result.first_byte()) {
                (Some(exported), Some(measured)) => {
                    assert!((exported - measured.as_secs_f64()).abs() <= 0.0005)
                }
                (None, None) => {}
                other => panic!("first byte mismatch: {:?}", other),
            }
            assert_eq!(row.timestamp, result.started_at());
        }
    }

    #[test]
    fn test_read_without_bom() {
        let buf = export_to_string(&sample_batch());
        let rows = read_csv(&buf[UTF8_BOM.len()..]).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let empty = BatchResult::from_results(2, Vec::new());
        let mut buf = Vec::new();
        assert!(matches!(write_csv(&empty, &mut buf), Err(ExportError::Empty)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_export_and_import_file() {
        let path = std::env::temp_dir().join(format!("firstbyte-{}.csv", uuid::Uuid::now_v7()));
        let batch = sample_batch();

        export_csv(&batch, &path).unwrap();
        let rows = import_csv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].error.as_deref(), Some("timeout"));
        assert!(rows[1].first_byte_s.is_none());
    }
}

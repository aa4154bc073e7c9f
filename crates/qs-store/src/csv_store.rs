//! Headerless CSV coefficient table.
//!
//! One row per device: `serial,c0,c1,c2,c3`. Rows for other devices are written
//! back field for field when a row is rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use qs_core::{CHANNEL_COUNT, Coefficients, DeviceSerial};
use tracing::debug;

use crate::{CoefficientStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct CsvCoefficientStore {
    path: PathBuf,
}

impl CsvCoefficientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows stay raw bytes so a bad row for one serial does not stop the
    /// others from loading.
    fn read_records(&self) -> StoreResult<Vec<ByteRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        let mut records = Vec::new();
        for record in reader.byte_records() {
            records.push(record?);
        }
        Ok(records)
    }
}

fn row_matches(record: &ByteRecord, serial: DeviceSerial) -> bool {
    record
        .get(0)
        .and_then(|field| std::str::from_utf8(field).ok())
        .and_then(|field| field.parse::<DeviceSerial>().ok())
        .is_some_and(|s| s == serial)
}

fn parse_row(record: &ByteRecord, line: u64) -> StoreResult<Coefficients> {
    let record =
        StringRecord::from_byte_record(record.clone()).map_err(|e| StoreError::MalformedRow {
            line,
            what: format!("row is not valid UTF-8: {e}"),
        })?;
    let values = record.len().saturating_sub(1);
    if values != CHANNEL_COUNT {
        return Err(StoreError::MalformedRow {
            line,
            what: format!("expected {CHANNEL_COUNT} coefficients, found {values}"),
        });
    }

    let mut gains = [0.0; CHANNEL_COUNT];
    for (c, field) in record.iter().skip(1).enumerate() {
        gains[c] = field.parse::<f64>().map_err(|_| StoreError::MalformedRow {
            line,
            what: format!("coefficient c{c} is not a number: {field:?}"),
        })?;
    }
    Coefficients::new(gains).map_err(|e| StoreError::MalformedRow {
        line,
        what: e.to_string(),
    })
}

fn to_record(serial: DeviceSerial, coefficients: &Coefficients) -> ByteRecord {
    let mut record = ByteRecord::new();
    record.push_field(serial.to_string().as_bytes());
    for gain in coefficients.gains() {
        record.push_field(gain.to_string().as_bytes());
    }
    record
}

/// Write `records` to a sibling temp file, then rename it over `path`.
///
/// The temp file is removed if either step fails.
fn replace_table(path: &Path, records: &[ByteRecord]) -> StoreResult<()> {
    let tmp_path = path.with_extension("csv.tmp");
    let result = write_records(&tmp_path, records)
        .and_then(|()| fs::rename(&tmp_path, path).map_err(StoreError::from));
    if result.is_err() && tmp_path.exists() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            debug!(path = %tmp_path.display(), error = %e, "temp table not removed");
        }
    }
    result
}

fn write_records(path: &Path, records: &[ByteRecord]) -> StoreResult<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    for record in records {
        writer.write_byte_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

impl CoefficientStore for CsvCoefficientStore {
    fn load(&self, serial: DeviceSerial) -> StoreResult<Coefficients> {
        let records = self.read_records()?;
        for (idx, record) in records.iter().enumerate() {
            if row_matches(record, serial) {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(idx as u64 + 1);
                let coefficients = parse_row(record, line)?;
                debug!(%serial, path = %self.path.display(), "coefficients loaded");
                return Ok(coefficients);
            }
        }
        Err(StoreError::NotFound { serial })
    }

    fn save(&mut self, serial: DeviceSerial, coefficients: &Coefficients) -> StoreResult<()> {
        let mut records = self.read_records()?;
        let row = to_record(serial, coefficients);

        match records.iter().position(|r| row_matches(r, serial)) {
            Some(first) => {
                records[first] = row;
                let mut idx = 0;
                records.retain(|r| {
                    let keep = idx <= first || !row_matches(r, serial);
                    idx += 1;
                    keep
                });
            }
            None => records.push(row),
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        replace_table(&self.path, &records)?;

        debug!(%serial, rows = records.len(), path = %self.path.display(), "coefficients saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_is_malformed() {
        let record = ByteRecord::from(vec!["716692", "1.0", "2.0", "3.0"]);
        let err = parse_row(&record, 4).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow { line: 4, .. }));
    }

    #[test]
    fn empty_value_is_not_zero() {
        let record = ByteRecord::from(vec!["716692", "1.0", "", "3.0", "4.0"]);
        assert!(parse_row(&record, 1).is_err());
    }

    #[test]
    fn nan_value_rejected() {
        let record = ByteRecord::from(vec!["716692", "1.0", "NaN", "3.0", "4.0"]);
        assert!(parse_row(&record, 1).is_err());
    }

    #[test]
    fn serial_match_ignores_other_rows() {
        let record = ByteRecord::from(vec!["716692", "1"]);
        assert!(row_matches(&record, DeviceSerial(716692)));
        assert!(!row_matches(&record, DeviceSerial(716710)));
        assert!(!row_matches(&ByteRecord::from(vec!["header"]), DeviceSerial(0)));
        let garbled = ByteRecord::from(vec![&b"7166\xff92"[..], &b"1"[..]]);
        assert!(!row_matches(&garbled, DeviceSerial(716692)));
    }

    #[test]
    fn non_utf8_value_is_malformed() {
        let fields: [&[u8]; 5] = [b"716692", b"1.0", b"\xff", b"3.0", b"4.0"];
        let record = ByteRecord::from(fields.to_vec());
        let err = parse_row(&record, 2).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn failed_rename_removes_temp_table() {
        let dir = std::env::temp_dir().join("qs_store_unit").join("rename");
        let _ = fs::remove_dir_all(&dir);
        // A directory in place of the table makes the final rename fail.
        let path = dir.join("table.csv");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let c = Coefficients::new([1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = replace_table(&path, &[to_record(DeviceSerial(1), &c)]).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.join("table.csv.tmp").exists());
        assert!(path.is_dir());
    }
}

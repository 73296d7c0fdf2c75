//! Durable CSV artifact writing
//!
//! One artifact per partition, rebuilt from scratch every run: the first
//! flush truncates and writes the header row, every later flush appends
//! data rows with no header. Each flush is all-or-nothing from the caller's
//! perspective - the batch is encoded fully into memory and lands on disk
//! through a single write call, so a failure leaves at most the previous
//! flush's data in the file, never a half-written row.

use crate::decode::Record;
use crate::error::{IngestError, Result};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Batch writer for one partition's artifact
#[derive(Debug)]
pub struct ArtifactWriter {
    destination: PathBuf,
    /// Column order, derived once at the first flush of the run
    header: Option<Vec<String>>,
}

impl ArtifactWriter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            header: None,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Flush one batch of records
    ///
    /// `first_write_of_run` decides write mode (truncate vs. append) and
    /// header emission; the caller derives it from its write cursor, since
    /// on-disk state alone cannot distinguish a fresh run from a resumed
    /// one. Returns the number of records written.
    pub fn flush(&mut self, records: &[Record], first_write_of_run: bool) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let header = self
            .header
            .get_or_insert_with(|| derive_header(records))
            .clone();

        let encoded = encode_batch(records, &header, first_write_of_run)
            .map_err(|source| self.write_failure(source))?;

        if let Some(parent) = self.destination.parent() {
            std::fs::create_dir_all(parent).map_err(|source| self.write_failure(source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first_write_of_run)
            .append(!first_write_of_run)
            .open(&self.destination)
            .map_err(|source| self.write_failure(source))?;

        file.write_all(&encoded)
            .and_then(|()| file.flush())
            .map_err(|source| self.write_failure(source))?;

        debug!(
            destination = %self.destination.display(),
            records = records.len(),
            first_write = first_write_of_run,
            "flushed batch"
        );

        Ok(records.len() as u64)
    }

    fn write_failure(&self, source: std::io::Error) -> IngestError {
        IngestError::WriteFailure {
            path: self.destination.clone(),
            source,
        }
    }
}

/// Column order for the run: record keys in first-seen order across the
/// first batch
fn derive_header(records: &[Record]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !header.iter().any(|h| h == key) {
                header.push(key.clone());
            }
        }
    }
    header
}

/// Encode a batch into an in-memory CSV buffer
fn encode_batch(
    records: &[Record],
    header: &[String],
    with_header: bool,
) -> std::io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(records.len() * 64));

    if with_header {
        writer.write_record(header).map_err(std::io::Error::other)?;
    }
    for record in records {
        writer
            .write_record(header.iter().map(|key| render_scalar(record.get(key))))
            .map_err(std::io::Error::other)?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Render one scalar field for CSV output
///
/// Absent keys and JSON null become empty fields; everything else keeps its
/// JSON textual form (strings unquoted).
fn render_scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // Nested values do not occur in this dataset; keep them readable.
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut map = Record::new();
        for (key, value) in pairs {
            map.insert((*key).to_string(), value.clone());
        }
        map
    }

    #[test]
    fn first_flush_writes_header_then_appends_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022-1.csv");
        let mut writer = ArtifactWriter::new(&path);

        let first = vec![
            record(&[("a", Value::from("1")), ("b", Value::from("x"))]),
            record(&[("a", Value::from("2")), ("b", Value::from("y"))]),
        ];
        let second = vec![
            record(&[("a", Value::from("3")), ("b", Value::from("z"))]),
            record(&[("a", Value::from("4")), ("b", Value::from("w"))]),
        ];

        assert_eq!(writer.flush(&first, true).unwrap(), 2);
        assert_eq!(writer.flush(&second, false).unwrap(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, ["a,b", "1,x", "2,y", "3,z", "4,w"]);
    }

    #[test]
    fn first_write_truncates_prior_run_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022-2.csv");
        std::fs::write(&path, "stale,rows\nfrom,before\n").unwrap();

        let mut writer = ArtifactWriter::new(&path);
        let batch = vec![record(&[("a", Value::from("1"))])];
        writer.flush(&batch, true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a\n1\n");
    }

    #[test]
    fn header_is_first_seen_order_across_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022-3.csv");
        let mut writer = ArtifactWriter::new(&path);

        // Second record introduces a key the first one lacks.
        let batch = vec![
            record(&[("b", Value::from("1")), ("a", Value::from("2"))]),
            record(&[("b", Value::from("3")), ("c", Value::from("4"))]),
        ];
        writer.flush(&batch, true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, ["b,a,c", "1,2,", "3,,4"]);
    }

    #[test]
    fn null_and_missing_fields_render_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022-4.csv");
        let mut writer = ArtifactWriter::new(&path);

        let batch = vec![
            record(&[("a", Value::from("1")), ("b", Value::Null)]),
            record(&[("a", Value::from("2"))]),
        ];
        writer.flush(&batch, true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, ["a,b", "1,", "2,"]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022-5.csv");
        let mut writer = ArtifactWriter::new(&path);
        assert_eq!(writer.flush(&[], true).unwrap(), 0);
        assert!(!path.exists());
    }
}

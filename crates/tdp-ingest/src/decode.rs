//! Line-level decoding of the streamed response body
//!
//! The upstream `.json` format is not a JSON document when read as a whole:
//! it is a line-oriented relaxation of a JSON array, one object per line
//! with the array brackets and element separators attached to the lines
//! they happen to land on. A page with no matching rows is the single
//! literal line `[]`.

use crate::error::{IngestError, Result};

/// One decoded record: field name to scalar value, in first-seen order
///
/// Structurally untyped at this layer; the record is an opaque row with no
/// identity beyond its position in the stream.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Output of feeding one response line to the decoder
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    /// One decoded record
    Record(Record),
    /// The server's empty-array sentinel: no rows matched this page
    EndOfStream,
}

/// Decoder for one page's line stream
///
/// Consumes its input exactly once; after the sentinel is seen, further
/// lines produce nothing. Not restartable across pages - the driver creates
/// a fresh decoder per response.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    finished: bool,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the empty-array sentinel has been observed
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Decode one response line
    ///
    /// Returns `None` for lines after the sentinel. A line that fails to
    /// parse after the array framing is stripped is fatal for the page:
    /// silently dropping it would break the row-count invariant downstream.
    pub fn feed(&mut self, line: &str) -> Result<Option<DecodeEvent>> {
        if self.finished {
            return Ok(None);
        }

        if line == "[]" {
            self.finished = true;
            return Ok(Some(DecodeEvent::EndOfStream));
        }

        // Strip array framing and the element separator: leading/trailing
        // '[', ']' and ',' characters, whichever of them the line carries.
        let stripped = line.trim_matches(|c| c == '[' || c == ']' || c == ',');

        let record: Record =
            serde_json::from_str(stripped).map_err(|source| IngestError::MalformedRecord {
                line: line.to_string(),
                source,
            })?;

        Ok(Some(DecodeEvent::Record(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_array_sentinel_signals_end_of_stream() {
        let mut decoder = RecordDecoder::new();
        assert_eq!(decoder.feed("[]").unwrap(), Some(DecodeEvent::EndOfStream));
        assert!(decoder.finished());
        // Consumed exactly once: later lines produce nothing.
        assert_eq!(decoder.feed("{\"a\":1}").unwrap(), None);
    }

    #[test]
    fn decodes_line_with_trailing_separator() {
        let mut decoder = RecordDecoder::new();
        let event = decoder.feed("{\"a\":1},").unwrap().unwrap();
        match event {
            DecodeEvent::Record(record) => {
                assert_eq!(record.get("a"), Some(&json!(1)));
            },
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn strips_opening_and_closing_brackets() {
        let mut decoder = RecordDecoder::new();
        for line in ["[{\"a\":\"x\"}", ",{\"a\":\"y\"}", "{\"a\":\"z\"}]"] {
            let event = decoder.feed(line).unwrap().unwrap();
            assert!(matches!(event, DecodeEvent::Record(_)), "line {line:?}");
        }
    }

    #[test]
    fn unparseable_line_is_a_malformed_record() {
        let mut decoder = RecordDecoder::new();
        let err = decoder.feed("not json at all").unwrap_err();
        match err {
            IngestError::MalformedRecord { line, .. } => {
                assert_eq!(line, "not json at all");
            },
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn record_preserves_field_order() {
        let mut decoder = RecordDecoder::new();
        let event = decoder
            .feed("{\"vendorid\":\"2\",\"tpep_pickup_datetime\":\"2022-01-01T00:35:40.000\",\"fare_amount\":\"14.5\"},")
            .unwrap()
            .unwrap();
        let DecodeEvent::Record(record) = event else {
            panic!("expected record");
        };
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["vendorid", "tpep_pickup_datetime", "fare_amount"]);
    }
}

//! Bounded in-memory record buffer
//!
//! The accumulator is what keeps an a-priori-unbounded stream inside a fixed
//! memory budget: records buffer up to `capacity` and are drained to the
//! artifact writer in whole batches. Owned by the driver; never shared.

use crate::decode::Record;

/// Result of offering one record to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The record was buffered; capacity not yet reached
    Buffered,
    /// The buffer has reached exactly `capacity` and must be drained
    FlushDue,
}

/// Fixed-capacity record buffer
#[derive(Debug)]
pub struct BoundedAccumulator {
    buffer: Vec<Record>,
    capacity: usize,
}

impl BoundedAccumulator {
    /// Create an accumulator with the given capacity (must be non-zero;
    /// validated by [`crate::config::IngestConfig::validate`])
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append a record, signalling `FlushDue` exactly when the buffer
    /// reaches capacity (an exact threshold, matching the writer's
    /// batch-size expectations - not `>=`)
    pub fn offer(&mut self, record: Record) -> Offer {
        self.buffer.push(record);
        if self.buffer.len() == self.capacity {
            Offer::FlushDue
        } else {
            Offer::Buffered
        }
    }

    /// Empty the buffer and return its prior contents
    ///
    /// Used both at capacity and for the end-of-page cleanup flush.
    pub fn drain(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Record;
    use serde_json::Value;

    fn record(n: u64) -> Record {
        let mut map = Record::new();
        map.insert("n".to_string(), Value::from(n));
        map
    }

    #[test]
    fn flush_due_exactly_at_capacity() {
        let mut acc = BoundedAccumulator::new(3);
        assert_eq!(acc.offer(record(1)), Offer::Buffered);
        assert_eq!(acc.offer(record(2)), Offer::Buffered);
        assert_eq!(acc.offer(record(3)), Offer::FlushDue);
    }

    #[test]
    fn drain_returns_contents_and_empties_buffer() {
        let mut acc = BoundedAccumulator::new(3);
        for n in 1..=3 {
            acc.offer(record(n));
        }
        let drained = acc.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].get("n"), Some(&Value::from(1u64)));
        assert_eq!(drained[2].get("n"), Some(&Value::from(3u64)));
        assert!(acc.is_empty());
    }

    #[test]
    fn buffer_refills_after_drain() {
        let mut acc = BoundedAccumulator::new(2);
        acc.offer(record(1));
        acc.offer(record(2));
        acc.drain();
        assert_eq!(acc.offer(record(3)), Offer::Buffered);
        assert_eq!(acc.offer(record(4)), Offer::FlushDue);
    }
}

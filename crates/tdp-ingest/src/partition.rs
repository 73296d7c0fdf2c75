//! Monthly partitions and ingestion windows
//!
//! A partition is one calendar month of the partitioned year. Resolving a
//! partition key yields the half-open time window `[start, end)` used in the
//! upstream `$where` predicate, and the artifact path the run writes to.

use crate::error::{IngestError, Result};
use chrono::{Datelike, Months, NaiveDate};
use std::path::{Path, PathBuf};

/// Half-open time window for one ingestion run
///
/// `start` is inclusive, `end` exclusive. Created once per run and immutable
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl IngestionWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(IngestError::InvalidPartition {
                key: start.to_string(),
                reason: format!("window start must precede end ({start} >= {end})"),
            });
        }
        Ok(Self { start, end })
    }
}

/// The set of monthly partitions an ingestion source can be run for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyPartitions {
    start: NaiveDate,
    end: NaiveDate,
}

impl MonthlyPartitions {
    /// Create a partition set covering `[start, end)`, both first-of-month
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        for date in [start, end] {
            if date.day() != 1 {
                return Err(IngestError::InvalidPartition {
                    key: date.to_string(),
                    reason: "partition boundaries must be first-of-month dates".into(),
                });
            }
        }
        if start >= end {
            return Err(IngestError::InvalidPartition {
                key: start.to_string(),
                reason: format!("partition range start must precede end ({start} >= {end})"),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Resolve a partition key to its ingestion window
    ///
    /// The window starts on the key itself. For months 1-11 the end is the
    /// first day of the following month. December is resolved explicitly to
    /// the first day of the next calendar year: the partition source has no
    /// "next" key to derive it from, so the boundary must not be looked up.
    pub fn resolve(&self, key: NaiveDate) -> Result<IngestionWindow> {
        if key.day() != 1 {
            return Err(IngestError::InvalidPartition {
                key: key.to_string(),
                reason: "partition key must be the first day of a month".into(),
            });
        }
        if key < self.start || key >= self.end {
            return Err(IngestError::InvalidPartition {
                key: key.to_string(),
                reason: format!(
                    "partition key is outside the partition range [{}, {})",
                    self.start, self.end
                ),
            });
        }

        let end = if key.month() == 12 {
            NaiveDate::from_ymd_opt(key.year() + 1, 1, 1)
        } else {
            key.checked_add_months(Months::new(1))
        };
        let end = end.ok_or_else(|| IngestError::InvalidPartition {
            key: key.to_string(),
            reason: "window end is out of the representable date range".into(),
        })?;

        IngestionWindow::new(key, end)
    }
}

/// Artifact path for a partition: `<dir>/<year>-<month_num>.csv`
///
/// The month number is unpadded (`2022-1.csv` through `2022-12.csv`), which
/// is the naming the downstream transformation step consumes.
pub fn artifact_path(dir: &Path, key: NaiveDate) -> PathBuf {
    dir.join(format!("{}-{}.csv", key.year(), key.month()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn partitions_2022() -> MonthlyPartitions {
        MonthlyPartitions::new(date(2022, 1, 1), date(2023, 1, 1)).unwrap()
    }

    #[test]
    fn resolves_mid_year_month_to_next_month_start() {
        let window = partitions_2022().resolve(date(2022, 6, 1)).unwrap();
        assert_eq!(window.start, date(2022, 6, 1));
        assert_eq!(window.end, date(2022, 7, 1));
    }

    #[test]
    fn resolves_december_to_next_year_boundary() {
        let window = partitions_2022().resolve(date(2022, 12, 1)).unwrap();
        assert_eq!(window.start, date(2022, 12, 1));
        assert_eq!(window.end, date(2023, 1, 1));
    }

    #[test]
    fn rejects_key_not_on_first_of_month() {
        let err = partitions_2022().resolve(date(2022, 6, 15)).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPartition { .. }));
    }

    #[test]
    fn rejects_key_outside_partition_range() {
        let err = partitions_2022().resolve(date(2021, 12, 1)).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPartition { .. }));
        let err = partitions_2022().resolve(date(2023, 1, 1)).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPartition { .. }));
    }

    #[test]
    fn rejects_partition_set_with_misaligned_boundaries() {
        let err = MonthlyPartitions::new(date(2022, 1, 15), date(2023, 1, 1)).unwrap_err();
        assert!(matches!(err, IngestError::InvalidPartition { .. }));
    }

    #[test]
    fn artifact_path_uses_unpadded_month_number() {
        let dir = Path::new("/data/csv");
        assert_eq!(
            artifact_path(dir, date(2022, 1, 1)),
            PathBuf::from("/data/csv/2022-1.csv")
        );
        assert_eq!(
            artifact_path(dir, date(2022, 12, 1)),
            PathBuf::from("/data/csv/2022-12.csv")
        );
    }

    #[test]
    fn window_rejects_inverted_range() {
        assert!(IngestionWindow::new(date(2022, 2, 1), date(2022, 1, 1)).is_err());
    }
}

//! Yellow-taxi trip-record ingestion
//!
//! Downloads one monthly partition of the NYC TLC yellow-taxi 2022 dataset
//! via streamed, paginated requests and persists it as a CSV artifact. The
//! dataset is large enough that a month must never be held in memory whole:
//! records stream through a bounded accumulator and are flushed to the
//! artifact in fixed-size batches.
//!
//! Pagination is strictly sequential - the upstream offset cursor is
//! stateful, so no pages are requested in parallel. Distinct partitions are
//! independent pipelines and may run concurrently; their artifacts never
//! collide because filenames are partition-scoped.

use crate::accumulator::{BoundedAccumulator, Offer};
use crate::artifact::ArtifactWriter;
use crate::checks;
use crate::config::IngestConfig;
use crate::decode::{DecodeEvent, RecordDecoder};
use crate::error::Result;
use crate::partition::{artifact_path, IngestionWindow, MonthlyPartitions};
use crate::socrata::{stream_error, PageRequest, SocrataClient};
use chrono::NaiveDate;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Base URL of the 2022 yellow-taxi trip-record dataset, without the format
/// suffix. See
/// <https://dev.socrata.com/foundry/data.cityofnewyork.us/qp3b-zxtp>.
pub const YELLOW_TAXI_TRIPS_2022_URL: &str = "https://data.cityofnewyork.us/resource/qp3b-zxtp";

/// Timestamp field the partition window predicate filters on
pub const PICKUP_TIMESTAMP_FIELD: &str = "tpep_pickup_datetime";

/// The monthly partitions the 2022 dataset can be ingested for
pub fn partitions() -> MonthlyPartitions {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid partition range start");
    let end = NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid partition range end");
    MonthlyPartitions::new(start, end).expect("valid partition range")
}

/// Report of one completed ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The partition key the run was for
    pub partition: NaiveDate,
    /// Destination artifact path (not created when the partition was empty)
    pub artifact: PathBuf,
    /// Total records durably written
    pub records_written: u64,
    /// Pages requested, including the final short or empty page
    pub pages: u32,
}

/// Ingest one monthly partition into its CSV artifact
///
/// The artifact is rebuilt from scratch: the first flush truncates whatever
/// a prior run left behind. On failure the error is terminal for the run
/// and the artifact retains exactly the batches flushed before the failure.
pub async fn ingest(
    config: &IngestConfig,
    partition_key: NaiveDate,
    output_dir: &Path,
) -> Result<IngestReport> {
    config.validate()?;

    let window = partitions().resolve(partition_key)?;
    let destination = artifact_path(output_dir, partition_key);
    let client = SocrataClient::new(
        &config.base_url,
        PICKUP_TIMESTAMP_FIELD,
        config.app_token.clone(),
        config.timeout,
    )?;

    info!(
        partition = %partition_key,
        destination = %destination.display(),
        page_limit = config.page_limit,
        batch_capacity = config.batch_capacity,
        "starting stream download"
    );

    let driver = PaginationDriver::new(client, config, window, partition_key, destination);
    driver.run().await
}

/// Pagination loop states
///
/// `Requesting` covers the request and the streaming of its response
/// (including capacity flushes and the end-of-page cleanup flush);
/// `Deciding` holds the completed page's decoded record count.
enum RunState {
    Requesting,
    Deciding { page_records: u64 },
    Done,
}

/// The sequential request/decode/accumulate/flush/decide pipeline for one
/// partition
///
/// The accumulator and the write cursor are plain fields of this value
/// object, threaded through the state transitions - never closures over
/// loop-local mutables.
struct PaginationDriver {
    client: SocrataClient,
    window: IngestionWindow,
    partition: NaiveDate,
    page_limit: u64,
    offset: u64,
    total_records: u64,
    pages: u32,
    accumulator: BoundedAccumulator,
    writer: ArtifactWriter,
}

impl PaginationDriver {
    fn new(
        client: SocrataClient,
        config: &IngestConfig,
        window: IngestionWindow,
        partition: NaiveDate,
        destination: PathBuf,
    ) -> Self {
        Self {
            client,
            window,
            partition,
            page_limit: config.page_limit,
            offset: 0,
            total_records: 0,
            pages: 0,
            accumulator: BoundedAccumulator::new(config.batch_capacity),
            writer: ArtifactWriter::new(destination),
        }
    }

    async fn run(mut self) -> Result<IngestReport> {
        let mut state = RunState::Requesting;
        loop {
            state = match state {
                RunState::Requesting => self.request_and_stream().await?,
                RunState::Deciding { page_records } => self.decide(page_records),
                RunState::Done => break,
            };
        }

        info!(
            partition = %self.partition,
            total_rows = self.total_records,
            pages = self.pages,
            "ingestion complete"
        );

        Ok(IngestReport {
            partition: self.partition,
            artifact: self.writer.destination().to_path_buf(),
            records_written: self.total_records,
            pages: self.pages,
        })
    }

    /// Issue one page request and stream its body through the decoder into
    /// the accumulator, flushing whenever capacity is reached
    async fn request_and_stream(&mut self) -> Result<RunState> {
        let request = PageRequest {
            offset: self.offset,
            limit: self.page_limit,
            window: self.window,
        };
        let mut lines = self.client.page_lines(&request).await?;
        self.pages += 1;

        let mut decoder = RecordDecoder::new();
        let mut page_records: u64 = 0;

        while let Some(line) = lines.next().await {
            let line = line.map_err(stream_error)?;
            match decoder.feed(&line)? {
                Some(DecodeEvent::Record(record)) => {
                    page_records += 1;
                    if self.accumulator.offer(record) == Offer::FlushDue {
                        self.flush_batch()?;
                    }
                },
                Some(DecodeEvent::EndOfStream) => break,
                None => break,
            }
        }

        if decoder.finished() {
            // The empty-array sentinel: no rows matched this page. The
            // accumulator is empty by construction here - a previous page
            // either flushed its residue and stopped, or ended exactly on a
            // batch boundary.
            debug!(partition = %self.partition, offset = self.offset, "empty response for stream data");
            return Ok(RunState::Done);
        }

        // A page whose record count does not evenly divide the batch size
        // leaves a partial buffer; persist it before deciding.
        if !self.accumulator.is_empty() {
            self.flush_batch()?;
        }

        debug!(
            partition = %self.partition,
            offset = self.offset,
            page_records,
            "page complete"
        );

        Ok(RunState::Deciding { page_records })
    }

    /// Continuation policy: another page is requested only after a full
    /// page, and only when the page size is a whole number of batches.
    ///
    /// The second condition is the documented legacy limitation: with
    /// misaligned sizes every page ends in a short flush, which is
    /// indistinguishable from an exhausted result set, so the run stops
    /// after one page even when more rows exist. The `strict_batching`
    /// configuration rejects such setups up front instead.
    fn decide(&mut self, page_records: u64) -> RunState {
        let full_page = page_records == self.page_limit;
        let aligned = self.page_limit % self.accumulator.capacity() as u64 == 0;

        if full_page && aligned {
            self.offset += self.page_limit;
            RunState::Requesting
        } else {
            RunState::Done
        }
    }

    /// Drain the accumulator and durably append the batch to the artifact
    fn flush_batch(&mut self) -> Result<()> {
        let batch = self.accumulator.drain();

        for outcome in checks::run_batch_checks(&batch) {
            if !outcome.passed {
                warn!(
                    partition = %self.partition,
                    check = outcome.name,
                    "batch check failed"
                );
            }
        }

        let first_write = self.total_records == 0;
        let written = self.writer.flush(&batch, first_write)?;
        self.total_records += written;

        info!(
            partition = %self.partition,
            rows_total = self.total_records,
            "saved rows"
        );
        Ok(())
    }
}

//! Socrata open-data API client
//!
//! Builds the paginated query (`$$app_token`, `$where`, `$limit`,
//! `$offset`) against a dataset base URL and streams the line-framed
//! response body. See <https://dev.socrata.com/docs/queries/> for the query
//! parameters.
//!
//! No retry is performed here: a transport failure surfaces as a typed
//! [`IngestError::Transport`] carrying the upstream status and cause, and
//! the run fails.

use crate::error::{IngestError, Result};
use crate::partition::IngestionWindow;
use futures::{Stream, TryStreamExt};
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::debug;

/// One page of the paginated query; ephemeral, one per network call
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// Row offset into the full result set; increases monotonically by the
    /// page limit across a run
    pub offset: u64,
    /// Maximum rows for this page (`$limit`)
    pub limit: u64,
    /// The run's time window, rendered into the `$where` predicate
    pub window: IngestionWindow,
}

/// HTTP client for one Socrata dataset
#[derive(Debug, Clone)]
pub struct SocrataClient {
    http: reqwest::Client,
    base_url: String,
    timestamp_field: String,
    app_token: Option<String>,
}

impl SocrataClient {
    /// Create a client for `base_url` (without the format suffix), querying
    /// on `timestamp_field` with the given request timeout
    pub fn new(
        base_url: &str,
        timestamp_field: &str,
        app_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| IngestError::Transport {
                status: None,
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timestamp_field: timestamp_field.to_string(),
            app_token,
        })
    }

    /// The `$where` predicate for a window: half-open on the timestamp field
    fn where_clause(&self, window: &IngestionWindow) -> String {
        format!(
            "{field} >= '{start}' AND {field} < '{end}'",
            field = self.timestamp_field,
            start = window.start.format("%Y-%m-%d"),
            end = window.end.format("%Y-%m-%d"),
        )
    }

    fn page_query(&self, request: &PageRequest) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(4);
        if let Some(ref token) = self.app_token {
            query.push(("$$app_token".to_string(), token.clone()));
        }
        query.push(("$where".to_string(), self.where_clause(&request.window)));
        query.push(("$limit".to_string(), request.limit.to_string()));
        query.push(("$offset".to_string(), request.offset.to_string()));
        query
    }

    /// Issue one page request and return the line-framed body stream
    ///
    /// Returns once response headers are available and the status has been
    /// checked; the body is consumed line by line by the caller, never
    /// buffered whole.
    pub async fn page_lines(
        &self,
        request: &PageRequest,
    ) -> Result<impl Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin> {
        let url = format!("{}.json", self.base_url);
        debug!(%url, offset = request.offset, limit = request.limit, "requesting page");

        let response = self
            .http
            .get(&url)
            .query(&self.page_query(request))
            .send()
            .await
            .map_err(|source| IngestError::Transport {
                status: source.status(),
                source,
            })?;

        let response = response
            .error_for_status()
            .map_err(|source| IngestError::Transport {
                status: source.status(),
                source,
            })?;

        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        Ok(FramedRead::new(reader, LinesCodec::new()))
    }
}

/// Convert a body-stream error into the ingest taxonomy
pub(crate) fn stream_error(err: LinesCodecError) -> IngestError {
    match err {
        LinesCodecError::Io(e) => IngestError::Stream(e),
        LinesCodecError::MaxLineLengthExceeded => {
            IngestError::Stream(std::io::Error::other("response line exceeded length limit"))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> IngestionWindow {
        IngestionWindow::new(
            NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 7, 1).unwrap(),
        )
        .unwrap()
    }

    fn client(token: Option<&str>) -> SocrataClient {
        SocrataClient::new(
            "https://data.cityofnewyork.us/resource/qp3b-zxtp",
            "tpep_pickup_datetime",
            token.map(String::from),
            Duration::from_secs(90),
        )
        .unwrap()
    }

    #[test]
    fn where_clause_is_half_open_on_the_timestamp_field() {
        let clause = client(None).where_clause(&window());
        assert_eq!(
            clause,
            "tpep_pickup_datetime >= '2022-06-01' AND tpep_pickup_datetime < '2022-07-01'"
        );
    }

    #[test]
    fn page_query_includes_token_only_when_configured() {
        let request = PageRequest {
            offset: 500_000,
            limit: 500_000,
            window: window(),
        };

        let query = client(Some("secret")).page_query(&request);
        assert_eq!(query[0], ("$$app_token".to_string(), "secret".to_string()));
        assert_eq!(query[2], ("$limit".to_string(), "500000".to_string()));
        assert_eq!(query[3], ("$offset".to_string(), "500000".to_string()));

        let query = client(None).page_query(&request);
        assert!(query.iter().all(|(key, _)| key != "$$app_token"));
    }
}

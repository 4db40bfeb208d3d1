//! Query engine: single-window queries and band queries
//!
//! A band query runs the same target over `num` windows of length `D`,
//! each ending `P` earlier than the previous one:
//!
//! ```text
//! now ───────────────────────────────────────────────▶
//!                                   [ window 0  ]   │ end_0 = now - P
//!                      [ window 1  ]                │ end_1 = now - 2P
//!         [ window 2  ]                             │ end_2 = now - 3P
//! ```
//!
//! Windows run strictly in order. The first window seeds the result; later
//! windows are merged into it by tag set, so a series missing from some
//! windows is still reported, and where two windows cover the same
//! timestamp the later (older) window's value is kept.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::LruResponseCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::decode::decode;
use crate::duration::Duration;
use crate::error::{Error, Result, ValidationError};
use crate::executor::WindowQueryExecutor;
use crate::format::{self, TagFormat};
use crate::metrics;
use crate::request::{AuditLog, Request};
use crate::transport::HttpTransport;
use crate::types::{Element, ResultSet};

/// Operation name reported for single-window queries
pub const QUERY_OPERATION: &str = "graphite";

/// Operation name reported for band queries
pub const BAND_OPERATION: &str = "graphiteBand";

/// Fewest windows a band query may request
pub const MIN_BAND_WINDOWS: i64 = 1;

/// Most windows a band query may request
pub const MAX_BAND_WINDOWS: i64 = 100;

/// Runs queries relative to an injectable clock
#[derive(Clone)]
pub struct QueryEngine {
    executor: WindowQueryExecutor,
    clock: Arc<dyn Clock>,
}

impl QueryEngine {
    /// Create an engine from its collaborators
    pub fn new(executor: WindowQueryExecutor, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    /// Create an engine with the HTTP transport, LRU cache and wall clock
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.transport)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let cache = LruResponseCache::new(config.cache.clone());
        let executor = WindowQueryExecutor::new(Arc::new(transport), Arc::new(cache));
        Ok(Self::new(executor, Arc::new(SystemClock)))
    }

    /// Replace the evaluation clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tag keys a query with `format` groups by
    pub fn tag_keys(format: &str) -> BTreeSet<String> {
        format::tag_keys(format)
    }

    /// Query one window `[now - start_duration, now - end_duration]`
    ///
    /// An empty `end_duration` means the window ends now.
    pub async fn query(
        &self,
        target: &str,
        start_duration: &str,
        end_duration: &str,
        format: &str,
        audit: &mut AuditLog,
    ) -> Result<ResultSet> {
        let start_offset = Duration::parse(start_duration)?;
        let end_offset = Duration::parse_offset(end_duration)?;

        let now = self.clock.now();
        let request = Request::new(
            target,
            shift_back(now, start_offset)?,
            shift_back(now, end_offset)?,
        );

        let elements = self
            .fetch(QUERY_OPERATION, &request, &TagFormat::parse(format), audit)
            .await?;
        Ok(ResultSet::from_elements(elements))
    }

    /// Query `num` windows of length `duration`, stepping back by `period`
    ///
    /// Every failure, including validation, is reported as [`Error::Band`].
    /// Validation happens before any request is issued.
    pub async fn band(
        &self,
        target: &str,
        duration: &str,
        period: &str,
        format: &str,
        num: i64,
        audit: &mut AuditLog,
    ) -> Result<ResultSet> {
        self.band_windows(target, duration, period, format, num, audit)
            .await
            .map_err(Error::into_band)
    }

    async fn band_windows(
        &self,
        target: &str,
        duration: &str,
        period: &str,
        format: &str,
        num: i64,
        audit: &mut AuditLog,
    ) -> Result<ResultSet> {
        let length = Duration::parse(duration)?;
        let step = Duration::parse(period)?;
        if !(MIN_BAND_WINDOWS..=MAX_BAND_WINDOWS).contains(&num) {
            return Err(ValidationError::OutOfRange {
                field: "num".to_string(),
                value: num.to_string(),
                min: MIN_BAND_WINDOWS.to_string(),
                max: MAX_BAND_WINDOWS.to_string(),
            }
            .into());
        }
        let format = TagFormat::parse(format);

        let now = self.clock.now();
        let mut request = Request::new(target, shift_back(now, length)?, now);
        let mut result = ResultSet {
            ignore_unjoined: true,
            ignore_other_unjoined: true,
            ..Default::default()
        };

        let mut end = now;
        for i in 0..num {
            end = shift_back(end, step)?;
            request.set_window(shift_back(end, length)?, end);
            debug!(
                window = i,
                start = %request.start,
                end = %request.end,
                "band window"
            );

            let elements = self.fetch(BAND_OPERATION, &request, &format, audit).await?;
            if i == 0 {
                result.elements = elements;
            } else {
                for element in elements {
                    result.merge(element);
                }
            }
        }

        info!(
            target,
            windows = num,
            series = result.len(),
            "band query complete"
        );
        Ok(result)
    }

    /// Execute and decode one window
    async fn fetch(
        &self,
        operation: &'static str,
        request: &Request,
        format: &TagFormat,
        audit: &mut AuditLog,
    ) -> Result<Vec<Element>> {
        let response = self.executor.execute(operation, request, audit).await?;
        decode(request, &response, format).map_err(|e| {
            metrics::record_decode_error(e.kind.as_str());
            warn!(operation, error = %e, "failed to decode render response");
            Error::Decode(e)
        })
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

/// `instant - by`, rejecting results outside the representable range
fn shift_back(instant: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>> {
    instant.checked_sub_signed(by.as_chrono()).ok_or_else(|| {
        ValidationError::InvalidFormat {
            field: "duration".to_string(),
            message: format!("{} before {} is out of range", by, instant),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, LruResponseCache};
    use crate::clock::FixedClock;
    use crate::error::TransportError;
    use crate::response::{RawResponse, RawSeries};
    use crate::transport::QueryTransport;
    use async_trait::async_trait;
    use chrono::TimeZone;

    const NOW: i64 = 1_700_000_000;

    /// Returns one series per request whose single point sits at the window end
    struct EchoTransport;

    #[async_trait]
    impl QueryTransport for EchoTransport {
        async fn query(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
            Ok(RawResponse::new(vec![RawSeries::new("web1.cpu.idle")
                .with_point(request.end.timestamp() as f64, request.end.timestamp())]))
        }
    }

    fn engine() -> QueryEngine {
        let executor = WindowQueryExecutor::new(
            Arc::new(EchoTransport),
            Arc::new(LruResponseCache::new(CacheConfig::default())),
        );
        QueryEngine::new(
            executor,
            Arc::new(FixedClock::new(Utc.timestamp_opt(NOW, 0).unwrap())),
        )
    }

    #[tokio::test]
    async fn test_query_window() {
        let mut audit = AuditLog::new();
        let result = engine()
            .query("web*.cpu.idle", "1h", "", "host..", &mut audit)
            .await
            .unwrap();

        let req = &audit.requests()[0];
        assert_eq!(req.start.timestamp(), NOW - 3600);
        assert_eq!(req.end.timestamp(), NOW);
        assert_eq!(result.len(), 1);
        assert!(!result.ignore_unjoined);
        assert!(!result.ignore_other_unjoined);
    }

    #[tokio::test]
    async fn test_query_end_offset() {
        let mut audit = AuditLog::new();
        engine()
            .query("web*.cpu.idle", "2h", "30m", "host..", &mut audit)
            .await
            .unwrap();

        let req = &audit.requests()[0];
        assert_eq!(req.start.timestamp(), NOW - 7200);
        assert_eq!(req.end.timestamp(), NOW - 1800);
    }

    #[tokio::test]
    async fn test_query_rejects_bad_duration() {
        let mut audit = AuditLog::new();
        let err = engine()
            .query("a", "1hour", "", "", &mut audit)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_band_merges_windows() {
        let mut audit = AuditLog::new();
        let result = engine()
            .band("web*.cpu.idle", "1h", "1h", "host..", 3, &mut audit)
            .await
            .unwrap();

        assert_eq!(audit.len(), 3);
        assert_eq!(result.len(), 1);
        assert!(result.ignore_unjoined);
        assert!(result.ignore_other_unjoined);
        let stamps: Vec<i64> = result.elements[0]
            .series
            .timestamps()
            .map(|t| t.timestamp())
            .collect();
        assert_eq!(stamps, vec![NOW - 3 * 3600, NOW - 2 * 3600, NOW - 3600]);
    }

    #[tokio::test]
    async fn test_band_num_bounds() {
        for num in [0, -1, 101] {
            let mut audit = AuditLog::new();
            let err = engine()
                .band("a", "1h", "1h", "", num, &mut audit)
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with("graphiteBand: "));
            assert!(matches!(
                err.root(),
                Error::Validation(ValidationError::OutOfRange { .. })
            ));
            assert!(audit.is_empty());
        }
    }

    #[tokio::test]
    async fn test_band_bad_period() {
        let mut audit = AuditLog::new();
        let err = engine()
            .band("a", "1h", "soon", "", 2, &mut audit)
            .await
            .unwrap_err();
        assert!(matches!(
            err.root(),
            Error::Validation(ValidationError::InvalidFormat { .. })
        ));
        assert!(audit.is_empty());
    }

    #[test]
    fn test_tag_keys() {
        let keys = QueryEngine::tag_keys("host..metric");
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_from_config() {
        assert!(QueryEngine::from_config(&Config::default()).is_ok());

        let mut config = Config::default();
        config.transport.timeout_secs = 0;
        assert!(QueryEngine::from_config(&config).is_err());
    }
}

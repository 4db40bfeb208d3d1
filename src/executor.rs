//! Single-window query execution
//!
//! Records the request in the caller's audit log, then resolves it through
//! the response cache, computing it with the transport on a miss.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::{ComputeFuture, ResponseCache};
use crate::error::{Error, Result};
use crate::metrics;
use crate::request::{AuditLog, Request};
use crate::response::RawResponse;
use crate::transport::QueryTransport;

/// Cache label used for hit/miss accounting
const CACHE_BACKEND: &str = "graphite";

/// Executes one request through the cache and transport
#[derive(Clone)]
pub struct WindowQueryExecutor {
    transport: Arc<dyn QueryTransport>,
    cache: Arc<dyn ResponseCache>,
}

impl WindowQueryExecutor {
    /// Create an executor
    pub fn new(transport: Arc<dyn QueryTransport>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { transport, cache }
    }

    /// Run one request
    ///
    /// The request is appended to `audit` before anything else happens, so a
    /// failed request is still recorded. Transport failures come back as
    /// [`Error::Transport`] tagged with `operation`; nothing is retried.
    pub async fn execute(
        &self,
        operation: &'static str,
        request: &Request,
        audit: &mut AuditLog,
    ) -> Result<Arc<RawResponse>> {
        audit.record(request);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let json = serde_json::to_string_pretty(request).unwrap_or_default();
            debug!(operation, request = %json, "issuing render query");
        }

        let start = Instant::now();
        let transport = Arc::clone(&self.transport);
        let compute: ComputeFuture<'_> = Box::pin(async move { transport.query(request).await });
        let result = self.cache.get_or_compute(request.cache_key(), compute).await;
        metrics::record_query(operation, start.elapsed().as_secs_f64(), result.is_ok());

        match result {
            Ok(cached) => {
                metrics::record_cache_lookup(CACHE_BACKEND, cached.hit);
                debug!(
                    operation,
                    hit = cached.hit,
                    series = cached.value.len(),
                    "render query complete"
                );
                Ok(cached.value)
            }
            Err(source) => Err(Error::Transport { operation, source }),
        }
    }
}

impl std::fmt::Debug for WindowQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowQueryExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, LruResponseCache};
    use crate::error::TransportError;
    use crate::response::RawSeries;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl QueryTransport for CountingTransport {
        async fn query(&self, _request: &Request) -> std::result::Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::Other("connection refused".to_string()))
            } else {
                Ok(RawResponse::new(vec![RawSeries::new("a.b")]))
            }
        }
    }

    fn executor(fail: bool) -> (WindowQueryExecutor, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
            fail,
        });
        let cache = Arc::new(LruResponseCache::new(CacheConfig::default()));
        (WindowQueryExecutor::new(transport.clone(), cache), transport)
    }

    fn request() -> Request {
        Request::new(
            "a.*",
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(60, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_records_and_caches() {
        let (executor, transport) = executor(false);
        let mut audit = AuditLog::new();

        let first = executor.execute("graphite", &request(), &mut audit).await.unwrap();
        let second = executor.execute("graphite", &request(), &mut audit).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(audit.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_tagged() {
        let (executor, transport) = executor(true);
        let mut audit = AuditLog::new();

        let err = executor
            .execute("graphiteBand", &request(), &mut audit)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { operation: "graphiteBand", .. }));
        assert_eq!(audit.len(), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}

//! Render requests, their cache keys, and the audit log of issued requests

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One query against the render API
///
/// Targets are Graphite expressions. Instants are sent with second precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Target expressions
    pub targets: Vec<String>,
    /// Window start (inclusive)
    pub start: DateTime<Utc>,
    /// Window end (inclusive)
    pub end: DateTime<Utc>,
}

impl Request {
    /// Create a request for a single target
    pub fn new(target: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            targets: vec![target.into()],
            start,
            end,
        }
    }

    /// Move the request to a new window
    pub fn set_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.start = start;
        self.end = end;
    }

    /// Render path with query string, relative to the backend base URL
    ///
    /// Also used as the request's identity in decode errors.
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use graphite_band::request::Request;
    ///
    /// let req = Request::new(
    ///     "a.b.*",
    ///     Utc.timestamp_opt(100, 0).unwrap(),
    ///     Utc.timestamp_opt(200, 0).unwrap(),
    /// );
    /// assert_eq!(req.path(), "/render?format=json&target=a.b.*&from=100&until=200");
    /// ```
    pub fn path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("format", "json");
        for target in &self.targets {
            query.append_pair("target", target);
        }
        query.append_pair("from", &self.start.timestamp().to_string());
        query.append_pair("until", &self.end.timestamp().to_string());
        format!("/render?{}", query.finish())
    }

    /// Deterministic cache key for this request
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_request(self)
    }
}

/// Hash key derived from a request's targets and window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Create a cache key from a request
    ///
    /// Equal requests always hash to the same key; `DefaultHasher::new()`
    /// uses fixed SipHash keys.
    pub fn from_request(request: &Request) -> Self {
        let mut hasher = DefaultHasher::new();
        "graphite".hash(&mut hasher);
        request.targets.hash(&mut hasher);
        request.start.timestamp().hash(&mut hasher);
        request.end.timestamp().hash(&mut hasher);
        CacheKey(hasher.finish())
    }

    /// Raw hash value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Append-only record of every request issued on behalf of a caller
///
/// Owned by the caller and passed down explicitly, so retried windows show
/// up once per attempt.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AuditLog {
    requests: Vec<Request>,
}

impl AuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request
    pub fn record(&mut self, request: &Request) {
        self.requests.push(request.clone());
    }

    /// Recorded requests in issue order
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Number of recorded requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_cache_key_generation() {
        let req1 = Request::new("a.b", ts(0), ts(60));
        let req2 = Request::new("a.b", ts(0), ts(60));
        let req3 = Request::new("a.b", ts(0), ts(120));
        let req4 = Request::new("a.c", ts(0), ts(60));

        assert_eq!(req1.cache_key(), req2.cache_key());
        assert_ne!(req1.cache_key(), req3.cache_key());
        assert_ne!(req1.cache_key(), req4.cache_key());
    }

    #[test]
    fn test_cache_key_follows_window_changes() {
        let mut req = Request::new("a.b", ts(0), ts(60));
        let before = req.cache_key();
        req.set_window(ts(60), ts(120));
        assert_ne!(before, req.cache_key());
        assert_eq!(req.cache_key(), Request::new("a.b", ts(60), ts(120)).cache_key());
    }

    #[test]
    fn test_path_escapes_targets() {
        let req = Request::new("sumSeries(a.{b,c}) d", ts(1), ts(2));
        assert_eq!(
            req.path(),
            "/render?format=json&target=sumSeries%28a.%7Bb%2Cc%7D%29+d&from=1&until=2"
        );
    }

    #[test]
    fn test_audit_log_appends() {
        let mut log = AuditLog::new();
        let req = Request::new("a", ts(0), ts(1));
        log.record(&req);
        log.record(&req);
        assert_eq!(log.len(), 2);
        assert_eq!(log.requests()[1], req);
    }

    #[test]
    fn test_request_serializes_for_audit() {
        let req = Request::new("a.b", ts(0), ts(60));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["targets"][0], "a.b");
    }
}

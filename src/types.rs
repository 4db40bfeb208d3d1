//! Core data types shared by the decoder and the band orchestrator
//!
//! # Key Types
//!
//! - **`TagSet`**: Key-value labels identifying one logical series (e.g. host=web1)
//! - **`Series`**: Timestamp to value mapping for one logical series
//! - **`Element`**: A tag set together with its series
//! - **`ResultSet`**: Ordered elements plus the join flags consumed by callers
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use graphite_band::types::{Element, ResultSet, Series, TagSet};
//!
//! let mut tags = TagSet::new();
//! tags.add("host", "web1");
//!
//! let mut series = Series::new();
//! series.insert(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 42.5);
//!
//! let mut results = ResultSet::default();
//! results.merge(Element::new(tags, series));
//! assert_eq!(results.len(), 1);
//! ```

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Tag set for a series (key-value metadata)
///
/// Keys are kept sorted so that equality, the canonical string form and
/// iteration never depend on insertion order.
///
/// # Example
///
/// ```rust
/// use graphite_band::types::TagSet;
///
/// let mut a = TagSet::new();
/// a.add("host", "web1");
/// a.add("dc", "us-east");
///
/// let mut b = TagSet::new();
/// b.add("dc", "us-east");
/// b.add("host", "web1");
///
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "{dc=us-east,host=web1}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: BTreeMap<String, String>,
}

impl TagSet {
    /// Create a new empty tag set
    pub fn new() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag, replacing any previous value for the key
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Get a tag value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when no tags are set
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate over tags in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check that every key and value is a valid tag string
    ///
    /// An empty tag set is valid.
    pub fn is_valid(&self) -> bool {
        self.tags
            .iter()
            .all(|(k, v)| is_valid_tag(k) && is_valid_tag(v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        f.write_str("}")
    }
}

/// Check a tag key or value against the allowed alphabet
///
/// Non-empty, letters (any script), ASCII digits, plus `-`, `_`, `.` and `/`.
pub fn is_valid_tag(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            // is_alphabetic also admits letter numbers such as roman numerals
            (c.is_alphabetic() && !c.is_numeric())
                || c.is_ascii_digit()
                || matches!(c, '-' | '_' | '.' | '/')
        })
}

/// Datapoints of one logical series keyed by timestamp
///
/// Inserting at an existing timestamp overwrites the previous value; band
/// merging relies on this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: BTreeMap<DateTime<Utc>, f64>,
}

impl Series {
    /// Create an empty series
    pub fn new() -> Self {
        Self {
            points: BTreeMap::new(),
        }
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, timestamp: DateTime<Utc>, value: f64) -> Option<f64> {
        self.points.insert(timestamp, value)
    }

    /// Value at a timestamp
    pub fn get(&self, timestamp: &DateTime<Utc>) -> Option<f64> {
        self.points.get(timestamp).copied()
    }

    /// Copy every point of `other` into this series, `other` winning on collisions
    pub fn merge_from(&mut self, other: Series) {
        self.points.extend(other.points);
    }

    /// Number of datapoints
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the series holds no datapoints
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over datapoints in timestamp order
    pub fn iter(&self) -> btree_map::Iter<'_, DateTime<Utc>, f64> {
        self.points.iter()
    }

    /// Timestamps in ascending order
    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.points.keys()
    }
}

impl FromIterator<(DateTime<Utc>, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (DateTime<Utc>, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Series {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.points.len()))?;
        for (ts, value) in &self.points {
            map.serialize_entry(&ts.timestamp(), value)?;
        }
        map.end()
    }
}

/// One logical time series: its identity and its datapoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    /// Identity of the series
    pub tags: TagSet,
    /// Datapoints
    pub series: Series,
}

impl Element {
    /// Create an element
    pub fn new(tags: TagSet, series: Series) -> Self {
        Self { tags, series }
    }
}

/// Ordered elements produced by a query
///
/// The two flags tell the expression engine how to treat tag sets that show
/// up on only one side of a join. They are carried, never interpreted, here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Elements in first-seen order
    pub elements: Vec<Element>,
    /// Drop elements of this set that have no join partner
    pub ignore_unjoined: bool,
    /// Drop elements of the other set that have no join partner
    pub ignore_other_unjoined: bool,
}

impl ResultSet {
    /// Create a result set from decoded elements
    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Default::default()
        }
    }

    /// Append an element without looking for an existing tag set
    pub fn append(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Position of the first element whose tag set equals `tags`
    pub fn position(&self, tags: &TagSet) -> Option<usize> {
        self.elements.iter().position(|e| &e.tags == tags)
    }

    /// Element with the given tag set
    pub fn get(&self, tags: &TagSet) -> Option<&Element> {
        self.position(tags).map(|i| &self.elements[i])
    }

    /// Merge an element by tag set identity
    ///
    /// If an element with an equal tag set exists, the incoming datapoints are
    /// written into it and overwrite values at colliding timestamps. Otherwise
    /// the element is appended.
    pub fn merge(&mut self, element: Element) {
        match self.position(&element.tags) {
            Some(i) => self.elements[i].series.merge_from(element.series),
            None => self.append(element),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when there are no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_tag_set_equality_ignores_insertion_order() {
        let mut a = TagSet::new();
        a.add("host", "server1");
        a.add("dc", "us-east");

        let mut b = TagSet::new();
        b.add("dc", "us-east");
        b.add("host", "server1");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_tag_set_display() {
        assert_eq!(TagSet::new().to_string(), "{}");
        assert_eq!(tags(&[("b", "2"), ("a", "1")]).to_string(), "{a=1,b=2}");
    }

    #[test]
    fn test_tag_validity() {
        assert!(tags(&[("host", "web-01.prod/a_b")]).is_valid());
        assert!(tags(&[("région", "zürich")]).is_valid());
        assert!(TagSet::new().is_valid());

        assert!(!tags(&[("host", "")]).is_valid());
        assert!(!tags(&[("", "web1")]).is_valid());
        assert!(!tags(&[("host", "web 1")]).is_valid());
        assert!(!tags(&[("host", "web*")]).is_valid());
        assert!(!tags(&[("key", "sumSeries(a.b)")]).is_valid());
    }

    #[test]
    fn test_numeric_symbols_are_not_digits() {
        assert!(is_valid_tag("web01"));
        assert!(!is_valid_tag("½"));
        assert!(!is_valid_tag("Ⅻ"));
        assert!(!is_valid_tag("cpu²"));
    }

    #[test]
    fn test_series_overwrite_on_same_timestamp() {
        let mut s = Series::new();
        assert_eq!(s.insert(ts(10), 1.0), None);
        assert_eq!(s.insert(ts(10), 2.0), Some(1.0));
        assert_eq!(s.get(&ts(10)), Some(2.0));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_result_set_merge_by_identity() {
        let mut results = ResultSet::from_elements(vec![
            Element::new(tags(&[("host", "a")]), [(ts(1), 1.0), (ts(2), 2.0)].into_iter().collect()),
            Element::new(tags(&[("host", "b")]), [(ts(1), 10.0)].into_iter().collect()),
        ]);

        results.merge(Element::new(
            tags(&[("host", "a")]),
            [(ts(2), 20.0), (ts(3), 30.0)].into_iter().collect(),
        ));
        results.merge(Element::new(
            tags(&[("host", "c")]),
            [(ts(1), 100.0)].into_iter().collect(),
        ));

        assert_eq!(results.len(), 3);
        let a = results.get(&tags(&[("host", "a")])).unwrap();
        assert_eq!(a.series.len(), 3);
        assert_eq!(a.series.get(&ts(1)), Some(1.0));
        assert_eq!(a.series.get(&ts(2)), Some(20.0));
        assert_eq!(a.series.get(&ts(3)), Some(30.0));
        assert_eq!(results.elements[2].tags, tags(&[("host", "c")]));
    }

    #[test]
    fn test_series_serializes_unix_seconds() {
        let series: Series = [(ts(1_700_000_000), 1.5)].into_iter().collect();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, r#"{"1700000000":1.5}"#);
    }
}

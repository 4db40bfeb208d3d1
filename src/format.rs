//! Tag formats: how a dot-separated series name is carved into tags
//!
//! A format is itself dot-separated. Each segment either names the tag key
//! that receives the corresponding segment of the series name, or is empty,
//! meaning that segment is ignored:
//!
//! ```text
//! format       "host..metric"
//! series name  "web1.cpu.idle"
//! tags         {host=web1, metric=idle}
//! ```
//!
//! The format consisting of the empty string alone is a separate mode: the
//! whole series name becomes the value of the tag `key`.

use std::collections::BTreeSet;

/// Tag key used in whole-name mode
pub const WHOLE_NAME_KEY: &str = "key";

/// A parsed tag format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFormat {
    /// The full series name becomes the value of `key`
    WholeName,
    /// One entry per name segment; `None` marks an ignored segment
    Positional(Vec<Option<String>>),
}

impl TagFormat {
    /// Parse a format string
    ///
    /// Never fails: a template that names no keys simply produces tag sets
    /// with no keys.
    pub fn parse(format: &str) -> Self {
        if format.is_empty() {
            return TagFormat::WholeName;
        }
        TagFormat::Positional(
            format
                .split('.')
                .map(|s| (!s.is_empty()).then(|| s.to_string()))
                .collect(),
        )
    }

    /// Minimum number of dot-separated segments a series name must have
    pub fn segments(&self) -> usize {
        match self {
            TagFormat::WholeName => 1,
            TagFormat::Positional(keys) => keys.len(),
        }
    }

    /// Render the segment list for error messages, comma-separated
    pub fn describe(&self) -> String {
        match self {
            TagFormat::WholeName => String::new(),
            TagFormat::Positional(keys) => keys
                .iter()
                .map(|k| k.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Tag keys a query with this format will group by
///
/// Needed by the expression engine before any query runs. Whole-name mode
/// declares no keys.
///
/// # Example
///
/// ```rust
/// use graphite_band::format::tag_keys;
///
/// let keys = tag_keys("host..metric");
/// assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["host", "metric"]);
/// assert!(tag_keys("").is_empty());
/// ```
pub fn tag_keys(format: &str) -> BTreeSet<String> {
    format
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

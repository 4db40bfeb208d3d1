//! Response decoding
//!
//! Turns one [`RawResponse`] into ordered [`Element`]s. Decoding is
//! all-or-nothing: the first problem aborts the whole response and the error
//! names the request that produced it.
//!
//! Per series, in response order:
//!
//! 1. Build the tag set from the series name and the [`TagFormat`].
//! 2. Reject invalid tag sets.
//! 3. Reject a tag set already produced by this response.
//! 4. Decode datapoints, skipping "no value" entries.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{DecodeError, DecodeErrorKind};
use crate::format::{TagFormat, WHOLE_NAME_KEY};
use crate::request::Request;
use crate::response::{RawResponse, RawSeries, Token};
use crate::types::{Element, Series, TagSet};

/// Decode a response into elements
///
/// An empty response is an error, distinct from a response with series that
/// carry no datapoints.
pub fn decode(
    request: &Request,
    response: &RawResponse,
    format: &TagFormat,
) -> Result<Vec<Element>, DecodeError> {
    let path = request.path();
    let fail = |kind: DecodeErrorKind, message: String| DecodeError::new(kind, path.clone(), message);

    if response.is_empty() {
        return Err(fail(DecodeErrorKind::EmptyResponse, "empty response".to_string()));
    }

    let mut seen = HashSet::with_capacity(response.len());
    let mut elements = Vec::with_capacity(response.len());

    for raw in &response.series {
        let tags = tag_set(raw, format).ok_or_else(|| {
            fail(
                DecodeErrorKind::FormatMismatch,
                format!(
                    "returned target '{}' does not match format '{}'",
                    raw.target,
                    format.describe()
                ),
            )
        })?;

        if !tags.is_valid() {
            return Err(fail(
                DecodeErrorKind::InvalidTagSet,
                format!(
                    "returned target '{}' would make an invalid tag '{}'",
                    raw.target, tags
                ),
            ));
        }

        let canonical = tags.to_string();
        if !seen.insert(canonical.clone()) {
            return Err(fail(
                DecodeErrorKind::DuplicateTagSet,
                format!("more than 1 series identified by tagset '{}'", canonical),
            ));
        }

        let series = datapoints(raw).map_err(|(kind, message)| fail(kind, message))?;
        elements.push(Element::new(tags, series));
    }

    Ok(elements)
}

/// Tag set for one series, or `None` if the name has too few segments
fn tag_set(raw: &RawSeries, format: &TagFormat) -> Option<TagSet> {
    let mut tags = TagSet::new();
    match format {
        TagFormat::WholeName => tags.add(WHOLE_NAME_KEY, raw.target.as_str()),
        TagFormat::Positional(keys) => {
            let nodes: Vec<&str> = raw.target.split('.').collect();
            if nodes.len() < keys.len() {
                return None;
            }
            for (key, node) in keys.iter().zip(nodes) {
                if let Some(key) = key {
                    tags.add(key.as_str(), node);
                }
            }
        }
    }
    Some(tags)
}

fn datapoints(raw: &RawSeries) -> Result<Series, (DecodeErrorKind, String)> {
    let mut series = Series::new();
    for point in &raw.datapoints {
        let [value, timestamp] = point.as_slice() else {
            return Err((
                DecodeErrorKind::MalformedDatapoint,
                format!("datapoint has != 2 fields: {}", render(point)),
            ));
        };
        if value.is_none() {
            continue;
        }
        let value = value.as_f64().map_err(|e| {
            (
                DecodeErrorKind::InvalidValue,
                format!("value '{}' cannot be decoded to f64: {}", value, e),
            )
        })?;
        let unix = timestamp.as_i64().map_err(|e| {
            (
                DecodeErrorKind::InvalidTimestamp,
                format!("timestamp '{}' cannot be decoded to i64: {}", timestamp, e),
            )
        })?;
        let instant = instant(unix).ok_or_else(|| {
            (
                DecodeErrorKind::InvalidTimestamp,
                format!("timestamp '{}' is out of range", unix),
            )
        })?;
        series.insert(instant, value);
    }
    Ok(series)
}

fn instant(unix: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(unix, 0).single()
}

fn render(point: &[Token]) -> String {
    let fields: Vec<String> = point.iter().map(ToString::to_string).collect();
    format!("[{}]", fields.join(" "))
}

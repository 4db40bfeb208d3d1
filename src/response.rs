//! Raw render API responses
//!
//! Graphite answers `format=json` render requests with a list of series:
//!
//! ```json
//! [
//!   {"target": "web1.cpu.idle", "datapoints": [[97.5, 1700000000], [null, 1700000060]]}
//! ]
//! ```
//!
//! Datapoints are kept as loosely typed tokens here; the decoder decides
//! what is acceptable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One token of a datapoint: a number, a string, or `null`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// JSON `null`
    Null,
    /// JSON number, kept exact until decoded
    Number(serde_json::Number),
    /// Numeric literal sent as a string
    Text(String),
}

impl Token {
    /// True for the explicit "no value" marker (`null` or `""`)
    pub fn is_none(&self) -> bool {
        match self {
            Token::Null => true,
            Token::Text(s) => s.is_empty(),
            Token::Number(_) => false,
        }
    }

    /// Decode as a float
    pub fn as_f64(&self) -> Result<f64, String> {
        match self {
            Token::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("{} is not representable as f64", n)),
            Token::Text(s) => s.parse::<f64>().map_err(|e| e.to_string()),
            Token::Null => Err("null".to_string()),
        }
    }

    /// Decode as a signed integer
    pub fn as_i64(&self) -> Result<i64, String> {
        match self {
            Token::Number(n) => n
                .as_i64()
                .ok_or_else(|| format!("{} is not an integer", n)),
            Token::Text(s) => s.parse::<i64>().map_err(|e| e.to_string()),
            Token::Null => Err("null".to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => Ok(()),
            Token::Number(n) => write!(f, "{}", n),
            Token::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Token {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v).map_or(Token::Null, Token::Number)
    }
}

impl From<i64> for Token {
    fn from(v: i64) -> Self {
        Token::Number(v.into())
    }
}

impl From<&str> for Token {
    fn from(v: &str) -> Self {
        Token::Text(v.to_string())
    }
}

/// One named series in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    /// Dot-delimited series name
    pub target: String,
    /// `[value, timestamp]` pairs; arity is checked by the decoder
    #[serde(default)]
    pub datapoints: Vec<Vec<Token>>,
}

impl RawSeries {
    /// Create a series with no datapoints
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            datapoints: Vec::new(),
        }
    }

    /// Add a `[value, timestamp]` datapoint
    pub fn with_point(mut self, value: impl Into<Token>, timestamp: impl Into<Token>) -> Self {
        self.datapoints.push(vec![value.into(), timestamp.into()]);
        self
    }
}

/// The backend's answer to one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResponse {
    /// Series in backend order
    pub series: Vec<RawSeries>,
}

impl RawResponse {
    /// Create a response from series
    pub fn new(series: Vec<RawSeries>) -> Self {
        Self { series }
    }

    /// Parse a render API JSON body
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when the backend returned no series
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

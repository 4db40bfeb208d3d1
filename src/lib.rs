//! Graphite band - windowed query adapter for the Graphite render API
//!
//! This library turns metric path expressions into grouped time series:
//! - Tag formats that map dot-separated path nodes onto tag keys
//! - Response decoding with tag-set identity checks
//! - Cached, audited single-window queries
//! - Band queries that merge many historical windows into one result

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod decode;
pub mod duration;
pub mod error;
pub mod format;
pub mod request;
pub mod response;
pub mod types;

/// Response cache with single-flight fills and TTL expiry
pub mod cache;

/// Render API transport (HTTP via reqwest)
pub mod transport;

/// Single-window execution through the cache and transport
pub mod executor;

/// Band and single-window query engine
pub mod engine;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use engine::QueryEngine;
pub use error::{Error, Result};
pub use format::{tag_keys, TagFormat};
pub use request::{AuditLog, Request};
pub use types::{Element, ResultSet, Series, TagSet};

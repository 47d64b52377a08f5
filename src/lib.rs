//! # iRacing Stats Client Library
//!
//! An authenticated, rate-limited client for the iRacing member-site stats
//! backend. The backend is undocumented and inconsistent: the login handshake is
//! scraped from HTML, responses come back as plain text, JSON, or a compact
//! columnar envelope, and every caller in a process has to share one request
//! budget.
//!
//! ## Quick Start
//!
//! ```no_run
//! use irace_stats::{ClientConfig, Stats};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stats = Stats::authenticate(ClientConfig::default(), "user@example.com", "hunter2").await?;
//!
//! let career = stats.career_stats(None).await?;
//! println!("{career}");
//!
//! let members = stats.league_members(1234).await?;
//! println!("{} league members", members.len());
//!
//! stats.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - Throttled, connection-pooled dispatcher (the only network code)
//! - [`stats::request`] - Request assembly (method, URL, headers, cookies, body)
//! - [`stats::decoder`] - Text / JSON / columnar response decoding
//! - [`stats::scrape`] - Pure parsers for script variables embedded in HTML
//! - [`stats::reference`] - Reference tables scraped once at login
//! - [`stats::auth`] - Login handshake and session derivation
//! - [`stats::pagination`] - "Fetch until short page" helper
//! - [`stats::client`] - The [`Stats`] facade
//!
//! ## Data Types
//!
//! - [`Session`] - Cookie and customer id of an authenticated user
//! - [`Record`] - One decoded columnar row, in column order
//! - [`RecordValue`] - Typed value of one column
//! - [`RecordPage`] - One page of records plus the backend's total count
//! - [`PageWindow`] - Lower/upper row bounds for a 1-indexed page

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Dispatch metrics
pub mod metrics;

/// Stats backend client
pub mod stats;

/// Throttled HTTP transport
pub mod transport;

// Re-export commonly used types
pub use stats::client::{ClientConfig, Stats};
pub use stats::{StatsError, StatsResult};
pub use transport::{ThrottledTransport, TransportConfig, TransportError};

/// Number of rows the backend returns per page on bounded-result endpoints
pub const PAGE_SIZE: u32 = 25;

/// Highest page whose row bounds fit in a `u32`
pub const MAX_PAGE: u32 = u32::MAX / PAGE_SIZE;

/// Authenticated session state
///
/// Only produced by a successful login; there is no way to build one by hand
/// outside the crate, so holding a `Session` implies the cookie carried the
/// session marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookie: String,
    customer_id: i64,
}

impl Session {
    pub(crate) fn new(cookie: String, customer_id: i64) -> Self {
        Self {
            cookie,
            customer_id,
        }
    }

    /// Assembled cookie header sent with every authenticated request
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Customer id of the logged-in member
    pub fn customer_id(&self) -> i64 {
        self.customer_id
    }
}

/// Row bounds for one page of a bounded-result endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// First row (1-indexed, inclusive)
    pub lower: u32,
    /// Last row (inclusive)
    pub upper: u32,
}

impl PageWindow {
    /// Window for a 1-indexed page number. Page 0 is treated as page 1.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidArgument`] for pages above [`MAX_PAGE`]
    pub fn try_for_page(page: u32) -> StatsResult<Self> {
        let page = page.max(1);
        let upper = page.checked_mul(PAGE_SIZE).ok_or_else(|| {
            StatsError::InvalidArgument(format!(
                "page {page} is beyond the last addressable page {MAX_PAGE}"
            ))
        })?;
        Ok(Self {
            lower: upper - PAGE_SIZE + 1,
            upper,
        })
    }
}

/// Typed value of one column in a decoded record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// JSON null or an empty cell
    Null,
    /// Integer column
    Integer(i64),
    /// Floating point column
    Float(f64),
    /// Date column (epoch milliseconds on the wire)
    Date(DateTime<Utc>),
    /// Text column, or a value that could not be coerced to its declared type
    Text(String),
    /// Nested JSON (arrays or objects embedded in a cell)
    Json(serde_json::Value),
}

impl RecordValue {
    /// Integer view. Text holding a base-10 integer is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordValue::Integer(v) => Some(*v),
            RecordValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            RecordValue::Text(s) => s.trim().parse().ok(),
            RecordValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    /// Float view
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Integer(v) => Some(*v as f64),
            RecordValue::Float(v) => Some(*v),
            RecordValue::Text(s) => s.trim().parse().ok(),
            RecordValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    /// String view (text columns only)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Date view
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Null => write!(f, "null"),
            RecordValue::Integer(v) => write!(f, "{v}"),
            RecordValue::Float(v) => write!(f, "{v}"),
            RecordValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            RecordValue::Text(s) => write!(f, "{s}"),
            RecordValue::Json(v) => write!(f, "{v}"),
        }
    }
}

/// One decoded row: column name to value, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, RecordValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` columns
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Set a column value. An existing column keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: RecordValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Value of a column
    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Mutable value of a column
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RecordValue> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Column names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Columns in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable values in column order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut RecordValue> {
        self.fields.iter_mut().map(|(_, v)| v)
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One page of decoded records and the total the backend reported
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordPage {
    /// Records on this page
    pub records: Vec<Record>,
    /// Total rows (or pages, depending on the endpoint) reported by the backend
    pub total: u64,
}

impl RecordPage {
    /// An empty page with a zero total
    pub fn empty() -> Self {
        Self::default()
    }
}

//! Response decoding
//!
//! Stateless conversion of response bodies into text, JSON, or normalized
//! records, selected by the endpoint's [`DecodeMode`].
//!
//! # Columnar envelope
//!
//! ```text
//! {"m": [{"name": "custid", "type": "int"}, "displayname"],
//!  "d": {"r": [[123, "Jane%20Doe"]], "32": 1}}
//! ```
//!
//! `m` lists the columns, either as bare names, as `{"name", "type"}` objects,
//! or as an object keyed by 1-based position. Rows are arrays zipped
//! positionally, or objects keyed by the same 1-based positions. Type codes
//! coerce values: `int` to integers, `float` to floats, `date` (epoch
//! milliseconds) to UTC date-times; anything else passes through.

use chrono::DateTime;
use std::collections::HashSet;
use serde_json::Value;

use super::endpoints::{ColumnarLayout, DecodeMode, RowLocation};
use crate::{Record, RecordPage, RecordValue};

/// Decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Body is not JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Row width differs from the column count
    #[error("row {row} has {actual} values, expected {expected}")]
    ArityMismatch {
        /// Zero-based row index
        row: usize,
        /// Column count
        expected: usize,
        /// Values found in the row
        actual: usize,
    },

    /// JSON does not have the expected structure
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Required field is absent
    #[error("missing field: {0}")]
    MissingField(String),
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Text body
    Text(String),
    /// JSON body
    Json(Value),
    /// Columnar records
    Page(RecordPage),
}

impl Decoded {
    /// Placeholder result for `mode`: empty text, JSON null, or an empty page
    pub fn empty(mode: &DecodeMode) -> Self {
        match mode {
            DecodeMode::Text => Decoded::Text(String::new()),
            DecodeMode::Json => Decoded::Json(Value::Null),
            DecodeMode::Columnar(_) => Decoded::Page(RecordPage::empty()),
        }
    }

    /// Text body
    pub fn into_text(self) -> DecodeResult<String> {
        match self {
            Decoded::Text(text) => Ok(text),
            other => Err(other.shape_error("text")),
        }
    }

    /// JSON body
    pub fn into_json(self) -> DecodeResult<Value> {
        match self {
            Decoded::Json(value) => Ok(value),
            other => Err(other.shape_error("JSON")),
        }
    }

    /// Record page
    pub fn into_page(self) -> DecodeResult<RecordPage> {
        match self {
            Decoded::Page(page) => Ok(page),
            other => Err(other.shape_error("records")),
        }
    }

    fn shape_error(&self, wanted: &str) -> DecodeError {
        let got = match self {
            Decoded::Text(_) => "text",
            Decoded::Json(_) => "JSON",
            Decoded::Page(_) => "records",
        };
        DecodeError::UnexpectedShape(format!("expected {wanted}, decoded {got}"))
    }
}

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Integer (numbers or numeric strings)
    Integer,
    /// Floating point
    Float,
    /// Epoch milliseconds
    Date,
    /// No coercion
    Raw,
}

impl ColumnType {
    /// Map a backend type code; unknown codes pass values through
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "int" | "i" | "integer" | "long" => ColumnType::Integer,
            "float" | "f" | "double" | "number" => ColumnType::Float,
            "date" | "d" | "datetime" => ColumnType::Date,
            _ => ColumnType::Raw,
        }
    }
}

/// One column descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
    /// 1-based position key used by object rows
    pub key: String,
}

/// Stateless response decoder
pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Decode `body` according to `mode`
    ///
    /// # Arguments
    /// * `body` - Response body text
    /// * `mode` - Endpoint decode mode
    /// * `customer_id` - Session customer id, used by self-row rules
    /// * `unescape` - Decode URL-encoded text values
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the body does not match the mode
    pub fn decode(
        body: &str,
        mode: &DecodeMode,
        customer_id: Option<i64>,
        unescape: bool,
    ) -> DecodeResult<Decoded> {
        match mode {
            DecodeMode::Text => Ok(Decoded::Text(body.to_string())),
            DecodeMode::Json => {
                let mut value = Self::decode_json(body)?;
                if unescape {
                    unescape_json(&mut value);
                }
                Ok(Decoded::Json(value))
            }
            DecodeMode::Columnar(layout) => {
                let mut page = Self::decode_columnar(body, layout, customer_id)?;
                if unescape {
                    for record in &mut page.records {
                        unescape_record(record);
                    }
                }
                Ok(Decoded::Page(page))
            }
        }
    }

    /// Parse `body` as JSON
    pub fn decode_json(body: &str) -> DecodeResult<Value> {
        serde_json::from_str(body).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }

    /// Parse `body` as a columnar envelope
    pub fn decode_columnar(
        body: &str,
        layout: &ColumnarLayout,
        customer_id: Option<i64>,
    ) -> DecodeResult<RecordPage> {
        let envelope = Self::decode_json(body)?;
        Self::records_from_envelope(&envelope, layout, customer_id)
    }

    /// Zip an already-parsed envelope into records
    ///
    /// # Returns
    /// Records in row order and the total reported by the envelope (the record
    /// count when the layout declares no total field). An empty or missing `d`
    /// yields an empty page with total 0.
    ///
    /// # Errors
    /// - [`DecodeError::ArityMismatch`] if a row width differs from the column count
    /// - [`DecodeError::MissingField`] if the declared total field is absent
    /// - [`DecodeError::UnexpectedShape`] for any other structural problem
    pub fn records_from_envelope(
        envelope: &Value,
        layout: &ColumnarLayout,
        customer_id: Option<i64>,
    ) -> DecodeResult<RecordPage> {
        let data = match envelope.get("d") {
            Some(d) if !is_empty(d) => d,
            _ => return Ok(RecordPage::empty()),
        };

        let rows: &[Value] = match layout.rows {
            RowLocation::Direct => row_list(data)?,
            RowLocation::Nested => match data {
                Value::Object(fields) => match fields.get("r") {
                    Some(r) => row_list(r)?,
                    None => &[],
                },
                _ => {
                    return Err(DecodeError::UnexpectedShape(
                        "d is not an object".to_string(),
                    ))
                }
            },
        };

        let columns = match envelope.get("m") {
            Some(meta) => parse_meta(meta)?,
            None if rows.is_empty() => Vec::new(),
            None => return Err(DecodeError::MissingField("m".to_string())),
        };

        let mut records = rows
            .iter()
            .enumerate()
            .map(|(index, row)| zip_row(index, row, &columns))
            .collect::<DecodeResult<Vec<_>>>()?;

        let mut total_field = layout.total_field;

        if let (Some(rule), Some(id)) = (layout.self_row, customer_id) {
            let first_is_self = records
                .first()
                .and_then(|r| r.get(rule.customer_id_column))
                .and_then(RecordValue::as_i64)
                == Some(id);
            if first_is_self {
                records.remove(0);
                total_field = Some(rule.alternate_total_field);
            }
        }

        let total = match total_field {
            Some(field) => match read_total(data, field) {
                Err(DecodeError::MissingField(_)) if records.is_empty() => 0,
                total => total?,
            },
            None => records.len() as u64,
        };

        Ok(RecordPage { records, total })
    }
}

fn row_list(value: &Value) -> DecodeResult<&[Value]> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(&[]),
        _ => Err(DecodeError::UnexpectedShape(
            "row list is not an array".to_string(),
        )),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Column descriptors in order. Two columns with the same name are rejected.
pub fn parse_meta(meta: &Value) -> DecodeResult<Vec<ColumnMeta>> {
    let columns = parse_columns(meta)?;

    let mut seen = HashSet::with_capacity(columns.len());
    if let Some(duplicate) = columns.iter().find(|column| !seen.insert(column.name.as_str())) {
        return Err(DecodeError::UnexpectedShape(format!(
            "duplicate column name {:?}",
            duplicate.name
        )));
    }
    Ok(columns)
}

fn parse_columns(meta: &Value) -> DecodeResult<Vec<ColumnMeta>> {
    match meta {
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let key = (index + 1).to_string();
                match entry {
                    Value::String(name) => Ok(ColumnMeta {
                        name: name.clone(),
                        column_type: ColumnType::Raw,
                        key,
                    }),
                    Value::Object(fields) => {
                        let name = fields.get("name").and_then(Value::as_str).ok_or_else(|| {
                            DecodeError::UnexpectedShape(format!("column {key} has no name"))
                        })?;
                        let column_type = fields
                            .get("type")
                            .and_then(Value::as_str)
                            .map(ColumnType::from_code)
                            .unwrap_or(ColumnType::Raw);
                        Ok(ColumnMeta {
                            name: name.to_string(),
                            column_type,
                            key,
                        })
                    }
                    _ => Err(DecodeError::UnexpectedShape(format!(
                        "column {key} is neither a name nor a descriptor"
                    ))),
                }
            })
            .collect(),
        Value::Object(entries) => {
            let mut columns = entries
                .iter()
                .map(|(key, name)| {
                    let position: usize = key.parse().map_err(|_| {
                        DecodeError::UnexpectedShape(format!("column key {key:?} is not a position"))
                    })?;
                    let name = name.as_str().ok_or_else(|| {
                        DecodeError::UnexpectedShape(format!("column {key} name is not a string"))
                    })?;
                    Ok((
                        position,
                        ColumnMeta {
                            name: name.to_string(),
                            column_type: ColumnType::Raw,
                            key: key.clone(),
                        },
                    ))
                })
                .collect::<DecodeResult<Vec<_>>>()?;
            columns.sort_by_key(|(position, _)| *position);
            Ok(columns.into_iter().map(|(_, column)| column).collect())
        }
        _ => Err(DecodeError::UnexpectedShape(
            "m is neither a list nor a map".to_string(),
        )),
    }
}

fn zip_row(index: usize, row: &Value, columns: &[ColumnMeta]) -> DecodeResult<Record> {
    let mut record = Record::with_capacity(columns.len());
    let mismatch = |actual| DecodeError::ArityMismatch {
        row: index,
        expected: columns.len(),
        actual,
    };

    match row {
        Value::Array(values) => {
            if values.len() != columns.len() {
                return Err(mismatch(values.len()));
            }
            for (column, value) in columns.iter().zip(values) {
                record.insert(column.name.as_str(), coerce(value, column.column_type));
            }
        }
        Value::Object(values) => {
            if values.len() != columns.len() {
                return Err(mismatch(values.len()));
            }
            for column in columns {
                let value = values
                    .get(&column.key)
                    .ok_or_else(|| mismatch(values.len()))?;
                record.insert(column.name.as_str(), coerce(value, column.column_type));
            }
        }
        _ => {
            return Err(DecodeError::UnexpectedShape(format!(
                "row {index} is neither a list nor a map"
            )))
        }
    }

    Ok(record)
}

fn read_total(data: &Value, field: &str) -> DecodeResult<u64> {
    let value = data
        .get(field)
        .ok_or_else(|| DecodeError::MissingField(format!("d.{field}")))?;
    let count = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| DecodeError::UnexpectedShape(format!("d.{field} is not a count: {value}")))
}

/// Convert a cell to a typed value; values that cannot be coerced pass through
pub fn coerce(value: &Value, column_type: ColumnType) -> RecordValue {
    match (column_type, value) {
        (_, Value::Null) => RecordValue::Null,
        (ColumnType::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => RecordValue::Integer(i),
            None => raw(value),
        },
        (ColumnType::Integer, Value::String(s)) => s
            .trim()
            .parse()
            .map(RecordValue::Integer)
            .unwrap_or_else(|_| raw(value)),
        (ColumnType::Float, Value::Number(n)) => {
            n.as_f64().map(RecordValue::Float).unwrap_or_else(|| raw(value))
        }
        (ColumnType::Float, Value::String(s)) => s
            .trim()
            .parse()
            .map(RecordValue::Float)
            .unwrap_or_else(|_| raw(value)),
        (ColumnType::Date, Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(RecordValue::Date)
            .unwrap_or_else(|| raw(value)),
        (ColumnType::Date, Value::String(s)) => s
            .trim()
            .parse()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(RecordValue::Date)
            .unwrap_or_else(|| raw(value)),
        _ => raw(value),
    }
}

fn raw(value: &Value) -> RecordValue {
    match value {
        Value::Null => RecordValue::Null,
        Value::Number(n) => match n.as_i64() {
            Some(i) => RecordValue::Integer(i),
            None => n.as_f64().map(RecordValue::Float).unwrap_or(RecordValue::Null),
        },
        Value::String(s) => RecordValue::Text(s.clone()),
        other => RecordValue::Json(other.clone()),
    }
}

/// Decode backend URL encoding: `+` is a space, then `%xx` escapes
///
/// Text that does not decode to UTF-8 is returned with only `+` replaced.
pub fn unescape_text(text: &str) -> String {
    let spaced = text.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Unescape every string inside `value`
pub fn unescape_json(value: &mut Value) {
    match value {
        Value::String(s) => *s = unescape_text(s),
        Value::Array(items) => items.iter_mut().for_each(unescape_json),
        Value::Object(fields) => fields.values_mut().for_each(unescape_json),
        _ => {}
    }
}

/// Unescape every text and nested JSON value of `record`
pub fn unescape_record(record: &mut Record) {
    for value in record.values_mut() {
        match value {
            RecordValue::Text(s) => *s = unescape_text(s),
            RecordValue::Json(v) => unescape_json(v),
            _ => {}
        }
    }
}

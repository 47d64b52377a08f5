//! Script-variable scraping
//!
//! The member home page and the series stats page carry their data as script
//! statements rather than an API response:
//!
//! ```text
//! var TrackListing = extractJSON('[{"id":1,"name":"Lime Rock"}]');
//! var YearAndQuarterListing = [{"year":2020,"quarters":[1,2,3,4]}];
//! var js_custid = 123456;
//! ```
//!
//! These functions are pure: they take the page text and return a parsed value
//! or a [`ScrapeError`] describing what was missing.

use serde_json::Value;

/// Marker preceding the customer id assignment
pub const CUSTOMER_ID_MARKER: &str = "js_custid";

const EXTRACT_JSON_OPEN: &str = "extractJSON('";
const EXTRACT_JSON_CLOSE: &str = "');";

/// Scraping errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    /// No `var NAME =` statement in the page
    #[error("script variable not found: {0}")]
    VariableNotFound(String),

    /// Statement has no terminator
    #[error("unterminated statement for {0}")]
    Unterminated(String),

    /// Statement value is not valid JSON
    #[error("invalid JSON in {name}: {message}")]
    InvalidJson {
        /// Variable name
        name: String,
        /// Parser message
        message: String,
    },

    /// Statement value is JSON null
    #[error("script variable {0} is null")]
    NullValue(String),

    /// Page does not mention the customer id
    #[error("customer id marker not found")]
    CustomerIdNotFound,

    /// Customer id value is not an integer
    #[error("invalid customer id: {0:?}")]
    InvalidCustomerId(String),
}

/// Result type for scraping
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Parse the value assigned to script variable `name`
///
/// Accepts both `var NAME = extractJSON('...');` and a bare
/// `var NAME = <json>;`. Single quotes escaped inside `extractJSON` are
/// unescaped before parsing.
///
/// # Errors
/// - [`ScrapeError::VariableNotFound`] if no statement assigns `name`
/// - [`ScrapeError::Unterminated`] if the statement never ends
/// - [`ScrapeError::InvalidJson`] if the value does not parse
/// - [`ScrapeError::NullValue`] if the value is `null`
pub fn extract_var(body: &str, name: &str) -> ScrapeResult<Value> {
    let value_text =
        find_assignment(body, name).ok_or_else(|| ScrapeError::VariableNotFound(name.to_string()))?;

    let value = if let Some(rest) = value_text.strip_prefix(EXTRACT_JSON_OPEN) {
        let end = rest
            .find(EXTRACT_JSON_CLOSE)
            .ok_or_else(|| ScrapeError::Unterminated(name.to_string()))?;
        let json = rest[..end].replace("\\'", "'");
        serde_json::from_str(&json).map_err(|e| invalid_json(name, &e))?
    } else {
        parse_statement_value(value_text, name)?
    };

    if value.is_null() {
        return Err(ScrapeError::NullValue(name.to_string()));
    }
    Ok(value)
}

/// Read the logged-in customer id from the home page
///
/// Takes the text after `js_custid` and its `=` up to the next `;`.
///
/// # Errors
/// - [`ScrapeError::CustomerIdNotFound`] if the marker is absent
/// - [`ScrapeError::Unterminated`] if no `;` follows
/// - [`ScrapeError::InvalidCustomerId`] if the value is not an integer
pub fn extract_customer_id(body: &str) -> ScrapeResult<i64> {
    let start = body
        .find(CUSTOMER_ID_MARKER)
        .ok_or(ScrapeError::CustomerIdNotFound)?;
    let rest = body[start + CUSTOMER_ID_MARKER.len()..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    let end = rest
        .find(';')
        .ok_or_else(|| ScrapeError::Unterminated(CUSTOMER_ID_MARKER.to_string()))?;

    let raw = rest[..end].trim();
    raw.parse()
        .map_err(|_| ScrapeError::InvalidCustomerId(raw.to_string()))
}

/// Text right after `var NAME =` for the first statement assigning exactly `name`
fn find_assignment<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    for (index, _) in body.match_indices("var ") {
        let rest = body[index + 4..].trim_start();
        let Some(after_name) = rest.strip_prefix(name) else {
            continue;
        };
        if after_name.starts_with(is_identifier_char) {
            continue;
        }
        if let Some(value) = after_name.trim_start().strip_prefix('=') {
            return Some(value.trim_start());
        }
    }
    None
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Parse the value of a bare `var NAME = value;` statement
fn parse_statement_value(text: &str, name: &str) -> ScrapeResult<Value> {
    // Arrays and objects may contain ';' inside strings, so parse one value first.
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    if let Some(Ok(value)) = stream.next() {
        if text[stream.byte_offset()..].trim_start().starts_with(';') {
            return Ok(value);
        }
    }

    // Scalars stop at the terminator.
    let end = text
        .find(';')
        .ok_or_else(|| ScrapeError::Unterminated(name.to_string()))?;
    serde_json::from_str(text[..end].trim()).map_err(|e| invalid_json(name, &e))
}

fn invalid_json(name: &str, error: &serde_json::Error) -> ScrapeError {
    ScrapeError::InvalidJson {
        name: name.to_string(),
        message: error.to_string(),
    }
}

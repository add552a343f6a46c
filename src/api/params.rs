//! Query-string parsing shared by the list endpoints.

use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use crate::store::{DEFAULT_LIMIT, MAX_LIMIT, Page};

/// Raw `limit`/`offset`, kept as text so bad input becomes a 400 with a
/// useful message instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageParams {
    pub fn page(&self) -> Result<Page, ApiError> {
        self.page_with_default(DEFAULT_LIMIT)
    }

    /// Like [`PageParams::page`] but with a different default limit.
    pub fn page_with_default(&self, default_limit: u32) -> Result<Page, ApiError> {
        let limit = match self.limit.as_deref() {
            Some(raw) => parse_count("limit", raw)?.min(MAX_LIMIT),
            None => default_limit,
        };
        let offset = match self.offset.as_deref() {
            Some(raw) => parse_count("offset", raw)?,
            None => 0,
        };
        Ok(Page { limit, offset })
    }
}

fn parse_count(name: &str, raw: &str) -> Result<u32, ApiError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{name} must be a non-negative integer")))?;
    if value < 0 {
        return Err(ApiError::bad_request(format!("{name} must be a non-negative integer")));
    }
    // Anything above u32::MAX is far past the cap anyway
    Ok(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Parse an optional `true`/`false` filter.
pub fn parse_bool(name: &str, raw: Option<&str>) -> Result<Option<bool>, ApiError> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(ApiError::bad_request(format!("{name} must be true or false"))),
    }
}

/// Parse an integer path id.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {raw}")))
}

/// Parse a UUID path id.
pub fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id: {raw}")))
}

/// A required body field: missing, `null` and blank strings are all rejected.
pub fn require_text(name: &str, value: Option<String>) -> Result<String, ApiError> {
    non_empty(value).ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

/// Treat empty filter values as absent.
pub fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

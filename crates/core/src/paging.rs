//! Page-number pagination arithmetic for list endpoints.

use serde::Deserialize;

use crate::error::CoreError;

/// Page size used when the caller omits `size` or passes a non-positive one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest accepted page size. Larger requests are rejected, not truncated.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A one-based page request with an optional country filter.
///
/// Raw values are kept as supplied; call [`PageRequest::validate`] first,
/// then use [`PageRequest::skip`] and [`PageRequest::limit`] for the store
/// window. `limit` always equals `size`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub country: Option<String>,
}

impl PageRequest {
    pub fn new(page: i64, size: i64, country: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            country: Some(country.into()),
        }
    }

    /// One-based page number, at least 1.
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    /// Requested page size, or [`DEFAULT_PAGE_SIZE`] when absent or below 1.
    pub fn size(&self) -> i64 {
        match self.size {
            Some(s) if s >= 1 => s,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// Reject page sizes above [`MAX_PAGE_SIZE`].
    pub fn validate(&self) -> Result<(), CoreError> {
        let size = self.size();
        if size > MAX_PAGE_SIZE {
            return Err(CoreError::Validation(format!(
                "Page size {size} exceeds the maximum of {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Number of records to skip: `size * (page - 1)`.
    pub fn skip(&self) -> u64 {
        self.size().saturating_mul(self.page() - 1) as u64
    }

    pub fn limit(&self) -> u64 {
        self.size() as u64
    }

    /// The country filter, treating an empty or blank string as absent.
    pub fn country_filter(&self) -> Option<&str> {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

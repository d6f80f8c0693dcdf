//! Pagination and sorting types for list operations.
//!
//! Lists use offset-based pagination: the caller asks for `limit` records
//! starting at `offset` and receives the page together with the total number
//! of matching records.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default page size.
pub const DEFAULT_LIMIT: u32 = 10;

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of matching records to skip.
    pub offset: u32,
    /// Maximum number of records to return.
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Creates a pagination window.
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Returns the first page with the given size.
    pub fn first(limit: u32) -> Self {
        Self::new(0, limit)
    }

    /// Returns the window immediately after this one.
    pub fn next(&self) -> Self {
        Self::new(self.offset.saturating_add(self.limit), self.limit)
    }

    /// Rejects windows that cannot return anything.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidArgument {
                argument: "limit".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// A requested sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Dotted attribute path, e.g. `patients.fullName`.
    pub attribute: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on `attribute`.
    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `attribute`.
    pub fn descending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parses a sort parameter value (e.g., "-dates.lastUploadDate" for descending).
    pub fn parse(s: &str) -> Self {
        if let Some(stripped) = s.strip_prefix('-') {
            Self::descending(stripped)
        } else {
            Self::ascending(s.strip_prefix('+').unwrap_or(s))
        }
    }

    /// Returns true for ascending sorts.
    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Ascending
    }
}

/// A page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Number of records matching the query, ignoring the window.
    pub total: u64,
}

impl<T> Page<T> {
    /// Creates a new page with the given items and total.
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Creates an empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    /// Returns true if this page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse() {
        assert_eq!(
            Sort::parse("-dates.lastUploadDate"),
            Sort::descending("dates.lastUploadDate")
        );
        assert_eq!(
            Sort::parse("patients.fullName"),
            Sort::ascending("patients.fullName")
        );
        assert_eq!(
            Sort::parse("+stats.hasTimeCGMUsePercent"),
            Sort::ascending("stats.hasTimeCGMUsePercent")
        );
    }

    #[test]
    fn test_pagination_defaults_and_next() {
        let page = Pagination::default();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(Pagination::new(10, 5).next(), Pagination::new(15, 5));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(Pagination::new(0, 0).validate().is_err());
        assert!(Pagination::new(0, 1).validate().is_ok());
    }

    #[test]
    fn test_page_map_keeps_total() {
        let page = Page::new(vec![1, 2, 3], 23).map(|n| n * 2);
        assert_eq!(page.items, vec![2, 4, 6]);
        assert_eq!(page.total, 23);
        assert!(Page::<u8>::empty().is_empty());
    }
}

//! Compilation of summary list requests into a store-agnostic query.
//!
//! Backends translate a [`SummaryQuery`] into their own query language (an
//! aggregation pipeline for MongoDB, direct evaluation for the in-memory
//! store). Everything that decides *which* records match and in *which*
//! order lives here so that every backend agrees.

use serde_json::Value;

use super::filter::{Comparator, Filter, StatField, is_zero_instant};
use super::period::SummaryType;
use crate::error::ValidationError;
use crate::types::{Pagination, Sort, SortDirection, timestamp};

/// Value excluded from every unconstrained statistic once any threshold is
/// applied. Keeps the predicate aligned with the per-statistic index prefix.
pub const EXCLUDED_STAT_SENTINEL: f64 = -1111.0;

/// Paths the free-text search is applied to.
pub const SEARCH_FIELDS: [&str; 4] = [
    "patients.fullName",
    "patients.email",
    "patients.mrn",
    "patients.birthDate",
];

/// Attributes a list may be sorted by. Anything else is ignored.
pub const SORTABLE_ATTRIBUTES: [&str; 14] = [
    "patients.fullName",
    "patients.birthDate",
    "dates.lastUploadDate",
    "dates.hasLastUploadDate",
    "stats.timeCGMUsePercent",
    "stats.hasTimeCGMUsePercent",
    "stats.glucoseManagementIndicator",
    "stats.hasGlucoseManagementIndicator",
    "stats.hasAverageGlucose",
    "stats.hasTimeInLowPercent",
    "stats.hasTimeInVeryLowPercent",
    "stats.hasTimeInHighPercent",
    "stats.hasTimeInVeryHighPercent",
    "stats.hasTimeInTargetPercent",
];

/// Sort applied when the request has no usable sort.
pub const DEFAULT_SORT_ATTRIBUTE: &str = "patients.fullName";

/// Tie-breaker appended to every sort.
pub const ID_ATTRIBUTE: &str = "_id";

/// One conjunct of the compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `field == value`.
    Equals { field: String, value: Value },
    /// Some element of the `array` has `field == value`.
    ElementMatch {
        array: String,
        field: String,
        value: Value,
    },
    /// Any of `fields` matches the case-insensitive regex `pattern`.
    Matches { fields: Vec<String>, pattern: String },
    /// `field <comparator> value`.
    Compare {
        field: String,
        comparator: Comparator,
        value: Value,
    },
    /// `field != value` (missing fields satisfy it).
    NotEquals { field: String, value: Value },
}

impl Clause {
    /// The document path this clause constrains. Searches report their first
    /// field.
    pub fn field(&self) -> &str {
        match self {
            Clause::Equals { field, .. }
            | Clause::Compare { field, .. }
            | Clause::NotEquals { field, .. } => field,
            Clause::ElementMatch { array, .. } => array,
            Clause::Matches { fields, .. } => fields.first().map(String::as_str).unwrap_or(""),
        }
    }
}

/// One compiled sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Dotted document path.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl SortKey {
    fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }

    /// Returns true for ascending keys.
    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Ascending
    }
}

/// A compiled list request.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryQuery {
    /// Conjunction of clauses.
    pub predicate: Vec<Clause>,
    /// Ordered sort keys, always ending with the id tie-breaker.
    pub sort: Vec<SortKey>,
    /// Records to skip.
    pub skip: u64,
    /// Maximum records to return.
    pub limit: u64,
    /// Compare strings case-insensitively (primary-strength collation).
    pub case_insensitive: bool,
}

/// Compiles a list request for summaries of `summary_type`.
pub fn compile(
    summary_type: SummaryType,
    filter: &Filter,
    pagination: Pagination,
    sorts: &[Sort],
) -> Result<SummaryQuery, ValidationError> {
    pagination.validate()?;

    let sort = compile_sort(sorts);
    let case_insensitive = sort.iter().any(|key| key.field == DEFAULT_SORT_ATTRIBUTE);

    Ok(SummaryQuery {
        predicate: compile_predicate(summary_type, filter),
        sort,
        skip: u64::from(pagination.offset),
        limit: u64::from(pagination.limit),
        case_insensitive,
    })
}

/// Compiles the filter into a conjunction of clauses.
pub fn compile_predicate(summary_type: SummaryType, filter: &Filter) -> Vec<Clause> {
    let mut predicate = vec![Clause::Equals {
        field: "type".to_string(),
        value: Value::String(summary_type.to_string()),
    }];

    if let Some(clinic_id) = &filter.clinic_id {
        predicate.push(Clause::ElementMatch {
            array: "patients".to_string(),
            field: "clinicId".to_string(),
            value: Value::String(clinic_id.clone()),
        });
    }

    if let Some(user_id) = &filter.user_id {
        predicate.push(Clause::Equals {
            field: "userId".to_string(),
            value: Value::String(user_id.clone()),
        });
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        predicate.push(Clause::Matches {
            fields: SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
            pattern: regex::escape(search),
        });
    }

    if let Some(from) = filter
        .last_upload_date_from
        .filter(|from| !is_zero_instant(from))
    {
        predicate.push(Clause::Compare {
            field: "dates.lastUploadDate".to_string(),
            comparator: Comparator::GreaterThanOrEqual,
            value: Value::String(timestamp::format(&from)),
        });
    }

    if let Some(to) = filter
        .last_upload_date_to
        .filter(|to| !is_zero_instant(to))
    {
        predicate.push(Clause::Compare {
            field: "dates.lastUploadDate".to_string(),
            comparator: Comparator::LessThan,
            value: Value::String(timestamp::format(&to)),
        });
    }

    if !filter.thresholds.is_empty() {
        for field in StatField::ALL {
            match filter.thresholds.get(&field) {
                Some(threshold) => predicate.push(Clause::Compare {
                    field: field.path(),
                    comparator: threshold.comparator,
                    value: Value::from(threshold.value),
                }),
                None => predicate.push(Clause::NotEquals {
                    field: field.path(),
                    value: Value::from(EXCLUDED_STAT_SENTINEL),
                }),
            }
        }
    }

    predicate
}

/// Keeps allow-listed sorts, defaults to full name ascending, and appends
/// the id tie-breaker.
pub fn compile_sort(sorts: &[Sort]) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = sorts
        .iter()
        .filter(|sort| SORTABLE_ATTRIBUTES.contains(&sort.attribute.as_str()))
        .map(|sort| SortKey::new(&sort.attribute, sort.direction))
        .collect();

    if keys.is_empty() {
        keys.push(SortKey::new(DEFAULT_SORT_ATTRIBUTE, SortDirection::Ascending));
    }

    keys.push(SortKey::new(ID_ATTRIBUTE, SortDirection::Ascending));
    keys
}

//! List filters for summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Numeric comparison applied to a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
}

impl Comparator {
    /// Query-language operator for this comparator.
    pub fn operator(&self) -> &'static str {
        match self {
            Comparator::GreaterThan => "$gt",
            Comparator::GreaterThanOrEqual => "$gte",
            Comparator::LessThan => "$lt",
            Comparator::LessThanOrEqual => "$lte",
        }
    }

    /// Evaluates `lhs <cmp> rhs`.
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::GreaterThan => lhs > rhs,
            Comparator::GreaterThanOrEqual => lhs >= rhs,
            Comparator::LessThan => lhs < rhs,
            Comparator::LessThanOrEqual => lhs <= rhs,
        }
    }
}

impl FromStr for Comparator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Comparator::GreaterThan),
            ">=" => Ok(Comparator::GreaterThanOrEqual),
            "<" => Ok(Comparator::LessThan),
            "<=" => Ok(Comparator::LessThanOrEqual),
            other => Err(ValidationError::InvalidArgument {
                argument: "comparator".to_string(),
                message: format!("unsupported comparator '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}

/// Percentage statistics that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum StatField {
    TimeCgmUsePercent,
    TimeInVeryLowPercent,
    TimeInLowPercent,
    TimeInTargetPercent,
    TimeInHighPercent,
    TimeInVeryHighPercent,
}

impl StatField {
    /// Every filterable statistic.
    pub const ALL: [StatField; 6] = [
        StatField::TimeCgmUsePercent,
        StatField::TimeInVeryLowPercent,
        StatField::TimeInLowPercent,
        StatField::TimeInTargetPercent,
        StatField::TimeInHighPercent,
        StatField::TimeInVeryHighPercent,
    ];

    /// Attribute name within `stats`.
    pub fn attribute(&self) -> &'static str {
        match self {
            StatField::TimeCgmUsePercent => "timeCGMUsePercent",
            StatField::TimeInVeryLowPercent => "timeInVeryLowPercent",
            StatField::TimeInLowPercent => "timeInLowPercent",
            StatField::TimeInTargetPercent => "timeInTargetPercent",
            StatField::TimeInHighPercent => "timeInHighPercent",
            StatField::TimeInVeryHighPercent => "timeInVeryHighPercent",
        }
    }

    /// Full document path, e.g. `stats.timeInLowPercent`.
    pub fn path(&self) -> String {
        format!("stats.{}", self.attribute())
    }
}

/// One `(comparator, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    /// How the statistic is compared.
    pub comparator: Comparator,
    /// The bound the statistic is compared against.
    pub value: f64,
}

/// Selection criteria for listing summaries.
///
/// # Examples
///
/// ```
/// use clinic_persistence::summary::{Comparator, Filter, StatField};
///
/// let filter = Filter::for_clinic("clinic-1")
///     .with_search("smith")
///     .with_threshold(StatField::TimeInLowPercent, Comparator::GreaterThan, 0.04);
///
/// assert_eq!(filter.thresholds.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Restrict to summaries with a patient projection for this clinic.
    pub clinic_id: Option<String>,
    /// Restrict to one user.
    pub user_id: Option<String>,
    /// Case-insensitive literal search over name, email, MRN and birth date.
    pub search: Option<String>,
    /// Inclusive lower bound on the last upload date.
    pub last_upload_date_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the last upload date.
    pub last_upload_date_to: Option<DateTime<Utc>>,
    /// At most one threshold per statistic.
    pub thresholds: BTreeMap<StatField, Threshold>,
}

impl Filter {
    /// Filter scoped to one clinic.
    pub fn for_clinic(clinic_id: impl Into<String>) -> Self {
        Self {
            clinic_id: Some(clinic_id.into()),
            ..Default::default()
        }
    }

    /// Sets the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the search text.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Sets the upload date window `[from, to)`.
    pub fn with_last_upload_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.last_upload_date_from = from;
        self.last_upload_date_to = to;
        self
    }

    /// Sets the threshold for one statistic, replacing any previous one.
    pub fn with_threshold(mut self, field: StatField, comparator: Comparator, value: f64) -> Self {
        self.thresholds.insert(field, Threshold { comparator, value });
        self
    }

    /// Parses and sets a threshold given in query-string form (`">="`).
    pub fn with_threshold_str(
        self,
        field: StatField,
        comparator: &str,
        value: f64,
    ) -> Result<Self, ValidationError> {
        let comparator = comparator.parse()?;
        Ok(self.with_threshold(field, comparator, value))
    }
}

/// Returns true for the instants treated as "no bound": the Unix epoch and
/// `0001-01-01T00:00:00Z`.
pub fn is_zero_instant(value: &DateTime<Utc>) -> bool {
    const YEAR_ONE_SECONDS: i64 = -62_135_596_800;
    value.timestamp_subsec_nanos() == 0
        && (value.timestamp() == 0 || value.timestamp() == YEAR_ONE_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_comparator_parse() {
        assert_eq!(">".parse::<Comparator>().unwrap(), Comparator::GreaterThan);
        assert_eq!(">=".parse::<Comparator>().unwrap().operator(), "$gte");
        assert_eq!("<".parse::<Comparator>().unwrap().operator(), "$lt");
        assert_eq!("<=".parse::<Comparator>().unwrap().to_string(), "<=");
        assert!("==".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_comparator_holds() {
        assert!(Comparator::GreaterThan.holds(0.5, 0.4));
        assert!(!Comparator::GreaterThan.holds(0.4, 0.4));
        assert!(Comparator::LessThanOrEqual.holds(0.4, 0.4));
    }

    #[test]
    fn test_one_threshold_per_field() {
        let filter = Filter::default()
            .with_threshold(StatField::TimeInLowPercent, Comparator::GreaterThan, 0.1)
            .with_threshold(StatField::TimeInLowPercent, Comparator::LessThan, 0.2);
        assert_eq!(filter.thresholds.len(), 1);
        assert_eq!(
            filter.thresholds[&StatField::TimeInLowPercent].comparator,
            Comparator::LessThan
        );
    }

    #[test]
    fn test_stat_field_paths() {
        assert_eq!(
            StatField::TimeCgmUsePercent.path(),
            "stats.timeCGMUsePercent"
        );
        assert_eq!(StatField::ALL.len(), 6);
    }

    #[test]
    fn test_zero_instants() {
        assert!(is_zero_instant(&Utc.timestamp_opt(0, 0).unwrap()));
        assert!(is_zero_instant(
            &Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()
        ));
        assert!(!is_zero_instant(
            &Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        ));
    }
}

//! Backend seam for the summary collection.

use async_trait::async_trait;
use serde_json::Value;

use super::filter::StatField;
use super::period::SummaryType;
use super::query::SummaryQuery;
use crate::core::IndexProvisioner;
use crate::error::StorageResult;
use crate::types::{IndexSpec, Page};

/// Collection holding every summary type.
pub const SUMMARY_COLLECTION: &str = "summary";

/// Identity of a summary document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    /// Owner of the summary.
    pub user_id: String,
    /// Device class of the summary.
    pub summary_type: SummaryType,
}

impl SummaryKey {
    /// Creates a key.
    pub fn new(user_id: impl Into<String>, summary_type: SummaryType) -> Self {
        Self {
            user_id: user_id.into(),
            summary_type,
        }
    }
}

/// What an upsert did, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
    /// Documents matched by the key.
    pub matched: u64,
    /// Documents whose content changed.
    pub modified: u64,
    /// Whether a new document was inserted.
    pub upserted: bool,
}

/// Storage operations over the summary collection.
///
/// Documents cross this seam as JSON in the persisted layout; the repository
/// owns the typed view.
#[async_trait]
pub trait SummaryStore: IndexProvisioner {
    /// Returns the document for `key`, if any.
    async fn find_summary(&self, key: &SummaryKey) -> StorageResult<Option<Value>>;

    /// Deletes the document for `key` and returns the number removed.
    async fn delete_summary(&self, key: &SummaryKey) -> StorageResult<u64>;

    /// Sets `document`'s fields on the document for `key`, inserting it when
    /// absent.
    async fn upsert_summary(&self, key: &SummaryKey, document: Value) -> StorageResult<UpsertOutcome>;

    /// Runs a compiled list query and returns the page with the total count,
    /// in one round trip.
    async fn query_summaries(&self, query: &SummaryQuery) -> StorageResult<Page<Value>>;
}

/// Indexes of the summary collection.
pub fn summary_indexes() -> Vec<IndexSpec> {
    let mut indexes = vec![
        IndexSpec::new("UniqueUserSummaryType")
            .asc("type")
            .asc("userId")
            .unique(),
        IndexSpec::new("LastUploadDate")
            .asc("patients.clinicId")
            .asc("dates.lastUploadDate"),
    ];

    let mut stat_index = |name: &str, attribute: &str| {
        let has_flag = format!("has{}{}", attribute[..1].to_uppercase(), &attribute[1..]);
        indexes.push(
            IndexSpec::new(name)
                .asc("patients.clinicId")
                .asc(format!("stats.{}", attribute))
                .desc(format!("stats.{}", has_flag)),
        );
    };

    stat_index("CGMUsePercent", StatField::TimeCgmUsePercent.attribute());
    stat_index("GlucoseManagementIndicator", "glucoseManagementIndicator");
    stat_index("AverageGlucose", "averageGlucose");
    for field in [
        StatField::TimeInVeryLowPercent,
        StatField::TimeInLowPercent,
        StatField::TimeInTargetPercent,
        StatField::TimeInHighPercent,
        StatField::TimeInVeryHighPercent,
    ] {
        let name = format!(
            "{}{}",
            field.attribute()[..1].to_uppercase(),
            &field.attribute()[1..]
        );
        stat_index(&name, field.attribute());
    }

    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_summary_index_names_are_distinct() {
        let indexes = summary_indexes();
        let names: HashSet<_> = indexes.iter().map(|index| index.name.as_str()).collect();
        assert_eq!(names.len(), indexes.len());
        assert_eq!(indexes.len(), 10);
    }

    #[test]
    fn test_unique_key_is_type_and_user() {
        let indexes = summary_indexes();
        let unique = indexes
            .iter()
            .find(|index| index.name == "UniqueUserSummaryType")
            .unwrap();
        assert!(unique.unique);
        assert_eq!(unique.key_paths(), vec!["type", "userId"]);
    }

    #[test]
    fn test_stat_indexes_have_flag_descending() {
        let indexes = summary_indexes();
        let low = indexes
            .iter()
            .find(|index| index.name == "TimeInLowPercent")
            .unwrap();
        assert_eq!(
            low.key_paths(),
            vec![
                "patients.clinicId",
                "stats.timeInLowPercent",
                "stats.hasTimeInLowPercent"
            ]
        );
        assert_eq!(low.keys[2].1, crate::types::IndexOrder::Descending);

        let cgm = indexes
            .iter()
            .find(|index| index.name == "CGMUsePercent")
            .unwrap();
        assert_eq!(cgm.key_paths()[2], "stats.hasTimeCGMUsePercent");
    }
}

//! Store-agnostic index declarations.
//!
//! Repositories declare the indexes they rely on; each backend applies them
//! during startup (see [`IndexProvisioner`](crate::core::IndexProvisioner)).

use serde::{Deserialize, Serialize};

/// Direction of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOrder {
    /// Ascending (`1`).
    Ascending,
    /// Descending (`-1`).
    Descending,
}

impl IndexOrder {
    /// Numeric form used by document stores.
    pub fn as_i32(self) -> i32 {
        match self {
            IndexOrder::Ascending => 1,
            IndexOrder::Descending => -1,
        }
    }
}

/// A named compound index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Ordered key paths.
    pub keys: Vec<(String, IndexOrder)>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// When set, only documents that have this field are indexed.
    pub partial_on_field: Option<String>,
}

impl IndexSpec {
    /// Creates a non-unique index with no keys.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
            partial_on_field: None,
        }
    }

    /// Appends an ascending key.
    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.keys.push((path.into(), IndexOrder::Ascending));
        self
    }

    /// Appends a descending key.
    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.keys.push((path.into(), IndexOrder::Descending));
        self
    }

    /// Marks the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Restricts the index to documents where `field` exists.
    pub fn partial_on(mut self, field: impl Into<String>) -> Self {
        self.partial_on_field = Some(field.into());
        self
    }

    /// Returns the key paths in order.
    pub fn key_paths(&self) -> Vec<&str> {
        self.keys.iter().map(|(path, _)| path.as_str()).collect()
    }
}

/// Indexes of the `clinics` collection.
pub fn clinic_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("UniqueShareCodes").asc("shareCodes").unique(),
        IndexSpec::new("UniqueCanonicalShareCode")
            .asc("canonicalShareCode")
            .unique(),
    ]
}

/// Indexes of the `clinicians` collection.
pub fn clinician_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("UniqueClinicianUserId")
            .asc("clinicId")
            .asc("userId")
            .unique()
            .partial_on("userId"),
        IndexSpec::new("UniqueInviteId")
            .asc("clinicId")
            .asc("inviteId")
            .unique()
            .partial_on("inviteId"),
        IndexSpec::new("UniqueClinicMemberEmail")
            .asc("clinicId")
            .asc("email")
            .unique()
            .partial_on("email"),
    ]
}

/// Indexes of the `patients` collection.
pub fn patient_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("UniquePatient")
            .asc("clinicId")
            .asc("userId")
            .unique()
            .partial_on("userId"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinic_indexes_are_unique() {
        let indexes = clinic_indexes();
        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().all(|index| index.unique));
        assert_eq!(indexes[0].key_paths(), vec!["shareCodes"]);
    }

    #[test]
    fn test_builder_preserves_key_order() {
        let index = IndexSpec::new("X").asc("a").desc("b").asc("c");
        assert_eq!(index.key_paths(), vec!["a", "b", "c"]);
        assert_eq!(index.keys[1].1.as_i32(), -1);
    }
}

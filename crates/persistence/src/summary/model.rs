//! Summary documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::{Period, SummaryType};
use crate::error::ValidationError;

/// Per-clinic projection of the patient a summary belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedPatient {
    /// Clinic the projection belongs to.
    pub clinic_id: String,
    /// Birth date as `YYYY-MM-DD`.
    #[serde(default)]
    pub birth_date: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name, the default sort key.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Medical record number within the clinic.
    #[serde(default)]
    pub mrn: Option<String>,
}

impl EmbeddedPatient {
    /// Creates a projection for `clinic_id`.
    pub fn new(clinic_id: impl Into<String>) -> Self {
        Self {
            clinic_id: clinic_id.into(),
            ..Default::default()
        }
    }

    /// Sets the full name.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the medical record number.
    pub fn with_mrn(mut self, mrn: impl Into<String>) -> Self {
        self.mrn = Some(mrn.into());
        self
    }

    /// Sets the birth date.
    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }
}

/// Thresholds the statistics were computed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryConfig {
    /// Version of the summary computation.
    pub schema_version: i32,
    /// Upper bound of the target range.
    pub high_glucose_threshold: f64,
    /// Very high bound.
    pub very_high_glucose_threshold: f64,
    /// Lower bound of the target range.
    pub low_glucose_threshold: f64,
    /// Very low bound.
    pub very_low_glucose_threshold: f64,
}

/// Date bookkeeping of a summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDates {
    /// Hours of data covered.
    #[serde(default)]
    pub total_hours: i64,
    /// Whether `last_upload_date` is set.
    #[serde(default)]
    pub has_last_upload_date: bool,
    /// Time of the most recent upload.
    #[serde(default, with = "crate::types::timestamp::option")]
    pub last_upload_date: Option<DateTime<Utc>>,
    /// Time the summary was last recomputed.
    #[serde(default, with = "crate::types::timestamp::option")]
    pub last_updated_date: Option<DateTime<Utc>>,
    /// Earliest datum included.
    #[serde(default, with = "crate::types::timestamp::option")]
    pub first_data: Option<DateTime<Utc>>,
    /// Latest datum included.
    #[serde(default, with = "crate::types::timestamp::option")]
    pub last_data: Option<DateTime<Utc>>,
    /// Set when new data arrived after the last computation.
    #[serde(default, with = "crate::types::timestamp::option")]
    pub outdated_since: Option<DateTime<Utc>>,
}

/// Statistics summary of one user's data for one summary type.
///
/// Identified by `(user_id, summary_type)`. The `summary_type` field is kept
/// as a string so that a mismatched document can be represented and rejected
/// by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Period"))]
pub struct Summary<T: Period> {
    /// Store-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owner of the underlying data.
    pub user_id: String,
    /// Stored discriminant, `"cgm"` or `"bgm"`.
    #[serde(rename = "type")]
    pub summary_type: String,
    /// Per-clinic patient projections.
    #[serde(default)]
    pub patients: Vec<EmbeddedPatient>,
    /// Computation thresholds.
    #[serde(default)]
    pub config: SummaryConfig,
    /// Date bookkeeping.
    #[serde(default)]
    pub dates: SummaryDates,
    /// The statistics.
    #[serde(default)]
    pub stats: T,
}

impl<T: Period> Summary<T> {
    /// Creates an empty summary of `T`'s type for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            summary_type: T::summary_type().to_string(),
            patients: Vec::new(),
            config: SummaryConfig::default(),
            dates: SummaryDates::default(),
            stats: T::default(),
        }
    }

    /// Adds a patient projection.
    pub fn with_patient(mut self, patient: EmbeddedPatient) -> Self {
        self.patients.push(patient);
        self
    }

    /// Replaces the statistics.
    pub fn with_stats(mut self, stats: T) -> Self {
        self.stats = stats;
        self
    }

    /// Checks the summary can be stored by a repository of `T`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = T::summary_type();
        if self.summary_type != expected.as_str() {
            return Err(ValidationError::SummaryTypeMismatch {
                expected: expected.to_string(),
                actual: self.summary_type.clone(),
            });
        }
        if self.user_id.is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "userId".to_string(),
            });
        }
        Ok(())
    }
}

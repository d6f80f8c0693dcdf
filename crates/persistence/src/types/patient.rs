//! Patient documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Permissions a patient granted to a clinic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientPermissions {
    /// Allows reading the patient's data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<Map<String, Value>>,
    /// Allows uploading data on the patient's behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<Map<String, Value>>,
    /// Allows writing notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Map<String, Value>>,
    /// Full custodial access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Map<String, Value>>,
}

impl PatientPermissions {
    /// View-only permission set.
    pub fn view_only() -> Self {
        Self {
            view: Some(Map::new()),
            ..Default::default()
        }
    }
}

/// A patient record within a clinic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Store-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning clinic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    /// Platform user backing this patient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PatientPermissions>,
    #[serde(default)]
    pub is_migrated: bool,
    #[serde(
        default,
        with = "crate::types::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "crate::types::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_time: Option<DateTime<Utc>>,
}

impl Patient {
    /// Creates a patient backed by an existing platform user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Turns a template patient into the demo patient of a new clinic.
    pub fn into_demo(mut self, demo_user_id: &str) -> Self {
        self.id = None;
        self.clinic_id = None;
        self.user_id = Some(demo_user_id.to_string());
        self.is_migrated = true;
        self.permissions = Some(PatientPermissions::view_only());
        self
    }
}

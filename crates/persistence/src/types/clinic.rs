//! Clinic documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A clinic phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Free-form label such as `"Main"` or `"Fax"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    /// The number as entered.
    pub number: String,
}

/// A clinic and its admin roster.
///
/// `admins` mirrors the user ids of every clinician of this clinic that holds
/// the admin role. It is only mutated inside a transaction together with the
/// clinician document that causes the change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    /// Store-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State or province.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Clinic type, e.g. `"provider_practice"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_type: Option<String>,
    /// Clinic size bucket, e.g. `"0-249"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_size: Option<String>,
    /// Website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Phone numbers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumber>,
    /// The share code patients currently use to find this clinic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_share_code: Option<String>,
    /// Every share code ever assigned to this clinic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub share_codes: Vec<String>,
    /// User ids of the clinic's admins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<String>,
    /// Creation time.
    #[serde(
        default,
        with = "crate::types::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_time: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(
        default,
        with = "crate::types::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_time: Option<DateTime<Utc>>,
    /// Whether the clinic was created on (or migrated to) this service.
    #[serde(default)]
    pub is_migrated: bool,
}

impl Clinic {
    /// Creates a clinic template with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Adds a user to the admin set. Adding an existing admin is a no-op.
    pub fn add_admin(&mut self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        if !self.admins.contains(&user_id) {
            self.admins.push(user_id);
        }
    }

    /// Removes a user from the admin set. Removing a non-admin is a no-op.
    pub fn remove_admin(&mut self, user_id: &str) {
        self.admins.retain(|admin| admin != user_id);
    }

    /// Returns true if `user_id` is in the admin set.
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|admin| admin == user_id)
    }

    /// Assigns a fresh share code as both the canonical code and the only
    /// historical code.
    pub fn assign_share_code(&mut self, share_code: impl Into<String>) {
        let share_code = share_code.into();
        self.share_codes = vec![share_code.clone()];
        self.canonical_share_code = Some(share_code);
    }

    /// Returns the clinic id or an empty string for unsaved clinics.
    pub fn id_or_default(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Selection criteria for listing clinics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicFilter {
    /// Restrict to these clinic ids.
    pub ids: Vec<String>,
    /// Restrict to clinics that own any of these share codes.
    pub share_codes: Vec<String>,
    /// Restrict to clinics where this user is an admin.
    pub admin_user_id: Option<String>,
}

impl ClinicFilter {
    /// Filter matching clinics that own any of `codes`.
    pub fn by_share_codes(codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            share_codes: codes.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Returns true if `clinic` satisfies every populated criterion.
    pub fn matches(&self, clinic: &Clinic) -> bool {
        if !self.ids.is_empty()
            && !clinic
                .id
                .as_ref()
                .is_some_and(|id| self.ids.contains(id))
        {
            return false;
        }
        if !self.share_codes.is_empty()
            && !clinic
                .share_codes
                .iter()
                .any(|code| self.share_codes.contains(code))
        {
            return false;
        }
        if let Some(admin) = &self.admin_user_id {
            if !clinic.is_admin(admin) {
                return false;
            }
        }
        true
    }
}

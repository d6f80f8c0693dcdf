//! Clinician documents and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag granting clinic administration rights.
pub const ROLE_CLINIC_ADMIN: &str = "CLINIC_ADMIN";

/// Role tag for regular clinic members.
pub const ROLE_CLINIC_MEMBER: &str = "CLINIC_MEMBER";

/// A clinician's membership in a clinic.
///
/// A clinician created from an invite has an `invite_id` and no `user_id`
/// until the invite is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinician {
    /// Store-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning clinic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    /// Bound platform user, absent for pending invites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Pending invite, cleared once accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
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
}

impl Clinician {
    /// Creates a clinician bound to a user.
    pub fn new(clinic_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            clinic_id: Some(clinic_id.into()),
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Creates a pending invite.
    pub fn invite(clinic_id: impl Into<String>, invite_id: impl Into<String>) -> Self {
        Self {
            clinic_id: Some(clinic_id.into()),
            invite_id: Some(invite_id.into()),
            ..Default::default()
        }
    }

    /// Replaces the role tags.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the clinician holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ROLE_CLINIC_ADMIN)
    }

    /// Applies the populated fields of `update` to this clinician.
    ///
    /// Identity fields (id and clinic) are never overwritten. Roles are
    /// always replaced, so an empty role list revokes every role.
    pub fn merge(&mut self, update: Clinician) {
        if update.user_id.is_some() {
            self.user_id = update.user_id;
        }
        if update.invite_id.is_some() {
            self.invite_id = update.invite_id;
        }
        if update.email.is_some() {
            self.email = update.email;
        }
        if update.name.is_some() {
            self.name = update.name;
        }
        self.roles = update.roles;
        if update.updated_time.is_some() {
            self.updated_time = update.updated_time;
        }
    }

    /// Strips the fields an update may not change.
    pub fn into_update(mut self) -> Self {
        self.id = None;
        self.clinic_id = None;
        self.created_time = None;
        self
    }
}

//! Directory records for platform users.

use serde::{Deserialize, Serialize};

/// A platform user as returned by the user directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Directory identifier of the user.
    pub user_id: String,
    /// Login name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email addresses, primary first.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Platform roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whether the primary email was verified.
    #[serde(default)]
    pub email_verified: bool,
}

impl User {
    /// Creates a user with a single email address.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            emails: vec![email.into()],
            ..Default::default()
        }
    }

    /// Returns the primary email address, if any.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

/// Profile data kept alongside a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Date of birth (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    /// Medical record number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
}

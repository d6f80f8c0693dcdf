//! File-backed user directory.
//!
//! The directory file is a JSON document of the form:
//!
//! ```json
//! {
//!   "users": [{ "userId": "u1", "emails": ["u1@example.com"] }],
//!   "profiles": { "u1": { "fullName": "Dana Doe" } },
//!   "patients": { "demo": { "userId": "demo", "fullName": "Demo Patient" } }
//! }
//! ```
//!
//! Every section is optional.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use clinic_persistence::core::UserDirectory;
use clinic_persistence::{OperationContext, StorageError, StorageResult};
use clinic_persistence::types::{Patient, User, UserProfile};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectoryFile {
    users: Vec<User>,
    profiles: HashMap<String, UserProfile>,
    patients: HashMap<String, Patient>,
}

/// User directory answering from an in-memory snapshot.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, User>,
    profiles: HashMap<String, UserProfile>,
    patients: HashMap<String, Patient>,
}

impl StaticUserDirectory {
    /// An empty directory. Every clinic creation fails with an unknown
    /// creator until users are added.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a directory from its JSON form.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: DirectoryFile = serde_json::from_str(json)?;
        Ok(Self {
            users: file
                .users
                .into_iter()
                .map(|user| (user.user_id.clone(), user))
                .collect(),
            profiles: file.profiles,
            patients: file.patients,
        })
    }

    /// Loads a directory file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading user directory {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("parsing user directory {}", path.display()))
    }

    /// Number of known users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn get_user(&self, _ctx: &OperationContext, user_id: &str) -> StorageResult<Option<User>> {
        Ok(self.users.get(user_id).cloned())
    }

    async fn get_user_profile(
        &self,
        _ctx: &OperationContext,
        user_id: &str,
    ) -> StorageResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }

    async fn get_patient_from_existing_user(
        &self,
        _ctx: &OperationContext,
        user_id: &str,
    ) -> StorageResult<Patient> {
        self.patients
            .get(user_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("Patient", user_id))
    }
}

//! Test fixtures for persistence layer testing.
//!
//! This module provides a scripted user directory, a scripted share code
//! generator, and builders for the documents the tests store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use clinic_persistence::OperationContext;
use clinic_persistence::core::UserDirectory;
use clinic_persistence::error::{StorageError, StorageResult};
use clinic_persistence::sharecode::{RandomShareCodeGenerator, ShareCodeGenerator};
use clinic_persistence::summary::{BgmPeriod, CgmPeriod, EmbeddedPatient, Summary};
use clinic_persistence::types::{Patient, User, UserProfile};

/// Id of the user whose data seeds demo patients.
pub const DEMO_USER_ID: &str = "demo-user";

/// Id of the default clinic creator.
pub const CREATOR_ID: &str = "creator-1";

/// In-memory [`UserDirectory`] answering from fixed maps.
#[derive(Debug, Default)]
pub struct StubUserDirectory {
    users: HashMap<String, User>,
    profiles: HashMap<String, UserProfile>,
    patients: HashMap<String, Patient>,
}

impl StubUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with an email and a full name.
    pub fn with_user(mut self, user_id: &str, email: &str, full_name: &str) -> Self {
        self.users
            .insert(user_id.to_string(), User::new(user_id, email));
        self.profiles.insert(
            user_id.to_string(),
            UserProfile {
                full_name: Some(full_name.to_string()),
                ..Default::default()
            },
        );
        self
    }

    /// Registers a user without any email address.
    pub fn with_user_without_email(mut self, user_id: &str) -> Self {
        self.users.insert(
            user_id.to_string(),
            User {
                user_id: user_id.to_string(),
                ..Default::default()
            },
        );
        self
    }

    /// Registers the patient record returned for `user_id`.
    pub fn with_patient(mut self, user_id: &str, patient: Patient) -> Self {
        self.patients.insert(user_id.to_string(), patient);
        self
    }
}

#[async_trait]
impl UserDirectory for StubUserDirectory {
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

/// Share code generator replaying scripted codes.
///
/// Once the script runs out it either repeats its last code forever or falls
/// back to random codes.
#[derive(Debug)]
pub struct ScriptedShareCodeGenerator {
    script: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedShareCodeGenerator {
    /// Replays `codes`, then generates random codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(codes.into_iter().map(Into::into).collect()),
            repeat: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns `code` on every call.
    pub fn repeating(code: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Appends codes to the script.
    pub fn push<I, S>(&self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .unwrap()
            .extend(codes.into_iter().map(Into::into));
    }

    /// Number of codes handed out so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShareCodeGenerator for ScriptedShareCodeGenerator {
    fn generate(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.script.lock().unwrap().pop_front() {
            return code;
        }
        match &self.repeat {
            Some(code) => code.clone(),
            None => RandomShareCodeGenerator::new().generate(),
        }
    }
}

/// Patient record used as the demo patient template.
pub fn demo_patient_template() -> Patient {
    Patient {
        id: Some("template-id".to_string()),
        clinic_id: Some("template-clinic".to_string()),
        user_id: Some(DEMO_USER_ID.to_string()),
        full_name: Some("Demo Patient".to_string()),
        birth_date: Some("1990-04-12".to_string()),
        mrn: Some("DEMO-001".to_string()),
        ..Default::default()
    }
}

/// A CGM summary of `user_id` listed under `clinic_id` as `full_name`.
pub fn cgm_summary(user_id: &str, clinic_id: &str, full_name: &str) -> Summary<CgmPeriod> {
    Summary::new(user_id).with_patient(
        EmbeddedPatient::new(clinic_id)
            .with_full_name(full_name)
            .with_email(format!("{user_id}@example.com")),
    )
}

/// A BGM summary of `user_id` listed under `clinic_id` as `full_name`.
pub fn bgm_summary(user_id: &str, clinic_id: &str, full_name: &str) -> Summary<BgmPeriod> {
    Summary::new(user_id).with_patient(EmbeddedPatient::new(clinic_id).with_full_name(full_name))
}

/// CGM statistics with the given time-in-low percentage.
pub fn cgm_stats_with_low(percent: Option<f64>) -> CgmPeriod {
    CgmPeriod {
        has_time_in_low_percent: percent.is_some(),
        time_in_low_percent: percent,
        ..Default::default()
    }
}

//! Test harness wiring the services to an in-memory backend.

use std::sync::Arc;

use futures::FutureExt;

use clinic_persistence::OperationContext;
use clinic_persistence::backends::memory::MemoryBackend;
use clinic_persistence::core::{PatientRepository, TransactionOptions, TransactionProvider};
use clinic_persistence::services::{ClinicManagerConfig, ClinicServices, CreateClinic};
use clinic_persistence::types::{Clinic, Patient};

use super::fixtures::{
    CREATOR_ID, DEMO_USER_ID, ScriptedShareCodeGenerator, StubUserDirectory,
    demo_patient_template,
};

/// An initialized set of services over a fresh in-memory backend.
pub struct TestContext {
    /// The backend, for inspecting stored documents.
    pub backend: Arc<MemoryBackend>,
    /// The services under test.
    pub services: Arc<ClinicServices<MemoryBackend>>,
    /// The share code source the services draw from.
    pub share_codes: Arc<ScriptedShareCodeGenerator>,
    /// Context passed to every call.
    pub ctx: OperationContext,
}

impl TestContext {
    /// Services with the default directory, random share codes and demo
    /// patients enabled.
    pub async fn new() -> Self {
        Self::with_share_codes(ScriptedShareCodeGenerator::new(Vec::<String>::new())).await
    }

    /// Like [`TestContext::new`] with a scripted share code generator.
    pub async fn with_share_codes(share_codes: ScriptedShareCodeGenerator) -> Self {
        let config = ClinicManagerConfig::default().with_demo_patient_user_id(DEMO_USER_ID);
        Self::build(default_directory(), share_codes, config).await
    }

    /// Fully custom services.
    pub async fn build(
        directory: StubUserDirectory,
        share_codes: ScriptedShareCodeGenerator,
        config: ClinicManagerConfig,
    ) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let share_codes = Arc::new(share_codes);
        let services = ClinicServices::new(
            Arc::clone(&backend),
            Arc::new(directory),
            share_codes.clone(),
            config,
        );

        let ctx = OperationContext::new().with_correlation_id("test");
        services
            .initialize(&ctx)
            .await
            .expect("Failed to initialize services");

        Self {
            backend,
            services: Arc::new(services),
            share_codes,
            ctx,
        }
    }

    /// Creates a clinic owned by [`CREATOR_ID`] and returns its id.
    pub async fn create_clinic(&self, name: &str) -> String {
        self.services
            .clinics()
            .create_clinic(&self.ctx, CreateClinic::new(Clinic::new(name), CREATOR_ID))
            .await
            .expect("Failed to create clinic")
            .id
            .expect("Created clinic has no id")
    }

    /// Reads a clinic straight from the backend.
    pub async fn clinic(&self, clinic_id: &str) -> Option<Clinic> {
        self.backend
            .clinics()
            .await
            .into_iter()
            .find(|clinic| clinic.id.as_deref() == Some(clinic_id))
    }

    /// Inserts a patient bound to `user_id` into a clinic.
    pub async fn add_patient(&self, clinic_id: &str, user_id: &str) {
        let mut patient = Patient::for_user(user_id);
        patient.clinic_id = Some(clinic_id.to_string());
        self.backend
            .with_transaction(&self.ctx, TransactionOptions::new(), move |tx| {
                let patient = patient.clone();
                async move { tx.create_patient(patient).await.map(|_| ()) }.boxed()
            })
            .await
            .expect("Failed to add patient");
    }
}

/// Directory knowing the default creator, a second user and the demo patient.
pub fn default_directory() -> StubUserDirectory {
    StubUserDirectory::new()
        .with_user(CREATOR_ID, "creator@example.com", "Casey Creator")
        .with_user("member-1", "member@example.com", "Morgan Member")
        .with_patient(DEMO_USER_ID, demo_patient_template())
}

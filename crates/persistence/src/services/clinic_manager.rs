//! Clinic creation and deletion.

use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info};

use crate::context::OperationContext;
use crate::core::{
    ClinicRepository, ClinicianRepository, DeletionStore, PatientRepository, TransactionOptions,
    TransactionProvider, UserDirectory,
};
use crate::deletions::{DeletionLog, DeletionMetadata};
use crate::error::{StorageError, StorageResult, TransactionError, ValidationError};
use crate::sharecode::ShareCodeGenerator;
use crate::types::{Clinic, Clinician, Patient, ROLE_CLINIC_ADMIN};

/// Number of share codes tried before clinic creation gives up.
pub const SHARE_CODE_RETRY_ATTEMPTS: usize = 100;

/// Settings of [`ClinicManager`], resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicManagerConfig {
    /// User whose data is copied into every new clinic as a demo patient.
    /// `None` disables demo patients.
    pub demo_patient_user_id: Option<String>,
}

impl ClinicManagerConfig {
    /// Sets the demo patient template user. Empty ids disable the feature.
    pub fn with_demo_patient_user_id(mut self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        self.demo_patient_user_id = (!user_id.is_empty()).then_some(user_id);
        self
    }
}

/// A request to create a clinic.
#[derive(Debug, Clone, Default)]
pub struct CreateClinic {
    /// Profile of the new clinic. Share codes and admins are assigned.
    pub clinic: Clinic,
    /// User creating the clinic; becomes its first admin clinician.
    pub creator_user_id: String,
    /// Whether to add the configured demo patient.
    pub create_demo_patient: bool,
}

impl CreateClinic {
    /// Creates a request without a demo patient.
    pub fn new(clinic: Clinic, creator_user_id: impl Into<String>) -> Self {
        Self {
            clinic,
            creator_user_id: creator_user_id.into(),
            create_demo_patient: false,
        }
    }

    /// Requests the demo patient.
    pub fn with_demo_patient(mut self) -> Self {
        self.create_demo_patient = true;
        self
    }
}

/// Creates and deletes clinics together with their dependent documents.
pub struct ClinicManager<P> {
    provider: Arc<P>,
    directory: Arc<dyn UserDirectory>,
    share_codes: Arc<dyn ShareCodeGenerator>,
    clinic_deletions: DeletionLog<Clinic>,
    clinician_deletions: DeletionLog<Clinician>,
    patient_deletions: DeletionLog<Patient>,
    config: ClinicManagerConfig,
}

impl<P> std::fmt::Debug for ClinicManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Audit logs of the entities removed with a clinic.
pub fn clinic_deletion_log(store: Arc<dyn DeletionStore>) -> DeletionLog<Clinic> {
    DeletionLog::new(store, "clinic", ["_id"])
}

/// See [`clinic_deletion_log`].
pub fn clinician_deletion_log(store: Arc<dyn DeletionStore>) -> DeletionLog<Clinician> {
    DeletionLog::new(store, "clinician", ["clinicId", "userId"])
}

/// See [`clinic_deletion_log`].
pub fn patient_deletion_log(store: Arc<dyn DeletionStore>) -> DeletionLog<Patient> {
    DeletionLog::new(store, "patient", ["clinicId", "userId"])
}

impl<P: TransactionProvider> ClinicManager<P> {
    /// Creates the manager.
    pub fn new(
        provider: Arc<P>,
        deletion_store: Arc<dyn DeletionStore>,
        directory: Arc<dyn UserDirectory>,
        share_codes: Arc<dyn ShareCodeGenerator>,
        config: ClinicManagerConfig,
    ) -> Self {
        Self {
            provider,
            directory,
            share_codes,
            clinic_deletions: clinic_deletion_log(Arc::clone(&deletion_store)),
            clinician_deletions: clinician_deletion_log(Arc::clone(&deletion_store)),
            patient_deletions: patient_deletion_log(deletion_store),
            config,
        }
    }

    /// Provisions the indexes of the deletion logs this manager writes.
    pub async fn initialize(&self, ctx: &OperationContext) -> StorageResult<()> {
        self.clinic_deletions.initialize(ctx).await?;
        self.clinician_deletions.initialize(ctx).await?;
        self.patient_deletions.initialize(ctx).await
    }

    async fn demo_patient(&self, ctx: &OperationContext) -> StorageResult<Option<Patient>> {
        let Some(demo_user_id) = self.config.demo_patient_user_id.as_deref() else {
            return Ok(None);
        };
        let template = self
            .directory
            .get_patient_from_existing_user(ctx, demo_user_id)
            .await?;
        Ok(Some(template.into_demo(demo_user_id)))
    }

    /// Creates a clinic with a unique share code, its admin clinician and,
    /// optionally, the demo patient, all in one transaction.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - the creator is not a known user
    /// * `ValidationError::MissingRequiredField` - the creator has no email
    /// * `TransactionError::ShareCodeRetriesExhausted` - every generated share
    ///   code was taken
    /// * any directory or store error, unchanged
    pub async fn create_clinic(
        &self,
        ctx: &OperationContext,
        create: CreateClinic,
    ) -> StorageResult<Clinic> {
        let CreateClinic {
            mut clinic,
            creator_user_id,
            create_demo_patient,
        } = create;

        let user = self
            .directory
            .get_user(ctx, &creator_user_id)
            .await?
            .ok_or_else(|| StorageError::not_found("User", &creator_user_id))?;
        let profile = self
            .directory
            .get_user_profile(ctx, &creator_user_id)
            .await?;
        let email = user
            .primary_email()
            .map(str::to_string)
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "email".to_string(),
            })?;

        let demo_patient = if create_demo_patient {
            self.demo_patient(ctx).await?
        } else {
            None
        };

        clinic.add_admin(creator_user_id.clone());
        clinic.is_migrated = true;

        let share_codes = Arc::clone(&self.share_codes);
        let created = self
            .provider
            .with_transaction(ctx, TransactionOptions::new(), move |tx| {
                let share_codes = Arc::clone(&share_codes);
                let clinic = clinic.clone();
                let creator_user_id = creator_user_id.clone();
                let email = email.clone();
                let profile = profile.clone();
                let demo_patient = demo_patient.clone();
                async move {
                    let created = insert_with_unique_share_code(tx, share_codes.as_ref(), clinic)
                        .await?;
                    let clinic_id = created.id.clone().unwrap_or_default();

                    let mut clinician = Clinician::new(clinic_id.clone(), creator_user_id)
                        .with_roles([ROLE_CLINIC_ADMIN])
                        .with_email(email);
                    clinician.name = profile.and_then(|profile| profile.full_name);
                    tx.create_clinician(clinician).await?;

                    if let Some(mut patient) = demo_patient {
                        patient.clinic_id = Some(clinic_id);
                        tx.create_patient(patient).await?;
                    }

                    Ok(created)
                }
                .boxed()
            })
            .await?;

        info!(
            clinic_id = created.id_or_default(),
            share_code = created.canonical_share_code.as_deref().unwrap_or_default(),
            "Clinic created"
        );
        Ok(created)
    }

    /// Deletes a clinic with its clinicians and patients, recording each
    /// removed document in the deletion logs within the same transaction.
    ///
    /// Only clinics without patients, or whose sole patient is the demo
    /// patient, can be deleted.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no such clinic
    /// * `ValidationError::ConstraintViolation` - the clinic still has patients
    pub async fn delete_clinic(
        &self,
        ctx: &OperationContext,
        clinic_id: &str,
        metadata: DeletionMetadata,
    ) -> StorageResult<()> {
        let clinic_id = clinic_id.to_string();
        let demo_user_id = self.config.demo_patient_user_id.clone();
        let clinic_log = self.clinic_deletions.clone();
        let clinician_log = self.clinician_deletions.clone();
        let patient_log = self.patient_deletions.clone();

        self.provider
            .with_transaction(ctx, TransactionOptions::new(), move |tx| {
                let clinic_id = clinic_id.clone();
                let demo_user_id = demo_user_id.clone();
                let metadata = metadata.clone();
                let clinic_log = clinic_log.clone();
                let clinician_log = clinician_log.clone();
                let patient_log = patient_log.clone();
                async move {
                    tx.get_clinic(&clinic_id).await?;

                    let patients = tx.list_patients(&clinic_id, 2).await?;
                    if !allows_deletion(&patients, demo_user_id.as_deref()) {
                        return Err(ValidationError::ConstraintViolation {
                            message: "deletion of non-empty clinics is not allowed".to_string(),
                        }
                        .into());
                    }

                    let patients = tx.delete_patients(&clinic_id).await?;
                    patient_log
                        .create_many_in(&mut *tx, &patients, &metadata)
                        .await?;

                    let clinicians = tx.delete_clinicians(&clinic_id).await?;
                    clinician_log
                        .create_many_in(&mut *tx, &clinicians, &metadata)
                        .await?;

                    let clinic = tx.delete_clinic(&clinic_id).await?;
                    clinic_log.create_in(&mut *tx, &clinic, &metadata).await?;

                    info!(
                        clinic_id = %clinic_id,
                        patients = patients.len(),
                        clinicians = clinicians.len(),
                        "Clinic deleted"
                    );
                    Ok(())
                }
                .boxed()
            })
            .await
    }
}

/// Inserts `clinic` under freshly generated share codes until one is free.
async fn insert_with_unique_share_code<T>(
    tx: &mut T,
    share_codes: &dyn ShareCodeGenerator,
    clinic: Clinic,
) -> StorageResult<Clinic>
where
    T: ClinicRepository + ?Sized,
{
    for attempt in 1..=SHARE_CODE_RETRY_ATTEMPTS {
        let share_code = share_codes.generate();
        let mut candidate = clinic.clone();
        candidate.assign_share_code(share_code.as_str());

        match tx.create_clinic(candidate).await {
            Ok(created) => return Ok(created),
            Err(err) if err.is_duplicate_share_code() => {
                debug!(attempt, share_code = %share_code, "Share code taken, retrying");
            }
            Err(err) => return Err(err),
        }
    }

    Err(TransactionError::ShareCodeRetriesExhausted {
        attempts: SHARE_CODE_RETRY_ATTEMPTS,
    }
    .into())
}

fn allows_deletion(patients: &[Patient], demo_user_id: Option<&str>) -> bool {
    match patients {
        [] => true,
        [only] => demo_user_id.is_some() && only.user_id.as_deref() == demo_user_id,
        _ => false,
    }
}

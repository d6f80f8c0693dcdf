//! Keeps clinic admin sets in step with clinician roles.

use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::context::OperationContext;
use crate::core::{ClinicRepository, ClinicianRepository, TransactionOptions, TransactionProvider};
use crate::error::{StorageResult, ValidationError};
use crate::types::Clinician;

/// Applies clinician changes together with the matching admin set change.
///
/// A clinic's `admins` always equals the user ids of its clinicians holding
/// the admin role. Every method here writes the clinician and the admin set
/// in one transaction, so a failure leaves both untouched.
#[derive(Debug)]
pub struct ClinicianRoleSync<P> {
    provider: Arc<P>,
}

impl<P> Clone for ClinicianRoleSync<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

/// Adds or removes `user_id` from the admin set according to `clinician`.
async fn mirror_admin<T>(
    tx: &mut T,
    clinic_id: &str,
    user_id: &str,
    clinician: &Clinician,
) -> StorageResult<()>
where
    T: ClinicRepository + ?Sized,
{
    if clinician.is_admin() {
        tx.upsert_admin(clinic_id, user_id).await
    } else {
        tx.remove_admin(clinic_id, user_id).await
    }
}

impl<P: TransactionProvider> ClinicianRoleSync<P> {
    /// Creates the service.
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Inserts a clinician and, when it is bound to a user, mirrors its
    /// admin state onto the clinic.
    ///
    /// # Errors
    ///
    /// * `ValidationError::MissingRequiredField` - no clinic id
    /// * `ResourceError::AlreadyExists` - duplicate user, invite or email
    /// * `ResourceError::NotFound` - the clinic does not exist
    pub async fn create(
        &self,
        ctx: &OperationContext,
        clinician: Clinician,
    ) -> StorageResult<Clinician> {
        let Some(clinic_id) = clinician.clinic_id.clone() else {
            return Err(ValidationError::MissingRequiredField {
                field: "clinicId".to_string(),
            }
            .into());
        };

        self.provider
            .with_transaction(ctx, TransactionOptions::new(), move |tx| {
                let clinic_id = clinic_id.clone();
                let clinician = clinician.clone();
                async move {
                    let created = tx.create_clinician(clinician).await?;
                    if let Some(user_id) = created.user_id.clone() {
                        mirror_admin(tx, &clinic_id, &user_id, &created).await?;
                    }
                    Ok(created)
                }
                .boxed()
            })
            .await
    }

    /// Persists `new_state` for the clinician bound to `clinician_id` and
    /// adds or removes that user from the clinic's admins.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - the clinic or the clinician does not exist
    pub async fn update(
        &self,
        ctx: &OperationContext,
        clinic_id: &str,
        clinician_id: &str,
        new_state: Clinician,
    ) -> StorageResult<Clinician> {
        let clinic_id = clinic_id.to_string();
        let clinician_id = clinician_id.to_string();
        debug!(
            clinic_id = %clinic_id,
            clinician_id = %clinician_id,
            admin = new_state.is_admin(),
            "Updating clinician"
        );

        self.provider
            .with_transaction(ctx, TransactionOptions::new(), move |tx| {
                let clinic_id = clinic_id.clone();
                let clinician_id = clinician_id.clone();
                let new_state = new_state.clone();
                async move {
                    mirror_admin(tx, &clinic_id, &clinician_id, &new_state).await?;
                    tx.update_clinician(&clinic_id, &clinician_id, new_state)
                        .await
                }
                .boxed()
            })
            .await
    }

    /// Binds a pending invite to `user_id` and mirrors the resulting admin
    /// state.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no such invite, or no such clinic
    /// * `ResourceError::AlreadyExists` - the user already belongs to the clinic
    pub async fn associate_invite(
        &self,
        ctx: &OperationContext,
        clinic_id: &str,
        invite_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        let clinic_id = clinic_id.to_string();
        let invite_id = invite_id.to_string();
        let user_id = user_id.to_string();

        self.provider
            .with_transaction(ctx, TransactionOptions::new(), move |tx| {
                let clinic_id = clinic_id.clone();
                let invite_id = invite_id.clone();
                let user_id = user_id.clone();
                async move {
                    let clinician = tx.resolve_invite(&clinic_id, &invite_id, &user_id).await?;
                    let bound_user = clinician.user_id.clone().unwrap_or(user_id);
                    mirror_admin(tx, &clinic_id, &bound_user, &clinician).await?;
                    Ok(clinician)
                }
                .boxed()
            })
            .await
    }
}

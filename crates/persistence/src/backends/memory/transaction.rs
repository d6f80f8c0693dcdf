//! Transaction support for the in-memory backend.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! private copy of the state. Commit swaps the copy in; rollback or drop
//! discards it. Transactions are therefore fully serialized.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use crate::core::{
    ClinicRepository, ClinicianRepository, DeletionSink, PatientRepository, Transaction,
    TransactionOptions,
};
use crate::error::{StorageResult, TransactionError};
use crate::types::{Clinic, ClinicFilter, Clinician, Pagination, Patient};

use super::state::MemoryState;

/// An in-memory transaction.
pub struct MemoryTransaction {
    /// The store lock. `None` once committed or rolled back.
    guard: Option<OwnedMutexGuard<MemoryState>>,
    /// Uncommitted working copy.
    working: MemoryState,
    options: TransactionOptions,
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("active", &self.guard.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl MemoryTransaction {
    pub(crate) fn new(guard: OwnedMutexGuard<MemoryState>, options: TransactionOptions) -> Self {
        let working = (*guard).clone();
        Self {
            guard: Some(guard),
            working,
            options,
        }
    }

    fn state(&mut self) -> StorageResult<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(TransactionError::InvalidTransaction.into());
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl ClinicRepository for MemoryTransaction {
    async fn create_clinic(&mut self, clinic: Clinic) -> StorageResult<Clinic> {
        self.state()?.insert_clinic(clinic)
    }

    async fn get_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic> {
        self.state()?.clinic(clinic_id).cloned()
    }

    async fn list_clinics(
        &mut self,
        filter: &ClinicFilter,
        pagination: Pagination,
    ) -> StorageResult<Vec<Clinic>> {
        pagination.validate()?;
        Ok(self.state()?.list_clinics(filter, pagination))
    }

    async fn upsert_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        self.state()?.upsert_admin(clinic_id, user_id)
    }

    async fn remove_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        self.state()?.remove_admin(clinic_id, user_id)
    }

    async fn delete_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic> {
        self.state()?.delete_clinic(clinic_id)
    }
}

#[async_trait]
impl ClinicianRepository for MemoryTransaction {
    async fn create_clinician(&mut self, clinician: Clinician) -> StorageResult<Clinician> {
        self.state()?.insert_clinician(clinician)
    }

    async fn get_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        self.state()?.clinician(clinic_id, user_id)
    }

    async fn update_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
        clinician: Clinician,
    ) -> StorageResult<Clinician> {
        self.state()?.update_clinician(clinic_id, user_id, clinician)
    }

    async fn resolve_invite(
        &mut self,
        clinic_id: &str,
        invite_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        self.state()?.resolve_invite(clinic_id, invite_id, user_id)
    }

    async fn delete_clinicians(&mut self, clinic_id: &str) -> StorageResult<Vec<Clinician>> {
        Ok(self.state()?.delete_clinicians(clinic_id))
    }
}

#[async_trait]
impl PatientRepository for MemoryTransaction {
    async fn create_patient(&mut self, patient: Patient) -> StorageResult<Patient> {
        self.state()?.insert_patient(patient)
    }

    async fn list_patients(&mut self, clinic_id: &str, limit: u32) -> StorageResult<Vec<Patient>> {
        Ok(self.state()?.list_patients(clinic_id, limit))
    }

    async fn delete_patients(&mut self, clinic_id: &str) -> StorageResult<Vec<Patient>> {
        Ok(self.state()?.delete_patients(clinic_id))
    }
}

#[async_trait]
impl DeletionSink for MemoryTransaction {
    async fn insert_deletions(
        &mut self,
        collection: &str,
        documents: Vec<Value>,
    ) -> StorageResult<()> {
        self.state()?.insert_deletions(collection, documents);
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn try_commit(&mut self) -> StorageResult<()> {
        let Some(mut guard) = self.guard.take() else {
            return Err(TransactionError::InvalidTransaction.into());
        };
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.try_commit().await
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        if self.guard.take().is_none() {
            return Err(TransactionError::InvalidTransaction.into());
        }
        Ok(())
    }

    fn options(&self) -> TransactionOptions {
        self.options
    }

    fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}

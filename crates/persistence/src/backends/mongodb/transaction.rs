//! Transaction support for the MongoDB backend.

use async_trait::async_trait;
use mongodb::bson::{Document, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{ClientSession, Collection, Database};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::core::{
    ClinicRepository, ClinicianRepository, DeletionSink, PatientRepository, Transaction,
    TransactionOptions,
};
use crate::error::{ResourceError, StorageError, StorageResult, TransactionError};
use crate::types::{Clinic, ClinicFilter, Clinician, Pagination, Patient, timestamp};

use super::backend::{CLINICIANS_COLLECTION, CLINICS_COLLECTION, PATIENTS_COLLECTION};
use super::convert::{is_duplicate_key, operation_failed, to_document};

/// A MongoDB transaction bound to one client session.
///
/// Dropping an uncommitted transaction ends the session, and the server
/// aborts the transaction.
pub struct MongoTransaction {
    session: ClientSession,
    database: Database,
    active: bool,
    options: TransactionOptions,
}

impl std::fmt::Debug for MongoTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoTransaction")
            .field("active", &self.active)
            .field("options", &self.options)
            .finish()
    }
}

fn generate_id() -> String {
    ObjectId::new().to_hex()
}

fn serialize_update<T: Serialize>(value: &T) -> StorageResult<Document> {
    let value = serde_json::to_value(value)?;
    to_document(&value)
}

/// `$set` document replacing a clinician's mutable fields.
fn clinician_update(clinician: Clinician) -> StorageResult<Document> {
    let mut update = clinician.into_update();
    update.updated_time = Some(timestamp::now());
    let mut set = serialize_update(&update)?;
    // Empty role lists are skipped by serde but must still be written.
    set.insert("roles", update.roles);
    Ok(set)
}

fn clinic_filter(filter: &ClinicFilter) -> Document {
    let mut query = Document::new();
    if !filter.ids.is_empty() {
        query.insert("_id", doc! { "$in": filter.ids.clone() });
    }
    if !filter.share_codes.is_empty() {
        query.insert("shareCodes", doc! { "$in": filter.share_codes.clone() });
    }
    if let Some(admin) = &filter.admin_user_id {
        query.insert("admins", admin.as_str());
    }
    query
}

impl MongoTransaction {
    pub(crate) fn new(
        session: ClientSession,
        database: Database,
        options: TransactionOptions,
    ) -> Self {
        Self {
            session,
            database,
            active: true,
            options,
        }
    }

    fn ensure_active(&self) -> StorageResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(TransactionError::InvalidTransaction.into())
        }
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection(name)
    }

    async fn find_all<T>(&mut self, name: &str, filter: Document, limit: Option<i64>) -> StorageResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<T>(name);
        let mut find = collection.find(filter).sort(doc! { "_id": 1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let mut cursor = find
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find", name, e))?;

        let mut found = Vec::new();
        while let Some(item) = cursor.next(&mut self.session).await {
            found.push(item.map_err(|e| operation_failed("find", name, e))?);
        }
        Ok(found)
    }

    async fn find_and_update<T>(
        &mut self,
        name: &str,
        filter: Document,
        update: Document,
    ) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.collection::<T>(name)
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find_one_and_update", name, e))
    }

    async fn count(&mut self, name: &str, filter: Document) -> StorageResult<u64> {
        self.collection::<Document>(name)
            .count_documents(filter)
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("count_documents", name, e))
    }
}

#[async_trait]
impl ClinicRepository for MongoTransaction {
    async fn create_clinic(&mut self, mut clinic: Clinic) -> StorageResult<Clinic> {
        self.ensure_active()?;

        let codes: Vec<String> = clinic
            .share_codes
            .iter()
            .chain(clinic.canonical_share_code.iter())
            .cloned()
            .collect();
        let duplicate_code = || {
            StorageError::from(ResourceError::DuplicateShareCode {
                share_code: codes.first().cloned().unwrap_or_default(),
            })
        };

        // A duplicate key error would abort the whole server-side transaction,
        // so collisions are detected before the insert.
        let taken = self
            .count(
                CLINICS_COLLECTION,
                doc! {
                    "$or": [
                        { "shareCodes": { "$in": codes.clone() } },
                        { "canonicalShareCode": { "$in": codes.clone() } },
                    ]
                },
            )
            .await?;
        if taken > 0 {
            return Err(duplicate_code());
        }

        let now = timestamp::now();
        clinic.id = Some(clinic.id.take().unwrap_or_else(generate_id));
        clinic.created_time = Some(now);
        clinic.updated_time = Some(now);

        let result = self
            .collection::<Clinic>(CLINICS_COLLECTION)
            .insert_one(&clinic)
            .session(&mut self.session)
            .await;
        match result {
            Ok(_) => Ok(clinic),
            Err(e) if is_duplicate_key(&e) => Err(duplicate_code()),
            Err(e) => Err(operation_failed("insert_one", CLINICS_COLLECTION, e)),
        }
    }

    async fn get_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic> {
        self.ensure_active()?;
        self.collection::<Clinic>(CLINICS_COLLECTION)
            .find_one(doc! { "_id": clinic_id })
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find_one", CLINICS_COLLECTION, e))?
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    async fn list_clinics(
        &mut self,
        filter: &ClinicFilter,
        pagination: Pagination,
    ) -> StorageResult<Vec<Clinic>> {
        self.ensure_active()?;
        pagination.validate()?;

        let collection = self.collection::<Clinic>(CLINICS_COLLECTION);
        let mut cursor = collection
            .find(clinic_filter(filter))
            .sort(doc! { "_id": 1 })
            .skip(u64::from(pagination.offset))
            .limit(i64::from(pagination.limit))
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find", CLINICS_COLLECTION, e))?;

        let mut clinics = Vec::new();
        while let Some(clinic) = cursor.next(&mut self.session).await {
            clinics.push(clinic.map_err(|e| operation_failed("find", CLINICS_COLLECTION, e))?);
        }
        Ok(clinics)
    }

    async fn upsert_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        self.ensure_active()?;
        let updated: Option<Clinic> = self
            .find_and_update(
                CLINICS_COLLECTION,
                doc! { "_id": clinic_id },
                doc! {
                    "$addToSet": { "admins": user_id },
                    "$set": { "updatedTime": timestamp::format(&timestamp::now()) },
                },
            )
            .await?;
        updated
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    async fn remove_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        self.ensure_active()?;
        let updated: Option<Clinic> = self
            .find_and_update(
                CLINICS_COLLECTION,
                doc! { "_id": clinic_id },
                doc! {
                    "$pull": { "admins": user_id },
                    "$set": { "updatedTime": timestamp::format(&timestamp::now()) },
                },
            )
            .await?;
        updated
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    async fn delete_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic> {
        self.ensure_active()?;
        self.collection::<Clinic>(CLINICS_COLLECTION)
            .find_one_and_delete(doc! { "_id": clinic_id })
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find_one_and_delete", CLINICS_COLLECTION, e))?
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }
}

#[async_trait]
impl ClinicianRepository for MongoTransaction {
    async fn create_clinician(&mut self, mut clinician: Clinician) -> StorageResult<Clinician> {
        self.ensure_active()?;
        let clinic_id = clinician.clinic_id.clone().unwrap_or_default();

        let mut alternatives = Vec::new();
        for (field, value) in [
            ("userId", &clinician.user_id),
            ("inviteId", &clinician.invite_id),
            ("email", &clinician.email),
        ] {
            if let Some(value) = value {
                let mut alternative = doc! { "clinicId": clinic_id.as_str() };
                alternative.insert(field, value.as_str());
                alternatives.push(alternative);
            }
        }
        let conflict_id = clinician
            .user_id
            .clone()
            .or_else(|| clinician.invite_id.clone())
            .unwrap_or_default();
        let conflict = || {
            StorageError::from(ResourceError::AlreadyExists {
                resource_type: "Clinician".to_string(),
                id: conflict_id.clone(),
            })
        };

        if !alternatives.is_empty()
            && self
                .count(CLINICIANS_COLLECTION, doc! { "$or": alternatives })
                .await?
                > 0
        {
            return Err(conflict());
        }

        let now = timestamp::now();
        clinician.id = Some(generate_id());
        clinician.created_time = Some(now);
        clinician.updated_time = Some(now);

        let result = self
            .collection::<Clinician>(CLINICIANS_COLLECTION)
            .insert_one(&clinician)
            .session(&mut self.session)
            .await;
        match result {
            Ok(_) => Ok(clinician),
            Err(e) if is_duplicate_key(&e) => Err(conflict()),
            Err(e) => Err(operation_failed("insert_one", CLINICIANS_COLLECTION, e)),
        }
    }

    async fn get_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        self.ensure_active()?;
        self.collection::<Clinician>(CLINICIANS_COLLECTION)
            .find_one(doc! { "clinicId": clinic_id, "userId": user_id })
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("find_one", CLINICIANS_COLLECTION, e))?
            .ok_or_else(|| StorageError::not_found("Clinician", user_id))
    }

    async fn update_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
        clinician: Clinician,
    ) -> StorageResult<Clinician> {
        self.ensure_active()?;
        let set = clinician_update(clinician)?;

        self.find_and_update(
            CLINICIANS_COLLECTION,
            doc! { "clinicId": clinic_id, "userId": user_id },
            doc! { "$set": set },
        )
        .await?
        .ok_or_else(|| StorageError::not_found("Clinician", user_id))
    }

    async fn resolve_invite(
        &mut self,
        clinic_id: &str,
        invite_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        self.ensure_active()?;
        self.find_and_update(
            CLINICIANS_COLLECTION,
            doc! { "clinicId": clinic_id, "inviteId": invite_id },
            doc! {
                "$set": {
                    "userId": user_id,
                    "updatedTime": timestamp::format(&timestamp::now()),
                },
                "$unset": { "inviteId": "" },
            },
        )
        .await?
        .ok_or_else(|| StorageError::not_found("Clinician", invite_id))
    }

    async fn delete_clinicians(&mut self, clinic_id: &str) -> StorageResult<Vec<Clinician>> {
        self.ensure_active()?;
        let filter = doc! { "clinicId": clinic_id };
        let clinicians = self
            .find_all::<Clinician>(CLINICIANS_COLLECTION, filter.clone(), None)
            .await?;
        self.collection::<Document>(CLINICIANS_COLLECTION)
            .delete_many(filter)
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("delete_many", CLINICIANS_COLLECTION, e))?;
        Ok(clinicians)
    }
}

#[async_trait]
impl PatientRepository for MongoTransaction {
    async fn create_patient(&mut self, mut patient: Patient) -> StorageResult<Patient> {
        self.ensure_active()?;
        let now = timestamp::now();
        patient.id = Some(generate_id());
        patient.created_time = Some(now);
        patient.updated_time = Some(now);

        let result = self
            .collection::<Patient>(PATIENTS_COLLECTION)
            .insert_one(&patient)
            .session(&mut self.session)
            .await;
        match result {
            Ok(_) => Ok(patient),
            Err(e) if is_duplicate_key(&e) => Err(ResourceError::AlreadyExists {
                resource_type: "Patient".to_string(),
                id: patient.user_id.clone().unwrap_or_default(),
            }
            .into()),
            Err(e) => Err(operation_failed("insert_one", PATIENTS_COLLECTION, e)),
        }
    }

    async fn list_patients(&mut self, clinic_id: &str, limit: u32) -> StorageResult<Vec<Patient>> {
        self.ensure_active()?;
        self.find_all(
            PATIENTS_COLLECTION,
            doc! { "clinicId": clinic_id },
            Some(i64::from(limit)),
        )
        .await
    }

    async fn delete_patients(&mut self, clinic_id: &str) -> StorageResult<Vec<Patient>> {
        self.ensure_active()?;
        let filter = doc! { "clinicId": clinic_id };
        let patients = self
            .find_all::<Patient>(PATIENTS_COLLECTION, filter.clone(), None)
            .await?;
        self.collection::<Document>(PATIENTS_COLLECTION)
            .delete_many(filter)
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("delete_many", PATIENTS_COLLECTION, e))?;
        Ok(patients)
    }
}

#[async_trait]
impl DeletionSink for MongoTransaction {
    async fn insert_deletions(
        &mut self,
        collection: &str,
        documents: Vec<Value>,
    ) -> StorageResult<()> {
        self.ensure_active()?;
        if documents.is_empty() {
            return Ok(());
        }
        let documents = documents
            .iter()
            .map(to_document)
            .collect::<StorageResult<Vec<_>>>()?;
        self.collection::<Document>(collection)
            .insert_many(documents)
            .session(&mut self.session)
            .await
            .map_err(|e| operation_failed("insert_many", collection, e))?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for MongoTransaction {
    async fn try_commit(&mut self) -> StorageResult<()> {
        self.ensure_active()?;
        match self.session.commit_transaction().await {
            Ok(()) => {
                self.active = false;
                Ok(())
            }
            Err(e) => {
                let err = StorageError::from_transaction_label(&e).unwrap_or_else(|| {
                    StorageError::Transaction(TransactionError::RolledBack {
                        reason: format!("commit failed: {e}"),
                    })
                });
                // Only an unknown outcome leaves the transaction open for
                // another commit attempt.
                if !err.is_unknown_commit_result() {
                    self.active = false;
                }
                Err(err)
            }
        }
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.try_commit().await
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.active = false;
        if let Err(e) = self.session.abort_transaction().await {
            warn!(error = %e, "Abort reported an error");
            return Err(e.into());
        }
        Ok(())
    }

    fn options(&self) -> TransactionOptions {
        self.options
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ROLE_CLINIC_ADMIN, ROLE_CLINIC_MEMBER};

    #[test]
    fn test_clinician_update_always_sets_roles() {
        let set = clinician_update(Clinician::new("c1", "u1")).unwrap();
        assert!(set.get_array("roles").unwrap().is_empty());
        assert!(!set.contains_key("clinicId"));
        assert!(set.contains_key("updatedTime"));

        let set = clinician_update(
            Clinician::new("c1", "u1").with_roles([ROLE_CLINIC_ADMIN, ROLE_CLINIC_MEMBER]),
        )
        .unwrap();
        assert_eq!(set.get_array("roles").unwrap().len(), 2);
    }
}

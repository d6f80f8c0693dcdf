//! Append-only audit log of deleted entities.
//!
//! Every removed clinic, clinician or patient is copied into an
//! `<type>_deletions` collection before (or in the same transaction as) its
//! removal. The log only ever grows: [`DeletionLog`] offers inserts and index
//! provisioning, nothing else.
//!
//! ```compile_fail
//! use std::sync::Arc;
//! use clinic_persistence::backends::memory::MemoryBackend;
//! use clinic_persistence::deletions::DeletionLog;
//! use clinic_persistence::types::Clinic;
//!
//! let log = DeletionLog::<Clinic>::new(Arc::new(MemoryBackend::new()), "clinic", ["_id"]);
//! // Records cannot be rewritten or purged.
//! log.delete_many(&[]);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::context::OperationContext;
use crate::core::{DeletionSink, DeletionStore};
use crate::error::StorageResult;
use crate::types::{IndexSpec, timestamp};

/// Field holding the deletion instant.
pub const DELETED_TIME_FIELD: &str = "deletedTime";

/// Field holding the acting user, when known.
pub const DELETED_BY_FIELD: &str = "deletedByUserId";

/// Who removed an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionMetadata {
    /// The acting user. Omitted from the record when `None`.
    pub deleted_by_user_id: Option<String>,
}

impl DeletionMetadata {
    /// Metadata attributing the deletion to `user_id`.
    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self {
            deleted_by_user_id: Some(user_id.into()),
        }
    }

    /// Metadata taken from the acting user of `ctx`, if any.
    pub fn from_context(ctx: &OperationContext) -> Self {
        Self {
            deleted_by_user_id: ctx.user_id().map(str::to_string),
        }
    }
}

/// A deleted entity as stored in the log.
///
/// Serializes to `{"<type>": entity, "deletedTime": ..., "deletedByUserId": ...}`.
#[derive(Debug, Clone)]
pub struct DeletionRecord<'a, T> {
    entity_type: &'a str,
    entity: &'a T,
    deleted_time: DateTime<Utc>,
    deleted_by_user_id: Option<&'a str>,
}

impl<'a, T: Serialize> DeletionRecord<'a, T> {
    /// Wraps `entity` as deleted at `deleted_time`.
    pub fn new(
        entity_type: &'a str,
        entity: &'a T,
        deleted_time: DateTime<Utc>,
        metadata: &'a DeletionMetadata,
    ) -> Self {
        Self {
            entity_type,
            entity,
            deleted_time,
            deleted_by_user_id: metadata.deleted_by_user_id.as_deref(),
        }
    }

    /// Renders the record as a store document.
    pub fn to_document(&self) -> StorageResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<T: Serialize> Serialize for DeletionRecord<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.deleted_by_user_id.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(self.entity_type, self.entity)?;
        map.serialize_entry(DELETED_TIME_FIELD, &timestamp::format(&self.deleted_time))?;
        if let Some(user_id) = self.deleted_by_user_id {
            map.serialize_entry(DELETED_BY_FIELD, user_id)?;
        }
        map.end()
    }
}

/// Insert-only log of deleted `T`s.
pub struct DeletionLog<T> {
    store: Arc<dyn DeletionStore>,
    entity_type: String,
    primary_key_attributes: Vec<String>,
    _entity: PhantomData<fn(&T)>,
}

impl<T> Clone for DeletionLog<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            entity_type: self.entity_type.clone(),
            primary_key_attributes: self.primary_key_attributes.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for DeletionLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionLog")
            .field("entity_type", &self.entity_type)
            .field("primary_key_attributes", &self.primary_key_attributes)
            .finish()
    }
}

impl<T: Serialize + Sync> DeletionLog<T> {
    /// Creates a log for entities tagged `entity_type`, identified by
    /// `primary_key_attributes` for indexing.
    pub fn new<I, S>(
        store: Arc<dyn DeletionStore>,
        entity_type: impl Into<String>,
        primary_key_attributes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            entity_type: entity_type.into(),
            primary_key_attributes: primary_key_attributes.into_iter().map(Into::into).collect(),
            _entity: PhantomData,
        }
    }

    /// The tag under which entities are nested.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The collection records are written to.
    pub fn collection_name(&self) -> String {
        format!("{}_deletions", self.entity_type)
    }

    /// The indexes of the log collection: one over the nested primary key and
    /// one over the deletion time followed by the same key.
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        let nested: Vec<String> = self
            .primary_key_attributes
            .iter()
            .map(|attr| format!("{}.{}", self.entity_type, attr))
            .collect();

        let by_key = nested
            .iter()
            .fold(IndexSpec::new(format!("{}Deletion", capitalize(&self.entity_type))), |spec, path| {
                spec.asc(path.as_str())
            });
        let by_time = nested
            .iter()
            .fold(IndexSpec::new("DeletedTime").asc(DELETED_TIME_FIELD), |spec, path| {
                spec.asc(path.as_str())
            });

        vec![by_key, by_time]
    }

    /// Provisions the log's indexes.
    pub async fn initialize(&self, ctx: &OperationContext) -> StorageResult<()> {
        let collection = self.collection_name();
        let indexes = self.index_specs();
        ctx.bounded(self.store.create_indexes(&collection, &indexes))
            .await
    }

    /// Records one deleted entity.
    pub async fn create(
        &self,
        ctx: &OperationContext,
        entity: &T,
        metadata: &DeletionMetadata,
    ) -> StorageResult<()> {
        self.create_many(ctx, std::slice::from_ref(entity), metadata)
            .await
    }

    /// Records deleted entities in one insert. An empty slice writes nothing.
    pub async fn create_many(
        &self,
        ctx: &OperationContext,
        entities: &[T],
        metadata: &DeletionMetadata,
    ) -> StorageResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let documents = self.documents(entities, metadata)?;
        let collection = self.collection_name();
        ctx.bounded(self.store.insert_deletions(&collection, documents))
            .await
    }

    /// Records one deleted entity inside an open transaction.
    pub async fn create_in<S>(
        &self,
        sink: &mut S,
        entity: &T,
        metadata: &DeletionMetadata,
    ) -> StorageResult<()>
    where
        S: DeletionSink + ?Sized,
    {
        self.create_many_in(sink, std::slice::from_ref(entity), metadata)
            .await
    }

    /// Records deleted entities inside an open transaction. An empty slice
    /// writes nothing.
    pub async fn create_many_in<S>(
        &self,
        sink: &mut S,
        entities: &[T],
        metadata: &DeletionMetadata,
    ) -> StorageResult<()>
    where
        S: DeletionSink + ?Sized,
    {
        if entities.is_empty() {
            return Ok(());
        }
        let documents = self.documents(entities, metadata)?;
        sink.insert_deletions(&self.collection_name(), documents)
            .await
    }

    fn documents(&self, entities: &[T], metadata: &DeletionMetadata) -> StorageResult<Vec<Value>> {
        let deleted_time = timestamp::now();
        debug!(
            entity_type = %self.entity_type,
            count = entities.len(),
            deleted_by = ?metadata.deleted_by_user_id,
            "Recording deletions"
        );
        entities
            .iter()
            .map(|entity| {
                DeletionRecord::new(&self.entity_type, entity, deleted_time, metadata).to_document()
            })
            .collect()
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryBackend;
    use crate::types::{Clinician, IndexOrder};
    use chrono::TimeZone;
    use serde_json::json;

    fn clinician_log() -> DeletionLog<Clinician> {
        DeletionLog::new(Arc::new(MemoryBackend::new()), "clinician", ["clinicId", "userId"])
    }

    #[test]
    fn test_record_shape() {
        let clinician = Clinician::new("c1", "u1");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let metadata = DeletionMetadata::by_user("admin-1");
        let document = DeletionRecord::new("clinician", &clinician, at, &metadata)
            .to_document()
            .unwrap();
        assert_eq!(
            document,
            json!({
                "clinician": {"clinicId": "c1", "userId": "u1"},
                "deletedTime": "2024-03-01T12:00:00.000Z",
                "deletedByUserId": "admin-1",
            })
        );

        let anonymous = DeletionMetadata::default();
        let document = DeletionRecord::new("clinician", &clinician, at, &anonymous)
            .to_document()
            .unwrap();
        assert!(document.get(DELETED_BY_FIELD).is_none());
    }

    #[test]
    fn test_collection_and_indexes() {
        let log = clinician_log();
        assert_eq!(log.collection_name(), "clinician_deletions");

        let indexes = log.index_specs();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name, "ClinicianDeletion");
        assert_eq!(
            indexes[0].key_paths(),
            vec!["clinician.clinicId", "clinician.userId"]
        );
        assert_eq!(indexes[1].name, "DeletedTime");
        assert_eq!(
            indexes[1].key_paths(),
            vec!["deletedTime", "clinician.clinicId", "clinician.userId"]
        );
        assert!(
            indexes[1]
                .keys
                .iter()
                .all(|(_, order)| *order == IndexOrder::Ascending)
        );
    }

    #[test]
    fn test_metadata_from_context() {
        let ctx = OperationContext::new().with_user_id("u9");
        assert_eq!(
            DeletionMetadata::from_context(&ctx).deleted_by_user_id.as_deref(),
            Some("u9")
        );
        assert_eq!(DeletionMetadata::from_context(&OperationContext::new()), DeletionMetadata::default());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("patient"), "Patient");
        assert_eq!(capitalize(""), "");
    }
}

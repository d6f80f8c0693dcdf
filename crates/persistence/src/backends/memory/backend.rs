//! In-memory backend implementation.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::{
    Backend, BackendKind, DeletionStore, IndexProvisioner, TransactionOptions,
    TransactionProvider,
};
use crate::error::StorageResult;
use crate::summary::{SummaryKey, SummaryQuery, SummaryStore, UpsertOutcome};
use crate::types::{
    Clinic, Clinician, IndexSpec, Page, Patient, clinic_indexes, clinician_indexes,
    patient_indexes,
};

use super::state::{MemoryState, generate_id};
use super::summary;
use super::transaction::MemoryTransaction;

/// Collection holding clinics.
pub const CLINICS_COLLECTION: &str = "clinics";
/// Collection holding clinicians.
pub const CLINICIANS_COLLECTION: &str = "clinicians";
/// Collection holding patients.
pub const PATIENTS_COLLECTION: &str = "patients";

/// Store kept entirely in process memory.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed clinic, ordered by id.
    pub async fn clinics(&self) -> Vec<Clinic> {
        self.state.lock().await.clinics.values().cloned().collect()
    }

    /// Every committed clinician, ordered by id.
    pub async fn clinicians(&self) -> Vec<Clinician> {
        self.state.lock().await.clinicians.values().cloned().collect()
    }

    /// Every committed patient, ordered by id.
    pub async fn patients(&self) -> Vec<Patient> {
        self.state.lock().await.patients.values().cloned().collect()
    }

    /// Every stored summary document.
    pub async fn summaries(&self) -> Vec<Value> {
        self.state.lock().await.summaries.values().cloned().collect()
    }

    /// The audit documents written to `collection`, in insertion order.
    pub async fn deletion_records(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .await
            .deletions
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// The indexes declared on `collection`.
    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.state
            .lock()
            .await
            .indexes
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn initialize(&self) -> StorageResult<()> {
        self.create_indexes(CLINICS_COLLECTION, &clinic_indexes())
            .await?;
        self.create_indexes(CLINICIANS_COLLECTION, &clinician_indexes())
            .await?;
        self.create_indexes(PATIENTS_COLLECTION, &patient_indexes())
            .await?;
        info!(backend = self.name(), "Backend initialized");
        Ok(())
    }
}

#[async_trait]
impl IndexProvisioner for MemoryBackend {
    async fn create_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> StorageResult<()> {
        debug!(collection, count = indexes.len(), "Declaring indexes");
        self.state.lock().await.create_indexes(collection, indexes);
        Ok(())
    }
}

#[async_trait]
impl DeletionStore for MemoryBackend {
    async fn insert_deletions(&self, collection: &str, documents: Vec<Value>) -> StorageResult<()> {
        self.state
            .lock()
            .await
            .insert_deletions(collection, documents);
        Ok(())
    }
}

fn key_matches(document: &Value, key: &SummaryKey) -> bool {
    document.get("userId").and_then(Value::as_str) == Some(key.user_id.as_str())
        && document.get("type").and_then(Value::as_str) == Some(key.summary_type.as_str())
}

#[async_trait]
impl SummaryStore for MemoryBackend {
    async fn find_summary(&self, key: &SummaryKey) -> StorageResult<Option<Value>> {
        let state = self.state.lock().await;
        Ok(state
            .summaries
            .values()
            .find(|document| key_matches(document, key))
            .cloned())
    }

    async fn delete_summary(&self, key: &SummaryKey) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.summaries.len();
        state
            .summaries
            .retain(|_, document| !key_matches(document, key));
        Ok((before - state.summaries.len()) as u64)
    }

    async fn upsert_summary(&self, key: &SummaryKey, document: Value) -> StorageResult<UpsertOutcome> {
        let mut state = self.state.lock().await;

        let Value::Object(fields) = document else {
            return Err(crate::error::BackendError::SerializationError {
                message: "summary document must be an object".to_string(),
            }
            .into());
        };

        let existing = state
            .summaries
            .iter_mut()
            .find(|(_, stored)| key_matches(stored, key));

        if let Some((_, stored)) = existing {
            let before = stored.clone();
            if let Value::Object(target) = stored {
                for (name, value) in fields {
                    if name != "_id" {
                        target.insert(name, value);
                    }
                }
            }
            let modified = u64::from(*stored != before);
            return Ok(UpsertOutcome {
                matched: 1,
                modified,
                upserted: false,
            });
        }

        let id = generate_id();
        let mut inserted = fields;
        inserted.insert("_id".to_string(), Value::String(id.clone()));
        inserted.insert("userId".to_string(), Value::String(key.user_id.clone()));
        inserted.insert(
            "type".to_string(),
            Value::String(key.summary_type.as_str().to_string()),
        );
        state.summaries.insert(id, Value::Object(inserted));

        Ok(UpsertOutcome {
            matched: 0,
            modified: 0,
            upserted: true,
        })
    }

    async fn query_summaries(&self, query: &SummaryQuery) -> StorageResult<Page<Value>> {
        let state = self.state.lock().await;
        let (items, total) = summary::execute(state.summaries.values().cloned(), query)?;
        Ok(Page::new(items, total))
    }
}

#[async_trait]
impl TransactionProvider for MemoryBackend {
    type Transaction = MemoryTransaction;

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
    ) -> StorageResult<Self::Transaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(MemoryTransaction::new(guard, options))
    }
}

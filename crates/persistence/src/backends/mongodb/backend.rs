//! MongoDB backend implementation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::{Acknowledgment, ClientOptions, ReadConcern, WriteConcern};
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::{
    Backend, BackendConfig, BackendKind, DeletionStore, Durability, IndexProvisioner,
    IsolationLevel, TransactionOptions, TransactionProvider,
};
use crate::error::{BackendError, StorageError, StorageResult, TransactionError};
use crate::types::{IndexSpec, clinic_indexes, clinician_indexes, patient_indexes};

use super::convert::{index_model, operation_failed, to_document};
use super::transaction::MongoTransaction;

/// Collection holding clinics.
pub const CLINICS_COLLECTION: &str = "clinics";
/// Collection holding clinicians.
pub const CLINICIANS_COLLECTION: &str = "clinicians";
/// Collection holding patients.
pub const PATIENTS_COLLECTION: &str = "patients";

/// MongoDB backend.
///
/// Transactions require a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoBackend {
    client: Client,
    database: Database,
    config: BackendConfig,
}

impl Debug for MongoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoBackend")
            .field("database", &self.config.database_name)
            .finish_non_exhaustive()
    }
}

impl MongoBackend {
    /// Connects using `config`.
    ///
    /// The driver connects lazily; call [`Backend::health_check`] to verify
    /// the server is reachable.
    pub async fn connect(config: BackendConfig) -> StorageResult<Self> {
        let mut options = ClientOptions::parse(&config.connection_string)
            .await
            .map_err(|e| connection_failed(e.to_string()))?;
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));
        options.app_name = Some("clinic".to_string());

        let client = Client::with_options(options).map_err(|e| connection_failed(e.to_string()))?;
        let database = client.database(&config.database_name);

        info!(database = %config.database_name, "MongoDB client created");
        Ok(Self {
            client,
            database,
            config,
        })
    }

    /// Returns the configuration the backend was built with.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub(crate) fn database(&self) -> &Database {
        &self.database
    }

    pub(crate) fn documents(&self, collection: &str) -> Collection<Document> {
        self.database.collection(collection)
    }
}

fn connection_failed(message: String) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: "mongodb".to_string(),
        message,
    })
}

pub(crate) fn read_concern(level: IsolationLevel) -> ReadConcern {
    match level {
        IsolationLevel::Local => ReadConcern::local(),
        IsolationLevel::Majority => ReadConcern::majority(),
        IsolationLevel::Snapshot => ReadConcern::snapshot(),
    }
}

pub(crate) fn write_concern(durability: Durability) -> WriteConcern {
    let acknowledgment = match durability {
        Durability::Acknowledged => Acknowledgment::Nodes(1),
        Durability::Majority => Acknowledgment::Majority,
    };
    WriteConcern::builder().w(acknowledgment).build()
}

#[async_trait]
impl Backend for MongoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDB
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| connection_failed(e.to_string()))?;
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
impl IndexProvisioner for MongoBackend {
    async fn create_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> StorageResult<()> {
        if indexes.is_empty() {
            return Ok(());
        }
        debug!(collection, count = indexes.len(), "Creating indexes");
        let models: Vec<_> = indexes.iter().map(index_model).collect();
        self.documents(collection)
            .create_indexes(models)
            .await
            .map_err(|e| operation_failed("create_indexes", collection, e))?;
        Ok(())
    }
}

#[async_trait]
impl DeletionStore for MongoBackend {
    async fn insert_deletions(&self, collection: &str, documents: Vec<Value>) -> StorageResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let documents = documents
            .iter()
            .map(to_document)
            .collect::<StorageResult<Vec<_>>>()?;
        self.documents(collection)
            .insert_many(documents)
            .await
            .map_err(|e| operation_failed("insert_many", collection, e))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionProvider for MongoBackend {
    type Transaction = MongoTransaction;

    async fn begin_transaction(
        &self,
        options: TransactionOptions,
    ) -> StorageResult<Self::Transaction> {
        let mut session = self.client.start_session().await.map_err(|e| {
            StorageError::Transaction(TransactionError::SessionUnavailable {
                message: format!("unable to start session: {e}"),
            })
        })?;

        session
            .start_transaction()
            .read_concern(read_concern(options.isolation_level))
            .write_concern(write_concern(options.durability))
            .await
            .map_err(|e| {
                StorageError::Transaction(TransactionError::SessionUnavailable {
                    message: format!("unable to start transaction: {e}"),
                })
            })?;

        Ok(MongoTransaction::new(session, self.database().clone(), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transaction_concerns() {
        let options = TransactionOptions::new();
        assert_eq!(read_concern(options.isolation_level), ReadConcern::snapshot());
        assert_eq!(
            write_concern(options.durability).w,
            Some(Acknowledgment::Majority)
        );
    }

    #[test]
    fn test_acknowledged_durability() {
        assert_eq!(
            write_concern(Durability::Acknowledged).w,
            Some(Acknowledgment::Nodes(1))
        );
    }
}

//! Store seams shared by the repositories.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::types::IndexSpec;

/// Applies declared indexes to a collection.
#[async_trait]
pub trait IndexProvisioner: Send + Sync {
    /// Creates `indexes` on `collection`. Existing identical indexes are kept.
    async fn create_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> StorageResult<()>;
}

/// Append-only sink for audit documents written outside a transaction.
#[async_trait]
pub trait DeletionStore: IndexProvisioner {
    /// Inserts already-shaped deletion documents into `collection`.
    async fn insert_deletions(&self, collection: &str, documents: Vec<Value>) -> StorageResult<()>;
}

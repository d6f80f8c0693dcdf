//! Typed repository over the summary collection.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::filter::Filter;
use super::model::Summary;
use super::period::Period;
use super::query;
use super::store::{SUMMARY_COLLECTION, SummaryKey, SummaryStore, summary_indexes};
use crate::context::OperationContext;
use crate::error::{StorageError, StorageResult};
use crate::types::{Page, Pagination, Sort};

/// Reads, writes and lists summaries of one [`Period`] type.
///
/// Every operation is scoped to `T`'s discriminant: a CGM repository never
/// sees BGM documents even though both live in one collection.
pub struct SummaryRepository<T: Period> {
    store: Arc<dyn SummaryStore>,
    _period: PhantomData<fn() -> T>,
}

impl<T: Period> Clone for SummaryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _period: PhantomData,
        }
    }
}

impl<T: Period> std::fmt::Debug for SummaryRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryRepository")
            .field("summary_type", &T::summary_type())
            .finish()
    }
}

impl<T: Period> SummaryRepository<T> {
    /// Creates a repository over `store`.
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self {
            store,
            _period: PhantomData,
        }
    }

    fn key(user_id: &str) -> SummaryKey {
        SummaryKey::new(user_id, T::summary_type())
    }

    /// Provisions the summary collection's indexes.
    pub async fn initialize(&self, ctx: &OperationContext) -> StorageResult<()> {
        ctx.bounded(
            self.store
                .create_indexes(SUMMARY_COLLECTION, &summary_indexes()),
        )
        .await
    }

    /// Returns the summary of `user_id`.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - no summary of this type exists
    pub async fn get(&self, ctx: &OperationContext, user_id: &str) -> StorageResult<Summary<T>> {
        let key = Self::key(user_id);
        let document = ctx
            .bounded(self.store.find_summary(&key))
            .await?
            .ok_or_else(|| StorageError::not_found(summary_resource::<T>(), user_id))?;

        Ok(serde_json::from_value(document)?)
    }

    /// Deletes the summary of `user_id`.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - nothing was deleted
    pub async fn remove(&self, ctx: &OperationContext, user_id: &str) -> StorageResult<()> {
        let key = Self::key(user_id);
        let deleted = ctx.bounded(self.store.delete_summary(&key)).await?;
        if deleted == 0 {
            return Err(StorageError::not_found(summary_resource::<T>(), user_id));
        }
        Ok(())
    }

    /// Inserts or replaces the summary keyed by `(user_id, type)`.
    ///
    /// # Errors
    ///
    /// * `ValidationError::SummaryTypeMismatch` - the summary's type is not
    ///   `T`'s; nothing is written
    /// * `ValidationError::MissingRequiredField` - the user id is empty
    /// * `ResourceError::NotFound` - the store neither matched nor inserted
    ///   a document
    pub async fn create_or_update(
        &self,
        ctx: &OperationContext,
        summary: &Summary<T>,
    ) -> StorageResult<()> {
        summary.validate()?;

        let mut document = serde_json::to_value(summary)?;
        if let Value::Object(fields) = &mut document {
            fields.remove("_id");
        }

        let key = Self::key(&summary.user_id);
        let outcome = ctx
            .bounded(self.store.upsert_summary(&key, document))
            .await?;

        debug!(
            user_id = %summary.user_id,
            summary_type = %T::summary_type(),
            matched = outcome.matched,
            modified = outcome.modified,
            upserted = outcome.upserted,
            "Summary upserted"
        );

        if outcome.matched == 0 && !outcome.upserted {
            return Err(StorageError::not_found(
                summary_resource::<T>(),
                &summary.user_id,
            ));
        }
        Ok(())
    }

    /// Lists summaries matching `filter`.
    ///
    /// Returns the requested window together with the total number of
    /// matches. No matches yields an empty page.
    pub async fn list(
        &self,
        ctx: &OperationContext,
        filter: &Filter,
        pagination: Pagination,
        sorts: &[Sort],
    ) -> StorageResult<Page<Summary<T>>> {
        let query = query::compile(T::summary_type(), filter, pagination, sorts)?;
        debug!(
            summary_type = %T::summary_type(),
            clauses = query.predicate.len(),
            sort = ?query.sort,
            skip = query.skip,
            limit = query.limit,
            case_insensitive = query.case_insensitive,
            "Listing summaries"
        );

        let page = ctx.bounded(self.store.query_summaries(&query)).await?;

        let items = page
            .items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Summary<T>>, _>>()?;

        Ok(Page::new(items, page.total))
    }
}

fn summary_resource<T: Period>() -> String {
    format!("{}Summary", T::summary_type().as_str().to_uppercase())
}

//! Transaction traits for multi-document operations.
//!
//! A [`Transaction`] is a session-bound handle: it implements the clinic,
//! clinician, patient and deletion repositories, and every write made through
//! it becomes visible atomically on commit. [`TransactionProvider`] opens
//! transactions and runs units of work inside them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, error};

use crate::context::OperationContext;
use crate::error::StorageResult;
use crate::types::{Clinic, ClinicFilter, Clinician, Pagination, Patient};

/// Read isolation requested for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Reads the node's most recent data.
    Local,
    /// Reads data acknowledged by a majority of replicas.
    Majority,
    /// Point-in-time consistent view for the whole transaction.
    #[default]
    Snapshot,
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationLevel::Local => write!(f, "local"),
            IsolationLevel::Majority => write!(f, "majority"),
            IsolationLevel::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Acknowledgement required before a commit returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// The primary acknowledged the write.
    Acknowledged,
    /// A majority of replicas acknowledged the write.
    #[default]
    Majority,
}

impl std::fmt::Display for Durability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Durability::Acknowledged => write!(f, "acknowledged"),
            Durability::Majority => write!(f, "majority"),
        }
    }
}

/// Options for starting a transaction.
///
/// The default is snapshot reads with majority-acknowledged commits, which is
/// what every operation in this crate uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    /// The read isolation for the transaction.
    pub isolation_level: IsolationLevel,
    /// The commit durability.
    pub durability: Durability,
}

impl TransactionOptions {
    /// Creates new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level.
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Sets the commit durability.
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }
}

/// Clinic operations available inside a transaction.
#[async_trait]
pub trait ClinicRepository: Send {
    /// Inserts a new clinic and returns it with its id and timestamps.
    ///
    /// # Errors
    ///
    /// * `ResourceError::DuplicateShareCode` - another clinic owns one of the
    ///   share codes
    async fn create_clinic(&mut self, clinic: Clinic) -> StorageResult<Clinic>;

    /// Reads a clinic by id.
    async fn get_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic>;

    /// Lists clinics matching `filter`, ordered by id.
    async fn list_clinics(
        &mut self,
        filter: &ClinicFilter,
        pagination: Pagination,
    ) -> StorageResult<Vec<Clinic>>;

    /// Adds `user_id` to the admin set. Idempotent.
    async fn upsert_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()>;

    /// Removes `user_id` from the admin set. Idempotent.
    async fn remove_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()>;

    /// Deletes the clinic and returns the removed document.
    async fn delete_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic>;
}

/// Clinician operations available inside a transaction.
#[async_trait]
pub trait ClinicianRepository: Send {
    /// Inserts a clinician.
    ///
    /// # Errors
    ///
    /// * `ResourceError::AlreadyExists` - the clinic already has a clinician
    ///   with the same user id, invite id or email
    async fn create_clinician(&mut self, clinician: Clinician) -> StorageResult<Clinician>;

    /// Reads the clinician bound to `user_id` in a clinic.
    async fn get_clinician(&mut self, clinic_id: &str, user_id: &str)
    -> StorageResult<Clinician>;

    /// Applies the populated fields of `clinician` to the clinician bound to
    /// `user_id` and returns the stored result.
    async fn update_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
        clinician: Clinician,
    ) -> StorageResult<Clinician>;

    /// Binds a pending invite to `user_id` and clears the invite id.
    async fn resolve_invite(
        &mut self,
        clinic_id: &str,
        invite_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician>;

    /// Deletes every clinician of a clinic and returns the removed documents.
    async fn delete_clinicians(&mut self, clinic_id: &str) -> StorageResult<Vec<Clinician>>;
}

/// Patient operations available inside a transaction.
#[async_trait]
pub trait PatientRepository: Send {
    /// Inserts a patient.
    async fn create_patient(&mut self, patient: Patient) -> StorageResult<Patient>;

    /// Lists up to `limit` patients of a clinic.
    async fn list_patients(&mut self, clinic_id: &str, limit: u32) -> StorageResult<Vec<Patient>>;

    /// Deletes every patient of a clinic and returns the removed documents.
    async fn delete_patients(&mut self, clinic_id: &str) -> StorageResult<Vec<Patient>>;
}

/// Audit writes available inside a transaction.
#[async_trait]
pub trait DeletionSink: Send {
    /// Inserts already-shaped deletion documents into `collection`.
    async fn insert_deletions(&mut self, collection: &str, documents: Vec<Value>)
    -> StorageResult<()>;
}

/// A database transaction.
///
/// This trait represents an active transaction bound to one store session.
/// Changes are only persisted when `commit()` is called. Dropping an
/// uncommitted transaction aborts it and releases the session.
#[async_trait]
pub trait Transaction:
    ClinicRepository + ClinicianRepository + PatientRepository + DeletionSink + Send
{
    /// Attempts to commit the transaction.
    ///
    /// On `TransactionError::UnknownCommitResult` the transaction stays
    /// active and the commit may be attempted again. On any other outcome it
    /// is no longer active.
    async fn try_commit(&mut self) -> StorageResult<()>;

    /// Commits the transaction, persisting all changes.
    ///
    /// After calling this, the transaction is consumed and cannot be used again.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Rolls back the transaction, discarding all changes.
    ///
    /// After calling this, the transaction is consumed and cannot be used again.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;

    /// Returns the options the transaction was started with.
    fn options(&self) -> TransactionOptions;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}

/// How long a unit of work keeps being retried after transient failures.
pub const TRANSACTION_RETRY_WINDOW: Duration = Duration::from_secs(120);

/// Returns true if another attempt fits in both the retry window and the
/// caller's deadline.
fn can_retry(ctx: &OperationContext, started: Instant) -> bool {
    started.elapsed() < TRANSACTION_RETRY_WINDOW
        && ctx.remaining().is_none_or(|left| !left.is_zero())
}

/// Commits `tx`, repeating the commit while its outcome is unknown.
async fn commit_with_retry<T>(
    tx: &mut T,
    ctx: &OperationContext,
    started: Instant,
) -> StorageResult<()>
where
    T: Transaction,
{
    loop {
        match ctx.bounded(tx.try_commit()).await {
            Err(err) if err.is_unknown_commit_result() && can_retry(ctx, started) => {
                debug!(error = %err, "Commit result unknown, committing again");
            }
            outcome => return outcome,
        }
    }
}

/// Provider for transaction support.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// The transaction type returned by this provider.
    type Transaction: Transaction;

    /// Opens a session and starts a transaction on it.
    ///
    /// # Errors
    ///
    /// * `StorageError::Transaction(SessionUnavailable)` - the session or the
    ///   transaction could not be started
    async fn begin_transaction(
        &self,
        options: TransactionOptions,
    ) -> StorageResult<Self::Transaction>;

    /// Executes a unit of work within a transaction.
    ///
    /// If the work returns `Ok`, the transaction is committed and the value is
    /// returned. If it returns `Err`, or the context deadline elapses, the
    /// transaction is rolled back and the error is returned unchanged. A
    /// failed rollback is logged and never replaces the original error.
    ///
    /// Transient store failures (see [`StorageError::is_transient`]) run
    /// `work` again in a fresh transaction, and a commit whose outcome is
    /// unknown is attempted again. Both stop at the context deadline or after
    /// [`TRANSACTION_RETRY_WINDOW`]. `work` must therefore be repeatable.
    ///
    /// [`StorageError::is_transient`]: crate::StorageError::is_transient
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::FutureExt;
    ///
    /// let clinic_id = clinic_id.to_string();
    /// provider
    ///     .with_transaction(&ctx, TransactionOptions::new(), move |tx| {
    ///         let clinic_id = clinic_id.clone();
    ///         async move { tx.upsert_admin(&clinic_id, "user-1").await }.boxed()
    ///     })
    ///     .await?;
    /// ```
    async fn with_transaction<F, R>(
        &self,
        ctx: &OperationContext,
        options: TransactionOptions,
        work: F,
    ) -> StorageResult<R>
    where
        F: for<'t> Fn(&'t mut Self::Transaction) -> BoxFuture<'t, StorageResult<R>>
            + Send
            + Sync,
        R: Send,
    {
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let mut tx = self.begin_transaction(options).await?;

            let unit = work(&mut tx);
            let err = match ctx.bounded(unit).await {
                Ok(value) => match commit_with_retry(&mut tx, ctx, started).await {
                    Ok(()) => return Ok(value),
                    Err(err) => err,
                },
                Err(err) => err,
            };

            if tx.is_active() {
                if let Err(abort_err) = Box::new(tx).rollback().await {
                    error!(error = %abort_err, "error when aborting transaction");
                }
            }

            if err.is_transient() && can_retry(ctx, started) {
                debug!(attempt, error = %err, "Transient transaction failure, running again");
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }
}

//! Tests for transactional units of work.
//!
//! This module tests commit and abort scenarios, deadline handling, retries
//! after transient failures and uniqueness checks made inside a transaction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;

use clinic_persistence::backends::memory::MemoryBackend;
use clinic_persistence::core::{
    ClinicRepository, ClinicianRepository, Transaction, TransactionOptions, TransactionProvider,
};
use clinic_persistence::error::{StorageError, TransactionError};
use clinic_persistence::types::{Clinic, Clinician};
use clinic_persistence::{ErrorKind, OperationContext};

fn clinic_with_code(name: &str, code: &str) -> Clinic {
    let mut clinic = Clinic::new(name);
    clinic.assign_share_code(code);
    clinic
}

// ============================================================================
// Basic Commit Tests
// ============================================================================

#[tokio::test]
async fn test_transaction_commit() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();

    let created = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                let clinic = tx
                    .create_clinic(clinic_with_code("Riverside", "AAAA-BBBB-CCCC"))
                    .await?;
                let clinic_id = clinic.id.clone().unwrap_or_default();
                tx.create_clinician(Clinician::new(clinic_id, "user-1"))
                    .await?;
                Ok(clinic)
            }
            .boxed()
        })
        .await
        .unwrap();

    let clinics = backend.clinics().await;
    assert_eq!(clinics.len(), 1);
    assert_eq!(clinics[0].id, created.id);
    assert_eq!(backend.clinicians().await.len(), 1);
}

#[tokio::test]
async fn test_explicit_commit_and_rollback() {
    let backend = MemoryBackend::new();

    let mut tx = backend
        .begin_transaction(TransactionOptions::new())
        .await
        .unwrap();
    assert!(tx.is_active());
    tx.create_clinic(Clinic::new("Kept")).await.unwrap();
    Box::new(tx).commit().await.unwrap();

    let mut tx = backend
        .begin_transaction(TransactionOptions::new())
        .await
        .unwrap();
    tx.create_clinic(Clinic::new("Discarded")).await.unwrap();
    Box::new(tx).rollback().await.unwrap();

    let names: Vec<_> = backend
        .clinics()
        .await
        .into_iter()
        .filter_map(|clinic| clinic.name)
        .collect();
    assert_eq!(names, vec!["Kept"]);
}

// ============================================================================
// Rollback Tests
// ============================================================================

#[tokio::test]
async fn test_error_rolls_back_and_is_returned_unchanged() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                tx.create_clinic(Clinic::new("Riverside")).await?;
                Err::<(), _>(StorageError::not_found("Clinician", "user-1"))
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "resource not found: Clinician/user-1");
    assert!(backend.clinics().await.is_empty());
}

#[tokio::test]
async fn test_dropped_transaction_discards_writes() {
    let backend = MemoryBackend::new();

    {
        let mut tx = backend
            .begin_transaction(TransactionOptions::new())
            .await
            .unwrap();
        tx.create_clinic(Clinic::new("Riverside")).await.unwrap();
    }

    assert!(backend.clinics().await.is_empty());
    // The lock was released with the transaction.
    backend
        .begin_transaction(TransactionOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deadline_rolls_back() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new().with_timeout(Duration::from_millis(50));

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                tx.create_clinic(Clinic::new("Slow")).await?;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert!(backend.clinics().await.is_empty());
}

// ============================================================================
// Uniqueness Tests
// ============================================================================

#[tokio::test]
async fn test_duplicate_share_code_inside_transaction() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                tx.create_clinic(clinic_with_code("First", "AAAA-BBBB-CCCC"))
                    .await?;
                tx.create_clinic(clinic_with_code("Second", "AAAA-BBBB-CCCC"))
                    .await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert!(err.is_duplicate_share_code());
    assert!(backend.clinics().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_clinician_is_rejected() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                tx.create_clinician(Clinician::new("c1", "user-1")).await?;
                tx.create_clinician(Clinician::new("c1", "user-1")).await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Duplicate);

    // The same user may belong to another clinic.
    backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            async move {
                tx.create_clinician(Clinician::new("c1", "user-1")).await?;
                tx.create_clinician(Clinician::new("c2", "user-1")).await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap();
    assert_eq!(backend.clinicians().await.len(), 2);
}

// ============================================================================
// Retry Tests
// ============================================================================

fn write_conflict() -> StorageError {
    TransactionError::Transient {
        message: "WriteConflict".to_string(),
    }
    .into()
}

#[tokio::test]
async fn test_transient_failure_runs_unit_again() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();
    let attempts = AtomicUsize::new(0);

    let created = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let clinic = tx.create_clinic(Clinic::new(format!("Attempt {attempt}"))).await?;
                if attempt == 1 {
                    return Err(write_conflict());
                }
                Ok(clinic)
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(created.name.as_deref(), Some("Attempt 2"));

    // The first attempt's write was rolled back.
    let clinics = backend.clinics().await;
    assert_eq!(clinics.len(), 1);
    assert_eq!(clinics[0].name.as_deref(), Some("Attempt 2"));
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new();
    let attempts = AtomicUsize::new(0);

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                tx.create_clinic(Clinic::new("Riverside")).await?;
                Err::<(), _>(StorageError::not_found("Clinician", "user-1"))
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(backend.clinics().await.is_empty());
}

#[tokio::test]
async fn test_transient_failures_stop_at_deadline() {
    let backend = MemoryBackend::new();
    let ctx = OperationContext::new().with_timeout(Duration::from_millis(100));
    let attempts = AtomicUsize::new(0);

    let err = backend
        .with_transaction(&ctx, TransactionOptions::new(), |tx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                tx.create_clinic(Clinic::new("Contended")).await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<(), _>(write_conflict())
            }
            .boxed()
        })
        .await
        .unwrap_err();

    // Either the last conflict or the deadline ends the loop.
    assert!(err.is_transient() || err.kind() == ErrorKind::DeadlineExceeded);
    assert!(attempts.load(Ordering::SeqCst) > 1);
    assert!(backend.clinics().await.is_empty());
}

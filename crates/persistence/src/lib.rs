//! Clinic Persistence Layer
//!
//! This crate provides the transactional persistence core of the clinic
//! management service: clinics, clinicians and patients kept consistent
//! across collections, per-user glucose statistics summaries with filtered
//! listing, and an append-only audit log of deletions.
//!
//! # Features
//!
//! - **Transactions**: Units of work run with snapshot reads and majority
//!   commits; any error aborts every write of the unit
//! - **Admin mirroring**: A clinic's admin set always matches its admin
//!   clinicians
//! - **Share codes**: Clinics are created under a unique, generated share code
//! - **Summaries**: Typed CGM/BGM summaries with search, thresholds, sorting
//!   and paging
//! - **Audit**: Insert-only deletion records
//!
//! # Backend Features
//!
//! Enable backends with feature flags in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! clinic-persistence = { version = "0.1", features = ["mongodb"] }
//! ```
//!
//! Available backend features:
//! - (none) - in-memory backend, always available
//! - `mongodb` - MongoDB document storage (replica set)
//!
//! # Architecture
//!
//! The persistence layer is organized into several modules:
//!
//! - [`types`] - Stored documents, pagination and index declarations
//! - [`error`] - Error types for all operations
//! - [`context`] - Per-call deadline and audit identity
//! - [`core`] - Storage traits and abstractions
//! - [`summary`] - Statistics summaries and their list queries
//! - [`deletions`] - Deletion audit log
//! - [`sharecode`] - Share code generation
//! - [`services`] - Transactional services composed from the above
//! - [`backends`] - Backend implementations (memory, MongoDB)
//!
//! # Quick Start
//!
//! ```
//! use clinic_persistence::summary::{CgmPeriod, EmbeddedPatient, Summary, SummaryType};
//!
//! let summary = Summary::<CgmPeriod>::new("user-1")
//!     .with_patient(EmbeddedPatient::new("clinic-1").with_full_name("Ada Smith"));
//!
//! assert_eq!(summary.summary_type, SummaryType::Cgm.as_str());
//! assert!(summary.validate().is_ok());
//! ```
//!
//! # Transactions
//!
//! Units of work receive a session-bound transaction handle. Returning an
//! error rolls everything back:
//!
//! ```
//! use clinic_persistence::OperationContext;
//! use clinic_persistence::backends::memory::MemoryBackend;
//! use clinic_persistence::core::{ClinicRepository, TransactionOptions, TransactionProvider};
//! use clinic_persistence::types::Clinic;
//! use futures::FutureExt;
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! let result = backend
//!     .with_transaction(&OperationContext::new(), TransactionOptions::new(), |tx| {
//!         async move {
//!             tx.create_clinic(Clinic::new("Riverside")).await?;
//!             tx.get_clinic("missing").await
//!         }
//!         .boxed()
//!     })
//!     .await;
//!
//! assert!(result.unwrap_err().is_not_found());
//! assert!(backend.clinics().await.is_empty());
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod context;
pub mod core;
pub mod deletions;
pub mod error;
pub mod services;
pub mod sharecode;
pub mod summary;
pub mod types;

// Re-export commonly used types at crate root
pub use context::OperationContext;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use types::{Page, Pagination, Sort};

// Re-export core traits
pub use core::{Backend, BackendKind, Transaction, TransactionOptions, TransactionProvider};

// Re-export services
pub use services::{ClinicManager, ClinicServices, ClinicianRoleSync};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

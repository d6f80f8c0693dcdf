//! Core storage traits and abstractions.
//!
//! This module provides the foundational traits for the persistence layer:
//!
//! - [`Backend`] - Backend lifecycle (health checks, startup indexes)
//! - [`TransactionProvider`] - Runs units of work in store transactions
//! - [`Transaction`] - Session-bound handle implementing the repositories
//! - [`ClinicRepository`], [`ClinicianRepository`], [`PatientRepository`],
//!   [`DeletionSink`] - Operations available inside a transaction
//! - [`IndexProvisioner`], [`DeletionStore`] - Non-transactional store seams
//! - [`UserDirectory`] - External user lookups
//!
//! # Trait Hierarchy
//!
//! ```text
//! TransactionProvider
//!     └── Transaction
//!             ├── ClinicRepository
//!             ├── ClinicianRepository
//!             ├── PatientRepository
//!             └── DeletionSink
//!
//! IndexProvisioner
//!     ├── DeletionStore
//!     └── SummaryStore (crate::summary)
//! ```

pub mod backend;
pub mod directory;
pub mod storage;
pub mod transaction;

pub use backend::{Backend, BackendConfig, BackendKind};
pub use directory::UserDirectory;
pub use storage::{DeletionStore, IndexProvisioner};
pub use transaction::{
    ClinicRepository, ClinicianRepository, DeletionSink, Durability, IsolationLevel,
    PatientRepository, TRANSACTION_RETRY_WINDOW, Transaction, TransactionOptions,
    TransactionProvider,
};

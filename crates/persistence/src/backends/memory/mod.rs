//! In-memory backend.
//!
//! Implements every storage trait of this crate on process-local state. It is
//! what the test suite and local development run against, and it follows the
//! MongoDB backend's observable behavior: the same uniqueness rules, upsert
//! outcomes, query semantics (array-aware paths, case-insensitive collation
//! for name sorts) and transactional all-or-nothing writes.
//!
//! # Example
//!
//! ```
//! use clinic_persistence::backends::memory::MemoryBackend;
//! use clinic_persistence::core::Backend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MemoryBackend::new();
//! backend.initialize().await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod state;
mod summary;
mod transaction;

pub use backend::{
    CLINICIANS_COLLECTION, CLINICS_COLLECTION, MemoryBackend, PATIENTS_COLLECTION,
};
pub use transaction::MemoryTransaction;

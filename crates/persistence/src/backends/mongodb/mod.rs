//! MongoDB backend.
//!
//! Requires the `mongodb` feature and a replica set (multi-document
//! transactions are not available on standalone servers).
//!
//! # Example
//!
//! ```no_run
//! use clinic_persistence::backends::mongodb::MongoBackend;
//! use clinic_persistence::core::{Backend, BackendConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BackendConfig::new("mongodb://localhost:27017/?replicaSet=rs0")
//!     .with_database_name("clinic");
//! let backend = MongoBackend::connect(config).await?;
//! backend.health_check().await?;
//! backend.initialize().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Collections
//!
//! | Collection | Contents |
//! |---|---|
//! | `clinics` | clinics, unique on every share code |
//! | `clinicians` | clinicians and pending invites |
//! | `patients` | clinic patients |
//! | `summary` | per-user statistics summaries |
//! | `<type>_deletions` | audit records of deleted entities |

mod backend;
mod convert;
mod summary;
mod transaction;

pub use backend::{CLINICIANS_COLLECTION, CLINICS_COLLECTION, MongoBackend, PATIENTS_COLLECTION};
pub use transaction::MongoTransaction;
